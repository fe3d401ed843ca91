use serde::{Deserialize, Serialize};

/// Largest AS number written in decimal. Anything above uses the
/// colon-separated hex group form (`ffaa:0:1`).
const AS_DECIMAL_MAX: u64 = u32::MAX as u64;

/// Largest AS number representable (48 bits).
const AS_MAX: u64 = (1 << 48) - 1;

/// Number of 16-bit hex groups in the long AS form.
const AS_GROUPS: usize = 3;

/// An ISD-AS identity, the unit every Coordinator call and local
/// directory lookup is keyed by. Wire and display form is `"I-A"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ia {
    isd: u16,
    asn: u64,
}

impl Ia {
    pub fn new(isd: u16, asn: u64) -> Result<Self, IaError> {
        if asn > AS_MAX {
            return Err(IaError::Invalid(format!("AS number {asn} exceeds 48 bits")));
        }
        Ok(Self { isd, asn })
    }

    /// Parse `"I-A"` where `A` is decimal or three hex groups.
    /// Surrounding whitespace (e.g. a trailing newline from a file) is ignored.
    pub fn parse(s: &str) -> Result<Self, IaError> {
        let s = s.trim();
        let (isd, asn) = s
            .split_once('-')
            .ok_or_else(|| IaError::Invalid(format!("expected \"I-A\", got '{s}'")))?;

        let isd: u16 = isd
            .parse()
            .map_err(|_| IaError::Invalid(format!("invalid ISD '{isd}' in '{s}'")))?;

        let asn = if asn.contains(':') {
            parse_hex_groups(asn).ok_or_else(|| IaError::Invalid(format!("invalid AS '{asn}'")))?
        } else {
            asn.parse::<u64>()
                .ok()
                .filter(|a| *a <= AS_DECIMAL_MAX)
                .ok_or_else(|| IaError::Invalid(format!("invalid AS '{asn}'")))?
        };

        Self::new(isd, asn)
    }

    pub fn isd(&self) -> u16 {
        self.isd
    }

    pub fn asn(&self) -> u64 {
        self.asn
    }

    /// AS part in its display form (`1007` or `ffaa:0:1`).
    pub fn as_str(&self) -> String {
        if self.asn <= AS_DECIMAL_MAX {
            self.asn.to_string()
        } else {
            format!(
                "{:x}:{:x}:{:x}",
                (self.asn >> 32) & 0xffff,
                (self.asn >> 16) & 0xffff,
                self.asn & 0xffff
            )
        }
    }

    /// AS part as used in directory names, where `:` is not portable.
    pub fn as_file_str(&self) -> String {
        self.as_str().replace(':', "_")
    }

    /// `I-A` with the file-system AS form, e.g. `17-ffaa_0_1`.
    pub fn file_str(&self) -> String {
        format!("{}-{}", self.isd, self.as_file_str())
    }
}

fn parse_hex_groups(s: &str) -> Option<u64> {
    let groups: Vec<&str> = s.split(':').collect();
    if groups.len() != AS_GROUPS {
        return None;
    }
    groups.iter().try_fold(0u64, |acc, g| {
        if g.is_empty() || g.len() > 4 {
            return None;
        }
        u16::from_str_radix(g, 16)
            .ok()
            .map(|v| (acc << 16) | u64::from(v))
    })
}

impl std::fmt::Display for Ia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.isd, self.as_str())
    }
}

impl std::str::FromStr for Ia {
    type Err = IaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ia::parse(s)
    }
}

impl TryFrom<String> for Ia {
    type Error = IaError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Ia::parse(&s)
    }
}

impl From<Ia> for String {
    fn from(ia: Ia) -> Self {
        ia.to_string()
    }
}

/// Error parsing an ISD-AS string.
#[derive(Debug, thiserror::Error)]
pub enum IaError {
    #[error("Invalid ISD-AS: {0}")]
    Invalid(String),
}
