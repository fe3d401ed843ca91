use std::path::{Path, PathBuf};

use crate::types::Ia;

/// Environment variable naming the SCION installation root.
pub const SC_ENV: &str = "SC";

/// Active configuration directory name under the installation root.
pub const GEN_DIR: &str = "gen";

/// File inside the active configuration holding the local `I-A`.
pub const IA_FILE: &str = "ia";

/// Suffix of private signing-key seed files.
pub const KEY_SUFFIX: &str = ".seed";

/// SCION installation root.
///
/// Taken from `$SC` when set, otherwise the conventional source checkout
/// location `~/go/src/github.com/scionproto/scion`.
pub fn sc_root() -> PathBuf {
    if let Some(sc) = std::env::var_os(SC_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(sc);
    }
    default_sc_root()
}

fn default_sc_root() -> PathBuf {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join("go")
        .join("src")
        .join("github.com")
        .join("scionproto")
        .join("scion")
}

/// Active configuration directory (`$SC/gen`).
pub fn gen_dir(sc_root: &Path) -> PathBuf {
    sc_root.join(GEN_DIR)
}

/// Retained backup of a displaced configuration (`$SC/gen.<stamp>`).
pub fn backup_dir(active: &Path, stamp: &str) -> PathBuf {
    let mut name = active
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| GEN_DIR.into());
    name.push(".");
    name.push(stamp);
    active.with_file_name(name)
}

/// Key directory of the beacon server instance of `ia`:
/// `gen/ISD{I}/AS{A}/bs{I}-{A}-1/keys`.
pub fn key_dir(gen_dir: &Path, ia: &Ia) -> PathBuf {
    gen_dir
        .join(format!("ISD{}", ia.isd()))
        .join(format!("AS{}", ia.as_file_str()))
        .join(format!("bs{}-1", ia.file_str()))
        .join("keys")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_dir_for_decimal_ia() {
        let ia = Ia::parse("1-7").unwrap();
        let dir = key_dir(Path::new("/opt/scion/gen"), &ia);
        assert_eq!(dir, PathBuf::from("/opt/scion/gen/ISD1/AS7/bs1-7-1/keys"));
    }

    #[test]
    fn key_dir_for_hex_ia() {
        let ia = Ia::parse("17-ffaa:0:1").unwrap();
        let dir = key_dir(Path::new("/opt/scion/gen"), &ia);
        assert_eq!(
            dir,
            PathBuf::from("/opt/scion/gen/ISD17/ASffaa_0_1/bs17-ffaa_0_1-1/keys")
        );
    }

    #[test]
    fn backup_dir_is_sibling_with_stamp() {
        let dir = backup_dir(Path::new("/opt/scion/gen"), "2024-01-01T00-00-00");
        assert_eq!(dir, PathBuf::from("/opt/scion/gen.2024-01-01T00-00-00"));
    }

    #[test]
    fn gen_dir_joins_root() {
        assert_eq!(
            gen_dir(Path::new("/opt/scion")),
            PathBuf::from("/opt/scion/gen")
        );
    }

    #[test]
    fn default_root_ends_in_scion_checkout() {
        assert!(default_sc_root().ends_with("go/src/github.com/scionproto/scion"));
    }
}
