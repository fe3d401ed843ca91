//! Private signing-key material on disk.
//!
//! Key directories hold base64-encoded seed files (`*.seed`). File names
//! encode recency, so the lexically-greatest name is the current key.

use std::path::{Path, PathBuf};

use remap_common::encoding::b64_decode;
use remap_common::paths::KEY_SUFFIX;
use zeroize::Zeroizing;

/// Raw private-key bytes for one identity, zeroized on drop.
pub struct KeyMaterial {
    bytes: Zeroizing<Vec<u8>>,
}

impl KeyMaterial {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

/// Pick the current key file in `key_dir`: the lexically-greatest file
/// name ending in `.seed`. Returns `None` when there is none.
pub fn select_current_key(key_dir: &Path) -> Result<Option<PathBuf>, CryptoError> {
    let entries = match std::fs::read_dir(key_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(CryptoError::Io {
                path: key_dir.to_path_buf(),
                source: e,
            })
        }
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CryptoError::Io {
            path: key_dir.to_path_buf(),
            source: e,
        })?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.ends_with(KEY_SUFFIX) && !entry.path().is_dir() {
            names.push(name.to_string());
        }
    }

    names.sort_unstable();
    Ok(names.pop().map(|name| key_dir.join(name)))
}

/// Load the current key material from `key_dir`.
///
/// Returns the chosen file alongside the decoded bytes so callers can log
/// which key signed.
pub fn load_current_key(key_dir: &Path) -> Result<(PathBuf, KeyMaterial), CryptoError> {
    let path =
        select_current_key(key_dir)?.ok_or_else(|| CryptoError::NoKeyFound(key_dir.to_path_buf()))?;

    let encoded = Zeroizing::new(std::fs::read_to_string(&path).map_err(|e| CryptoError::Io {
        path: path.clone(),
        source: e,
    })?);
    let bytes = b64_decode(&encoded)
        .map_err(|e| CryptoError::MalformedKey(format!("{}: {e}", path.display())))?;

    tracing::debug!(path = %path.display(), len = bytes.len(), "Key material loaded");
    Ok((path, KeyMaterial::from_bytes(bytes)))
}

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("no private key (*.seed) found under {}", .0.display())]
    NoKeyFound(PathBuf),
    #[error("malformed key: {0}")]
    MalformedKey(String),
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
