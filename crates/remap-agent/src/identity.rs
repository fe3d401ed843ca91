//! Local AS identity and signing-key resolution.
//!
//! The identity is passed explicitly to every later step; nothing reads it
//! from global state.

use std::path::{Path, PathBuf};

use remap_common::paths::{self, IA_FILE};
use remap_common::Ia;
use remap_crypto::KeyMaterial;

use crate::error::RemapError;

/// Identity of the AS this run acts for, plus where its files live.
#[derive(Debug, Clone)]
pub struct IdentityContext {
    ia: Ia,
    sc_root: PathBuf,
    key_dir: PathBuf,
}

impl IdentityContext {
    /// Resolve the identity for a run.
    ///
    /// An explicit `ia` wins; otherwise the first line of `$SC/gen/ia` is
    /// used. The key directory defaults to the beacon server instance's
    /// `keys/` under the active configuration.
    pub fn resolve(
        sc_root: &Path,
        ia: Option<Ia>,
        key_dir: Option<&Path>,
    ) -> Result<Self, RemapError> {
        let gen_dir = paths::gen_dir(sc_root);

        let ia = match ia {
            Some(explicit) => {
                match current_identity(&gen_dir) {
                    Ok(local) if local != explicit => tracing::warn!(
                        requested = %explicit,
                        installed = %local,
                        "Requested identity differs from the installed configuration"
                    ),
                    Ok(_) => {}
                    Err(e) => tracing::debug!(error = %e, "No installed identity to cross-check"),
                }
                explicit
            }
            None => current_identity(&gen_dir)?,
        };

        let key_dir = key_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| paths::key_dir(&gen_dir, &ia));

        Ok(Self {
            ia,
            sc_root: sc_root.to_path_buf(),
            key_dir,
        })
    }

    pub fn ia(&self) -> Ia {
        self.ia
    }

    pub fn sc_root(&self) -> &Path {
        &self.sc_root
    }

    /// Active configuration directory (`$SC/gen`).
    pub fn gen_dir(&self) -> PathBuf {
        paths::gen_dir(&self.sc_root)
    }

    pub fn key_dir(&self) -> &Path {
        &self.key_dir
    }

    /// Current private signing key of this identity.
    pub fn current_key_material(&self) -> Result<(PathBuf, KeyMaterial), RemapError> {
        remap_crypto::load_current_key(&self.key_dir).map_err(RemapError::from)
    }
}

/// Read the installed identity from `gen/ia`.
pub fn current_identity(gen_dir: &Path) -> Result<Ia, RemapError> {
    let path = gen_dir.join(IA_FILE);
    let content = std::fs::read_to_string(&path).map_err(|e| {
        RemapError::Configuration(format!("cannot read {}: {e}", path.display()))
    })?;
    let line = content.lines().next().unwrap_or("");
    Ia::parse(line).map_err(|e| {
        RemapError::Configuration(format!("could not understand the IA in {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use remap_common::encoding::b64_encode;
    use remap_common::test::temp_dir;

    fn write_ia(root: &Path, ia: &str) {
        let gen = root.join("gen");
        std::fs::create_dir_all(&gen).unwrap();
        std::fs::write(gen.join("ia"), ia).unwrap();
    }

    #[test]
    fn resolves_identity_from_ia_file() {
        let root = temp_dir("remap-identity-file");
        write_ia(&root, "1-7\n");

        let ctx = IdentityContext::resolve(&root, None, None).unwrap();
        assert_eq!(ctx.ia().to_string(), "1-7");
        assert_eq!(ctx.key_dir(), root.join("gen/ISD1/AS7/bs1-7-1/keys"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn explicit_identity_wins_over_file() {
        let root = temp_dir("remap-identity-explicit");
        write_ia(&root, "1-7");

        let explicit = Ia::parse("2-9").unwrap();
        let ctx = IdentityContext::resolve(&root, Some(explicit), None).unwrap();
        assert_eq!(ctx.ia(), explicit);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn explicit_identity_needs_no_file() {
        let root = temp_dir("remap-identity-nofile");
        let explicit = Ia::parse("1-7").unwrap();
        let ctx = IdentityContext::resolve(&root, Some(explicit), None).unwrap();
        assert_eq!(ctx.ia(), explicit);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_ia_file_is_configuration_error() {
        let root = temp_dir("remap-identity-missing");
        let err = IdentityContext::resolve(&root, None, None).unwrap_err();
        assert!(matches!(err, RemapError::Configuration(_)));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn unparsable_ia_is_configuration_error() {
        let root = temp_dir("remap-identity-garbage");
        write_ia(&root, "not-an-ia");
        let err = IdentityContext::resolve(&root, None, None).unwrap_err();
        assert!(matches!(err, RemapError::Configuration(_)));
        assert_eq!(err.exit_code(), 1);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn key_dir_override_is_used() {
        let root = temp_dir("remap-identity-keydir");
        let keys = root.join("custom-keys");
        std::fs::create_dir_all(&keys).unwrap();
        std::fs::write(keys.join("s1.seed"), b64_encode(&[1u8; 32])).unwrap();

        let ctx =
            IdentityContext::resolve(&root, Some(Ia::parse("1-7").unwrap()), Some(&keys)).unwrap();
        let (path, key) = ctx.current_key_material().unwrap();
        assert_eq!(path, keys.join("s1.seed"));
        assert_eq!(key.as_bytes().len(), 32);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_key_is_no_key_found() {
        let root = temp_dir("remap-identity-nokey");
        write_ia(&root, "1-7");
        let ctx = IdentityContext::resolve(&root, None, None).unwrap();
        let err = ctx.current_key_material().unwrap_err();
        assert!(matches!(err, RemapError::NoKeyFound(_)));
        let _ = std::fs::remove_dir_all(&root);
    }
}
