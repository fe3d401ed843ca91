//! Atomic installation of a validated configuration tree.
//!
//! The active directory is swapped with two renames:
//!
//! ```text
//!   $SC/gen      -> $SC/gen.<stamp>      (backup, never deleted)
//!   <bundle>/gen -> $SC/gen              (new configuration)
//! ```
//!
//! Between the two renames the active slot is vacant. If the second
//! rename fails the slot stays vacant and the error carries the command
//! that restores the backup.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use remap_common::paths;

use crate::error::RemapError;

/// Name of the advisory lock file under the installation root.
pub const LOCK_FILE: &str = ".remap.lock";

/// Backup suffix for a displaced configuration, e.g. `2024-03-01T12-30-05`.
///
/// Colons are avoided so the name is valid on every filesystem.
pub fn backup_stamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H-%M-%S").to_string()
}

/// Outcome of a successful swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installed {
    pub active_dir: PathBuf,
    pub backup_dir: PathBuf,
}

/// Replace `active` with `new_config`, keeping the old tree as
/// `<active>.<stamp>`.
pub fn install_atomically(
    new_config: &Path,
    active: &Path,
    stamp: &str,
) -> Result<Installed, RemapError> {
    install_with(new_config, active, stamp, |from, to| std::fs::rename(from, to))
}

pub(crate) fn install_with<F>(
    new_config: &Path,
    active: &Path,
    stamp: &str,
    mut rename: F,
) -> Result<Installed, RemapError>
where
    F: FnMut(&Path, &Path) -> std::io::Result<()>,
{
    if !active.is_dir() {
        return Err(RemapError::NotProvisioned(active.to_path_buf()));
    }
    if !new_config.is_dir() {
        return Err(RemapError::Installation {
            message: format!("new configuration {} is missing", new_config.display()),
            backup: None,
        });
    }
    let backup = paths::backup_dir(active, stamp);
    if backup.exists() {
        return Err(RemapError::Installation {
            message: format!("backup path {} already exists", backup.display()),
            backup: None,
        });
    }

    rename(active, &backup).map_err(|e| RemapError::Installation {
        message: format!(
            "cannot move {} to {}: {e}",
            active.display(),
            backup.display()
        ),
        backup: None,
    })?;
    tracing::info!(from = %active.display(), to = %backup.display(), "Previous configuration backed up");

    if let Err(e) = rename(new_config, active) {
        tracing::error!(
            active = %active.display(),
            backup = %backup.display(),
            error = %e,
            "New configuration could not be moved into place; active slot is empty"
        );
        return Err(RemapError::Installation {
            message: format!(
                "cannot move {} to {}: {e}; restore the previous configuration with `mv {} {}`",
                new_config.display(),
                active.display(),
                backup.display(),
                active.display()
            ),
            backup: Some(backup),
        });
    }
    tracing::info!(path = %active.display(), "New configuration installed");

    Ok(Installed {
        active_dir: active.to_path_buf(),
        backup_dir: backup,
    })
}

// ── Advisory lock ─────────────────────────────────────────────────

/// Exclusive marker that one run owns an installation root.
///
/// Created with `create_new`, so a second run fails instead of waiting.
/// The file holds the owner's pid and is removed on drop. A crashed run
/// leaves it behind; removing it by hand releases the root.
#[derive(Debug)]
pub struct InstallLock {
    path: PathBuf,
}

impl InstallLock {
    pub fn acquire(sc_root: &Path) -> Result<Self, RemapError> {
        let path = sc_root.join(LOCK_FILE);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(RemapError::Locked(path));
            }
            Err(e) => {
                return Err(RemapError::io(format!("cannot create {}", path.display()), e));
            }
        };
        if let Err(e) = writeln!(file, "{}", std::process::id()) {
            let _ = std::fs::remove_file(&path);
            return Err(RemapError::io(format!("cannot write {}", path.display()), e));
        }
        tracing::debug!(path = %path.display(), "Install lock acquired");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Install lock released"),
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove install lock"),
        }
    }
}
