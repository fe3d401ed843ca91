//! Remap Agent — re-establishes a SCION AS identity with the Coordinator.
//!
//! One run proves possession of the AS signing key through a
//! challenge-response handshake, downloads the configuration bundle the
//! Coordinator issued for the new identity, swaps it into `$SC/gen` and
//! acknowledges completion. Everything is blocking and strictly
//! sequential; nothing is retried.

pub mod bundle;
pub mod challenge;
pub mod error;
pub mod hooks;
pub mod identity;
pub mod install;
pub mod protocol;

use std::path::{Path, PathBuf};

use chrono::Utc;
use remap_client::{Method, RequestExecutor, Timeouts};
use remap_common::Ia;
use remap_crypto::ChallengeSigner;
use serde::Serialize;

pub use error::RemapError;
pub use hooks::{NoServiceControl, ServiceControl, ShellServiceControl};
pub use identity::IdentityContext;

use bundle::WorkDir;
use challenge::PollResult;
use install::InstallLock;
use protocol::{confirm_status_path, SessionPayload, SolutionRequest};

/// Default Coordinator base URL.
pub const DEFAULT_COORDINATOR: &str = "http://localhost:8080";

/// Settings for one run.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// SCION installation root (`$SC`).
    pub sc_root: PathBuf,
    /// Identity override; `None` reads `$SC/gen/ia`.
    pub ia: Option<Ia>,
    /// Key directory override.
    pub key_dir: Option<PathBuf>,
    /// Coordinator base URL.
    pub coordinator: String,
    pub timeouts: Timeouts,
    /// Hold `$SC/.remap.lock` for the duration of the run.
    pub lock: bool,
}

impl AgentConfig {
    pub fn new(sc_root: impl Into<PathBuf>) -> Self {
        Self {
            sc_root: sc_root.into(),
            ia: None,
            key_dir: None,
            coordinator: DEFAULT_COORDINATOR.to_string(),
            timeouts: Timeouts::default(),
            lock: true,
        }
    }
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The Coordinator had no remap pending; nothing was changed.
    NothingPending { ia: Ia },
    /// A new configuration was installed.
    Installed {
        ia: Ia,
        /// Identity the Coordinator reported for the new configuration.
        #[serde(skip_serializing_if = "Option::is_none")]
        new_ia: Option<Ia>,
        active_dir: PathBuf,
        backup_dir: PathBuf,
        /// Whether the Coordinator acknowledged the completion notice.
        confirmed: bool,
    },
}

// ── Agent ─────────────────────────────────────────────────────────

/// Sequences poll, solve, submit, download, install and notify for one
/// identity.
pub struct RemapAgent<S, H> {
    config: AgentConfig,
    signer: S,
    services: H,
    exec: RequestExecutor,
}

impl<S: ChallengeSigner, H: ServiceControl> RemapAgent<S, H> {
    pub fn new(config: AgentConfig, signer: S, services: H) -> Self {
        let exec = RequestExecutor::new(&config.coordinator, config.timeouts);
        Self {
            config,
            signer,
            services,
            exec,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run the remap end to end.
    ///
    /// Returns [`RunOutcome::NothingPending`] without touching the
    /// filesystem when the Coordinator has nothing for this identity.
    pub fn run(&mut self) -> Result<RunOutcome, RemapError> {
        let identity = IdentityContext::resolve(
            &self.config.sc_root,
            self.config.ia,
            self.config.key_dir.as_deref(),
        )?;
        let ia = identity.ia();
        tracing::info!(
            ia = %ia,
            sc = %identity.sc_root().display(),
            coordinator = self.exec.endpoint(),
            "Checking for a pending remap"
        );

        let (encoded, challenge_bytes) = match challenge::poll(&self.exec, &ia)? {
            PollResult::NonePending => return Ok(RunOutcome::NothingPending { ia }),
            PollResult::Challenge { encoded, bytes } => (encoded, bytes),
        };

        // Held from before submission until the swap is done.
        let _lock = if self.config.lock {
            Some(InstallLock::acquire(identity.sc_root())?)
        } else {
            None
        };

        let (key_path, key) = identity.current_key_material()?;
        tracing::debug!(path = %key_path.display(), "Signing with current key");
        let solution = challenge::solve(&self.signer, &challenge_bytes, &key)?;
        challenge::self_verify(&self.signer, &challenge_bytes, &solution, &key)?;
        drop(key);

        let request = challenge::solution_request(&encoded, &solution);
        let payload = challenge::submit(&self.exec, &ia, &request)?;

        let work = WorkDir::create_in(identity.sc_root())?;
        let archive = bundle::download(&self.exec, &ia, &payload, &work)?;
        let staged = bundle::extract_and_validate(&archive, &work.extract_dir())?;

        let installed = self.install_with_services(&staged, &identity)?;

        let confirmed = match notify_completion(&self.exec, &ia, &payload, &request) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Completion notice not acknowledged; configuration stays installed");
                false
            }
        };

        installed.restart?;

        tracing::info!(ia = %ia, confirmed, "Remap complete");
        Ok(RunOutcome::Installed {
            ia,
            new_ia: payload.remapped_ia(),
            active_dir: installed.swap.active_dir,
            backup_dir: installed.swap.backup_dir,
            confirmed,
        })
    }

    /// Stop services, swap the configuration, start services again.
    ///
    /// `start` runs whenever `stop` was attempted. An install or stop
    /// failure takes precedence over a start failure. A start failure
    /// after a good swap is handed back so the caller can still notify.
    fn install_with_services(
        &mut self,
        staged: &Path,
        identity: &IdentityContext,
    ) -> Result<SwapResult, RemapError> {
        if let Err(e) = self.services.stop() {
            if let Err(start_err) = self.services.start() {
                tracing::error!(error = %start_err, "Services did not start after failed stop");
            }
            return Err(e);
        }

        let swapped = install::install_atomically(
            staged,
            &identity.gen_dir(),
            &install::backup_stamp(Utc::now()),
        );
        let started = self.services.start();

        match swapped {
            Ok(swap) => Ok(SwapResult {
                swap,
                restart: started,
            }),
            Err(e) => {
                if let Err(start_err) = &started {
                    tracing::error!(error = %start_err, "Services did not start after failed install");
                }
                Err(e)
            }
        }
    }
}

struct SwapResult {
    swap: install::Installed,
    restart: Result<(), RemapError>,
}

// ── Completion notice ─────────────────────────────────────────────

/// Tell the Coordinator the new configuration is in place.
pub fn notify_completion(
    exec: &RequestExecutor,
    ia: &Ia,
    payload: &SessionPayload,
    request: &SolutionRequest,
) -> Result<(), RemapError> {
    let body = payload.confirmation(request);
    let resp = exec.execute(Method::Post, &confirm_status_path(ia), Some(&body))?;
    match resp.status() {
        200 => {
            tracing::info!(ia = %ia, "Coordinator acknowledged completion");
            Ok(())
        }
        status => Err(RemapError::ServerRejected(format!(
            "completion notice answered HTTP {status}"
        ))),
    }
}
