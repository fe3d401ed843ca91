//! Remap agent error types.

use std::path::PathBuf;

use remap_client::ClientError;
use remap_common::error::ErrorKind;
use remap_crypto::CryptoError;

#[derive(Debug, thiserror::Error)]
pub enum RemapError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no private key (*.seed) found under {}", .0.display())]
    NoKeyFound(PathBuf),

    #[error("malformed key: {0}")]
    MalformedKey(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("Coordinator not reachable: {0}")]
    Network(String),

    #[error("redirect loop: gave up after {hops} redirects (next target {url})")]
    RedirectLoop { hops: usize, url: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("Coordinator rejected the request: {0}")]
    ServerRejected(String),

    #[error("bundle download failed: {0}")]
    DownloadFailed(String),

    #[error("malformed bundle: {0}")]
    MalformedBundle(String),

    #[error("bundle extraction failed: {0}")]
    Extraction(String),

    #[error("{} does not exist; this AS has no installed configuration to replace", .0.display())]
    NotProvisioned(PathBuf),

    #[error("installation failed: {message}")]
    Installation {
        message: String,
        /// Where the previous configuration was preserved, when the first
        /// rename went through.
        backup: Option<PathBuf>,
    },

    #[error("another remap run holds the lock {}", .0.display())]
    Locked(PathBuf),

    #[error("service hook failed: {0}")]
    Hook(String),
}

impl RemapError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::from(self)
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }
}

impl From<CryptoError> for RemapError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::NoKeyFound(dir) => Self::NoKeyFound(dir),
            CryptoError::MalformedKey(msg) => Self::MalformedKey(msg),
            CryptoError::Io { path, source } => {
                Self::io(format!("cannot read {}", path.display()), source)
            }
        }
    }
}

impl From<ClientError> for RemapError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Network(msg) => Self::Network(msg),
            ClientError::RedirectLoop { hops, url } => Self::RedirectLoop { hops, url },
            ClientError::Protocol(msg) => Self::Protocol(msg),
            ClientError::InvalidUrl(msg) => Self::Configuration(format!("invalid URL: {msg}")),
        }
    }
}

impl From<&RemapError> for ErrorKind {
    fn from(e: &RemapError) -> Self {
        match e {
            RemapError::Configuration(_) => ErrorKind::Configuration,
            RemapError::NoKeyFound(_) => ErrorKind::NoKeyFound,
            RemapError::MalformedKey(_) => ErrorKind::MalformedKey,
            RemapError::Io { .. } => ErrorKind::IoError,
            RemapError::Crypto(_) => ErrorKind::Crypto,
            RemapError::Network(_) => ErrorKind::NetworkError,
            RemapError::RedirectLoop { .. } => ErrorKind::RedirectLoop,
            RemapError::Protocol(_) => ErrorKind::ProtocolError,
            RemapError::ServerRejected(_) => ErrorKind::ServerRejected,
            RemapError::DownloadFailed(_) => ErrorKind::DownloadFailed,
            RemapError::MalformedBundle(_) => ErrorKind::MalformedBundle,
            RemapError::Extraction(_) => ErrorKind::ExtractionError,
            RemapError::NotProvisioned(_) => ErrorKind::NotProvisioned,
            RemapError::Installation { .. } => ErrorKind::InstallationError,
            RemapError::Locked(_) => ErrorKind::Locked,
            RemapError::Hook(_) => ErrorKind::HookFailed,
        }
    }
}
