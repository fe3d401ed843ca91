use serde::{Deserialize, Serialize};

/// Machine-readable failure kinds for a remap run.
/// Shared by the agent library and the binary's exit-status dispatcher.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    // Local preconditions
    Configuration,
    NoKeyFound,
    MalformedKey,
    IoError,
    Crypto,
    MalformedBundle,
    ExtractionError,
    NotProvisioned,
    Locked,
    // Remote handshake and install
    NetworkError,
    RedirectLoop,
    ProtocolError,
    ServerRejected,
    DownloadFailed,
    InstallationError,
    HookFailed,
}

impl ErrorKind {
    /// Process exit status for this kind.
    ///
    /// `1` means a local precondition failed; `2` means the handshake with
    /// the Coordinator or the install that followed it failed.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration
            | Self::NoKeyFound
            | Self::MalformedKey
            | Self::IoError
            | Self::Crypto
            | Self::MalformedBundle
            | Self::ExtractionError
            | Self::NotProvisioned
            | Self::Locked => 1,
            Self::NetworkError
            | Self::RedirectLoop
            | Self::ProtocolError
            | Self::ServerRejected
            | Self::DownloadFailed
            | Self::InstallationError
            | Self::HookFailed => 2,
        }
    }
}
