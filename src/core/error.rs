use thiserror::Error;

use super::types::{CallId, OperationKind};

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Received an unsupported object version for {operation}: {version}")]
    UnsupportedVersion {
        operation: OperationKind,
        version: u32,
    },

    #[error("No completion cookie registered for {0}")]
    UnknownCookie(CallId),

    #[error("Completion cookie was already disposed")]
    CookieDisposed,

    #[error("Library instance has no owning client")]
    DetachedInstance,

    #[error("Host invocation failed: {0}")]
    Host(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl BridgeError {
    /// Structural errors mean the bridge and its collaborator disagree about
    /// layout or identity; retrying cannot fix them.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedVersion { .. } | Self::UnknownCookie(_) | Self::DetachedInstance
        )
    }
}
