use thiserror::Error;

/// Failures inside the offline layer.
///
/// A cache miss is not an error; lookups return `Option`.
#[derive(Debug, Error)]
pub enum OfflineError {
    #[error("network unavailable: {message}")]
    NetworkUnavailable { message: String },
    #[error("replay of queued item {id} failed: {message}")]
    QueueReplayFailure { id: i64, message: String },
    #[error("install failed for `{asset}`: {message}")]
    InstallFailure { asset: String, message: String },
    #[error("offline storage error: {message}")]
    Storage { message: String },
    #[error("offline serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid offline request: {message}")]
    InvalidRequest { message: String },
}

impl OfflineError {
    pub fn network(err: impl std::fmt::Display) -> Self {
        Self::NetworkUnavailable {
            message: err.to_string(),
        }
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn is_network_unavailable(&self) -> bool {
        matches!(self, Self::NetworkUnavailable { .. })
    }
}

impl From<std::io::Error> for OfflineError {
    fn from(err: std::io::Error) -> Self {
        Self::storage(err)
    }
}
