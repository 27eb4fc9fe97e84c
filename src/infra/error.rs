use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Failures while wiring the process together: listeners, pools, storage
/// directories and the log subscriber.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to prepare `{}`: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("database error: {message}")]
    Database { message: String },
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl InfraError {
    pub fn bind(addr: SocketAddr) -> impl FnOnce(std::io::Error) -> Self {
        move |source| Self::Bind { addr, source }
    }

    pub fn storage(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Storage { path, source }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}

impl From<sqlx::Error> for InfraError {
    fn from(err: sqlx::Error) -> Self {
        Self::database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_and_storage_errors_name_their_target() {
        let addr: SocketAddr = "127.0.0.1:3000".parse().unwrap();
        let err = InfraError::bind(addr)(std::io::Error::other("in use"));
        assert_eq!(err.to_string(), "failed to bind 127.0.0.1:3000: in use");

        let err = InfraError::storage("uploads")(std::io::Error::other("read-only"));
        assert_eq!(err.to_string(), "failed to prepare `uploads`: read-only");
    }
}
