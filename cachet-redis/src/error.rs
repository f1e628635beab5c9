//! Error types for the Redis store.
//!
//! All errors convert into [`StoreError`], which the cache reports as
//! [`BackendError::Store`] or [`BackendError::ConnectFailure`].
//!
//! [`StoreError`]: cachet_backend::StoreError
//! [`BackendError::Store`]: cachet_backend::BackendError::Store
//! [`BackendError::ConnectFailure`]: cachet_backend::BackendError::ConnectFailure

use std::path::PathBuf;

use cachet_backend::StoreError;
use redis::RedisError;

/// Error type for Redis store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error from the underlying Redis client.
    ///
    /// This includes invalid connection URLs, connection failures,
    /// authentication failures and command errors.
    #[error("Redis store error: {0}")]
    Redis(#[from] RedisError),

    /// Sentinel mode was selected without any sentinel node.
    #[error("No sentinel nodes configured")]
    NoSentinels,

    /// No sentinel knows the requested master.
    #[error("Sentinels don't monitor a master named {0:?}")]
    UnknownMaster(String),

    /// A TLS certificate file couldn't be read.
    #[error("Failed to read certificate {path:?}: {source}")]
    Certificate {
        /// Certificate path from the settings.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Only one of client certificate and client key was configured.
    #[error("Client certificate and client key must be configured together")]
    IncompleteClientCertificate,

    /// TLS certificates were configured but the `tls` feature is disabled.
    #[error("TLS certificates require the `tls` feature")]
    TlsDisabled,
}

impl From<Error> for StoreError {
    fn from(error: Error) -> Self {
        StoreError::new(error)
    }
}
