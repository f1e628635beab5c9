//! Error types for cache operations.

use cachet_core::{EnvelopeError, KeyError};
use thiserror::Error;

use crate::store::StoreError;

/// Error type for connection lifecycle and cache operations.
///
/// Every failure is returned to the caller; none of them is fatal and all of
/// them are safe to retry (for example calling [`start`] again after a
/// [`ConnectFailure`]).
///
/// [`start`]: crate::ConnectionManager::start
/// [`ConnectFailure`]: BackendError::ConnectFailure
#[derive(Debug, Error)]
pub enum BackendError {
    /// An operation was attempted before the connection became ready.
    #[error("Connection not started")]
    ConnectionNotStarted,

    /// A segment name was rejected.
    #[error(transparent)]
    InvalidSegmentName(#[from] KeyError),

    /// Value encoding or stored envelope validation failed.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// The store returned an error for a command.
    #[error("Store error: {0}")]
    Store(#[source] StoreError),

    /// The connection attempt failed before becoming ready.
    #[error("Failed to connect: {0}")]
    ConnectFailure(#[source] StoreError),
}

/// Error returned when settings can't be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The YAML document doesn't describe valid settings.
    #[error("Invalid settings: {0}")]
    Yaml(#[from] serde_saphyr::Error),
}
