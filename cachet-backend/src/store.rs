//! The capability the cache needs from a key-value store client.
//!
//! A store client is split in two parts:
//!
//! - [`Connector`] starts a [`ConnectionAttempt`]. The attempt reports its
//!   outcome through [`ConnectionEvent`]s: at most one `Ready` carrying the
//!   connected [`Store`], and any number of `Error`s.
//! - [`Store`] is the connected handle offering `get`, `set`, `expire`,
//!   `delete` and `quit`.
//!
//! The event channel is created together with the attempt, so observers are
//! in place before the attempt can make any progress.

use std::error::Error as StdError;
use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::settings::{ConnectionMode, Settings};

/// Result type of store commands.
pub type StoreResult<T> = Result<T, StoreError>;

/// Opaque error reported by a store client.
///
/// Client errors are passed through untouched; use [`StoreError::downcast_ref`]
/// to inspect the original error.
pub struct StoreError(Box<dyn StdError + Send + Sync>);

impl StoreError {
    /// Wraps a client error (or a message).
    pub fn new(error: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self(error.into())
    }

    /// Returns the original error if it is of type `E`.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref()
    }

    /// Consumes the wrapper, returning the original error.
    pub fn into_inner(self) -> Box<dyn StdError + Send + Sync> {
        self.0
    }
}

impl fmt::Debug for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for StoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

/// Status of deleting result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStatus {
    /// Record successfully deleted.
    Deleted(u32),
    /// Record already missing.
    Missing,
}

/// A connected store handle.
#[async_trait]
pub trait Store: Send + Sync {
    /// Reads the raw value at `key`. `None` means the key doesn't exist.
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>>;

    /// Writes `value` at `key` unconditionally.
    async fn set(&self, key: &str, value: Bytes) -> StoreResult<()>;

    /// Sets the expiration of `key` in seconds.
    async fn expire(&self, key: &str, seconds: u64) -> StoreResult<()>;

    /// Deletes `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<DeleteStatus>;

    /// Gracefully closes the connection.
    async fn quit(&self) -> StoreResult<()>;
}

/// Opens connections to a store.
pub trait Connector: Send + Sync {
    /// Connected handle produced by this connector.
    type Store: Store + 'static;

    /// Starts one connection attempt using `mode`.
    ///
    /// Must not block. Failures, including invalid addresses, are reported as
    /// [`ConnectionEvent::Error`] on the returned attempt.
    fn connect(&self, mode: ConnectionMode, settings: &Settings) -> ConnectionAttempt<Self::Store>;
}

/// Signal emitted by a connection attempt.
pub enum ConnectionEvent<S> {
    /// The connection is established and usable.
    Ready(S),
    /// The connection reported an error.
    Error(StoreError),
}

impl<S> fmt::Debug for ConnectionEvent<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(_) => f.write_str("Ready"),
            Self::Error(err) => f.debug_tuple("Error").field(err).finish(),
        }
    }
}

/// Sending half of a connection attempt, held by the store client.
pub struct ConnectionEvents<S> {
    tx: mpsc::UnboundedSender<ConnectionEvent<S>>,
}

impl<S> Clone for ConnectionEvents<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<S> ConnectionEvents<S> {
    /// Signals readiness. Returns `false` if nobody listens anymore.
    pub fn ready(&self, store: S) -> bool {
        self.tx.send(ConnectionEvent::Ready(store)).is_ok()
    }

    /// Signals an error. Returns `false` if nobody listens anymore.
    pub fn error(&self, error: impl Into<StoreError>) -> bool {
        self.tx.send(ConnectionEvent::Error(error.into())).is_ok()
    }

    /// Returns `true` while the attempt is still observed.
    pub fn is_observed(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// An in-flight connection attempt.
///
/// Dropping or [aborting](Self::abort) the attempt closes its event channel
/// and aborts the task driving it, if any.
pub struct ConnectionAttempt<S> {
    events: mpsc::UnboundedReceiver<ConnectionEvent<S>>,
    task: Option<JoinHandle<()>>,
}

impl<S> ConnectionAttempt<S> {
    /// Creates an attempt together with the handle used to report its events.
    pub fn channel() -> (ConnectionEvents<S>, Self) {
        let (tx, events) = mpsc::unbounded_channel();
        (ConnectionEvents { tx }, Self { events, task: None })
    }

    /// Ties the task driving the connection to this attempt.
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    /// Waits for the next event. `None` once every sender is gone.
    pub async fn next_event(&mut self) -> Option<ConnectionEvent<S>> {
        self.events.recv().await
    }

    /// Tears the attempt down immediately, without a graceful shutdown.
    pub fn abort(self) {
        drop(self);
    }
}

impl<S> Drop for ConnectionAttempt<S> {
    fn drop(&mut self) {
        self.events.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl From<&str> for StoreError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for StoreError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}
