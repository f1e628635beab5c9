//! Connection lifecycle and envelope cache operations over a key-value store.
//!
//! [`Cache`] is what a caching layer talks to. It owns a [`ConnectionManager`]
//! holding exactly one store connection, builds store keys from
//! [`Key`](cachet_core::Key)s and wraps values into
//! [`Envelope`](cachet_core::Envelope)s.
//!
//! The store client itself is abstracted behind [`Connector`] and [`Store`];
//! `cachet-redis` provides the Redis implementation.
#![warn(missing_docs)]

mod cache;
mod connection;
mod error;
pub mod settings;
pub mod store;

pub use cache::{Cache, expire_seconds};
pub use cachet_core::{Envelope, EnvelopeError, Key, KeyError};
pub use connection::ConnectionManager;
pub use error::{BackendError, ConfigError};
pub use settings::{ConnectionMode, SentinelAddr, Settings, TlsOptions};
pub use store::{
    ConnectionAttempt, ConnectionEvent, ConnectionEvents, Connector, DeleteStatus, Store,
    StoreError, StoreResult,
};
