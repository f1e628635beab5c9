//! Redis store for the cachet envelope cache.
//!
//! [`RedisConnector`] opens connections with the `redis` crate according to
//! the [`ConnectionMode`](cachet_backend::ConnectionMode) selected from
//! [`Settings`](cachet_backend::Settings). Sentinel mode asks the configured
//! sentinels for the master address, then connects to it directly.
//!
//! TLS (`rediss://`) needs the `tls` feature.
#![warn(missing_docs)]

pub mod connector;
pub mod error;
pub mod store;

#[doc(inline)]
pub use crate::connector::{RedisCache, RedisConnector};
#[doc(inline)]
pub use crate::error::Error;
#[doc(inline)]
pub use crate::store::RedisStore;
