//! Core building blocks of the cachet store adapter.
//!
//! This crate has no I/O. It provides the two pure pieces every cache
//! operation is built from:
//!
//! - [`key`] - turns a [`Key`] (segment + id) and an optional partition into
//!   the string address used against the store
//! - [`envelope`] - wraps a cached value with its storage timestamp and
//!   requested ttl, and validates envelopes read back from the store
//!
//! ```
//! use cachet_core::{Key, envelope, key};
//!
//! let key = Key::new("sessions", "u1").unwrap();
//! assert_eq!(key::generate(Some("app"), &key), "app:sessions:u1");
//!
//! let bytes = envelope::serialize(&envelope::wrap(42, 5000)).unwrap();
//! let decoded = envelope::deserialize::<i32>(&bytes).unwrap();
//! assert_eq!(decoded.item(), &42);
//! ```
#![warn(missing_docs)]

pub mod envelope;
pub mod key;

pub use envelope::{Envelope, EnvelopeError};
pub use key::{Key, KeyError, validate_segment_name};
