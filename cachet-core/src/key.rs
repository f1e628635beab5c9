//! Store key construction.
//!
//! A cache entry is addressed by a [`Key`]: a **segment** (a logical namespace,
//! similar to a table name) and an **id** inside that segment. An optional
//! **partition** separates several logical caches sharing one store.
//!
//! ## Format
//!
//! [`generate`] percent-encodes every component on its own and joins them with
//! [`DELIMITER`]:
//!
//! `{partition}:{segment}:{id}`
//!
//! - Partition is omitted if unset or empty
//! - The delimiter is always encoded inside components, so distinct
//!   `(partition, segment, id)` triples never produce the same string
//!
//! ```
//! use cachet_core::{Key, key::generate};
//!
//! let key = Key::new("a:b", "c").unwrap();
//! assert_eq!(generate(None, &key), "a%3Ab:c");
//!
//! let key = Key::new("a", "b:c").unwrap();
//! assert_eq!(generate(None, &key), "a:b%3Ac");
//! ```

use std::fmt;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use thiserror::Error;

/// Separator placed between encoded key components.
pub const DELIMITER: char = ':';

/// Bytes escaped inside a key component.
///
/// Everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )` is escaped, which
/// covers the delimiter, `%` itself and all control bytes.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Rejected segment names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Segment name is an empty string.
    #[error("Invalid segment name: empty string")]
    EmptySegmentName,

    /// Segment name contains a NUL character.
    #[error("Invalid segment name: includes null character")]
    NullCharacter,
}

/// Checks that `name` can be used as a segment.
///
/// Empty names and names containing `\0` are rejected.
pub fn validate_segment_name(name: &str) -> Result<(), KeyError> {
    if name.is_empty() {
        return Err(KeyError::EmptySegmentName);
    }
    if name.contains('\0') {
        return Err(KeyError::NullCharacter);
    }
    Ok(())
}

/// Address of a cache entry inside the store.
///
/// The segment is validated on construction, so a `Key` always carries a
/// non-empty, NUL-free segment. The id is unrestricted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    segment: String,
    id: String,
}

impl Key {
    /// Creates a key, validating the segment name.
    ///
    /// ```
    /// use cachet_core::{Key, KeyError};
    ///
    /// assert!(Key::new("sessions", "u1").is_ok());
    /// assert_eq!(Key::new("", "u1"), Err(KeyError::EmptySegmentName));
    /// ```
    pub fn new(segment: impl Into<String>, id: impl Into<String>) -> Result<Self, KeyError> {
        let segment = segment.into();
        validate_segment_name(&segment)?;
        Ok(Self {
            segment,
            id: id.into(),
        })
    }

    /// Returns the segment name.
    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// Returns the id within the segment.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&generate(None, self))
    }
}

/// Builds the store key string for `key` under an optional `partition`.
///
/// Deterministic and total: any input strings produce a key.
pub fn generate(partition: Option<&str>, key: &Key) -> String {
    let mut out = String::with_capacity(
        partition.map_or(0, str::len) + key.segment.len() + key.id.len() + 2,
    );

    if let Some(partition) = partition.filter(|p| !p.is_empty()) {
        out.extend(utf8_percent_encode(partition, COMPONENT));
        out.push(DELIMITER);
    }
    out.extend(utf8_percent_encode(&key.segment, COMPONENT));
    out.push(DELIMITER);
    out.extend(utf8_percent_encode(&key.id, COMPONENT));
    out
}
