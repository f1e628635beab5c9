//! Envelope wrapping for stored values.
//!
//! Every value written to the store is wrapped into an [`Envelope`] carrying
//! the time it was stored and the ttl the caller asked for. The wire form is a
//! JSON object:
//!
//! ```json
//! {"item": <value>, "stored": 1700000000000, "ttl": 5000}
//! ```
//!
//! Reading back is strict. [`deserialize`] distinguishes bytes that are not
//! JSON at all ([`EnvelopeError::BadContent`]) from JSON that lacks the
//! required fields ([`EnvelopeError::IncorrectStructure`]). Field presence is
//! checked by key, so falsy items such as `0`, `false` or `""` are valid.
//!
//! ```
//! use cachet_core::envelope::{self, EnvelopeError};
//!
//! let bytes = envelope::serialize(&envelope::wrap(0, 1000)).unwrap();
//! assert_eq!(envelope::deserialize::<i32>(&bytes).unwrap().item(), &0);
//!
//! let err = envelope::deserialize::<i32>(br#"{"item": 5}"#).unwrap_err();
//! assert!(matches!(err, EnvelopeError::IncorrectStructure(_)));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

const ITEM_FIELD: &str = "item";
const STORED_FIELD: &str = "stored";

/// Errors produced while encoding or decoding an envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The item can't be represented as JSON.
    #[error("Envelope serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Stored bytes are not JSON.
    #[error("Bad envelope content: {0}")]
    BadContent(#[source] serde_json::Error),

    /// Stored JSON is not an envelope.
    #[error("Incorrect envelope structure: {0}")]
    IncorrectStructure(String),
}

/// A cached value together with its storage metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T = Value> {
    item: T,
    stored: i64,
    #[serde(default)]
    ttl: i64,
}

impl<T> Envelope<T> {
    /// Creates an envelope with explicit metadata.
    ///
    /// `stored` is milliseconds since the Unix epoch, `ttl` is milliseconds.
    pub fn new(item: T, stored: i64, ttl: i64) -> Self {
        Self { item, stored, ttl }
    }

    /// Returns a reference to the wrapped item.
    pub fn item(&self) -> &T {
        &self.item
    }

    /// Consumes the envelope, returning the item.
    pub fn into_item(self) -> T {
        self.item
    }

    /// Milliseconds since the Unix epoch at which the item was stored.
    pub fn stored(&self) -> i64 {
        self.stored
    }

    /// Requested ttl in milliseconds, exactly as given to [`wrap`].
    pub fn ttl(&self) -> i64 {
        self.ttl
    }

    /// Storage time as a timestamp, if representable.
    pub fn stored_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.stored)
    }

    /// Time at which the item stops being valid (`stored + ttl`).
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.stored.saturating_add(self.ttl))
    }

    /// Returns `true` if the envelope is expired at `now`.
    ///
    /// The store expires entries on its own with second granularity; this is
    /// the millisecond-precise view for callers that need it.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.stored.saturating_add(self.ttl) <= now.timestamp_millis()
    }
}

/// Wraps `item` into an envelope stamped with the current time.
///
/// `ttl` is kept as given, zero and negative values included.
pub fn wrap<T>(item: T, ttl: i64) -> Envelope<T> {
    Envelope::new(item, Utc::now().timestamp_millis(), ttl)
}

/// Encodes an envelope into its JSON wire form.
pub fn serialize<T: Serialize>(envelope: &Envelope<T>) -> Result<Vec<u8>, EnvelopeError> {
    serde_json::to_vec(envelope).map_err(EnvelopeError::Serialization)
}

/// Decodes and validates an envelope read from the store.
pub fn deserialize<T: DeserializeOwned>(data: &[u8]) -> Result<Envelope<T>, EnvelopeError> {
    let value: Value = serde_json::from_slice(data).map_err(EnvelopeError::BadContent)?;

    let fields = match value {
        Value::Object(fields) => fields,
        other => {
            return Err(EnvelopeError::IncorrectStructure(format!(
                "expected an object, found {}",
                kind(&other)
            )));
        }
    };

    for field in [ITEM_FIELD, STORED_FIELD] {
        if !fields.contains_key(field) {
            return Err(EnvelopeError::IncorrectStructure(format!(
                "missing field `{field}`"
            )));
        }
    }

    serde_json::from_value(Value::Object(fields))
        .map_err(|err| EnvelopeError::IncorrectStructure(err.to_string()))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_wrap_captures_current_time() {
        let before = Utc::now().timestamp_millis();
        let envelope = wrap("value", 5000);
        let after = Utc::now().timestamp_millis();

        assert!(envelope.stored() >= before && envelope.stored() <= after);
        assert_eq!(envelope.ttl(), 5000);
        assert_eq!(envelope.item(), &"value");
    }

    #[test]
    fn test_wrap_keeps_non_positive_ttl() {
        assert_eq!(wrap(1, 0).ttl(), 0);
        assert_eq!(wrap(1, -20).ttl(), -20);
    }

    #[test]
    fn test_wire_format() {
        let bytes = serialize(&Envelope::new(json!({"name": "a"}), 1000, 5000)).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value,
            json!({"item": {"name": "a"}, "stored": 1000, "ttl": 5000})
        );
    }

    #[test]
    fn test_roundtrip_structured_value() {
        let envelope = wrap(json!({"name": "a", "tags": [1, 2]}), 5000);
        let bytes = serialize(&envelope).unwrap();
        let decoded: Envelope = deserialize(&bytes).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_falsy_items_are_valid() {
        for item in [json!(0), json!(false), json!(""), json!(null), json!([])] {
            let bytes = serialize(&wrap(item.clone(), 1000)).unwrap();
            let decoded: Envelope = deserialize(&bytes).unwrap();
            assert_eq!(decoded.item(), &item);
        }
    }

    #[test]
    fn test_stored_zero_is_present() {
        let decoded: Envelope<i32> = deserialize(br#"{"item": 1, "stored": 0}"#).unwrap();
        assert_eq!(decoded.stored(), 0);
    }

    #[test]
    fn test_missing_ttl_defaults_to_zero() {
        let decoded: Envelope<i32> = deserialize(br#"{"item": 1, "stored": 10}"#).unwrap();
        assert_eq!(decoded.ttl(), 0);
    }

    #[test]
    fn test_not_json_is_bad_content() {
        let err = deserialize::<Value>(b"not json {").unwrap_err();
        assert!(matches!(err, EnvelopeError::BadContent(_)), "{err:?}");

    }

    #[test]
    fn test_missing_stored_is_incorrect_structure() {
        let err = deserialize::<Value>(br#"{"item": 5}"#).unwrap_err();
        match err {
            EnvelopeError::IncorrectStructure(reason) => {
                assert_eq!(reason, "missing field `stored`")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_item_is_incorrect_structure() {
        let err = deserialize::<Value>(br#"{"stored": 5}"#).unwrap_err();
        match err {
            EnvelopeError::IncorrectStructure(reason) => {
                assert_eq!(reason, "missing field `item`")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_object_is_incorrect_structure() {
        for input in [&b"null"[..], b"5", b"\"text\"", b"[1, 2]"] {
            let err = deserialize::<Value>(input).unwrap_err();
            assert!(
                matches!(err, EnvelopeError::IncorrectStructure(_)),
                "{err:?}"
            );
        }
    }

    #[test]
    fn test_wrong_field_types_are_incorrect_structure() {
        let err = deserialize::<Value>(br#"{"item": 1, "stored": "yesterday"}"#).unwrap_err();
        assert!(matches!(err, EnvelopeError::IncorrectStructure(_)));

        let err = deserialize::<u8>(br#"{"item": "text", "stored": 1}"#).unwrap_err();
        assert!(matches!(err, EnvelopeError::IncorrectStructure(_)));
    }

    #[test]
    fn test_unrepresentable_item_is_serialization_error() {
        let mut item = HashMap::new();
        item.insert((1, 2), "tuple keys are not valid JSON object keys");

        let err = serialize(&wrap(item, 1000)).unwrap_err();
        assert!(matches!(err, EnvelopeError::Serialization(_)));
    }

    #[test]
    fn test_expiry_helpers() {
        let envelope = Envelope::new((), 1_000, 2_000);
        let expires_at = envelope.expires_at().unwrap();

        assert_eq!(expires_at.timestamp_millis(), 3_000);
        assert_eq!(envelope.stored_at().unwrap().timestamp_millis(), 1_000);
        assert!(!envelope.is_expired_at(DateTime::from_timestamp_millis(2_999).unwrap()));
        assert!(envelope.is_expired_at(expires_at));
    }
}
