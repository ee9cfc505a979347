//! Field deserializers that never fail on a wrongly typed value.
//!
//! Stored dialogues are hand-edited, so a bad optional field reads as
//! missing instead of rejecting the whole document.

use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Decode `value` as `T`. Null and wrongly typed values give `None`.
pub fn decode<T: DeserializeOwned>(value: Value) -> Option<T> {
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            warn!("Ignoring malformed dialogue field: {err}");
            None
        }
    }
}

/// `deserialize_with` for optional typed fields.
pub fn optional<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Value::deserialize(deserializer).map(decode)
}

/// `deserialize_with` for opaque payloads: an explicit `null` stays `Some(Null)`.
pub fn opaque<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// `deserialize_with` for lists. A malformed element becomes its default;
/// anything other than an array reads as missing.
pub fn optional_seq<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => Some(
            items
                .into_iter()
                .map(|item| decode(item).unwrap_or_default())
                .collect(),
        ),
        Value::Null => None,
        other => {
            warn!("Ignoring non-list dialogue field: {other}");
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_falls_back_to_none() {
        assert_eq!(decode::<bool>(json!(true)), Some(true));
        assert_eq!(decode::<bool>(json!(1)), None);
        assert_eq!(decode::<String>(json!(null)), None);
        assert_eq!(decode::<String>(json!({"a": 1})), None);
    }
}
