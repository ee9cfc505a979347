use std::collections::BTreeMap;
use std::sync::Arc;

use log::warn;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::dialogue::lenient;
use crate::dialogue::state::DialogueState;

/// State key -> state. Entries are shared between document versions.
pub type StateMap = BTreeMap<String, Arc<DialogueState>>;

/// The `states` field keeps "missing" apart from an explicit `null`.
///
/// Only `Null` marks a document as not loaded; a missing key and an empty
/// map both read as an empty, loaded document.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum States {
    #[default]
    Absent,
    Null,
    Present(Arc<StateMap>),
}

impl States {
    pub fn is_absent(&self) -> bool {
        matches!(self, States::Absent)
    }

    pub fn as_map(&self) -> Option<&StateMap> {
        match self {
            States::Present(map) => Some(map),
            States::Absent | States::Null => None,
        }
    }
}

impl Serialize for States {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            States::Present(map) => map.serialize(serializer),
            States::Absent | States::Null => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for States {
    // A missing key never reaches here; `#[serde(default)]` yields `Absent`.
    // A non-object reads as absent, a non-object entry as an empty state.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => States::Null,
            Value::Object(entries) => States::Present(Arc::new(
                entries
                    .into_iter()
                    .map(|(key, raw)| {
                        let state: DialogueState = lenient::decode(raw).unwrap_or_default();
                        (key, Arc::new(state))
                    })
                    .collect(),
            )),
            other => {
                warn!("Ignoring malformed dialogue states: {other}");
                States::Absent
            }
        })
    }
}

/// Display options for the dialogue screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogueLayout {
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DialogueLayout {
    pub fn of_type(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            extra: Map::new(),
        }
    }
}

/// The raw document body, in the same shape it is stored in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogueData {
    #[serde(default, skip_serializing_if = "States::is_absent")]
    pub states: States,
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_at: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub unskippable: Option<bool>,
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub layout: Option<DialogueLayout>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(raw: Value) -> DialogueData {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_states_three_way() {
        assert_eq!(parse(json!({})).states, States::Absent);
        assert_eq!(parse(json!({"states": null})).states, States::Null);
        assert_eq!(
            parse(json!({"states": {}})).states,
            States::Present(Arc::new(StateMap::new()))
        );
    }

    #[test]
    fn test_states_serialization_keeps_null() {
        assert_eq!(serde_json::to_value(parse(json!({}))).unwrap(), json!({}));
        assert_eq!(
            serde_json::to_value(parse(json!({"states": null}))).unwrap(),
            json!({"states": null})
        );
    }

    #[test]
    fn test_malformed_document_fields_read_as_missing() {
        let data = parse(json!({
            "start_at": 5,
            "unskippable": "yes",
            "layout": "rpg",
            "format_version": 2,
        }));
        assert_eq!(data.start_at, None);
        assert_eq!(data.unskippable, None);
        assert_eq!(data.layout, None);
        assert_eq!(data.extra.get("format_version"), Some(&json!(2)));

        let data = parse(json!({"layout": {"type": false, "portrait": "left"}}));
        let layout = data.layout.unwrap();
        assert_eq!(layout.kind, None);
        assert_eq!(layout.extra.get("portrait"), Some(&json!("left")));
    }

    #[test]
    fn test_malformed_states_tolerated() {
        assert_eq!(parse(json!({"states": [1, 2]})).states, States::Absent);

        let data = parse(json!({"states": {"bad": 3, "good": {"text": "hi"}}}));
        let states = data.states.as_map().unwrap();
        assert_eq!(*states["bad"], DialogueState::default());
        assert_eq!(states["good"].text, Some(json!("hi")));
    }

    #[test]
    fn test_non_object_root_is_rejected() {
        assert!(serde_json::from_value::<DialogueData>(json!([])).is_err());
        assert!(serde_json::from_value::<DialogueData>(json!("states")).is_err());
    }

    #[test]
    fn test_document_roundtrip_keeps_unknown_keys() {
        let raw = json!({
            "states": {"start": {"text": "hi", "choices": []}},
            "start_at": "start",
            "unskippable": true,
            "layout": {"type": "rpgish", "portrait": "left"},
            "format_version": 2,
        });
        let data = parse(raw.clone());
        assert_eq!(data.extra.get("format_version"), Some(&json!(2)));
        assert_eq!(
            data.layout.as_ref().and_then(|l| l.extra.get("portrait")),
            Some(&json!("left"))
        );
        assert_eq!(serde_json::to_value(&data).unwrap(), raw);
    }
}
