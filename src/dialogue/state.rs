use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dialogue::lenient;

/// Formatted text payload owned by the renderer. Copied verbatim, never parsed.
pub type McText = Value;

/// Side effect fired when the conversation enters a state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogueAction {
    /// Action kind. An empty string means "no action".
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DialogueAction {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            value: Some(value.into()),
            extra: Map::new(),
        }
    }

    /// Only an explicit empty type counts; a missing type is kept as-is.
    pub fn is_noop(&self) -> bool {
        self.kind.as_deref() == Some("")
    }
}

/// One outgoing edge of a state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogueChoice {
    #[serde(
        default,
        deserialize_with = "lenient::opaque",
        skip_serializing_if = "Option::is_none"
    )]
    pub text: Option<McText>,
    /// Key of the state this choice leads to.
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub next: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DialogueChoice {
    pub fn new(text: impl Into<McText>, next: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            next: Some(next.into()),
            extra: Map::new(),
        }
    }
}

/// A single node in the dialogue graph.
///
/// Field order matters for output: `action` is emitted first so pruned
/// documents read the same way the editor writes them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogueState {
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub action: Option<DialogueAction>,
    /// Node kind, interpreted by renderers (e.g. "text", "end").
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opaque",
        skip_serializing_if = "Option::is_none"
    )]
    pub text: Option<McText>,
    /// Presentation order is significant.
    #[serde(
        default,
        deserialize_with = "lenient::optional_seq",
        skip_serializing_if = "Option::is_none"
    )]
    pub choices: Option<Vec<DialogueChoice>>,
    /// Keys this model does not know about, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DialogueState {
    /// The state a freshly added key starts with: empty text, no choices.
    pub fn blank() -> Self {
        Self {
            text: Some(Value::String(String::new())),
            choices: Some(Vec::new()),
            ..Self::default()
        }
    }

    pub fn has_noop_action(&self) -> bool {
        self.action.as_ref().is_some_and(DialogueAction::is_noop)
    }

    /// Copy of this state with the action removed, everything else untouched.
    pub fn without_action(&self) -> Self {
        Self {
            action: None,
            ..self.clone()
        }
    }

    /// Keys of the states reachable through this state's choices, in order.
    pub fn next_keys(&self) -> impl Iterator<Item = &str> {
        self.choices
            .iter()
            .flatten()
            .filter_map(|choice| choice.next.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_noop_requires_explicit_empty_type() {
        assert!(DialogueAction::new("", "x").is_noop());
        assert!(!DialogueAction::new("say", "x").is_noop());

        let untyped: DialogueAction = serde_json::from_value(json!({"value": "x"})).unwrap();
        assert!(!untyped.is_noop());
    }

    #[test]
    fn test_blank_state_shape() {
        let blank = serde_json::to_value(DialogueState::blank()).unwrap();
        assert_eq!(blank, json!({"text": "", "choices": []}));
    }

    #[test]
    fn test_action_serialized_first() {
        let state: DialogueState = serde_json::from_value(json!({
            "text": "hi",
            "type": "text",
            "action": {"type": "say", "value": "x"},
        }))
        .unwrap();
        let raw = serde_json::to_string(&state).unwrap();
        assert!(raw.starts_with(r#"{"action":"#), "{raw}");
    }

    #[test]
    fn test_unknown_fields_survive() {
        let raw = json!({
            "text": {"translate": "npc.hello", "color": "gold"},
            "speaker": "villager",
            "choices": [{"text": "bye", "next": "end", "weight": 2}],
        });
        let state: DialogueState = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(state.extra.get("speaker"), Some(&json!("villager")));
        assert_eq!(serde_json::to_value(&state).unwrap(), raw);
    }

    #[test]
    fn test_malformed_fields_read_as_missing() {
        let state: DialogueState = serde_json::from_value(json!({
            "type": 7,
            "action": {"type": 3, "value": ["x"]},
            "text": "still here",
            "choices": [{"text": "ok", "next": 12}, "broken", {"next": "end"}],
        }))
        .unwrap();
        let action = state.action.as_ref().unwrap();
        assert_eq!(action.kind, None);
        assert_eq!(action.value, None);
        assert!(!state.has_noop_action());
        assert_eq!(state.kind, None);
        assert_eq!(state.text, Some(json!("still here")));

        let choices = state.choices.as_ref().unwrap();
        assert_eq!(choices.len(), 3);
        assert_eq!(choices[0].next, None);
        assert_eq!(choices[1], DialogueChoice::default());
        assert_eq!(state.next_keys().collect::<Vec<_>>(), ["end"]);
    }

    #[test]
    fn test_wrongly_typed_action_and_choices_dropped() {
        let state: DialogueState =
            serde_json::from_value(json!({"action": "say", "choices": {"a": 1}})).unwrap();
        assert_eq!(state.action, None);
        assert_eq!(state.choices, None);
    }

    #[test]
    fn test_null_text_is_copied_verbatim() {
        let raw = json!({"text": null, "choices": [{"text": null, "next": "b"}]});
        let state: DialogueState = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(state.text, Some(Value::Null));
        assert_eq!(serde_json::to_value(&state).unwrap(), raw);
    }

    #[test]
    fn test_next_keys_skip_dead_ends() {
        let state = DialogueState {
            choices: Some(vec![
                DialogueChoice::new("yes", "accept"),
                DialogueChoice::default(),
                DialogueChoice::new("no", "refuse"),
            ]),
            ..DialogueState::default()
        };
        assert_eq!(state.next_keys().collect::<Vec<_>>(), ["accept", "refuse"]);
    }
}
