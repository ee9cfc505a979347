pub mod data;
mod lenient;
pub mod state;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info, trace};
use serde_json::Value;

use crate::history::{self, HistorySlot};
use data::{DialogueData, DialogueLayout, StateMap, States};
use state::DialogueState;

static EMPTY_STATES: StateMap = BTreeMap::new();

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// An immutable dialogue document plus the file it came from.
///
/// Every `with_*` method returns a new document. The body is shallow-copied
/// at the level being edited and everything else is shared through `Arc`, so
/// `Arc::ptr_eq` is a valid "did this part change" test.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlabberDialogue {
    data: Arc<DialogueData>,
    filename: Option<String>,
}

impl BlabberDialogue {
    pub fn new(data: DialogueData, filename: Option<String>) -> Self {
        Self {
            data: Arc::new(data),
            filename,
        }
    }

    /// Decode a stored document. Missing or wrongly typed fields fall back to
    /// their defaults; only a root that is not an object is rejected.
    pub fn from_json(value: Value, filename: Option<String>) -> Result<Self> {
        let data: DialogueData =
            serde_json::from_value(value).context("dialogue document has an invalid shape")?;
        Ok(Self::new(data, filename))
    }

    pub fn from_json_str(raw: &str, filename: Option<String>) -> Result<Self> {
        let data: DialogueData =
            serde_json::from_str(raw).context("failed to parse dialogue JSON")?;
        Ok(Self::new(data, filename))
    }

    pub fn to_json(&self) -> Result<Value> {
        serde_json::to_value(&*self.data).context("failed to serialize dialogue")
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn data(&self) -> &Arc<DialogueData> {
        &self.data
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn start_at(&self) -> Option<&str> {
        self.data.start_at.as_deref()
    }

    pub fn unskippable(&self) -> bool {
        self.data.unskippable.unwrap_or(false)
    }

    /// The layout type. A layout object without a type reads as `None`.
    pub fn layout(&self) -> Option<&str> {
        self.data.layout.as_ref().and_then(|l| l.kind.as_deref())
    }

    pub fn states(&self) -> &StateMap {
        self.data.states.as_map().unwrap_or(&EMPTY_STATES)
    }

    pub fn state(&self, key: &str) -> Option<&Arc<DialogueState>> {
        self.states().get(key)
    }

    /// False only when `states` was explicitly set to `null`.
    pub fn is_loaded(&self) -> bool {
        !matches!(self.data.states, States::Null)
    }

    // -----------------------------------------------------------------------
    // Derivations
    // -----------------------------------------------------------------------

    /// Shallow-copy the body, apply `edit`, keep the filename.
    fn derive(&self, edit: impl FnOnce(&mut DialogueData)) -> Self {
        let mut data = DialogueData::clone(&self.data);
        edit(&mut data);
        Self {
            data: Arc::new(data),
            filename: self.filename.clone(),
        }
    }

    /// Same body, different filename. The body is not copied.
    pub fn with_filename(&self, filename: Option<&str>) -> Self {
        Self {
            data: Arc::clone(&self.data),
            filename: filename.map(str::to_owned),
        }
    }

    /// `None` clears the start pointer.
    pub fn with_start_at(&self, key: Option<&str>) -> Self {
        self.derive(|data| data.start_at = key.map(str::to_owned))
    }

    pub fn with_unskippability(&self, unskippable: bool) -> Self {
        self.derive(|data| data.unskippable = Some(unskippable))
    }

    /// Replaces the whole layout object; other layout fields are dropped.
    pub fn with_layout(&self, layout: &str) -> Self {
        self.derive(|data| data.layout = Some(DialogueLayout::of_type(layout)))
    }

    /// Puts a blank state at `key`, discarding whatever was there.
    pub fn with_added_state(&self, key: &str) -> Self {
        self.with_updated_state(key, |_| DialogueState::blank())
    }

    /// Replace the state at `key` with `updater(current)`.
    ///
    /// A missing state is passed to the updater as an empty state. Every other
    /// entry of the new map is the same `Arc` as in `self`.
    pub fn with_updated_state<F>(&self, key: &str, updater: F) -> Self
    where
        F: FnOnce(&DialogueState) -> DialogueState,
    {
        let empty = DialogueState::default();
        let current = self.state(key).map_or(&empty, Arc::as_ref);
        let updated = Arc::new(updater(current));

        let mut states = self.states().clone();
        if states.insert(key.to_owned(), updated).is_none() {
            debug!("Added state '{key}' ({} states total)", states.len());
        } else {
            trace!("Replaced state '{key}'");
        }

        self.derive(|data| data.states = States::Present(Arc::new(states)))
    }

    /// Drops the state at `key`. Choices pointing at it are left dangling.
    pub fn with_removed_state(&self, key: &str) -> Self {
        let mut states = self.states().clone();
        if states.remove(key).is_some() {
            debug!("Removed state '{key}' ({} states left)", states.len());
        }
        self.derive(|data| data.states = States::Present(Arc::new(states)))
    }

    // -----------------------------------------------------------------------
    // Normalization
    // -----------------------------------------------------------------------

    /// Drop every action whose type is the empty string.
    ///
    /// Nothing else is touched: empty text or an empty choice list stays as
    /// it is. States with nothing to drop keep their `Arc`.
    pub fn prune(&self) -> Self {
        let mut elided = 0usize;
        let states: StateMap = self
            .states()
            .iter()
            .map(|(key, state)| {
                let pruned = if state.has_noop_action() {
                    elided += 1;
                    Arc::new(state.without_action())
                } else {
                    Arc::clone(state)
                };
                (key.clone(), pruned)
            })
            .collect();

        if elided > 0 {
            debug!("Pruned {elided} no-op action(s) from {} states", states.len());
        }

        self.derive(|data| data.states = States::Present(Arc::new(states)))
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Merge this document into the slot's current contents and write it back
    /// in a single replace. Other keys already in the slot survive.
    pub fn save_to(&self, slot: &mut impl HistorySlot) -> Result<()> {
        let existing = slot.current().context("failed to read history slot")?;
        let payload = history::merge_payload(existing, self.to_json()?, self.filename());
        slot.replace(payload)
            .context("failed to write history slot")?;
        info!(
            "Saved dialogue {} ({} states)",
            self.filename().unwrap_or("<unnamed>"),
            self.states().len()
        );
        Ok(())
    }

    /// Read a document previously written by [`save_to`](Self::save_to).
    /// Returns `None` when the slot holds no document.
    pub fn restore_from(slot: &impl HistorySlot) -> Result<Option<Self>> {
        let Some(Value::Object(mut saved)) = slot.current()? else {
            return Ok(None);
        };
        let data = match saved.remove("data") {
            None | Some(Value::Null) => return Ok(None),
            Some(data) => data,
        };
        let filename = saved
            .get("filename")
            .and_then(Value::as_str)
            .map(str::to_owned);
        Self::from_json(data, filename).map(Some)
    }
}
