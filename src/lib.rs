//! Immutable document model for branching dialogue trees.
//!
//! A [`BlabberDialogue`] is never edited in place: every operation returns a
//! new document that shares unchanged parts with the old one.

pub mod dialogue;
pub mod history;

pub use dialogue::data::{DialogueData, DialogueLayout, StateMap, States};
pub use dialogue::state::{DialogueAction, DialogueChoice, DialogueState, McText};
pub use dialogue::BlabberDialogue;
pub use history::{HistorySlot, JsonFileSlot, MemorySlot};
