//! Host-side storage slot that editor sessions are saved into.
//!
//! The slot behaves like a browser history entry: one JSON value that is read
//! whole and replaced whole. Documents are merged into whatever the slot
//! already holds so other editor state kept there is not lost.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, warn};
use serde_json::{Map, Value};

pub trait HistorySlot {
    /// Current slot contents, `None` when nothing has been stored yet.
    fn current(&self) -> Result<Option<Value>>;

    /// Replace the slot contents with `state`.
    fn replace(&mut self, state: Value) -> Result<()>;
}

/// `{ ...existing, data, filename }`. A non-object slot contributes nothing.
pub fn merge_payload(existing: Option<Value>, data: Value, filename: Option<&str>) -> Value {
    let mut merged = match existing {
        Some(Value::Object(map)) => map,
        Some(other) => {
            warn!("Discarding non-object history slot contents: {other}");
            Map::new()
        }
        None => Map::new(),
    };
    merged.insert("data".into(), data);
    merged.insert(
        "filename".into(),
        filename.map_or(Value::Null, |f| Value::String(f.to_owned())),
    );
    Value::Object(merged)
}

// ---------------------------------------------------------------------------
// In-memory slot
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemorySlot {
    state: Option<Value>,
    writes: usize,
}

impl MemorySlot {
    pub fn with_state(state: Value) -> Self {
        Self {
            state: Some(state),
            writes: 0,
        }
    }

    pub fn state(&self) -> Option<&Value> {
        self.state.as_ref()
    }

    /// Number of `replace` calls so far.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl HistorySlot for MemorySlot {
    fn current(&self) -> Result<Option<Value>> {
        Ok(self.state.clone())
    }

    fn replace(&mut self, state: Value) -> Result<()> {
        self.state = Some(state);
        self.writes += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File-backed slot
// ---------------------------------------------------------------------------

/// A slot stored as a JSON file. A missing or empty file is an empty slot.
#[derive(Debug, Clone)]
pub struct JsonFileSlot {
    path: PathBuf,
}

impl JsonFileSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistorySlot for JsonFileSlot {
    fn current(&self) -> Result<Option<Value>> {
        if !self.path.exists() {
            debug!("History slot {} does not exist yet", self.path.display());
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let state = serde_json::from_str(&raw)
            .with_context(|| format!("{} is not valid JSON", self.path.display()))?;
        Ok(Some(state))
    }

    fn replace(&mut self, state: Value) -> Result<()> {
        let raw = serde_json::to_string_pretty(&state).context("failed to encode history slot")?;
        fs::write(&self.path, raw)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        debug!("Wrote history slot {}", self.path.display());
        Ok(())
    }
}
