use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::foundation::error::{CanvasError, CanvasResult};

/// Session storage key the generation pages write the hand-off payload under.
pub const HANDOFF_KEY: &str = "editorHandoff";

/// Just-generated asset passed from a generation page into the editor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HandoffPayload {
    pub image_url: Option<String>,
    pub svg_content: Option<String>,
    /// Raster rendering of `svg_content`, used when the markup cannot be parsed.
    pub svg_fallback: Option<String>,
    pub original_prompt: Option<String>,
    pub refined_prompt: Option<String>,
    pub options: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl HandoffPayload {
    pub fn from_json(s: &str) -> CanvasResult<Self> {
        serde_json::from_str(s).map_err(|e| CanvasError::serde(format!("handoff payload: {e}")))
    }

    /// Whether the payload carries anything importable.
    pub fn has_asset(&self) -> bool {
        self.image_url.as_deref().is_some_and(|s| !s.is_empty())
            || self.svg_content.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}

/// Prompts and options that produced the handed-off asset.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Provenance {
    pub original_prompt: Option<String>,
    pub refined_prompt: Option<String>,
    pub options: Option<serde_json::Value>,
}

impl From<&HandoffPayload> for Provenance {
    fn from(p: &HandoffPayload) -> Self {
        Self {
            original_prompt: p.original_prompt.clone(),
            refined_prompt: p.refined_prompt.clone(),
            options: p.options.clone(),
        }
    }
}

/// Transient, session-scoped key/value storage.
pub trait SessionStorage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
    fn remove(&mut self, key: &str) -> Option<String>;

    /// Read and remove in one step.
    fn take(&mut self, key: &str) -> Option<String> {
        self.remove(key)
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemorySessionStorage {
    entries: HashMap<String, String>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_owned(), value);
    }

    fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }
}

/// Take the pending hand-off out of `storage`; it is consumed even when it fails to parse.
pub fn take_handoff(storage: &mut dyn SessionStorage) -> CanvasResult<Option<HandoffPayload>> {
    let Some(raw) = storage.take(HANDOFF_KEY) else {
        return Ok(None);
    };
    HandoffPayload::from_json(&raw).map(Some)
}

#[cfg(test)]
#[path = "../../tests/unit/import/handoff.rs"]
mod tests;
