use std::collections::VecDeque;

use crate::foundation::error::CanvasResult;
use crate::layer::registry::{LayerRegistry, RegistrySnapshot};

/// Bounded undo/redo stacks of whole-registry snapshots.
///
/// Callers record the state *before* a mutation with [`History::record`]; recording clears the
/// redo stack. When more than `max_depth` undo entries exist the oldest is dropped.
#[derive(Debug)]
pub struct History {
    max_depth: usize,
    undo: VecDeque<RegistrySnapshot>,
    redo: Vec<RegistrySnapshot>,
}

impl Default for History {
    fn default() -> Self {
        Self::new(50)
    }
}

impl History {
    /// Create an empty history keeping at most `max_depth` undo steps (0 disables history).
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            undo: VecDeque::new(),
            redo: Vec::new(),
        }
    }

    /// Push the pre-mutation state.
    pub fn record(&mut self, before: RegistrySnapshot) {
        self.redo.clear();
        if self.max_depth == 0 {
            return;
        }
        if self.undo.len() == self.max_depth {
            self.undo.pop_front();
        }
        self.undo.push_back(before);
    }

    /// Restore the most recent recorded state. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self, registry: &mut LayerRegistry) -> CanvasResult<bool> {
        let Some(prev) = self.undo.pop_back() else {
            return Ok(false);
        };
        self.redo.push(registry.snapshot());
        registry.restore(prev)?;
        Ok(true)
    }

    /// Re-apply the most recently undone state. Returns `false` when there is nothing to redo.
    pub fn redo(&mut self, registry: &mut LayerRegistry) -> CanvasResult<bool> {
        let Some(next) = self.redo.pop() else {
            return Ok(false);
        };
        self.undo.push_back(registry.snapshot());
        if self.undo.len() > self.max_depth {
            self.undo.pop_front();
        }
        registry.restore(next)?;
        Ok(true)
    }

    /// Whether an undo step is available.
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Whether a redo step is available.
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Number of undo steps held.
    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    /// Drop both stacks.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layer/history.rs"]
mod tests;
