//! Layer metadata, the ordered layer registry and its undo history.

/// Snapshot-based undo/redo.
pub mod history;
/// Layer entity, kinds, blend modes and partial updates.
pub mod model;
/// Ordered layer stack bound to the surface arena.
pub mod registry;
