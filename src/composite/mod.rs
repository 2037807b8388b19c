//! Flattening of layer stacks into a single surface.

pub(crate) mod blend;
/// Deterministic layer-stack compositor.
pub mod compositor;
