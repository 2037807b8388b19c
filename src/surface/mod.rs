//! Raster surfaces and the per-session arena that owns them.

/// Owned premultiplied RGBA8 pixel buffer.
pub mod buffer;
/// Handle-based surface arena with teardown accounting.
pub mod store;
