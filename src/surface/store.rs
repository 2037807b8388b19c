use std::collections::HashMap;

use crate::foundation::core::Canvas;
use crate::foundation::error::{CanvasError, CanvasResult};
use crate::surface::buffer::Surface;

/// Opaque handle to a surface tracked by a [`SurfaceStore`].
///
/// Handles are never reused within a store, so a stale handle can only ever miss.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceId(u64);

impl SurfaceId {
    /// Handle carried by layers held outside any store; replaced when the layer is restored.
    pub(crate) const DETACHED: SurfaceId = SurfaceId(u64::MAX);

    /// Raw handle value (diagnostics only).
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Allocation accounting for a [`SurfaceStore`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SurfaceStoreStats {
    /// Surfaces currently tracked.
    pub live_surfaces: usize,
    /// Bytes held by tracked surfaces.
    pub live_bytes: usize,
    /// Surfaces ever allocated or adopted.
    pub alloc_surfaces: u64,
    /// Bytes ever allocated or adopted.
    pub alloc_bytes: u64,
    /// Surfaces released (explicitly or on teardown).
    pub released_surfaces: u64,
}

/// Arena of every live layer surface owned by one editor session.
///
/// Nothing outside the store touches pixel memory except through a [`SurfaceId`]. Dropping
/// the store force-releases whatever is still tracked.
#[derive(Debug)]
pub struct SurfaceStore {
    default_size: Canvas,
    next_id: u64,
    live: HashMap<SurfaceId, Surface>,
    stats: SurfaceStoreStats,
}

impl Default for SurfaceStore {
    fn default() -> Self {
        Self::new(Canvas::default())
    }
}

impl SurfaceStore {
    /// Create an empty store whose [`SurfaceStore::create_default`] allocates `default_size`.
    pub fn new(default_size: Canvas) -> Self {
        Self {
            default_size,
            next_id: 1,
            live: HashMap::new(),
            stats: SurfaceStoreStats::default(),
        }
    }

    /// Size used when no explicit container size is known.
    pub fn default_size(&self) -> Canvas {
        self.default_size
    }

    /// Update the fallback size once a host container reports concrete dimensions.
    pub fn set_default_size(&mut self, size: Canvas) {
        self.default_size = size;
    }

    /// Allocate a transparent `width x height` surface.
    pub fn create(&mut self, width: u32, height: u32) -> CanvasResult<SurfaceId> {
        let surface = Surface::new(width, height)?;
        Ok(self.track(surface))
    }

    /// Allocate a transparent surface at the default size.
    pub fn create_default(&mut self) -> CanvasResult<SurfaceId> {
        let Canvas { width, height } = self.default_size;
        self.create(width, height)
    }

    /// Take ownership of an already-populated surface.
    pub fn adopt(&mut self, surface: Surface) -> CanvasResult<SurfaceId> {
        if surface.is_released() {
            return Err(CanvasError::allocation("cannot adopt a released surface"));
        }
        Ok(self.track(surface))
    }

    fn track(&mut self, surface: Surface) -> SurfaceId {
        let id = SurfaceId(self.next_id);
        self.next_id += 1;

        let bytes = surface.data().len();
        self.stats.alloc_surfaces = self.stats.alloc_surfaces.saturating_add(1);
        self.stats.alloc_bytes = self.stats.alloc_bytes.saturating_add(bytes as u64);
        self.stats.live_surfaces += 1;
        self.stats.live_bytes = self.stats.live_bytes.saturating_add(bytes);

        self.live.insert(id, surface);
        id
    }

    /// Borrow a live surface.
    pub fn get(&self, id: SurfaceId) -> Option<&Surface> {
        self.live.get(&id)
    }

    /// Mutably borrow a live surface.
    pub fn get_mut(&mut self, id: SurfaceId) -> Option<&mut Surface> {
        self.live.get_mut(&id)
    }

    /// Whether `id` still refers to a tracked surface.
    pub fn is_live(&self, id: SurfaceId) -> bool {
        self.live.contains_key(&id)
    }

    /// Dimensions of `id`; released or unknown handles report `(0, 0)`.
    pub fn dimensions(&self, id: SurfaceId) -> (u32, u32) {
        self.live.get(&id).map_or((0, 0), Surface::dimensions)
    }

    /// Resize a live surface, keeping its overlapping top-left content.
    pub fn resize(&mut self, id: SurfaceId, width: u32, height: u32) -> CanvasResult<()> {
        let surface = self
            .live
            .get_mut(&id)
            .ok_or_else(|| CanvasError::validation("resize of a released surface"))?;
        let before = surface.data().len();
        surface.resize_preserving(width, height)?;
        let after = surface.data().len();
        self.stats.live_bytes = self.stats.live_bytes.saturating_sub(before) + after;
        Ok(())
    }

    /// Clear, zero and stop tracking a surface.
    ///
    /// Returns `false` (and does nothing) when the surface was already released.
    pub fn release(&mut self, id: SurfaceId) -> bool {
        let Some(mut surface) = self.live.remove(&id) else {
            return false;
        };
        self.stats.live_surfaces = self.stats.live_surfaces.saturating_sub(1);
        self.stats.live_bytes = self.stats.live_bytes.saturating_sub(surface.data().len());
        self.stats.released_surfaces = self.stats.released_surfaces.saturating_add(1);
        surface.release();
        true
    }

    /// Force-release every tracked surface; returns how many were still live.
    pub fn release_all(&mut self) -> usize {
        let mut ids: Vec<SurfaceId> = self.live.keys().copied().collect();
        ids.sort_unstable();
        let n = ids.len();
        for id in ids {
            self.release(id);
        }
        n
    }

    /// Number of live surfaces.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Whether no surface is tracked.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Snapshot of allocation accounting.
    pub fn stats(&self) -> SurfaceStoreStats {
        self.stats.clone()
    }
}

impl Drop for SurfaceStore {
    fn drop(&mut self) {
        let n = self.release_all();
        if n > 0 {
            tracing::debug!(released = n, "surface store teardown");
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/surface/store.rs"]
mod tests;
