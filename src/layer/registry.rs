use std::collections::HashSet;

use crate::composite::compositor::{Placement, draw_surface};
use crate::foundation::core::Canvas;
use crate::foundation::error::CanvasResult;
use crate::layer::model::{Layer, LayerId, LayerKind, LayerPatch};
use crate::surface::buffer::Surface;
use crate::surface::store::{SurfaceId, SurfaceStore, SurfaceStoreStats};

/// Name given to the product of [`LayerRegistry::merge_layers`].
pub const MERGED_LAYER_NAME: &str = "Merged Layer";

/// Ordered layer stack plus the surface arena backing it.
///
/// This is the single source of truth for layer metadata: every mutation goes through it, and
/// after every operation the `z_index` of each layer equals its position in [`Self::layers`].
/// Operations that cannot apply (unknown ids, deleting the last layer, merging fewer than two
/// layers) are silent no-ops reported through their return value.
#[derive(Debug, Default)]
pub struct LayerRegistry {
    store: SurfaceStore,
    layers: Vec<Layer>,
    active: Option<LayerId>,
}

/// Point-in-time copy of a registry: metadata plus pixel content of every layer.
#[derive(Clone, Debug)]
pub struct RegistrySnapshot {
    pub(crate) layers: Vec<(Layer, Surface)>,
    pub(crate) active: Option<LayerId>,
}

impl RegistrySnapshot {
    /// Number of layers captured.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether the snapshot holds no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl LayerRegistry {
    /// Empty registry whose default-sized layers are `default_size`.
    pub fn new(default_size: Canvas) -> Self {
        Self {
            store: SurfaceStore::new(default_size),
            layers: Vec::new(),
            active: None,
        }
    }

    /// Layers in draw order (bottom first).
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether the registry holds no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Look up a layer by id.
    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Position of a layer in draw order.
    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    /// The surface backing a layer.
    pub fn surface(&self, id: LayerId) -> Option<&Surface> {
        self.layer(id).and_then(|l| self.store.get(l.surface))
    }

    /// Mutable access to the pixels of a layer (drawing, import).
    pub fn surface_mut(&mut self, id: LayerId) -> Option<&mut Surface> {
        let sid = self.layer(id)?.surface;
        self.store.get_mut(sid)
    }

    /// Read-only access to the surface arena.
    pub fn store(&self) -> &SurfaceStore {
        &self.store
    }

    /// Surface arena accounting.
    pub fn surface_stats(&self) -> SurfaceStoreStats {
        self.store.stats()
    }

    /// Default size for layers created without explicit dimensions.
    pub fn default_size(&self) -> Canvas {
        self.store.default_size()
    }

    /// Change the default size for layers created later.
    pub fn set_default_size(&mut self, size: Canvas) {
        self.store.set_default_size(size);
    }

    /// Id of the active layer, if any.
    pub fn active_id(&self) -> Option<LayerId> {
        self.active
    }

    /// The active layer, if any.
    pub fn active(&self) -> Option<&Layer> {
        self.active.and_then(|id| self.layer(id))
    }

    /// Make `id` the active layer. Unknown ids are rejected and leave the selection unchanged.
    pub fn set_active(&mut self, id: LayerId) -> bool {
        if self.layer(id).is_none() {
            tracing::debug!(%id, "set_active ignored: unknown layer");
            return false;
        }
        self.active = Some(id);
        true
    }

    /// Create a default-sized layer on top of the stack and make it active.
    ///
    /// Returns `None` only when the surface cannot be allocated; callers must not assume success.
    pub fn create_layer(&mut self, kind: LayerKind, name: Option<&str>) -> Option<LayerId> {
        let Canvas { width, height } = self.store.default_size();
        self.create_layer_sized(kind, name, width, height)
    }

    /// Create a `width x height` layer on top of the stack and make it active.
    pub fn create_layer_sized(
        &mut self,
        kind: LayerKind,
        name: Option<&str>,
        width: u32,
        height: u32,
    ) -> Option<LayerId> {
        let surface = match self.store.create(width, height) {
            Ok(s) => s,
            Err(err) => {
                tracing::warn!(%err, ?kind, "create_layer: surface allocation failed");
                return None;
            }
        };
        Some(self.push_layer(kind, name, surface))
    }

    /// Create a layer that takes ownership of already-populated pixels.
    pub fn create_layer_from_surface(
        &mut self,
        kind: LayerKind,
        name: Option<&str>,
        surface: Surface,
    ) -> Option<LayerId> {
        let surface = match self.store.adopt(surface) {
            Ok(s) => s,
            Err(err) => {
                tracing::warn!(%err, ?kind, "create_layer: surface adoption failed");
                return None;
            }
        };
        Some(self.push_layer(kind, name, surface))
    }

    fn push_layer(&mut self, kind: LayerKind, name: Option<&str>, surface: SurfaceId) -> LayerId {
        let id = LayerId::new();
        let name = name.map_or_else(|| kind.default_name(), str::to_owned);
        self.layers
            .push(Layer::new(id, kind, name, self.layers.len(), surface));
        self.active = Some(id);
        id
    }

    /// Remove a layer and release its surface.
    ///
    /// Refuses to remove the last remaining layer. If the removed layer was active, the bottom
    /// layer becomes active.
    pub fn delete_layer(&mut self, id: LayerId) -> bool {
        if self.layers.len() <= 1 {
            tracing::debug!(%id, "delete_layer ignored: last layer");
            return false;
        }
        let Some(idx) = self.index_of(id) else {
            tracing::debug!(%id, "delete_layer ignored: unknown layer");
            return false;
        };

        let layer = self.layers.remove(idx);
        self.store.release(layer.surface);
        self.normalize_z();

        if self.active == Some(id) {
            self.active = self.layers.first().map(|l| l.id);
        }
        true
    }

    /// Shallow-merge `patch` into a layer. Returns `false` for unknown ids or no-op patches.
    pub fn update_layer(&mut self, id: LayerId, patch: LayerPatch) -> bool {
        if patch.is_empty() {
            return false;
        }
        let Some(layer) = self.layers.iter_mut().find(|l| l.id == id) else {
            tracing::debug!(%id, "update_layer ignored: unknown layer");
            return false;
        };
        patch.apply(layer)
    }

    /// Move the layer at `from` to position `to` and renumber every `z_index`.
    pub fn reorder_layers(&mut self, from: usize, to: usize) -> bool {
        let n = self.layers.len();
        if from >= n || to >= n {
            tracing::debug!(from, to, n, "reorder_layers ignored: index out of range");
            return false;
        }
        if from == to {
            return false;
        }
        let layer = self.layers.remove(from);
        self.layers.insert(to, layer);
        self.normalize_z();
        true
    }

    /// Copy a layer (pixels included) directly above itself and make the copy active.
    pub fn duplicate_layer(&mut self, id: LayerId) -> Option<LayerId> {
        let idx = self.index_of(id)?;
        let source = self.layers[idx].clone();
        let pixels = self.store.get(source.surface)?.clone();

        let surface = match self.store.adopt(pixels) {
            Ok(s) => s,
            Err(err) => {
                tracing::warn!(%err, %id, "duplicate_layer: surface allocation failed");
                return None;
            }
        };

        let copy_id = LayerId::new();
        let copy = Layer {
            id: copy_id,
            name: format!("{} Copy", source.name),
            z_index: source.z_index + 1,
            surface,
            ..source
        };
        self.layers.insert(idx + 1, copy);
        self.normalize_z();
        self.active = Some(copy_id);
        Some(copy_id)
    }

    /// Flatten two or more layers into one new layer.
    ///
    /// Matched layers are drawn bottom-up into a surface sized like the lowest matched layer,
    /// hidden ones skipped. All matched layers are removed (hidden content is discarded) and the
    /// merged layer takes the lowest position among them. Fewer than two resolvable ids is a
    /// no-op.
    #[tracing::instrument(skip(self, ids), fields(requested = ids.len()))]
    pub fn merge_layers(&mut self, ids: &[LayerId]) -> Option<LayerId> {
        let wanted: HashSet<LayerId> = ids.iter().copied().collect();
        let matched: Vec<usize> = self
            .layers
            .iter()
            .enumerate()
            .filter(|(_, l)| wanted.contains(&l.id))
            .map(|(i, _)| i)
            .collect();
        if matched.len() < 2 {
            tracing::debug!(matched = matched.len(), "merge_layers ignored: need two layers");
            return None;
        }

        let first = &self.layers[matched[0]];
        let (width, height) = self.store.dimensions(first.surface);
        let mut merged = match Surface::new(width, height) {
            Ok(s) => s,
            Err(err) => {
                tracing::warn!(%err, "merge_layers: surface allocation failed");
                return None;
            }
        };

        for &i in &matched {
            let layer = &self.layers[i];
            if !layer.visible {
                continue;
            }
            let Some(src) = self.store.get(layer.surface) else {
                continue;
            };
            if let Err(err) = draw_surface(
                &mut merged,
                src,
                layer.alpha(),
                layer.blend_mode,
                Placement::Origin,
            ) {
                tracing::warn!(%err, layer = %layer.id, "merge_layers: draw failed");
                return None;
            }
        }

        let surface = match self.store.adopt(merged) {
            Ok(s) => s,
            Err(err) => {
                tracing::warn!(%err, "merge_layers: surface adoption failed");
                return None;
            }
        };

        let insert_at = matched[0];
        for &i in matched.iter().rev() {
            let removed = self.layers.remove(i);
            self.store.release(removed.surface);
        }

        let id = LayerId::new();
        let layer = Layer::new(
            id,
            LayerKind::Drawing,
            MERGED_LAYER_NAME.to_owned(),
            insert_at,
            surface,
        );
        self.layers.insert(insert_at, layer);
        self.normalize_z();
        self.active = Some(id);
        Some(id)
    }

    /// Resize one layer's surface, keeping its top-left content.
    pub fn resize_layer(&mut self, id: LayerId, width: u32, height: u32) -> CanvasResult<bool> {
        let Some(layer) = self.layer(id) else {
            return Ok(false);
        };
        self.store.resize(layer.surface, width, height)?;
        Ok(true)
    }

    /// Cheap precondition for [`Self::delete_layer`].
    pub(crate) fn can_delete(&self, id: LayerId) -> bool {
        self.layers.len() > 1 && self.index_of(id).is_some()
    }

    pub(crate) fn can_update(&self, id: LayerId, patch: &LayerPatch) -> bool {
        !patch.is_empty() && self.index_of(id).is_some()
    }

    pub(crate) fn can_reorder(&self, from: usize, to: usize) -> bool {
        let n = self.layers.len();
        from != to && from < n && to < n
    }

    /// At least two distinct layers in `ids` exist.
    pub(crate) fn can_merge(&self, ids: &[LayerId]) -> bool {
        self.layers
            .iter()
            .filter(|l| ids.contains(&l.id))
            .take(2)
            .count()
            == 2
    }

    /// Capture metadata and pixels of every layer.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let layers = self
            .layers
            .iter()
            .filter_map(|l| self.store.get(l.surface).map(|s| (l.clone(), s.clone())))
            .collect();
        RegistrySnapshot {
            layers,
            active: self.active,
        }
    }

    /// Replace the whole registry with `snapshot`.
    ///
    /// Every current surface is released first; snapshot pixels get fresh surface handles while
    /// layer ids are kept.
    pub fn restore(&mut self, snapshot: RegistrySnapshot) -> CanvasResult<()> {
        self.clear();
        let RegistrySnapshot { layers, active } = snapshot;
        for (mut layer, pixels) in layers {
            layer.surface = self.store.adopt(pixels)?;
            self.layers.push(layer);
        }
        self.normalize_z();
        self.active = active.filter(|id| self.layer(*id).is_some());
        Ok(())
    }

    /// Remove every layer and release every tracked surface.
    pub fn clear(&mut self) -> usize {
        self.layers.clear();
        self.active = None;
        self.store.release_all()
    }

    fn normalize_z(&mut self) {
        for (i, layer) in self.layers.iter_mut().enumerate() {
            layer.z_index = i;
        }
    }

    /// Check the structural invariants; used by tests and debug assertions.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut seen_surfaces = HashSet::new();
        let mut seen_ids = HashSet::new();
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.z_index != i {
                return Err(format!("layer {} has z_index {} at {i}", layer.id, layer.z_index));
            }
            if !seen_ids.insert(layer.id) {
                return Err(format!("duplicate layer id {}", layer.id));
            }
            if !seen_surfaces.insert(layer.surface) {
                return Err(format!("surface {:?} shared", layer.surface));
            }
            if !self.store.is_live(layer.surface) {
                return Err(format!("layer {} references a released surface", layer.id));
            }
            if layer.opacity > 100 {
                return Err(format!("layer {} opacity {}", layer.id, layer.opacity));
            }
        }
        if self.store.len() != self.layers.len() {
            return Err(format!(
                "{} live surfaces for {} layers",
                self.store.len(),
                self.layers.len()
            ));
        }
        if let Some(active) = self.active
            && self.layer(active).is_none()
        {
            return Err(format!("active id {active} not in registry"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layer/registry.rs"]
mod tests;
