use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::surface::store::SurfaceId;

/// Stable, never-reused layer identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(Uuid);

impl LayerId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse the textual form produced by `Display`.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Provenance tag of a layer. Does not change how the layer is composited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    /// Decoded raster or rasterized vector content.
    Image,
    /// Freehand or merged content.
    Drawing,
    /// Text content.
    Text,
    /// Shape content.
    Shape,
}

impl LayerKind {
    /// Capitalized label used for generated names.
    pub fn label(self) -> &'static str {
        match self {
            LayerKind::Image => "Image",
            LayerKind::Drawing => "Drawing",
            LayerKind::Text => "Text",
            LayerKind::Shape => "Shape",
        }
    }

    /// Default layer name, e.g. `"Image Layer"`.
    pub fn default_name(self) -> String {
        format!("{} Layer", self.label())
    }
}

/// Pixel-combination function applied when a layer is drawn over what lies beneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    /// Standard source-over alpha compositing.
    #[default]
    Normal,
    /// `s * d`.
    Multiply,
    /// `s + d - s * d`.
    Screen,
    /// Hard-light with source and backdrop swapped.
    Overlay,
    /// W3C soft-light.
    SoftLight,
}

impl BlendMode {
    /// Serialized name, e.g. `"soft-light"`.
    pub fn as_str(self) -> &'static str {
        match self {
            BlendMode::Normal => "normal",
            BlendMode::Multiply => "multiply",
            BlendMode::Screen => "screen",
            BlendMode::Overlay => "overlay",
            BlendMode::SoftLight => "soft-light",
        }
    }
}

/// Layer metadata bound 1:1 to a surface in the registry's [`crate::SurfaceStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Stable identity.
    pub id: LayerId,
    /// Human-readable label.
    pub name: String,
    /// Provenance tag.
    pub kind: LayerKind,
    /// Hidden layers are skipped when compositing visible content.
    pub visible: bool,
    /// Advisory lock for hosts; no registry operation consults it.
    pub locked: bool,
    /// Opacity percentage in `0..=100`.
    pub opacity: u8,
    /// How the layer combines with the content beneath it.
    pub blend_mode: BlendMode,
    /// Draw order, bottom (0) to top; always equal to the layer's position in the registry.
    pub z_index: usize,
    /// Exclusively owned surface handle.
    pub surface: SurfaceId,
}

impl Layer {
    pub(crate) fn new(
        id: LayerId,
        kind: LayerKind,
        name: String,
        z_index: usize,
        surface: SurfaceId,
    ) -> Self {
        Self {
            id,
            name,
            kind,
            visible: true,
            locked: false,
            opacity: 100,
            blend_mode: BlendMode::Normal,
            z_index,
            surface,
        }
    }

    /// Opacity as a `0.0..=1.0` compositing factor.
    pub fn alpha(&self) -> f32 {
        f32::from(self.opacity.min(100)) / 100.0
    }
}

/// Partial update for [`crate::LayerRegistry::update_layer`]; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerPatch {
    /// New name.
    pub name: Option<String>,
    /// New visibility.
    pub visible: Option<bool>,
    /// New lock flag.
    pub locked: Option<bool>,
    /// New opacity percentage; values above 100 are clamped.
    pub opacity: Option<u8>,
    /// New blend mode.
    pub blend_mode: Option<BlendMode>,
}

impl LayerPatch {
    /// Patch that only renames.
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Patch that only toggles visibility.
    pub fn visible(visible: bool) -> Self {
        Self {
            visible: Some(visible),
            ..Self::default()
        }
    }

    /// Patch that only changes opacity.
    pub fn opacity(opacity: u8) -> Self {
        Self {
            opacity: Some(opacity),
            ..Self::default()
        }
    }

    /// Patch that only changes the blend mode.
    pub fn blend_mode(blend_mode: BlendMode) -> Self {
        Self {
            blend_mode: Some(blend_mode),
            ..Self::default()
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub(crate) fn apply(self, layer: &mut Layer) -> bool {
        let before = layer.clone();
        if let Some(name) = self.name {
            layer.name = name;
        }
        if let Some(visible) = self.visible {
            layer.visible = visible;
        }
        if let Some(locked) = self.locked {
            layer.locked = locked;
        }
        if let Some(opacity) = self.opacity {
            layer.opacity = opacity.min(100);
        }
        if let Some(blend_mode) = self.blend_mode {
            layer.blend_mode = blend_mode;
        }
        *layer != before
    }
}
