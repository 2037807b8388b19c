use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::export::encode::png_data_uri;
use crate::foundation::core::Canvas;
use crate::foundation::error::{CanvasError, CanvasResult};
use crate::import::raster::decode_image;
use crate::import::remote::decode_data_uri;
use crate::layer::model::{BlendMode, Layer, LayerId, LayerKind};
use crate::layer::registry::{LayerRegistry, RegistrySnapshot};
use crate::surface::store::SurfaceId;

/// Format version written into [`ProjectMetadata::version`].
pub const PROJECT_FORMAT_VERSION: &str = "1.0";

/// Saved project: every layer's metadata plus a PNG still of its pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub name: String,
    pub layers: Vec<LayerRecord>,
    pub metadata: ProjectMetadata,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
    pub opacity: u8,
    #[serde(default)]
    pub blend_mode: BlendMode,
    /// `data:image/png;base64,...`
    pub image_data: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    /// RFC 3339 timestamp.
    pub created_at: String,
    /// RFC 3339 timestamp.
    pub last_modified: String,
    pub version: String,
    pub canvas_size: Canvas,
}

fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl ProjectSnapshot {
    /// Transcribe the registry. `created_at` carries over from a previously loaded project.
    #[tracing::instrument(skip(registry, created_at), fields(layers = registry.len()))]
    pub fn capture(
        registry: &LayerRegistry,
        name: &str,
        created_at: Option<&str>,
    ) -> CanvasResult<Self> {
        let layers = registry
            .layers()
            .iter()
            .map(|layer| {
                let surface = registry.surface(layer.id).ok_or_else(|| {
                    CanvasError::validation(format!("layer {} has no live surface", layer.id))
                })?;
                Ok(LayerRecord {
                    id: layer.id.to_string(),
                    name: layer.name.clone(),
                    kind: layer.kind,
                    visible: layer.visible,
                    locked: layer.locked,
                    opacity: layer.opacity,
                    blend_mode: layer.blend_mode,
                    image_data: png_data_uri(surface)?,
                })
            })
            .collect::<CanvasResult<Vec<_>>>()?;

        let now = timestamp(Utc::now());
        Ok(Self {
            name: name.to_owned(),
            layers,
            metadata: ProjectMetadata {
                created_at: created_at.map_or_else(|| now.clone(), str::to_owned),
                last_modified: now,
                version: PROJECT_FORMAT_VERSION.to_owned(),
                canvas_size: registry.default_size(),
            },
        })
    }

    pub fn to_json_pretty(&self) -> CanvasResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CanvasError::serde(format!("project snapshot: {e}")))
    }

    pub fn from_json(s: &str) -> CanvasResult<Self> {
        let snap: Self = serde_json::from_str(s)
            .map_err(|e| CanvasError::serde(format!("project snapshot: {e}")))?;
        snap.check_metadata();
        Ok(snap)
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> CanvasResult<Self> {
        let snap: Self = serde_json::from_reader(reader)
            .map_err(|e| CanvasError::serde(format!("project snapshot: {e}")))?;
        snap.check_metadata();
        Ok(snap)
    }

    pub fn from_path(path: impl AsRef<Path>) -> CanvasResult<Self> {
        let path = path.as_ref();
        let f = std::fs::File::open(path)
            .with_context(|| format!("open project '{}'", path.display()))?;
        Self::from_reader(std::io::BufReader::new(f))
    }

    pub fn write_to_path(&self, path: impl AsRef<Path>) -> CanvasResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json_pretty()?)
            .with_context(|| format!("write project '{}'", path.display()))?;
        Ok(())
    }

    fn check_metadata(&self) {
        if self.metadata.version != PROJECT_FORMAT_VERSION {
            tracing::warn!(
                version = %self.metadata.version,
                expected = PROJECT_FORMAT_VERSION,
                "project version differs; loading anyway"
            );
        }
        for (field, value) in [
            ("createdAt", &self.metadata.created_at),
            ("lastModified", &self.metadata.last_modified),
        ] {
            if DateTime::parse_from_rfc3339(value).is_err() {
                tracing::warn!(field, %value, "project timestamp is not RFC 3339");
            }
        }
    }

    /// Decode every layer image into a registry snapshot without touching any registry.
    ///
    /// Any undecodable layer fails the whole load. Ids that are not UUIDs (or repeat) are
    /// replaced with fresh ones; the top layer becomes active.
    pub fn to_registry_snapshot(&self) -> CanvasResult<RegistrySnapshot> {
        let mut seen = HashSet::new();
        let mut layers = Vec::with_capacity(self.layers.len());
        for (z, rec) in self.layers.iter().enumerate() {
            let bytes = decode_data_uri(&rec.image_data)
                .map_err(|e| CanvasError::decode(format!("layer '{}': {e}", rec.name)))?;
            let pixels = decode_image(&bytes)
                .map_err(|e| CanvasError::decode(format!("layer '{}': {e}", rec.name)))?;

            let id = match LayerId::parse(&rec.id) {
                Some(id) if seen.insert(id) => id,
                _ => {
                    let id = LayerId::new();
                    tracing::debug!(old = %rec.id, new = %id, "project layer id replaced");
                    seen.insert(id);
                    id
                }
            };

            let mut layer = Layer::new(id, rec.kind, rec.name.clone(), z, SurfaceId::DETACHED);
            layer.visible = rec.visible;
            layer.locked = rec.locked;
            layer.opacity = rec.opacity.min(100);
            layer.blend_mode = rec.blend_mode;
            layers.push((layer, pixels));
        }
        let active = layers.last().map(|(l, _)| l.id);
        Ok(RegistrySnapshot { layers, active })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/project.rs"]
mod tests;
