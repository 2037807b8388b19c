use std::path::Path;

use anyhow::Context;

use crate::foundation::error::{CanvasError, CanvasResult};
use crate::foundation::math::premultiply_rgba8_in_place;
use crate::layer::model::{LayerId, LayerKind};
use crate::layer::registry::LayerRegistry;
use crate::surface::buffer::Surface;

/// A decoded file ready to become a layer, named after the file.
#[derive(Clone, Debug)]
pub struct ImportedImage {
    /// Decoded pixels at native resolution.
    pub surface: Surface,
    /// File name without its extension.
    pub name: String,
}

/// Decode encoded image bytes (PNG, JPEG, WebP, ...) into a premultiplied surface.
pub fn decode_image(bytes: &[u8]) -> CanvasResult<Surface> {
    if bytes.is_empty() {
        return Err(CanvasError::decode("image data is empty"));
    }
    let dyn_img = image::load_from_memory(bytes)
        .context("decode image from memory")
        .map_err(|e| CanvasError::decode(format!("{e:#}")))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);
    Surface::from_premul_rgba8(width, height, rgba8_premul)
}

/// Decode `bytes` and return the surface together with a name derived from `file_name`.
pub fn import_image_as_layer(bytes: &[u8], file_name: &str) -> CanvasResult<ImportedImage> {
    let surface = decode_image(bytes)?;
    Ok(ImportedImage {
        surface,
        name: layer_name_from_file(file_name),
    })
}

/// Decode `bytes` into a new image layer sized to the bitmap.
///
/// Decoding happens before the registry is touched, so a failure leaves it unchanged.
#[tracing::instrument(skip(registry, bytes), fields(len = bytes.len()))]
pub fn import_raster(
    registry: &mut LayerRegistry,
    bytes: &[u8],
    name: Option<&str>,
) -> CanvasResult<LayerId> {
    let surface = decode_image(bytes).inspect_err(|err| {
        tracing::warn!(%err, "raster import failed");
    })?;
    registry
        .create_layer_from_surface(LayerKind::Image, name, surface)
        .ok_or_else(|| CanvasError::allocation("no surface available for imported image"))
}

/// `"logo.final.png"` becomes `"logo.final"`; names without a stem fall back to `"Image"`.
pub fn layer_name_from_file(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("Image")
        .to_owned()
}

#[cfg(test)]
#[path = "../../tests/unit/import/raster.rs"]
mod tests;
