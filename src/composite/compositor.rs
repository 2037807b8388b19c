use image::imageops::FilterType;

use crate::composite::blend::composite_over_rgba8_premul;
use crate::foundation::error::{CanvasError, CanvasResult};
use crate::layer::model::{BlendMode, Layer};
use crate::layer::registry::LayerRegistry;
use crate::surface::buffer::Surface;

/// Which layers take part in a flatten.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LayerFilter {
    /// Only layers with `visible == true`.
    #[default]
    VisibleOnly,
    /// Every layer, hidden ones included.
    All,
}

impl LayerFilter {
    fn admits(self, layer: &Layer) -> bool {
        match self {
            LayerFilter::VisibleOnly => layer.visible,
            LayerFilter::All => true,
        }
    }
}

/// How a source surface is mapped onto a differently-sized destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Placement {
    /// Resample the source to the destination's dimensions.
    Stretch,
    /// Draw at native resolution anchored at the origin, clipped to the destination.
    Origin,
}

/// Flatten the registry's layers into `target`.
///
/// The target is cleared first; admitted layers are drawn in ascending `z_index`, each with its
/// own opacity and blend mode, resampled to the target's size where they differ. The registry
/// is only read. Identical registry state always yields identical pixels.
#[tracing::instrument(skip(registry, target), fields(w = target.width(), h = target.height()))]
pub fn composite_into(
    registry: &LayerRegistry,
    target: &mut Surface,
    filter: LayerFilter,
) -> CanvasResult<()> {
    target.clear();

    let mut stack: Vec<&Layer> = registry
        .layers()
        .iter()
        .filter(|l| filter.admits(l))
        .collect();
    stack.sort_by_key(|l| l.z_index);

    for layer in stack {
        let Some(src) = registry.surface(layer.id) else {
            return Err(CanvasError::validation(format!(
                "layer {} has no live surface",
                layer.id
            )));
        };
        draw_surface(
            target,
            src,
            layer.alpha(),
            layer.blend_mode,
            Placement::Stretch,
        )?;
    }
    Ok(())
}

/// Allocate a `width x height` surface and flatten the registry into it.
pub fn composite(
    registry: &LayerRegistry,
    width: u32,
    height: u32,
    filter: LayerFilter,
) -> CanvasResult<Surface> {
    let mut target = Surface::new(width, height)?;
    composite_into(registry, &mut target, filter)?;
    Ok(target)
}

/// Draw one surface onto another.
pub(crate) fn draw_surface(
    dst: &mut Surface,
    src: &Surface,
    opacity: f32,
    blend: BlendMode,
    placement: Placement,
) -> CanvasResult<()> {
    if src.is_released() || dst.is_released() {
        return Ok(());
    }

    if src.dimensions() == dst.dimensions() {
        return composite_over_rgba8_premul(dst.data_mut(), src.data(), opacity, blend);
    }

    match placement {
        Placement::Stretch => {
            let scaled = scale_surface(src, dst.width(), dst.height())?;
            composite_over_rgba8_premul(dst.data_mut(), scaled.data(), opacity, blend)
        }
        Placement::Origin => {
            let row_bytes = src.width().min(dst.width()) as usize * 4;
            let src_stride = src.width() as usize * 4;
            let dst_stride = dst.width() as usize * 4;
            for y in 0..src.height().min(dst.height()) as usize {
                let s = &src.data()[y * src_stride..y * src_stride + row_bytes];
                let d = &mut dst.data_mut()[y * dst_stride..y * dst_stride + row_bytes];
                composite_over_rgba8_premul(d, s, opacity, blend)?;
            }
            Ok(())
        }
    }
}

/// Resample a surface to `width x height` with a bilinear filter.
///
/// Premultiplied data is interpolated directly, which keeps edges free of color fringes.
pub fn scale_surface(src: &Surface, width: u32, height: u32) -> CanvasResult<Surface> {
    if src.dimensions() == (width, height) {
        return Ok(src.clone());
    }
    let img: image::RgbaImage =
        image::ImageBuffer::from_raw(src.width(), src.height(), src.data().to_vec())
            .ok_or_else(|| CanvasError::validation("surface buffer does not match its size"))?;
    let out = image::imageops::resize(&img, width, height, FilterType::Triangle);
    Surface::from_premul_rgba8(width, height, out.into_raw())
}

#[cfg(test)]
#[path = "../../tests/unit/composite/compositor.rs"]
mod tests;
