use std::time::Duration;

use crate::composite::compositor::{LayerFilter, Placement, composite, draw_surface, scale_surface};
use crate::export::encode::encode_surface;
use crate::export::options::{ExportOptions, ExportType};
use crate::export::sink::{DownloadSink, ExportedFile};
use crate::foundation::error::{CanvasError, CanvasResult};
use crate::layer::model::{BlendMode, Layer};
use crate::layer::registry::LayerRegistry;
use crate::surface::buffer::Surface;

/// Encode the registry per `opts` and hand the files to `sink`.
///
/// Returns how many files were delivered; `0` means there was nothing to export (e.g. an
/// active-layer export with no active layer). Batch exports pause `batch_delay` between files.
#[tracing::instrument(
    skip(registry, opts, sink),
    fields(export_type = ?opts.export_type, format = ?opts.format)
)]
pub fn export(
    registry: &LayerRegistry,
    opts: &ExportOptions,
    sink: &mut dyn DownloadSink,
    batch_delay: Duration,
) -> CanvasResult<usize> {
    opts.validate()?;

    match opts.export_type {
        ExportType::Composite | ExportType::VisibleLayers => {
            let filter = if opts.export_type == ExportType::Composite {
                LayerFilter::All
            } else {
                LayerFilter::VisibleOnly
            };
            let canvas = registry.default_size();
            let (w, h) = opts.resolution.resolve((canvas.width, canvas.height));
            let flat = composite(registry, w, h, filter)?;
            deliver(sink, opts, &opts.file_name, flat)?;
            Ok(1)
        }
        ExportType::ActiveLayer => {
            let Some(layer) = registry.active() else {
                tracing::debug!("active-layer export skipped: no active layer");
                return Ok(0);
            };
            let surface = layer_output(registry, layer, opts)?;
            deliver(sink, opts, &opts.file_name, surface)?;
            Ok(1)
        }
        ExportType::AllLayers => {
            let mut delivered = 0;
            for (i, layer) in registry.layers().iter().enumerate() {
                if i > 0 && !batch_delay.is_zero() {
                    std::thread::sleep(batch_delay);
                }
                let surface = layer_output(registry, layer, opts)?;
                let name = format!("{}_{}_{}", opts.file_name, i + 1, file_safe(&layer.name));
                deliver(sink, opts, &name, surface)?;
                delivered += 1;
            }
            Ok(delivered)
        }
    }
}

fn layer_output(
    registry: &LayerRegistry,
    layer: &Layer,
    opts: &ExportOptions,
) -> CanvasResult<Surface> {
    let src = registry.surface(layer.id).ok_or_else(|| {
        CanvasError::validation(format!("layer {} has no live surface", layer.id))
    })?;
    let (w, h) = opts.resolution.resolve(src.dimensions());
    scale_surface(src, w, h)
}

fn deliver(
    sink: &mut dyn DownloadSink,
    opts: &ExportOptions,
    stem: &str,
    surface: Surface,
) -> CanvasResult<()> {
    let surface = with_backing(surface, opts)?;
    let bytes = encode_surface(&surface, opts.format, opts.effective_quality())?;
    sink.deliver(ExportedFile {
        file_name: format!("{stem}.{}", opts.format.extension()),
        mime_type: opts.format.mime_type(),
        bytes,
    })
}

fn with_backing(surface: Surface, opts: &ExportOptions) -> CanvasResult<Surface> {
    let Some(fill) = opts.backing_fill() else {
        return Ok(surface);
    };
    let mut backed = Surface::new(surface.width(), surface.height())?;
    backed.fill(fill.premultiplied());
    draw_surface(&mut backed, &surface, 1.0, BlendMode::Normal, Placement::Origin)?;
    Ok(backed)
}

/// Reduce `name` to characters that are safe in a file name.
pub(crate) fn file_safe(name: &str) -> String {
    let s: String = name
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if s.is_empty() { "layer".to_owned() } else { s }
}

#[cfg(test)]
#[path = "../../tests/unit/export/exporter.rs"]
mod tests;
