use std::io::Cursor;

use anyhow::Context;
use base64ct::{Base64, Encoding};

use crate::export::options::ExportFormat;
use crate::foundation::error::{CanvasError, CanvasResult};
use crate::foundation::math::unpremultiply_rgba8_in_place;
use crate::surface::buffer::Surface;

/// Encode a premultiplied surface in `format`. `quality` only affects JPEG.
pub fn encode_surface(surface: &Surface, format: ExportFormat, quality: u8) -> CanvasResult<Vec<u8>> {
    match format {
        ExportFormat::Png => encode_png(surface),
        ExportFormat::Jpeg => encode_jpeg(surface, quality),
        ExportFormat::Svg => Ok(svg_wrapper(surface)?.into_bytes()),
        ExportFormat::Pdf => {
            tracing::warn!("document export is not supported; writing png instead");
            encode_png(surface)
        }
    }
}

/// Straight-alpha RGBA8 copy of the surface pixels.
pub fn to_straight_rgba8(surface: &Surface) -> Vec<u8> {
    let mut rgba = surface.data().to_vec();
    unpremultiply_rgba8_in_place(&mut rgba);
    rgba
}

pub fn encode_png(surface: &Surface) -> CanvasResult<Vec<u8>> {
    let (width, height) = surface.dimensions();
    let img = image::RgbaImage::from_raw(width, height, to_straight_rgba8(surface))
        .ok_or_else(|| CanvasError::encode("surface buffer does not match its dimensions"))?;
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .context("encode png")
        .map_err(|e| CanvasError::encode(format!("{e:#}")))?;
    Ok(buf)
}

/// JPEG has no alpha channel; translucent pixels are flattened over white first.
pub fn encode_jpeg(surface: &Surface, quality: u8) -> CanvasResult<Vec<u8>> {
    let (width, height) = surface.dimensions();
    let rgb: Vec<u8> = surface
        .data()
        .chunks_exact(4)
        .flat_map(|px| {
            let under = 255 - px[3];
            [
                px[0].saturating_add(under),
                px[1].saturating_add(under),
                px[2].saturating_add(under),
            ]
        })
        .collect();

    let mut buf = Vec::new();
    let quality = quality.clamp(1, 100);
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality)
        .encode(&rgb, width, height, image::ExtendedColorType::Rgb8)
        .context("encode jpeg")
        .map_err(|e| CanvasError::encode(format!("{e:#}")))?;
    Ok(buf)
}

/// `data:image/png;base64,...` of the surface.
pub fn png_data_uri(surface: &Surface) -> CanvasResult<String> {
    let png = encode_png(surface)?;
    Ok(format!("data:image/png;base64,{}", Base64::encode_string(&png)))
}

/// Minimal SVG document embedding the surface as a PNG data URI.
pub fn svg_wrapper(surface: &Surface) -> CanvasResult<String> {
    let (width, height) = surface.dimensions();
    let uri = png_data_uri(surface)?;
    Ok(format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" "#,
            r#"width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            r#"<image width="{w}" height="{h}" href="{uri}" xlink:href="{uri}"/></svg>"#
        ),
        w = width,
        h = height,
        uri = uri
    ))
}

#[cfg(test)]
#[path = "../../tests/unit/export/encode.rs"]
mod tests;
