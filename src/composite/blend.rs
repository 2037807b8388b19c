use crate::foundation::error::{CanvasError, CanvasResult};
use crate::foundation::math::{add_sat_u8, mul_div255_u8};
use crate::layer::model::BlendMode;

/// Composite `src` over `dst` (both premultiplied RGBA8, equal length) with `opacity` and `blend`.
pub(crate) fn composite_over_rgba8_premul(
    dst: &mut [u8],
    src: &[u8],
    opacity: f32,
    blend: BlendMode,
) -> CanvasResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(CanvasError::validation(
            "composite_over_rgba8_premul expects equal-length rgba8 buffers",
        ));
    }

    // Dispatch once per span, never per pixel.
    match blend {
        BlendMode::Normal => {
            premul_over_in_place_opacity(dst, src, opacity);
        }
        BlendMode::Multiply => composite_over_rgba8_premul_blend(dst, src, opacity, |s, d| s * d),
        BlendMode::Screen => {
            composite_over_rgba8_premul_blend(dst, src, opacity, |s, d| s + d - s * d)
        }
        BlendMode::Overlay => composite_over_rgba8_premul_blend(dst, src, opacity, |s, d| {
            if d <= 0.5 {
                2.0 * s * d
            } else {
                1.0 - 2.0 * (1.0 - s) * (1.0 - d)
            }
        }),
        BlendMode::SoftLight => composite_over_rgba8_premul_blend(dst, src, opacity, |s, d| {
            if s <= 0.5 {
                d - (1.0 - 2.0 * s) * d * (1.0 - d)
            } else {
                let g = if d <= 0.25 {
                    ((16.0 * d - 12.0) * d + 4.0) * d
                } else {
                    d.sqrt()
                };
                d + (2.0 * s - 1.0) * (g - d)
            }
        }),
    }
    Ok(())
}

fn premul_over_in_place_opacity(dst: &mut [u8], src: &[u8], opacity: f32) {
    let op = ((opacity.clamp(0.0, 1.0) * 255.0).round() as i32).clamp(0, 255) as u16;
    if op == 0 {
        return;
    }

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let sa = mul_div255_u8(u16::from(s[3]), op);
        if sa == 0 {
            continue;
        }
        let inv = 255u16 - u16::from(sa);

        d[3] = add_sat_u8(sa, mul_div255_u8(u16::from(d[3]), inv));
        for c in 0..3 {
            let sc = mul_div255_u8(u16::from(s[c]), op);
            let dc = mul_div255_u8(u16::from(d[c]), inv);
            d[c] = add_sat_u8(sc, dc);
        }
    }
}

#[inline(always)]
fn composite_over_rgba8_premul_blend<F>(dst: &mut [u8], src: &[u8], opacity: f32, blend_fn: F)
where
    F: Fn(f32, f32) -> f32,
{
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 {
        return;
    }

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        if s[3] == 0 {
            continue;
        }
        // Porter-Duff source-over with the blend applied to unpremultiplied channels:
        // out_a = sa + da * (1 - sa)
        // out_p = sp * (1 - da) + dp * (1 - sa) + B(sc, dc) * sa * da
        let sa = (f32::from(s[3]) / 255.0) * opacity;
        let da = f32::from(d[3]) / 255.0;
        let out_a = (sa + da * (1.0 - sa)).clamp(0.0, 1.0);

        for c in 0..3 {
            let sp = (f32::from(s[c]) / 255.0) * opacity;
            let dp = f32::from(d[c]) / 255.0;
            let sc = if sa > 0.0 { (sp / sa).clamp(0.0, 1.0) } else { 0.0 };
            let dc = if da > 0.0 { (dp / da).clamp(0.0, 1.0) } else { 0.0 };
            let b = blend_fn(sc, dc).clamp(0.0, 1.0);
            let out_p = (sp * (1.0 - da) + dp * (1.0 - sa) + b * sa * da).clamp(0.0, 1.0);
            d[c] = (out_p * 255.0).round() as u8;
        }
        d[3] = (out_a * 255.0).round() as u8;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/composite/blend.rs"]
mod tests;
