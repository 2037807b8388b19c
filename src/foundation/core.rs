use crate::foundation::error::{CanvasError, CanvasResult};

/// Largest accepted surface edge, in pixels.
pub const MAX_SURFACE_DIM: u32 = 16_384;

/// Canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Create validated canvas dimensions (`1..=MAX_SURFACE_DIM` on both edges).
    pub fn new(width: u32, height: u32) -> CanvasResult<Self> {
        check_dims(width, height)?;
        Ok(Self { width, height })
    }

    /// Number of bytes a premultiplied RGBA8 buffer of this size occupies.
    pub fn byte_len(self) -> usize {
        (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(4)
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

/// Straight-alpha RGBA8 color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rgba8(pub [u8; 4]);

impl Rgba8 {
    /// Opaque white.
    pub const WHITE: Self = Self([255, 255, 255, 255]);
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self([0, 0, 0, 0]);

    /// Premultiplied representation of this color.
    pub fn premultiplied(self) -> [u8; 4] {
        let [r, g, b, a] = self.0;
        let a16 = u16::from(a);
        let premul = |c: u8| -> u8 { (((u16::from(c) * a16) + 127) / 255) as u8 };
        [premul(r), premul(g), premul(b), a]
    }
}

pub(crate) fn check_dims(width: u32, height: u32) -> CanvasResult<()> {
    if width == 0 || height == 0 {
        return Err(CanvasError::allocation(format!(
            "surface dimensions must be non-zero (got {width}x{height})"
        )));
    }
    if width > MAX_SURFACE_DIM || height > MAX_SURFACE_DIM {
        return Err(CanvasError::allocation(format!(
            "surface too large: {width}x{height} (max {MAX_SURFACE_DIM}x{MAX_SURFACE_DIM})"
        )));
    }
    Ok(())
}
