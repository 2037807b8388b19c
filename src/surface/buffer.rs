use crate::foundation::core::{Canvas, check_dims};
use crate::foundation::error::{CanvasError, CanvasResult};

/// An owned raster pixel buffer: row-major, tightly packed, premultiplied RGBA8.
///
/// A zero-sized surface is the released state; it has no pixels and is never drawn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Surface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Surface {
    /// Allocate a zero-initialized (transparent) surface.
    pub fn new(width: u32, height: u32) -> CanvasResult<Self> {
        check_dims(width, height)?;
        Ok(Self {
            width,
            height,
            data: vec![0u8; Canvas { width, height }.byte_len()],
        })
    }

    /// Wrap existing premultiplied RGBA8 bytes.
    pub fn from_premul_rgba8(width: u32, height: u32, data: Vec<u8>) -> CanvasResult<Self> {
        check_dims(width, height)?;
        let expected = Canvas { width, height }.byte_len();
        if data.len() != expected {
            return Err(CanvasError::validation(format!(
                "surface byte len mismatch: expected {expected}, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)` in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Premultiplied RGBA8 bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable premultiplied RGBA8 bytes.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume the surface, returning its premultiplied RGBA8 bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Premultiplied pixel at `(x, y)`, or `None` outside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    /// Overwrite the pixel at `(x, y)`; out-of-bounds writes are ignored.
    pub fn put_pixel(&mut self, x: u32, y: u32, premul: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        self.data[i..i + 4].copy_from_slice(&premul);
    }

    /// Fill every pixel with a premultiplied color.
    pub fn fill(&mut self, premul: [u8; 4]) {
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&premul);
        }
    }

    /// Reset every pixel to transparent.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Whether this surface has been released (zero dimensions, no pixels).
    pub fn is_released(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Copy pixels from a surface of identical dimensions.
    pub fn copy_from(&mut self, src: &Surface) -> CanvasResult<()> {
        if self.dimensions() != src.dimensions() {
            return Err(CanvasError::validation(format!(
                "copy_from expects equal dimensions ({}x{} vs {}x{})",
                self.width, self.height, src.width, src.height
            )));
        }
        self.data.copy_from_slice(&src.data);
        Ok(())
    }

    /// Resize to `width x height`, keeping the overlapping top-left region.
    pub fn resize_preserving(&mut self, width: u32, height: u32) -> CanvasResult<()> {
        if (width, height) == self.dimensions() {
            return Ok(());
        }
        let mut next = Surface::new(width, height)?;
        let copy_w = self.width.min(width) as usize * 4;
        for y in 0..self.height.min(height) as usize {
            let src = y * self.width as usize * 4;
            let dst = y * width as usize * 4;
            next.data[dst..dst + copy_w].copy_from_slice(&self.data[src..src + copy_w]);
        }
        *self = next;
        Ok(())
    }

    /// Clear pixel content, zero dimensions and free the backing memory.
    pub(crate) fn release(&mut self) {
        self.data = Vec::new();
        self.width = 0;
        self.height = 0;
    }
}
