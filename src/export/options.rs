use serde::{Deserialize, Serialize};

use crate::foundation::core::{Canvas, Rgba8};
use crate::foundation::error::{CanvasError, CanvasResult};

/// Output encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Lossless raster.
    #[default]
    Png,
    /// Lossy raster; honors [`ExportOptions::quality`].
    Jpeg,
    /// PNG data URI wrapped in a minimal SVG envelope.
    Svg,
    /// Document format; currently written as PNG.
    Pdf,
}

impl ExportFormat {
    /// File extension of the bytes actually produced.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png | Self::Pdf => "png",
            Self::Jpeg => "jpg",
            Self::Svg => "svg",
        }
    }

    /// MIME type of the bytes actually produced.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png | Self::Pdf => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Svg => "image/svg+xml",
        }
    }
}

/// Which layers end up in the output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportType {
    /// Every layer flattened, hidden ones included.
    Composite,
    /// The active layer alone.
    #[serde(alias = "active-layer-only")]
    ActiveLayer,
    /// Visible layers flattened.
    #[default]
    VisibleLayers,
    /// One file per layer.
    #[serde(alias = "all-layers-batch")]
    AllLayers,
}

/// Output pixel size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "preset")]
pub enum Resolution {
    /// Canvas size for flattened output, the layer's own size for single-layer output.
    #[default]
    Original,
    /// 1920×1080.
    Web,
    /// 3508×2480 (A4 landscape at 300 dpi).
    Print,
    Custom { width: u32, height: u32 },
}

impl Resolution {
    pub const WEB: Canvas = Canvas {
        width: 1920,
        height: 1080,
    };
    pub const PRINT: Canvas = Canvas {
        width: 3508,
        height: 2480,
    };

    /// Concrete output size given the size `Original` maps to.
    pub fn resolve(self, original: (u32, u32)) -> (u32, u32) {
        match self {
            Self::Original => original,
            Self::Web => (Self::WEB.width, Self::WEB.height),
            Self::Print => (Self::PRINT.width, Self::PRINT.height),
            Self::Custom { width, height } => (width, height),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportOptions {
    pub format: ExportFormat,
    /// JPEG quality, clamped to 10..=100.
    pub quality: u8,
    pub export_type: ExportType,
    pub resolution: Resolution,
    pub include_background: bool,
    pub transparent_background: bool,
    pub background: Rgba8,
    /// Base name of the produced files, without extension.
    pub file_name: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: ExportFormat::Png,
            quality: 90,
            export_type: ExportType::VisibleLayers,
            resolution: Resolution::Original,
            include_background: true,
            transparent_background: false,
            background: Rgba8::WHITE,
            file_name: "export".to_owned(),
        }
    }
}

impl ExportOptions {
    pub const MIN_QUALITY: u8 = 10;
    pub const MAX_QUALITY: u8 = 100;

    /// Quality actually passed to the lossy encoder.
    pub fn effective_quality(&self) -> u8 {
        self.quality.clamp(Self::MIN_QUALITY, Self::MAX_QUALITY)
    }

    /// Backing fill painted under the layers, if any.
    pub fn backing_fill(&self) -> Option<Rgba8> {
        (self.include_background && !self.transparent_background).then_some(self.background)
    }

    pub fn validate(&self) -> CanvasResult<()> {
        if let Resolution::Custom { width, height } = self.resolution {
            Canvas::new(width, height)
                .map_err(|e| CanvasError::validation(format!("custom resolution: {e}")))?;
        }
        if self.file_name.trim().is_empty() {
            return Err(CanvasError::validation("file name must not be empty"));
        }
        if self.file_name.contains(['/', '\\']) {
            return Err(CanvasError::validation(
                "file name must not contain path separators",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/options.rs"]
mod tests;
