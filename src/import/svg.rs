use std::collections::HashSet;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use regex::Regex;

use crate::foundation::core::MAX_SURFACE_DIM;
use crate::foundation::error::{CanvasError, CanvasResult};
use crate::composite::compositor::scale_surface;
use crate::import::Fallback;
use crate::layer::model::{LayerId, LayerKind};
use crate::layer::registry::LayerRegistry;
use crate::surface::buffer::Surface;

/// Edge length used when the root element declares no usable `width`/`height`.
pub const DEFAULT_SVG_DIM: u32 = 400;

const PLACEHOLDER_BG: [u8; 4] = [243, 244, 246, 255];

static SVG_ROOT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<svg\b[^>]*>").expect("static regex"));
static WIDTH_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|\s)width\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("static regex")
});
static HEIGHT_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|\s)height\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("static regex")
});
static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([0-9]*\.?[0-9]+)").expect("static regex"));

/// SVG markup that passed the XML parser.
///
/// The usvg tree may still be unusable (e.g. no resolvable size); that surfaces later as a
/// rasterization failure rather than a parse failure.
#[derive(Clone)]
pub struct ParsedSvg {
    /// Raster width taken from the root `width` attribute.
    pub width: u32,
    /// Raster height taken from the root `height` attribute.
    pub height: u32,
    tree: Result<Arc<usvg::Tree>, String>,
}

impl std::fmt::Debug for ParsedSvg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedSvg")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("renderable", &self.tree.is_ok())
            .finish()
    }
}

/// Parse SVG markup. Malformed XML is a [`CanvasError::Parse`].
pub fn parse_svg(markup: &str, fontdb: Arc<usvg::fontdb::Database>) -> CanvasResult<ParsedSvg> {
    let opts = usvg::Options {
        fontdb,
        ..Default::default()
    };
    let tree = match usvg::Tree::from_str(markup, &opts) {
        Ok(tree) => Ok(Arc::new(tree)),
        Err(usvg::Error::ParsingFailed(e)) => {
            return Err(CanvasError::parse(format!("svg markup: {e}")));
        }
        Err(e) => Err(e.to_string()),
    };
    let (width, height) = declared_dimensions(markup);
    Ok(ParsedSvg {
        width,
        height,
        tree,
    })
}

/// `width`/`height` of the root `<svg>` element with unit suffixes stripped.
///
/// Missing, non-numeric or non-positive values fall back to [`DEFAULT_SVG_DIM`]; values beyond
/// the surface limit are clamped to it.
pub fn declared_dimensions(markup: &str) -> (u32, u32) {
    let Some(root) = SVG_ROOT_TAG.find(markup) else {
        return (DEFAULT_SVG_DIM, DEFAULT_SVG_DIM);
    };
    let tag = root.as_str();
    (
        attr_px(&WIDTH_ATTR, tag).unwrap_or(DEFAULT_SVG_DIM),
        attr_px(&HEIGHT_ATTR, tag).unwrap_or(DEFAULT_SVG_DIM),
    )
}

fn attr_px(attr: &Regex, tag: &str) -> Option<u32> {
    let caps = attr.captures(tag)?;
    let raw = caps.get(1).or_else(|| caps.get(2))?.as_str();
    let num = LEADING_NUMBER.captures(raw)?.get(1)?.as_str();
    let v: f64 = num.parse().ok()?;
    if !v.is_finite() || v < 1.0 {
        return None;
    }
    Some((v.round() as u32).min(MAX_SURFACE_DIM))
}

/// Rasterize a parsed SVG at its declared dimensions into a premultiplied surface.
pub fn rasterize_svg(svg: &ParsedSvg) -> CanvasResult<Surface> {
    let tree = svg
        .tree
        .as_ref()
        .map_err(|e| CanvasError::decode(format!("svg cannot be rendered: {e}")))?;
    rasterize_tree(tree, svg.width, svg.height)
}

fn rasterize_tree(tree: &usvg::Tree, width: u32, height: u32) -> CanvasResult<Surface> {
    let size = tree.size();
    if !(size.width() > 0.0 && size.height() > 0.0) {
        return Err(CanvasError::decode("svg has invalid width/height"));
    }
    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| CanvasError::allocation("failed to allocate svg pixmap"))?;

    let sx = (width as f32) / size.width();
    let sy = (height as f32) / size.height();
    let xform = resvg::tiny_skia::Transform::from_scale(sx, sy);

    resvg::render(tree, xform, &mut pixmap.as_mut());
    Surface::from_premul_rgba8(width, height, pixmap.take())
}

/// Solid background with a centered label; shown when an import could not be rendered.
pub fn placeholder_surface(
    width: u32,
    height: u32,
    label: &str,
    fontdb: Arc<usvg::fontdb::Database>,
) -> CanvasResult<Surface> {
    let mut surface = Surface::new(width, height)?;
    surface.fill(PLACEHOLDER_BG);

    let font_size = (width.min(height) as f32 / 10.0).clamp(10.0, 48.0);
    let markup = format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}"><rect width="100%" height="100%" fill="#f3f4f6"/><text x="50%" y="50%" text-anchor="middle" dominant-baseline="middle" font-family="sans-serif" font-size="{font_size}" fill="#6b7280">{}</text></svg>"##,
        escape_xml(label)
    );
    let opts = usvg::Options {
        fontdb,
        ..Default::default()
    };
    match usvg::Tree::from_str(&markup, &opts)
        .map_err(|e| CanvasError::decode(e.to_string()))
        .and_then(|tree| rasterize_tree(&tree, width, height))
    {
        Ok(rendered) => Ok(rendered),
        Err(err) => {
            tracing::debug!(%err, "placeholder label not rendered; using plain background");
            Ok(surface)
        }
    }
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

type InFlight = Arc<Mutex<HashSet<u64>>>;

/// Membership of one content key in the in-flight set; leaving it is tied to drop.
#[derive(Debug)]
struct InFlightGuard {
    key: u64,
    set: InFlight,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

/// An SVG import whose layer exists but whose pixels have not been delivered yet.
///
/// Produced by [`SvgImporter::begin`]; rasterize with [`PendingSvgImport::rasterize`] (which
/// needs no registry access) and hand the result to [`SvgImporter::finish`]. Dropping it
/// unfinished abandons the import and lets identical markup be imported again.
#[derive(Debug)]
#[must_use = "a pending import holds the re-entrancy guard until finished or dropped"]
pub struct PendingSvgImport {
    guard: InFlightGuard,
    layer: LayerId,
    svg: ParsedSvg,
}

impl PendingSvgImport {
    /// Layer that will receive the pixels.
    pub fn layer(&self) -> LayerId {
        self.layer
    }

    /// Declared raster dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.svg.width, self.svg.height)
    }

    /// Rasterize the markup.
    pub fn rasterize(&self) -> CanvasResult<Surface> {
        rasterize_svg(&self.svg)
    }
}

/// SVG import adapter with a per-content re-entrancy guard.
///
/// While an import of some markup is pending, a second request for identical markup is dropped
/// (not queued). Different markup may be imported concurrently and finish in any order.
#[derive(Debug)]
pub struct SvgImporter {
    fontdb: Arc<usvg::fontdb::Database>,
    in_flight: InFlight,
}

impl SvgImporter {
    /// Importer with system fonts loaded (needed for `<text>` and placeholder labels).
    pub fn new() -> Self {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        Self::with_fontdb(Arc::new(db))
    }

    /// Importer sharing an existing font database.
    pub fn with_fontdb(fontdb: Arc<usvg::fontdb::Database>) -> Self {
        Self {
            fontdb,
            in_flight: InFlight::default(),
        }
    }

    /// Font database used for parsing and placeholders.
    pub fn fontdb(&self) -> Arc<usvg::fontdb::Database> {
        Arc::clone(&self.fontdb)
    }

    /// Whether an import of exactly this markup is pending.
    pub fn is_in_flight(&self, markup: &str) -> bool {
        self.in_flight_keys().contains(&content_key(markup))
    }

    fn in_flight_keys(&self) -> std::sync::MutexGuard<'_, HashSet<u64>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Parse the markup and allocate its layer.
    ///
    /// Returns `Ok(None)` when identical markup is already pending. Parse errors abort before
    /// any layer exists.
    #[tracing::instrument(skip(self, registry, markup), fields(len = markup.len()))]
    pub fn begin(
        &mut self,
        registry: &mut LayerRegistry,
        markup: &str,
        name: Option<&str>,
    ) -> CanvasResult<Option<PendingSvgImport>> {
        let key = content_key(markup);
        if self.in_flight_keys().contains(&key) {
            tracing::debug!("svg import dropped: identical import in flight");
            return Ok(None);
        }

        let svg = parse_svg(markup, self.fontdb()).inspect_err(|err| {
            tracing::warn!(%err, "svg import aborted");
        })?;

        let layer = registry
            .create_layer_sized(LayerKind::Image, name, svg.width, svg.height)
            .ok_or_else(|| CanvasError::allocation("no surface available for svg import"))?;

        self.in_flight_keys().insert(key);
        let guard = InFlightGuard {
            key,
            set: Arc::clone(&self.in_flight),
        };
        Ok(Some(PendingSvgImport { guard, layer, svg }))
    }

    /// Deliver rasterized pixels (or the rasterization failure) for a pending import.
    ///
    /// On failure the layer gets a placeholder when `fallback` asks for one and stays blank
    /// otherwise. Pixels are resampled when the layer was resized in between. If the layer was
    /// deleted meanwhile the result is discarded. Always releases the re-entrancy guard.
    pub fn finish(
        &mut self,
        registry: &mut LayerRegistry,
        pending: PendingSvgImport,
        rasterized: CanvasResult<Surface>,
        fallback: Fallback,
    ) -> Option<LayerId> {
        let PendingSvgImport { guard, layer, svg } = pending;
        drop(guard);

        let pixels = match rasterized {
            Ok(pixels) => Some(pixels),
            Err(err) => {
                tracing::warn!(%err, %layer, "svg rasterization failed");
                match fallback {
                    Fallback::Placeholder => {
                        let label = registry
                            .layer(layer)
                            .map_or_else(|| "SVG".to_owned(), |l| l.name.clone());
                        placeholder_surface(svg.width, svg.height, &label, self.fontdb()).ok()
                    }
                    Fallback::None => None,
                }
            }
        };

        let Some(target) = registry.surface_mut(layer) else {
            tracing::debug!(%layer, "svg import finished after its layer was removed");
            return None;
        };
        let Some(pixels) = pixels else {
            return Some(layer);
        };
        let (w, h) = target.dimensions();
        if let Err(err) = scale_surface(&pixels, w, h).and_then(|scaled| target.copy_from(&scaled))
        {
            tracing::warn!(%err, %layer, "svg pixels could not be delivered");
        }
        Some(layer)
    }

    /// Parse, rasterize and deliver in one step.
    ///
    /// `Ok(None)` means the request was dropped by the re-entrancy guard.
    pub fn import(
        &mut self,
        registry: &mut LayerRegistry,
        markup: &str,
        name: Option<&str>,
        fallback: Fallback,
    ) -> CanvasResult<Option<LayerId>> {
        let Some(pending) = self.begin(registry, markup, name)? else {
            return Ok(None);
        };
        let rasterized = pending.rasterize();
        Ok(self.finish(registry, pending, rasterized, fallback))
    }
}

impl Default for SvgImporter {
    fn default() -> Self {
        Self::new()
    }
}

fn content_key(markup: &str) -> u64 {
    xxhash_rust::xxh3::xxh3_64(markup.as_bytes())
}

#[cfg(test)]
#[path = "../../tests/unit/import/svg.rs"]
mod tests;
