//! brandcanvas is a headless layered canvas editing engine.
//!
//! A session owns an ordered stack of layers, each bound to exactly one raster surface:
//!
//! - Create, reorder, duplicate, merge and delete layers through a [`LayerRegistry`]
//!   (or an [`Editor`], which adds undo history, imports and keyboard shortcuts)
//! - Flatten the stack with [`composite`] under per-layer opacity and [`BlendMode`]
//! - Import raster files, SVG markup and remote images as new layers
//! - Export PNG/JPEG/SVG files into a [`DownloadSink`] and save/load a [`ProjectSnapshot`]
//!
//! All pixel data is premultiplied RGBA8.
#![forbid(unsafe_code)]

mod foundation;

/// Layer flattening.
pub mod composite;
/// Editing session and keyboard shortcuts.
pub mod editor;
/// Encoders, download sinks and the project snapshot format.
pub mod export;
/// Raster, SVG, remote and hand-off imports.
pub mod import;
/// Layer model, registry and undo history.
pub mod layer;
/// Surfaces and the surface arena.
pub mod surface;

pub use crate::foundation::core::{Canvas, MAX_SURFACE_DIM, Rgba8};
pub use crate::foundation::error::{CanvasError, CanvasResult};

pub use crate::composite::compositor::{LayerFilter, composite, composite_into, scale_surface};
pub use crate::editor::keymap::{EditorAction, Key, KeyChord, Tool, action_for};
pub use crate::editor::session::{ActionOutcome, Editor, EditorOpts};
pub use crate::export::options::{ExportFormat, ExportOptions, ExportType, Resolution};
pub use crate::export::project::{LayerRecord, ProjectMetadata, ProjectSnapshot};
pub use crate::export::sink::{DirSink, DownloadSink, ExportedFile, InMemorySink};
pub use crate::import::handoff::{HandoffPayload, MemorySessionStorage, SessionStorage};
pub use crate::import::remote::{AssetFetcher, ProxyConfig};
#[cfg(feature = "remote-fetch")]
pub use crate::import::remote::HttpFetcher;
pub use crate::import::svg::{PendingSvgImport, SvgImporter};
pub use crate::import::{Fallback, FallbackPolicy};
pub use crate::layer::history::History;
pub use crate::layer::model::{BlendMode, Layer, LayerId, LayerKind, LayerPatch};
pub use crate::layer::registry::{LayerRegistry, MERGED_LAYER_NAME, RegistrySnapshot};
pub use crate::surface::buffer::Surface;
pub use crate::surface::store::{SurfaceId, SurfaceStore, SurfaceStoreStats};
