use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::composite::compositor::{LayerFilter, composite, composite_into};
use crate::editor::keymap::{EditorAction, KeyChord, Tool, action_for};
use crate::export::exporter::{export, file_safe};
use crate::export::options::ExportOptions;
use crate::export::project::ProjectSnapshot;
use crate::export::sink::{DownloadSink, ExportedFile};
use crate::foundation::core::Canvas;
use crate::foundation::error::{CanvasError, CanvasResult};
use crate::import::handoff::{HandoffPayload, Provenance, SessionStorage, take_handoff};
use crate::import::raster::{import_raster, layer_name_from_file};
use crate::import::remote::{AssetFetcher, ProxyConfig, import_remote};
use crate::import::svg::{PendingSvgImport, SvgImporter, placeholder_surface};
use crate::import::{Fallback, FallbackPolicy};
use crate::layer::history::History;
use crate::layer::model::{LayerId, LayerKind, LayerPatch};
use crate::layer::registry::LayerRegistry;
use crate::surface::buffer::Surface;

/// Options for an [`Editor`] session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorOpts {
    /// Size of default-sized layers and of flattened output.
    pub canvas: Canvas,
    /// Undo depth; `0` disables history.
    pub max_history: usize,
    pub proxy: ProxyConfig,
    pub fallback: FallbackPolicy,
    /// Pause between files of an all-layers export.
    pub batch_delay_ms: u64,
    pub project_name: String,
    /// Load system fonts for SVG `<text>` and placeholder labels.
    pub load_system_fonts: bool,
}

impl Default for EditorOpts {
    fn default() -> Self {
        Self {
            canvas: Canvas::default(),
            max_history: 50,
            proxy: ProxyConfig::default(),
            fallback: FallbackPolicy::default(),
            batch_delay_ms: 100,
            project_name: "Untitled Project".to_owned(),
            load_system_fonts: true,
        }
    }
}

impl EditorOpts {
    /// Parse options from JSON; missing fields take their defaults.
    pub fn from_reader<R: std::io::Read>(r: R) -> CanvasResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| CanvasError::validation(format!("parse editor options JSON: {e}")))
    }

    pub fn from_path(path: impl AsRef<Path>) -> CanvasResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            CanvasError::validation(format!("open editor options '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    pub fn validate(&self) -> CanvasResult<()> {
        Canvas::new(self.canvas.width, self.canvas.height)
            .map_err(|e| CanvasError::validation(format!("canvas: {e}")))?;
        if self.project_name.trim().is_empty() {
            return Err(CanvasError::validation("project name must not be empty"));
        }
        Ok(())
    }
}

/// What [`Editor::apply_action`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionOutcome {
    /// State changed.
    Applied,
    /// Nothing to do (empty history, no active layer, last layer).
    Ignored,
    /// The host should run its export flow.
    ExportRequested,
    /// The host should open its file picker.
    ImportRequested,
}

/// One editing session: the layer registry (and the surfaces it owns), undo history, SVG
/// importer and tool state.
///
/// Every surface is released when the session is torn down or dropped.
#[derive(Debug)]
pub struct Editor {
    registry: LayerRegistry,
    history: History,
    svg: SvgImporter,
    tool: Tool,
    opts: EditorOpts,
    project_name: String,
    created_at: Option<String>,
    provenance: Option<Provenance>,
}

impl Editor {
    pub fn new(opts: EditorOpts) -> CanvasResult<Self> {
        opts.validate()?;
        let svg = if opts.load_system_fonts {
            SvgImporter::new()
        } else {
            SvgImporter::with_fontdb(std::sync::Arc::new(usvg::fontdb::Database::new()))
        };
        Ok(Self {
            registry: LayerRegistry::new(opts.canvas),
            history: History::new(opts.max_history),
            svg,
            tool: Tool::default(),
            project_name: opts.project_name.clone(),
            opts,
            created_at: None,
            provenance: None,
        })
    }

    pub fn opts(&self) -> &EditorOpts {
        &self.opts
    }

    /// Read access to the layer stack.
    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    /// Pixels of a layer, for drawing tools. Edits made here are not recorded in history.
    pub fn surface_mut(&mut self, id: LayerId) -> Option<&mut Surface> {
        self.registry.surface_mut(id)
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn set_project_name(&mut self, name: impl Into<String>) {
        self.project_name = name.into();
    }

    /// Prompts behind the asset handed off from a generation page, if any.
    pub fn provenance(&self) -> Option<&Provenance> {
        self.provenance.as_ref()
    }

    pub fn canvas(&self) -> Canvas {
        self.registry.default_size()
    }

    /// Change the canvas size used for new layers and flattened output. Existing layers keep
    /// their pixels.
    pub fn set_canvas_size(&mut self, width: u32, height: u32) -> CanvasResult<()> {
        let size = Canvas::new(width, height)?;
        self.registry.set_default_size(size);
        Ok(())
    }

    /// Run `op`, recording an undo step when `changed` holds. The pixel snapshot is skipped
    /// when `may_change` already rules out an edit.
    fn record_if<T>(
        &mut self,
        may_change: bool,
        op: impl FnOnce(&mut LayerRegistry) -> T,
        changed: impl FnOnce(&T) -> bool,
    ) -> T {
        if !may_change {
            return op(&mut self.registry);
        }
        let before = self.registry.snapshot();
        let out = op(&mut self.registry);
        if changed(&out) {
            self.history.record(before);
        }
        out
    }

    pub fn create_layer(&mut self, kind: LayerKind, name: Option<&str>) -> Option<LayerId> {
        self.record_if(true, |r| r.create_layer(kind, name), Option::is_some)
    }

    pub fn delete_layer(&mut self, id: LayerId) -> bool {
        let may = self.registry.can_delete(id);
        self.record_if(may, |r| r.delete_layer(id), |&done| done)
    }

    pub fn update_layer(&mut self, id: LayerId, patch: LayerPatch) -> bool {
        let may = self.registry.can_update(id, &patch);
        self.record_if(may, |r| r.update_layer(id, patch), |&done| done)
    }

    pub fn reorder_layers(&mut self, from: usize, to: usize) -> bool {
        let may = self.registry.can_reorder(from, to);
        self.record_if(may, |r| r.reorder_layers(from, to), |&done| done)
    }

    pub fn duplicate_layer(&mut self, id: LayerId) -> Option<LayerId> {
        let may = self.registry.index_of(id).is_some();
        self.record_if(may, |r| r.duplicate_layer(id), Option::is_some)
    }

    pub fn merge_layers(&mut self, ids: &[LayerId]) -> Option<LayerId> {
        let may = self.registry.can_merge(ids);
        self.record_if(may, |r| r.merge_layers(ids), Option::is_some)
    }

    pub fn resize_layer(&mut self, id: LayerId, width: u32, height: u32) -> CanvasResult<bool> {
        let may = self.registry.index_of(id).is_some();
        self.record_if(
            may,
            |r| r.resize_layer(id, width, height),
            |res| matches!(res, Ok(true)),
        )
    }

    /// Selection is not an undoable edit.
    pub fn set_active(&mut self, id: LayerId) -> bool {
        self.registry.set_active(id)
    }

    pub fn undo(&mut self) -> CanvasResult<bool> {
        self.history.undo(&mut self.registry)
    }

    pub fn redo(&mut self) -> CanvasResult<bool> {
        self.history.redo(&mut self.registry)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Flatten visible layers at canvas size.
    pub fn composite(&self) -> CanvasResult<Surface> {
        let Canvas { width, height } = self.canvas();
        composite(&self.registry, width, height, LayerFilter::VisibleOnly)
    }

    /// Flatten visible layers into a caller-owned target of any size.
    pub fn composite_into(&self, target: &mut Surface) -> CanvasResult<()> {
        composite_into(&self.registry, target, LayerFilter::VisibleOnly)
    }

    /// Export per `opts`; returns the number of files delivered.
    pub fn export(&self, opts: &ExportOptions, sink: &mut dyn DownloadSink) -> CanvasResult<usize> {
        export(
            &self.registry,
            opts,
            sink,
            Duration::from_millis(self.opts.batch_delay_ms),
        )
    }

    /// Snapshot the project and deliver it as `<project name>.json`, the name reduced to
    /// file-safe characters.
    pub fn save_project(&mut self, sink: &mut dyn DownloadSink) -> CanvasResult<ProjectSnapshot> {
        let snap = ProjectSnapshot::capture(
            &self.registry,
            &self.project_name,
            self.created_at.as_deref(),
        )?;
        sink.deliver(ExportedFile {
            file_name: format!("{}.json", file_safe(&self.project_name)),
            mime_type: "application/json",
            bytes: snap.to_json_pretty()?.into_bytes(),
        })?;
        self.created_at = Some(snap.metadata.created_at.clone());
        Ok(snap)
    }

    /// Replace the session content with a saved project.
    ///
    /// Every layer image is decoded before the registry is touched; on error the session is
    /// unchanged. History is cleared.
    #[tracing::instrument(skip(self, project), fields(layers = project.layers.len()))]
    pub fn open_project(&mut self, project: &ProjectSnapshot) -> CanvasResult<()> {
        let canvas = project.metadata.canvas_size;
        let canvas = Canvas::new(canvas.width, canvas.height)?;
        let snapshot = project.to_registry_snapshot()?;

        self.history.clear();
        self.registry.set_default_size(canvas);
        self.registry.restore(snapshot)?;
        self.project_name = project.name.clone();
        self.created_at = Some(project.metadata.created_at.clone());
        Ok(())
    }

    /// Decode an uploaded file into a new layer named after it.
    pub fn import_file(&mut self, bytes: &[u8], file_name: &str) -> CanvasResult<LayerId> {
        let name = layer_name_from_file(file_name);
        self.import_image(bytes, Some(&name))
    }

    /// Decode raster bytes into a new layer. Failures are returned unless the raster fallback
    /// paints a placeholder.
    pub fn import_image(&mut self, bytes: &[u8], name: Option<&str>) -> CanvasResult<LayerId> {
        let res = self.record_if(true, |r| import_raster(r, bytes, name), Result::is_ok);
        match res {
            Ok(id) => Ok(id),
            Err(err) => match self.opts.fallback.raster {
                Fallback::Placeholder => self.placeholder_layer(name).ok_or(err),
                Fallback::None => Err(err),
            },
        }
    }

    /// Import SVG markup. `Ok(None)` means an identical import is still pending.
    pub fn import_svg(&mut self, markup: &str, name: Option<&str>) -> CanvasResult<Option<LayerId>> {
        let before = self.registry.snapshot();
        let out = self
            .svg
            .import(&mut self.registry, markup, name, self.opts.fallback.svg)?;
        if out.is_some() {
            self.history.record(before);
        }
        Ok(out)
    }

    /// First half of a split SVG import: parse and allocate the layer.
    ///
    /// Hosts that rasterize off the UI path call [`PendingSvgImport::rasterize`] and then
    /// [`Editor::finish_svg_import`].
    pub fn begin_svg_import(
        &mut self,
        markup: &str,
        name: Option<&str>,
    ) -> CanvasResult<Option<PendingSvgImport>> {
        let before = self.registry.snapshot();
        let pending = self.svg.begin(&mut self.registry, markup, name)?;
        if pending.is_some() {
            self.history.record(before);
        }
        Ok(pending)
    }

    pub fn finish_svg_import(
        &mut self,
        pending: PendingSvgImport,
        rasterized: CanvasResult<Surface>,
    ) -> Option<LayerId> {
        self.svg.finish(
            &mut self.registry,
            pending,
            rasterized,
            self.opts.fallback.svg,
        )
    }

    /// Fetch and decode a remote image. Failures are logged, never returned; the result is
    /// `None` unless a layer was created (possibly a placeholder, per the remote fallback).
    pub fn import_remote(
        &mut self,
        fetcher: &dyn AssetFetcher,
        url: &str,
        name: Option<&str>,
    ) -> Option<LayerId> {
        let proxy = self.opts.proxy.clone();
        let res = self.record_if(
            true,
            |r| import_remote(r, fetcher, &proxy, url, name),
            Result::is_ok,
        );
        match res {
            Ok(id) => Some(id),
            Err(err) => {
                tracing::warn!(%err, %url, "remote image import failed");
                match self.opts.fallback.remote {
                    Fallback::Placeholder => self.placeholder_layer(name),
                    Fallback::None => None,
                }
            }
        }
    }

    fn placeholder_layer(&mut self, name: Option<&str>) -> Option<LayerId> {
        let Canvas { width, height } = self.canvas();
        let label = name.unwrap_or("Image unavailable");
        let surface = placeholder_surface(width, height, label, self.svg.fontdb()).ok()?;
        self.record_if(
            true,
            |r| r.create_layer_from_surface(LayerKind::Image, name, surface),
            Option::is_some,
        )
    }

    /// Consume the one-shot hand-off from a generation page, importing its assets.
    ///
    /// SVG markup is imported first; if it cannot be parsed, `svgFallback` is fetched as a remote
    /// image instead. `imageUrl` is imported as a remote image. Returns the created layers.
    #[tracing::instrument(skip(self, storage, fetcher))]
    pub fn consume_handoff(
        &mut self,
        storage: &mut dyn SessionStorage,
        fetcher: &dyn AssetFetcher,
    ) -> CanvasResult<Vec<LayerId>> {
        let Some(payload) = take_handoff(storage)? else {
            return Ok(Vec::new());
        };
        self.provenance = Some(Provenance::from(&payload));
        Ok(self.import_handoff(&payload, fetcher))
    }

    fn import_handoff(&mut self, payload: &HandoffPayload, fetcher: &dyn AssetFetcher) -> Vec<LayerId> {
        let mut created = Vec::new();

        if let Some(markup) = payload.svg_content.as_deref().filter(|s| !s.trim().is_empty()) {
            match self.import_svg(markup, None) {
                Ok(Some(id)) => created.push(id),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(%err, "handoff svg not imported");
                    if let Some(url) = payload.svg_fallback.as_deref() {
                        created.extend(self.import_remote(fetcher, url, None));
                    }
                }
            }
        }
        if let Some(url) = payload.image_url.as_deref().filter(|s| !s.is_empty()) {
            created.extend(self.import_remote(fetcher, url, None));
        }
        created
    }

    /// Run the command bound to `chord`, if any.
    pub fn handle_key(&mut self, chord: &KeyChord) -> CanvasResult<Option<ActionOutcome>> {
        match action_for(chord) {
            Some(action) => self.apply_action(action).map(Some),
            None => Ok(None),
        }
    }

    pub fn apply_action(&mut self, action: EditorAction) -> CanvasResult<ActionOutcome> {
        let applied = |done: bool| {
            if done {
                ActionOutcome::Applied
            } else {
                ActionOutcome::Ignored
            }
        };
        Ok(match action {
            EditorAction::SelectTool(tool) => {
                self.set_tool(tool);
                ActionOutcome::Applied
            }
            EditorAction::Undo => applied(self.undo()?),
            EditorAction::Redo => applied(self.redo()?),
            EditorAction::Export => ActionOutcome::ExportRequested,
            EditorAction::Import => ActionOutcome::ImportRequested,
            EditorAction::DuplicateLayer => match self.registry.active_id() {
                Some(id) => applied(self.duplicate_layer(id).is_some()),
                None => ActionOutcome::Ignored,
            },
            EditorAction::DeleteLayer => match self.registry.active_id() {
                Some(id) => applied(self.delete_layer(id)),
                None => ActionOutcome::Ignored,
            },
        })
    }

    /// Release every surface and forget all layers and history. Returns how many surfaces were
    /// released.
    pub fn teardown(&mut self) -> usize {
        self.history.clear();
        self.registry.clear()
    }
}

impl Drop for Editor {
    fn drop(&mut self) {
        let released = self.teardown();
        if released > 0 {
            tracing::debug!(released, "editor session closed");
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/editor/session.rs"]
mod tests;
