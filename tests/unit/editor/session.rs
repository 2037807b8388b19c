use std::io::Cursor;

use super::*;
use crate::export::options::ExportType;
use crate::export::sink::InMemorySink;
use crate::import::handoff::{HANDOFF_KEY, MemorySessionStorage};

fn opts() -> EditorOpts {
    EditorOpts {
        canvas: Canvas {
            width: 8,
            height: 6,
        },
        batch_delay_ms: 0,
        load_system_fonts: false,
        ..EditorOpts::default()
    }
}

fn editor() -> Editor {
    Editor::new(opts()).unwrap()
}

fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba([5, 6, 7, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn offline(_: &str) -> anyhow::Result<Vec<u8>> {
    anyhow::bail!("offline")
}

#[test]
fn options_load_from_json_with_defaults() {
    let opts = EditorOpts::from_reader(
        r#"{"canvas":{"width":1024,"height":768},"fallback":{"raster":"placeholder"}}"#.as_bytes(),
    )
    .unwrap();
    assert_eq!(opts.canvas, Canvas { width: 1024, height: 768 });
    assert_eq!(opts.max_history, 50);
    assert_eq!(opts.fallback.raster, Fallback::Placeholder);
    assert_eq!(opts.fallback.svg, Fallback::Placeholder);
    assert_eq!(opts.proxy.proxy_path, "/api/proxy-image");
    assert_eq!(opts.project_name, "Untitled Project");

    assert!(EditorOpts::from_reader("{".as_bytes()).is_err());
    let bad = EditorOpts {
        canvas: Canvas { width: 0, height: 1 },
        ..EditorOpts::default()
    };
    assert!(Editor::new(bad).is_err());
}

#[test]
fn mutations_are_undoable() {
    let mut ed = editor();
    let a = ed.create_layer(LayerKind::Image, None).unwrap();
    let b = ed.create_layer(LayerKind::Drawing, None).unwrap();
    assert!(ed.update_layer(b, LayerPatch::opacity(20)));

    assert!(ed.undo().unwrap());
    assert_eq!(ed.registry().layer(b).unwrap().opacity, 100);
    assert!(ed.undo().unwrap());
    assert!(ed.registry().layer(b).is_none());
    assert!(ed.redo().unwrap());
    assert_eq!(ed.registry().len(), 2);
    assert_eq!(ed.registry().layer(a).unwrap().z_index, 0);
    ed.registry().check_invariants().unwrap();
}

#[test]
fn noops_do_not_record_history() {
    let mut ed = editor();
    let a = ed.create_layer(LayerKind::Image, None).unwrap();
    assert!(ed.undo().unwrap());
    assert!(!ed.can_undo());

    let a2 = ed.create_layer(LayerKind::Image, None).unwrap();
    assert!(!ed.delete_layer(a2));
    assert!(ed.merge_layers(&[a2]).is_none());
    assert!(!ed.update_layer(a, LayerPatch::opacity(5)));
    assert!(!ed.set_active(a));
    assert!(ed.undo().unwrap());
    assert!(!ed.can_undo());
}

#[test]
fn rejected_edits_leave_redo_intact() {
    let mut ed = editor();
    let a = ed.create_layer(LayerKind::Image, None).unwrap();
    let b = ed.create_layer(LayerKind::Image, None).unwrap();
    assert!(ed.undo().unwrap());
    assert!(ed.can_redo());

    let ghost = LayerId::new();
    assert!(!ed.reorder_layers(0, 3));
    assert!(ed.duplicate_layer(ghost).is_none());
    assert!(!ed.resize_layer(ghost, 2, 2).unwrap());
    assert!(!ed.update_layer(ghost, LayerPatch::opacity(5)));
    assert!(ed.merge_layers(&[a, ghost]).is_none());

    assert!(ed.can_redo());
    assert!(ed.redo().unwrap());
    assert_eq!(ed.registry().index_of(b), Some(1));
}

#[test]
fn key_actions_drive_the_session() {
    let mut ed = editor();
    let key = |s: &str| s.parse::<KeyChord>().unwrap();

    assert_eq!(ed.handle_key(&key("b")).unwrap(), Some(ActionOutcome::Applied));
    assert_eq!(ed.tool(), Tool::Brush);
    assert_eq!(
        ed.handle_key(&key("ctrl+d")).unwrap(),
        Some(ActionOutcome::Ignored)
    );

    let a = ed.create_layer(LayerKind::Image, Some("Base")).unwrap();
    assert_eq!(
        ed.handle_key(&key("ctrl+d")).unwrap(),
        Some(ActionOutcome::Applied)
    );
    assert_eq!(ed.registry().active().unwrap().name, "Base Copy");
    assert_eq!(
        ed.handle_key(&key("delete")).unwrap(),
        Some(ActionOutcome::Applied)
    );
    assert_eq!(ed.registry().active_id(), Some(a));
    assert_eq!(
        ed.handle_key(&key("delete")).unwrap(),
        Some(ActionOutcome::Ignored)
    );
    assert_eq!(
        ed.handle_key(&key("ctrl+shift+z")).unwrap(),
        Some(ActionOutcome::Ignored)
    );
    assert_eq!(
        ed.handle_key(&key("ctrl+z")).unwrap(),
        Some(ActionOutcome::Applied)
    );
    assert_eq!(ed.registry().len(), 2);
    assert_eq!(
        ed.handle_key(&key("ctrl+s")).unwrap(),
        Some(ActionOutcome::ExportRequested)
    );
    assert_eq!(
        ed.handle_key(&key("ctrl+o")).unwrap(),
        Some(ActionOutcome::ImportRequested)
    );
    assert_eq!(ed.handle_key(&key("q")).unwrap(), None);
}

#[test]
fn raster_fallback_policy_is_honored() {
    let mut ed = editor();
    assert!(ed.import_image(&[], None).is_err());
    assert!(ed.registry().is_empty());

    let mut ed = Editor::new(EditorOpts {
        fallback: FallbackPolicy::uniform(Fallback::Placeholder),
        ..opts()
    })
    .unwrap();
    let id = ed.import_image(b"junk", Some("broken.png")).unwrap();
    assert_eq!(ed.registry().surface(id).unwrap().dimensions(), (8, 6));
}

#[test]
fn remote_failures_are_swallowed() {
    let mut ed = editor();
    assert_eq!(ed.import_remote(&offline, "https://example.com/x.png", None), None);
    assert!(ed.registry().is_empty());
    assert!(!ed.can_undo());
}

#[test]
fn file_import_names_layer_after_file() {
    let mut ed = editor();
    let id = ed.import_file(&png_bytes(3, 3), "mark.png").unwrap();
    assert_eq!(ed.registry().layer(id).unwrap().name, "mark");
    assert!(ed.can_undo());
}

#[test]
fn handoff_imports_svg_and_keeps_provenance() {
    let mut ed = editor();
    let mut storage = MemorySessionStorage::new();
    let payload = serde_json::json!({
        "svgContent": "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"20\" height=\"10\"><rect width=\"20\" height=\"10\"/></svg>",
        "originalPrompt": "fox logo",
        "refinedPrompt": "minimal fox logo"
    });
    storage.set(HANDOFF_KEY, payload.to_string());

    let created = ed.consume_handoff(&mut storage, &offline).unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(
        ed.registry().surface(created[0]).unwrap().dimensions(),
        (20, 10)
    );
    assert_eq!(
        ed.provenance().unwrap().refined_prompt.as_deref(),
        Some("minimal fox logo")
    );
    assert!(ed.consume_handoff(&mut storage, &offline).unwrap().is_empty());
}

#[test]
fn handoff_falls_back_to_raster_when_svg_is_malformed() {
    let mut ed = editor();
    let png = png_bytes(4, 4);
    let fetched = std::cell::RefCell::new(Vec::new());
    let fetcher = |url: &str| -> anyhow::Result<Vec<u8>> {
        fetched.borrow_mut().push(url.to_owned());
        Ok(png.clone())
    };
    let mut storage = MemorySessionStorage::new();
    storage.set(
        HANDOFF_KEY,
        r#"{"svgContent":"<svg><g></svg>","svgFallback":"https://example.com/fallback.png"}"#
            .to_owned(),
    );

    let created = ed.consume_handoff(&mut storage, &fetcher).unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(fetched.borrow().as_slice(), ["https://example.com/fallback.png"]);
    assert_eq!(ed.registry().surface(created[0]).unwrap().dimensions(), (4, 4));
}

#[test]
fn split_svg_import_finishes_later() {
    let mut ed = editor();
    let markup = r##"<svg xmlns="http://www.w3.org/2000/svg" width="5" height="5"><rect width="5" height="5" fill="#00ff00"/></svg>"##;
    let pending = ed.begin_svg_import(markup, None).unwrap().unwrap();
    assert!(ed.begin_svg_import(markup, None).unwrap().is_none());

    let raster = pending.rasterize();
    let id = ed.finish_svg_import(pending, raster).unwrap();
    assert_eq!(ed.registry().surface(id).unwrap().pixel(2, 2), Some([0, 255, 0, 255]));
}

#[test]
fn save_and_open_project() {
    let mut ed = editor();
    ed.set_project_name("Launch");
    let a = ed.create_layer(LayerKind::Shape, Some("Badge")).unwrap();
    ed.surface_mut(a).unwrap().fill([0, 0, 200, 255]);

    let mut sink = InMemorySink::new();
    let snap = ed.save_project(&mut sink).unwrap();
    assert_eq!(sink.files()[0].file_name, "Launch.json");
    assert_eq!(sink.files()[0].mime_type, "application/json");

    let mut other = editor();
    other.create_layer(LayerKind::Image, None).unwrap();
    let loaded = ProjectSnapshot::from_json(std::str::from_utf8(&sink.files()[0].bytes).unwrap())
        .unwrap();
    other.open_project(&loaded).unwrap();

    assert_eq!(other.project_name(), "Launch");
    assert!(!other.can_undo());
    assert_eq!(other.registry().len(), 1);
    assert_eq!(other.registry().layers()[0].name, "Badge");
    assert_eq!(
        other.registry().surface(a).unwrap().pixel(0, 0),
        Some([0, 0, 200, 255])
    );
    assert_eq!(snap.metadata.canvas_size, other.canvas());
}

#[test]
fn saved_project_file_name_is_file_safe() {
    let mut ed = editor();
    ed.create_layer(LayerKind::Image, None).unwrap();
    ed.set_project_name("../../etc/brand kit");

    let mut sink = InMemorySink::new();
    ed.save_project(&mut sink).unwrap();
    assert_eq!(sink.files()[0].file_name, "______etc_brand_kit.json");
}

#[test]
fn open_project_is_all_or_nothing() {
    let mut ed = editor();
    let keep = ed.create_layer(LayerKind::Image, None).unwrap();
    let mut snap = ProjectSnapshot::capture(ed.registry(), "x", None).unwrap();
    snap.layers[0].image_data = "data:image/png;base64,Zm9v".to_owned();

    assert!(ed.open_project(&snap).is_err());
    assert_eq!(ed.registry().active_id(), Some(keep));
    assert!(ed.can_undo());
}

#[test]
fn export_uses_canvas_size() {
    let mut ed = editor();
    ed.create_layer(LayerKind::Image, None).unwrap();
    ed.set_canvas_size(12, 4).unwrap();
    assert!(ed.set_canvas_size(0, 4).is_err());

    let mut sink = InMemorySink::new();
    let n = ed
        .export(
            &ExportOptions {
                export_type: ExportType::Composite,
                ..ExportOptions::default()
            },
            &mut sink,
        )
        .unwrap();
    assert_eq!(n, 1);
    let out = crate::import::raster::decode_image(&sink.files()[0].bytes).unwrap();
    assert_eq!(out.dimensions(), (12, 4));
    assert_eq!(ed.composite().unwrap().dimensions(), (12, 4));
}

#[test]
fn teardown_releases_everything() {
    let mut ed = editor();
    ed.create_layer(LayerKind::Image, None).unwrap();
    ed.create_layer(LayerKind::Image, None).unwrap();
    assert_eq!(ed.teardown(), 2);
    assert!(ed.registry().is_empty());
    assert_eq!(ed.registry().surface_stats().live_surfaces, 0);
    assert!(!ed.can_undo());
    assert_eq!(ed.teardown(), 0);
}
