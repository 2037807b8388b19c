use super::*;
use crate::foundation::core::Canvas;

const RED_200X100: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="100"><rect width="200" height="100" fill="#ff0000"/></svg>"##;

fn importer() -> SvgImporter {
    SvgImporter::with_fontdb(Arc::new(usvg::fontdb::Database::new()))
}

fn reg() -> LayerRegistry {
    LayerRegistry::new(Canvas::default())
}

#[test]
fn dimensions_strip_units_and_default() {
    assert_eq!(
        declared_dimensions(r#"<svg width="200px" height='100.4pt'>"#),
        (200, 100)
    );
    assert_eq!(
        declared_dimensions(r#"<svg width="abc" height="abc"></svg>"#),
        (400, 400)
    );
    assert_eq!(declared_dimensions("<svg></svg>"), (400, 400));
    assert_eq!(declared_dimensions(r#"<svg width="0" height="-5">"#), (400, 400));
    assert_eq!(
        declared_dimensions(r#"<svg width="99999" height="12">"#),
        (MAX_SURFACE_DIM, 12)
    );
}

#[test]
fn dimensions_ignore_stroke_width_and_child_elements() {
    let markup = r#"<?xml version="1.0"?><svg stroke-width="9" height="30" width="40"><rect width="1" height="2"/></svg>"#;
    assert_eq!(declared_dimensions(markup), (40, 30));
}

#[test]
fn import_uses_declared_size() {
    let mut reg = reg();
    let mut svg = importer();
    let id = svg
        .import(&mut reg, RED_200X100, Some("logo"), Fallback::Placeholder)
        .unwrap()
        .unwrap();

    let surface = reg.surface(id).unwrap();
    assert_eq!(surface.dimensions(), (200, 100));
    assert_eq!(surface.pixel(100, 50), Some([255, 0, 0, 255]));
    assert_eq!(reg.layer(id).unwrap().kind, LayerKind::Image);
    assert_eq!(reg.active_id(), Some(id));
    assert!(!svg.is_in_flight(RED_200X100));
}

#[test]
fn malformed_markup_creates_no_layer() {
    let mut reg = reg();
    let mut svg = importer();
    for bad in ["<svg><rect></svg>", "definitely not markup <<", ""] {
        let err = svg.import(&mut reg, bad, None, Fallback::Placeholder);
        assert!(matches!(err, Err(CanvasError::Parse(_))), "{bad:?}");
    }
    assert!(reg.is_empty());
    assert_eq!(reg.surface_stats().alloc_surfaces, 0);
}

#[test]
fn unparseable_size_falls_back_to_400() {
    let mut reg = reg();
    let mut svg = importer();
    let markup = r#"<svg xmlns="http://www.w3.org/2000/svg" width="abc" height="abc"></svg>"#;
    let id = svg
        .import(&mut reg, markup, None, Fallback::Placeholder)
        .unwrap()
        .unwrap();

    assert_eq!(reg.len(), 1);
    assert_eq!(reg.surface(id).unwrap().dimensions(), (400, 400));
}

#[test]
fn failed_rasterization_paints_placeholder() {
    let mut reg = reg();
    let mut svg = importer();
    let pending = svg.begin(&mut reg, RED_200X100, None).unwrap().unwrap();
    let layer = pending.layer();
    svg.finish(
        &mut reg,
        pending,
        Err(CanvasError::decode("broken reference")),
        Fallback::Placeholder,
    );
    let surface = reg.surface(layer).unwrap();
    assert_eq!(surface.dimensions(), (200, 100));
    assert_eq!(surface.pixel(0, 0), Some(PLACEHOLDER_BG));
}

#[test]
fn failed_rasterization_without_fallback_leaves_layer_blank() {
    let mut reg = reg();
    let mut svg = importer();
    let pending = svg.begin(&mut reg, RED_200X100, None).unwrap().unwrap();
    let layer = pending.layer();
    let out = svg.finish(
        &mut reg,
        pending,
        Err(CanvasError::decode("broken reference")),
        Fallback::None,
    );
    assert_eq!(out, Some(layer));
    assert!(reg.surface(layer).unwrap().data().iter().all(|&b| b == 0));
}

#[test]
fn identical_import_in_flight_is_dropped() {
    let mut reg = reg();
    let mut svg = importer();
    let pending = svg.begin(&mut reg, RED_200X100, None).unwrap().unwrap();
    assert!(svg.is_in_flight(RED_200X100));

    assert!(svg.begin(&mut reg, RED_200X100, None).unwrap().is_none());
    assert_eq!(reg.len(), 1);

    let raster = pending.rasterize();
    svg.finish(&mut reg, pending, raster, Fallback::Placeholder);
    assert!(!svg.is_in_flight(RED_200X100));

    assert!(svg.begin(&mut reg, RED_200X100, None).unwrap().is_some());
    assert_eq!(reg.len(), 2);
}

#[test]
fn abandoned_import_releases_guard() {
    let mut reg = reg();
    let mut svg = importer();
    let pending = svg.begin(&mut reg, RED_200X100, None).unwrap().unwrap();
    assert!(svg.is_in_flight(RED_200X100));

    drop(pending);
    assert!(!svg.is_in_flight(RED_200X100));

    let again = svg
        .import(&mut reg, RED_200X100, None, Fallback::Placeholder)
        .unwrap();
    assert!(again.is_some());
    assert!(!svg.is_in_flight(RED_200X100));
}

#[test]
fn pixels_follow_layer_resized_before_finish() {
    let mut reg = reg();
    let mut svg = importer();
    let pending = svg.begin(&mut reg, RED_200X100, None).unwrap().unwrap();
    let layer = pending.layer();
    assert!(reg.resize_layer(layer, 50, 25).unwrap());

    let raster = pending.rasterize();
    assert_eq!(svg.finish(&mut reg, pending, raster, Fallback::None), Some(layer));
    let surface = reg.surface(layer).unwrap();
    assert_eq!(surface.dimensions(), (50, 25));
    assert_eq!(surface.pixel(25, 12), Some([255, 0, 0, 255]));
    assert_eq!(surface.pixel(49, 24), Some([255, 0, 0, 255]));
}

#[test]
fn placeholder_follows_layer_resized_before_finish() {
    let mut reg = reg();
    let mut svg = importer();
    let pending = svg.begin(&mut reg, RED_200X100, None).unwrap().unwrap();
    let layer = pending.layer();
    assert!(reg.resize_layer(layer, 30, 30).unwrap());

    let failed = Err(CanvasError::decode("broken image reference"));
    svg.finish(&mut reg, pending, failed, Fallback::Placeholder);
    let surface = reg.surface(layer).unwrap();
    assert_eq!(surface.dimensions(), (30, 30));
    assert_eq!(surface.pixel(0, 0), Some(PLACEHOLDER_BG));
}

#[test]
fn different_imports_may_finish_out_of_order() {
    let mut reg = reg();
    let mut svg = importer();
    let blue = r##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"><rect width="10" height="10" fill="#0000ff"/></svg>"##;

    let first = svg.begin(&mut reg, RED_200X100, None).unwrap().unwrap();
    let second = svg.begin(&mut reg, blue, None).unwrap().unwrap();
    let (first_id, second_id) = (first.layer(), second.layer());

    let r2 = second.rasterize();
    svg.finish(&mut reg, second, r2, Fallback::Placeholder);
    let r1 = first.rasterize();
    svg.finish(&mut reg, first, r1, Fallback::Placeholder);

    assert_eq!(reg.surface(first_id).unwrap().pixel(0, 0), Some([255, 0, 0, 255]));
    assert_eq!(reg.surface(second_id).unwrap().pixel(9, 9), Some([0, 0, 255, 255]));
    reg.check_invariants().unwrap();
}

#[test]
fn finishing_after_layer_deleted_is_discarded() {
    let mut reg = reg();
    reg.create_layer(LayerKind::Drawing, None).unwrap();
    let mut svg = importer();
    let pending = svg.begin(&mut reg, RED_200X100, None).unwrap().unwrap();
    assert!(reg.delete_layer(pending.layer()));

    let raster = pending.rasterize();
    assert_eq!(svg.finish(&mut reg, pending, raster, Fallback::Placeholder), None);
    assert_eq!(reg.len(), 1);
    assert!(!svg.is_in_flight(RED_200X100));
}

#[test]
fn placeholder_label_is_escaped() {
    assert_eq!(escape_xml(r#"<a & "b">"#), "&lt;a &amp; &quot;b&quot;&gt;");
    let surface = placeholder_surface(
        20,
        10,
        "<broken>",
        Arc::new(usvg::fontdb::Database::new()),
    )
    .unwrap();
    assert_eq!(surface.dimensions(), (20, 10));
    assert_eq!(surface.pixel(19, 9), Some(PLACEHOLDER_BG));
}
