use super::*;
use crate::export::options::{ExportFormat, Resolution};
use crate::export::sink::InMemorySink;
use crate::foundation::core::Canvas;
use crate::import::raster::decode_image;
use crate::layer::model::{LayerKind, LayerPatch};

fn reg() -> LayerRegistry {
    LayerRegistry::new(Canvas {
        width: 4,
        height: 4,
    })
}

fn transparent_png() -> ExportOptions {
    ExportOptions {
        transparent_background: true,
        ..ExportOptions::default()
    }
}

#[test]
fn active_layer_export_without_active_layer_is_noop() {
    let reg = reg();
    let mut sink = InMemorySink::new();
    let opts = ExportOptions {
        export_type: ExportType::ActiveLayer,
        ..ExportOptions::default()
    };
    assert_eq!(export(&reg, &opts, &mut sink, Duration::ZERO).unwrap(), 0);
    assert!(sink.files().is_empty());
}

#[test]
fn composite_includes_hidden_layers_visible_does_not() {
    let mut reg = reg();
    let a = reg.create_layer(LayerKind::Image, None).unwrap();
    reg.surface_mut(a).unwrap().fill([0, 0, 255, 255]);
    reg.update_layer(a, LayerPatch::visible(false));

    let mut sink = InMemorySink::new();
    let visible = transparent_png();
    let composite_all = ExportOptions {
        export_type: ExportType::Composite,
        ..transparent_png()
    };
    export(&reg, &visible, &mut sink, Duration::ZERO).unwrap();
    export(&reg, &composite_all, &mut sink, Duration::ZERO).unwrap();

    let vis = decode_image(&sink.files()[0].bytes).unwrap();
    let all = decode_image(&sink.files()[1].bytes).unwrap();
    assert_eq!(vis.pixel(0, 0), Some([0, 0, 0, 0]));
    assert_eq!(all.pixel(0, 0), Some([0, 0, 255, 255]));
}

#[test]
fn composite_and_visible_agree_when_all_layers_visible() {
    let mut reg = reg();
    let a = reg.create_layer(LayerKind::Image, None).unwrap();
    let b = reg.create_layer(LayerKind::Drawing, None).unwrap();
    reg.surface_mut(a).unwrap().fill([200, 10, 10, 255]);
    reg.surface_mut(b).unwrap().fill([0, 60, 0, 128]);
    reg.update_layer(b, LayerPatch::blend_mode(BlendMode::Screen));

    let mut sink = InMemorySink::new();
    for export_type in [ExportType::Composite, ExportType::VisibleLayers] {
        let opts = ExportOptions {
            export_type,
            ..ExportOptions::default()
        };
        export(&reg, &opts, &mut sink, Duration::ZERO).unwrap();
    }
    assert_eq!(sink.files()[0].bytes, sink.files()[1].bytes);
}

#[test]
fn background_is_painted_under_layers() {
    let mut reg = reg();
    reg.create_layer(LayerKind::Drawing, None).unwrap();
    let mut sink = InMemorySink::new();
    export(&reg, &ExportOptions::default(), &mut sink, Duration::ZERO).unwrap();

    let out = decode_image(&sink.files()[0].bytes).unwrap();
    assert_eq!(out.pixel(3, 3), Some([255, 255, 255, 255]));
}

#[test]
fn resolution_presets_size_the_output() {
    let mut reg = reg();
    reg.create_layer(LayerKind::Image, None).unwrap();
    let mut sink = InMemorySink::new();
    let opts = ExportOptions {
        resolution: Resolution::Custom {
            width: 10,
            height: 6,
        },
        ..ExportOptions::default()
    };
    export(&reg, &opts, &mut sink, Duration::ZERO).unwrap();
    assert_eq!(decode_image(&sink.files()[0].bytes).unwrap().dimensions(), (10, 6));
}

#[test]
fn active_layer_export_uses_layer_size() {
    let mut reg = reg();
    reg.create_layer_sized(LayerKind::Image, Some("wide"), 9, 2)
        .unwrap();
    let mut sink = InMemorySink::new();
    let opts = ExportOptions {
        export_type: ExportType::ActiveLayer,
        format: ExportFormat::Jpeg,
        file_name: "hero".to_owned(),
        ..ExportOptions::default()
    };
    assert_eq!(export(&reg, &opts, &mut sink, Duration::ZERO).unwrap(), 1);
    let file = &sink.files()[0];
    assert_eq!(file.file_name, "hero.jpg");
    assert_eq!(file.mime_type, "image/jpeg");
    assert_eq!(decode_image(&file.bytes).unwrap().dimensions(), (9, 2));
}

#[test]
fn batch_export_writes_one_file_per_layer_in_order() {
    let mut reg = reg();
    reg.create_layer(LayerKind::Image, Some("Sky")).unwrap();
    let hidden = reg.create_layer(LayerKind::Text, Some("Title / v2")).unwrap();
    reg.update_layer(hidden, LayerPatch::visible(false));

    let mut sink = InMemorySink::new();
    let opts = ExportOptions {
        export_type: ExportType::AllLayers,
        format: ExportFormat::Svg,
        ..ExportOptions::default()
    };
    assert_eq!(
        export(&reg, &opts, &mut sink, Duration::from_millis(1)).unwrap(),
        2
    );
    let names: Vec<_> = sink.files().iter().map(|f| f.file_name.as_str()).collect();
    assert_eq!(names, ["export_1_Sky.svg", "export_2_Title___v2.svg"]);
    assert!(sink.files().iter().all(|f| f.mime_type == "image/svg+xml"));
}

#[test]
fn invalid_options_are_rejected_before_encoding() {
    let mut reg = reg();
    reg.create_layer(LayerKind::Image, None).unwrap();
    let mut sink = InMemorySink::new();
    let opts = ExportOptions {
        file_name: String::new(),
        ..ExportOptions::default()
    };
    assert!(export(&reg, &opts, &mut sink, Duration::ZERO).is_err());
    assert!(sink.files().is_empty());
}

#[test]
fn file_safe_names() {
    assert_eq!(file_safe("Image Layer Copy"), "Image_Layer_Copy");
    assert_eq!(file_safe("   "), "layer");
}
