use brandcanvas::{
    BlendMode, Canvas, DirSink, Editor, EditorOpts, ExportFormat, ExportOptions, LayerKind,
    LayerPatch,
};

const LOGO: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="640" height="320">
  <rect width="640" height="320" fill="#0f172a"/>
  <circle cx="160" cy="160" r="96" fill="#f97316"/>
  <rect x="300" y="120" width="260" height="80" rx="16" fill="#e2e8f0"/>
</svg>"##;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut editor = Editor::new(EditorOpts {
        canvas: Canvas {
            width: 640,
            height: 320,
        },
        ..EditorOpts::default()
    })?;
    editor.set_project_name("banner");

    let logo = editor.import_svg(LOGO, Some("Logo"))?;
    println!("logo layer: {logo:?}");

    let glow = editor
        .create_layer(LayerKind::Drawing, Some("Glow"))
        .ok_or_else(|| anyhow::anyhow!("could not allocate glow layer"))?;
    if let Some(surface) = editor.surface_mut(glow) {
        for y in 0..surface.height() {
            let a = (y * 255 / surface.height()) as u8;
            for x in 0..surface.width() {
                surface.put_pixel(x, y, [a / 2, a / 4, a, a]);
            }
        }
    }
    editor.update_layer(
        glow,
        LayerPatch {
            opacity: Some(60),
            blend_mode: Some(BlendMode::Screen),
            ..LayerPatch::default()
        },
    );

    let mut sink = DirSink::new("target/demos/banner");
    for format in [ExportFormat::Png, ExportFormat::Jpeg] {
        editor.export(
            &ExportOptions {
                format,
                file_name: "banner".to_owned(),
                ..ExportOptions::default()
            },
            &mut sink,
        )?;
    }
    editor.save_project(&mut sink)?;

    for path in sink.written() {
        println!("wrote {}", path.display());
    }
    Ok(())
}
