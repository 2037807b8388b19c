use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

use brandcanvas::{
    Editor, EditorOpts, ExportFormat, ExportOptions, ExportType, InMemorySink, ProjectSnapshot,
    Resolution,
};

#[derive(Parser, Debug)]
#[command(name = "brandcanvas", version)]
struct Cli {
    /// Editor options JSON (canvas size, proxy hosts, fallbacks).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Flatten a saved project into a single image.
    Flatten(FlattenArgs),
    /// Turn an SVG file into a one-layer project.
    Svg(SvgArgs),
    /// Print the layer stack of a saved project.
    Layers(LayersArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Png,
    Jpeg,
    Svg,
}

impl From<Format> for ExportFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Png => ExportFormat::Png,
            Format::Jpeg => ExportFormat::Jpeg,
            Format::Svg => ExportFormat::Svg,
        }
    }
}

#[derive(Parser, Debug)]
struct FlattenArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output image path.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, value_enum, default_value_t = Format::Png)]
    format: Format,

    /// JPEG quality (10-100).
    #[arg(long, default_value_t = 90)]
    quality: u8,

    /// Include hidden layers.
    #[arg(long, default_value_t = false)]
    all: bool,

    /// Output width; requires --height.
    #[arg(long, requires = "height")]
    width: Option<u32>,

    /// Output height; requires --width.
    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// Skip the white backing fill.
    #[arg(long, default_value_t = false)]
    transparent: bool,
}

#[derive(Parser, Debug)]
struct SvgArgs {
    /// Input SVG file.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output project JSON.
    #[arg(long)]
    out: PathBuf,

    /// Project name (defaults to the SVG file stem).
    #[arg(long)]
    name: Option<String>,
}

#[derive(Parser, Debug)]
struct LayersArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let opts = match &cli.config {
        Some(path) => EditorOpts::from_path(path)?,
        None => EditorOpts::default(),
    };
    match cli.cmd {
        Command::Flatten(args) => cmd_flatten(args, opts),
        Command::Svg(args) => cmd_svg(args, opts),
        Command::Layers(args) => cmd_layers(args),
    }
}

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}

fn cmd_flatten(args: FlattenArgs, opts: EditorOpts) -> anyhow::Result<()> {
    let project = ProjectSnapshot::from_path(&args.in_path)?;
    let mut editor = Editor::new(EditorOpts {
        load_system_fonts: false,
        ..opts
    })?;
    editor.open_project(&project)?;

    let resolution = match (args.width, args.height) {
        (Some(width), Some(height)) => Resolution::Custom { width, height },
        _ => Resolution::Original,
    };
    let export = ExportOptions {
        format: args.format.into(),
        quality: args.quality,
        export_type: if args.all {
            ExportType::Composite
        } else {
            ExportType::VisibleLayers
        },
        resolution,
        transparent_background: args.transparent,
        ..ExportOptions::default()
    };

    let mut sink = InMemorySink::new();
    editor.export(&export, &mut sink)?;
    let file = sink
        .into_files()
        .into_iter()
        .next()
        .context("flatten produced no output")?;

    ensure_parent(&args.out)?;
    std::fs::write(&args.out, &file.bytes)
        .with_context(|| format!("write '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_svg(args: SvgArgs, opts: EditorOpts) -> anyhow::Result<()> {
    let markup = std::fs::read_to_string(&args.in_path)
        .with_context(|| format!("read svg '{}'", args.in_path.display()))?;
    let stem = args
        .in_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("svg")
        .to_owned();

    let mut editor = Editor::new(opts)?;
    let id = editor
        .import_svg(&markup, Some(&stem))?
        .context("svg import was dropped")?;
    let (w, h) = editor
        .registry()
        .surface(id)
        .map(|s| s.dimensions())
        .context("imported layer has no surface")?;
    editor.set_canvas_size(w, h)?;

    let name = args.name.unwrap_or(stem);
    let snapshot = ProjectSnapshot::capture(editor.registry(), &name, None)?;
    ensure_parent(&args.out)?;
    snapshot.write_to_path(&args.out)?;

    eprintln!("wrote {} ({w}x{h})", args.out.display());
    Ok(())
}

fn cmd_layers(args: LayersArgs) -> anyhow::Result<()> {
    let project = ProjectSnapshot::from_path(&args.in_path)?;
    let size = project.metadata.canvas_size;
    println!(
        "{} ({}x{}, format {})",
        project.name, size.width, size.height, project.metadata.version
    );
    for (z, layer) in project.layers.iter().enumerate().rev() {
        println!(
            "{z:>3}  {:<24} {:<8} {:>3}%  {:<10} {}{}",
            layer.name,
            layer.kind.label(),
            layer.opacity,
            layer.blend_mode.as_str(),
            if layer.visible { "visible" } else { "hidden" },
            if layer.locked { ", locked" } else { "" },
        );
    }
    Ok(())
}
