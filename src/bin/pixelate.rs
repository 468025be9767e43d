use anyhow::{Context, Result, anyhow};
use clap::Parser;
use pixel_palette_art::{DistanceMetric, SampleMethod, Settings, SortMode, render_bytes};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Turn images into grid-sampled pixel art over a palette picked from the image.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// One or more input image paths
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// JSON settings file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of grid cells across the image width
    #[arg(short = 'n', long)]
    cells: Option<u32>,

    /// Horizontal grid offset in pixels
    #[arg(long, allow_hyphen_values = true)]
    offset_x: Option<i32>,

    /// Vertical grid offset in pixels
    #[arg(long, allow_hyphen_values = true)]
    offset_y: Option<i32>,

    /// How each cell is reduced to one color
    #[arg(short, long, value_enum)]
    method: Option<SampleMethod>,

    /// Distance used to match cells against the palette
    #[arg(long, value_enum)]
    metric: Option<DistanceMetric>,

    /// Gaussian blur sigma applied before sampling
    #[arg(short, long)]
    blur: Option<f32>,

    /// Order of the palette listing in the JSON report
    #[arg(long, value_enum)]
    sort: Option<SortMode>,

    /// Palette pick location `x,y` in working-size pixels (repeatable).
    /// Defaults to the image center.
    #[arg(short = 'p', long = "sample", value_parser = parse_point)]
    samples: Vec<(u32, u32)>,

    /// Optional upscale size for the longest side (nearest-neighbour).
    /// If omitted, the output has one pixel per cell.
    #[arg(short, long)]
    output_size: Option<u32>,

    /// Output directory
    #[arg(short = 'd', long)]
    out_dir: Option<PathBuf>,

    /// Output filename prefix (ignored when --out-dir supplied)
    #[arg(long, default_value = "pixelated_")]
    prefix: String,

    /// Print a JSON report per image to stdout
    #[arg(long)]
    json: bool,
}

fn parse_point(s: &str) -> Result<(u32, u32), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected `x,y`, got `{s}`"))?;
    let x = x.trim().parse().map_err(|e| format!("bad x in `{s}`: {e}"))?;
    let y = y.trim().parse().map_err(|e| format!("bad y in `{s}`: {e}"))?;
    Ok((x, y))
}

fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => Settings::default(),
    };

    if let Some(cells) = args.cells {
        settings.cells_across = cells;
    }
    if let Some(x) = args.offset_x {
        settings.offset_x = x;
    }
    if let Some(y) = args.offset_y {
        settings.offset_y = y;
    }
    if let Some(method) = args.method {
        settings.sample_method = method;
    }
    if let Some(metric) = args.metric {
        settings.metric = metric;
    }
    if let Some(blur) = args.blur {
        settings.blur_radius = blur;
    }
    if let Some(sort) = args.sort {
        settings.sort_mode = sort;
    }
    Ok(settings)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = load_settings(&args)?;

    for input in &args.inputs {
        let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
        let out = render_bytes(&bytes, &settings, &args.samples, args.output_size)
            .with_context(|| format!("pixel-art processing failed for {}", input.display()))?;

        let out_path = if let Some(dir) = &args.out_dir {
            let stem = input.file_stem().unwrap_or_default().to_string_lossy();
            dir.join(format!("{stem}.png"))
        } else {
            let stem = input
                .file_stem()
                .ok_or_else(|| anyhow!("input path has no file name: {}", input.display()))?
                .to_string_lossy();
            PathBuf::from(format!("{}{}.png", args.prefix, stem))
        };

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&out_path, &out.png)?;
        info!(
            input = %input.display(),
            output = %out_path.display(),
            resolution = ?out.resolution,
            colors = out.palette.len(),
            "saved"
        );

        if args.json {
            let report = json!({
                "input": input.display().to_string(),
                "output": out_path.display().to_string(),
                "resolution": { "width": out.resolution.0, "height": out.resolution.1 },
                "settings": &settings,
                "palette": out.palette,
            });
            println!("{report}");
        }
    }

    Ok(())
}
