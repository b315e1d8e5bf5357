//! # DocThumb CLI
//!
//! Command-line interface for rendering template thumbnails.
//!
//! ## Usage
//!
//! ```bash
//! # Render a schema file to the default card thumbnail
//! docthumb render --schema templates/warranty.json --out warranty.jpg
//!
//! # Render a template record (name + schema URL or inline schema) as PNG
//! docthumb render --template warranty-template.json --preset large --out large.png
//!
//! # Draw real QR codes instead of placeholders
//! docthumb render --schema https://cdn.example.com/t/42.json --qr encode --out t42.webp
//!
//! # Print the draw operations as JSON instead of writing an image
//! docthumb render --schema templates/warranty.json --dump-ops
//!
//! # List size presets
//! docthumb presets
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use docthumb::{
    HttpLoader, QrMode, Rasterizer, RendererConfig, ResourceLoader, Template, ThumbnailError,
    ThumbnailFormat, ThumbnailOptions, ThumbnailPreset,
    canvas::Recorder,
    render::paint_template,
};

/// DocThumb - template thumbnail renderer
#[derive(Parser, Debug)]
#[command(name = "docthumb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a template thumbnail
    Render {
        /// Schema reference: URL, file path or data URL
        #[arg(long, conflicts_with = "template", required_unless_present = "template")]
        schema: Option<String>,

        /// Template record JSON file ({"name", "json_schema_url" | "schema"})
        #[arg(long, value_name = "FILE")]
        template: Option<PathBuf>,

        /// Template name, used as the placeholder label if the schema fails
        #[arg(long)]
        name: Option<String>,

        /// Size preset: card, small or large
        #[arg(long)]
        preset: Option<ThumbnailPreset>,

        /// Output width in pixels
        #[arg(long)]
        width: Option<u32>,

        /// Output height in pixels
        #[arg(long)]
        height: Option<u32>,

        /// Encoder quality, 0..1 (JPEG only)
        #[arg(long)]
        quality: Option<f32>,

        /// Output format: jpeg, png, webp or a MIME type (default: from --out)
        #[arg(long)]
        format: Option<ThumbnailFormat>,

        /// QR code rendering: placeholder or encode
        #[arg(long, value_parser = parse_qr_mode)]
        qr: Option<QrMode>,

        /// Renderer config JSON file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Print recorded draw operations as JSON to stdout
        #[arg(long)]
        dump_ops: bool,

        /// Output image file
        #[arg(long, value_name = "FILE", required_unless_present = "dump_ops")]
        out: Option<PathBuf>,
    },

    /// List thumbnail size presets
    Presets,
}

fn parse_qr_mode(s: &str) -> Result<QrMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "placeholder" => Ok(QrMode::Placeholder),
        "encode" => Ok(QrMode::Encode),
        _ => Err(format!("expected 'placeholder' or 'encode', got '{}'", s)),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), ThumbnailError> {
    match cli.command {
        Commands::Presets => {
            println!("Available presets:");
            for preset in ThumbnailPreset::ALL {
                let (width, height, quality) = preset.dimensions();
                println!(
                    "  {:<6} {}x{} quality {:.1}",
                    preset.name(),
                    width,
                    height,
                    quality
                );
            }
            Ok(())
        }
        Commands::Render {
            schema,
            template,
            name,
            preset,
            width,
            height,
            quality,
            format,
            qr,
            config,
            dump_ops,
            out,
        } => {
            let config = match &config {
                Some(path) => RendererConfig::load(path)?,
                None => RendererConfig::default(),
            };

            let template = load_template(schema, template.as_deref(), name)?;

            let mut options = config.defaults.clone();
            if let Some(preset) = preset {
                options = preset.apply(options);
            }
            if let Some(width) = width {
                options.width = width;
            }
            if let Some(height) = height {
                options.height = height;
            }
            if let Some(quality) = quality {
                options.quality = quality;
            }
            let format = format.or_else(|| out.as_deref().and_then(ThumbnailFormat::from_path));
            if let Some(format) = format {
                options.format = format;
            }
            if let Some(qr) = qr {
                options.qr_mode = qr;
            }

            let loader: Arc<dyn ResourceLoader> = Arc::new(HttpLoader::new(&config)?);

            if dump_ops {
                dump_draw_ops(&template, loader.as_ref(), &options).await?;
            }

            if let Some(out) = out {
                let mut rasterizer = Rasterizer::from_config_with_loader(&config, loader)?;
                let thumb = rasterizer.render_thumbnail(&template, &options).await?;
                std::fs::write(&out, &thumb.bytes)?;

                for issue in &thumb.issues {
                    eprintln!("warning: {}", issue.message);
                }
                println!(
                    "Wrote {} ({}x{}, {}, {} bytes{})",
                    out.display(),
                    thumb.width,
                    thumb.height,
                    thumb.mime_type(),
                    thumb.bytes.len(),
                    if thumb.fallback { ", placeholder" } else { "" }
                );
            }
            Ok(())
        }
    }
}

/// Build the template to render from `--schema` or `--template`.
fn load_template(
    schema: Option<String>,
    template_file: Option<&Path>,
    name: Option<String>,
) -> Result<Template, ThumbnailError> {
    let mut template = match (schema, template_file) {
        (_, Some(path)) => {
            let json = std::fs::read_to_string(path)?;
            serde_json::from_str::<Template>(&json).map_err(|e| {
                ThumbnailError::InvalidOptions(format!("Invalid template file: {}", e))
            })?
        }
        (Some(reference), None) => {
            let default_name = Path::new(&reference)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Template")
                .to_string();
            Template::with_schema_url(default_name, reference)
        }
        (None, None) => {
            return Err(ThumbnailError::InvalidOptions(
                "either --schema or --template is required".to_string(),
            ));
        }
    };
    if let Some(name) = name {
        template.name = name;
    }
    Ok(template)
}

async fn dump_draw_ops(
    template: &Template,
    loader: &dyn ResourceLoader,
    options: &ThumbnailOptions,
) -> Result<(), ThumbnailError> {
    options.validate()?;
    let mut recorder = Recorder::new(options.width, options.height);
    let outcome = paint_template(&mut recorder, template, loader, options).await;
    let dump = serde_json::json!({
        "fallback": outcome.fallback,
        "issues": outcome.issues,
        "ops": recorder.ops(),
    });
    let json = serde_json::to_string_pretty(&dump)
        .map_err(|e| ThumbnailError::Encode(format!("Failed to serialize draw ops: {}", e)))?;
    println!("{}", json);
    Ok(())
}
