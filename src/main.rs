//! # Tinta CLI
//!
//! Command-line interface for rendering compositions and templates.
//!
//! ## Usage
//!
//! ```bash
//! # Render a composition to PNG
//! tinta render status.json --output status.png
//!
//! # Packed 1-bit frame, dithered and turned for the panel
//! tinta render status.json --output status.bin --dither floyd-steinberg \
//!     --transform flip-v --transform rotate-90
//!
//! # Fill a template's IP and QR slots
//! tinta template setup.json --ip 192.168.1.20 --url https://example.com/setup \
//!     --output setup.png
//!
//! # Show the layer stack
//! tinta layers status.json
//! ```
//!
//! Set `RUST_LOG=debug` for per-layer logging.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use tinta::compositor;
use tinta::{
    Composition, Compositor, DitherMode, OutputFormat, PanelConfig, RenderOptions, Substitutions,
    TemplateRenderer, TintaError, Transform,
};

/// Tinta - layered compositing for e-paper panels
#[derive(Parser, Debug)]
#[command(name = "tinta")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a composition document
    Render {
        /// Composition JSON file
        composition: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Render a template, filling its placeholders
    Template {
        /// Template JSON file
        template: PathBuf,

        /// IP address for `ip` placeholders
        #[arg(long, default_value = "")]
        ip: String,

        /// Data encoded by `qr` placeholders
        #[arg(long, default_value = "")]
        url: String,

        /// Write generated QR codes here instead of keeping them in memory
        #[arg(long, value_name = "DIR")]
        scratch_dir: Option<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Print the layer stack of a composition document
    Layers {
        /// Composition JSON file
        composition: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct OutputArgs {
    /// Output file
    #[arg(long, short, value_name = "FILE")]
    output: PathBuf,

    /// png, bmp or binary (defaults to the output extension, then png)
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Final dither over the whole canvas
    #[arg(long, default_value = "none")]
    dither: DitherMode,

    /// Canvas transform, repeatable: flip-h, flip-v, rotate-90, invert
    #[arg(long = "transform", value_name = "TRANSFORM")]
    transforms: Vec<Transform>,

    /// Canvas background (0 = black, 255 = white)
    #[arg(long, default_value = "255")]
    bg_color: u8,

    /// Target panel, e.g. epd128x250 (defaults to $TINTA_PANEL)
    #[arg(long)]
    panel: Option<String>,
}

impl OutputArgs {
    fn format(&self) -> OutputFormat {
        self.format
            .or_else(|| OutputFormat::from_path(&self.output))
            .unwrap_or_default()
    }

    fn panel(&self) -> Result<PanelConfig, TintaError> {
        match self.panel {
            Some(ref name) => PanelConfig::parse(name),
            None => Ok(PanelConfig::from_env()),
        }
    }

    fn options(&self) -> RenderOptions {
        RenderOptions {
            background_color: self.bg_color,
            final_dither: self.dither,
            transformations: self.transforms.clone(),
        }
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), TintaError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            composition,
            output,
        } => {
            let comp = Composition::load(&composition)?;
            let format = output.format();
            println!(
                "Rendering {} ({}x{}, {} layers)...",
                composition.display(),
                comp.width,
                comp.height,
                comp.len()
            );
            let canvas = Compositor::default().render(&comp, &output.options());
            check_panel_fit(&output.panel()?, canvas.width(), canvas.height());
            compositor::write_atomic(&output.output, &compositor::encode(&canvas, format)?)?;
            report_saved(&output.output, format);
        }

        Commands::Template {
            template,
            ip,
            url,
            scratch_dir,
            output,
        } => {
            let mut renderer = TemplateRenderer::from_path(&template)?;
            if let Some(dir) = scratch_dir {
                renderer = renderer.with_scratch_dir(dir);
            }
            let format = output.format();
            println!("Rendering template {}...", template.display());
            renderer.render_and_save(
                &Substitutions::new(ip, url),
                &output.output,
                format,
                &output.options(),
            )?;
            report_saved(&output.output, format);
        }

        Commands::Layers { composition } => {
            let comp = Composition::load(&composition)?;
            println!("{}x{} canvas, {} layers", comp.width, comp.height, comp.len());
            for info in comp.get_layer_info()? {
                println!("{}", info);
            }
        }
    }

    Ok(())
}

/// Warn when the output cannot go to the panel as-is.
fn check_panel_fit(panel: &PanelConfig, width: u32, height: u32) {
    if (width, height) != (panel.width, panel.height) {
        eprintln!(
            "Note: output is {}x{}, {} expects {}x{}",
            width, height, panel, panel.width, panel.height
        );
    }
}

fn report_saved(path: &Path, format: OutputFormat) {
    println!("Saved {} to {}", format, path.display());
}
