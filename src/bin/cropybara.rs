use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use cropybara::{
    Cropybara, DetectorKind, DetectorParams, ProcessOptions, ProcessResult, StallPolicy,
    Unwatermarker, UnwatermarkerConfig,
};

#[derive(Parser)]
#[command(
    name = "cropybara",
    about = "Split tall comic/manhwa pages into slices at panel gutters",
    version,
    after_help = "Simple usage: cropybara <pages_dir> -o <output_dir>\n\n\
                  Pages are stacked top to bottom in file-name order and cut so no\n\
                  slice is taller than --limit pixels."
)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Input image files, or a single directory of images
    #[arg(required = true)]
    input: Vec<PathBuf>,

    /// Output directory for the numbered slices
    #[arg(short, long)]
    output: PathBuf,

    /// Maximum slice height in pixels
    #[arg(short, long, default_value = "5000")]
    limit: u32,

    /// How cut positions are chosen
    #[arg(long, value_enum, default_value = "pixel")]
    detector: DetectorArg,

    /// Edge sensitivity (0.0-1.0); higher avoids cutting through fainter detail
    #[arg(long, default_value = "0.9")]
    sensitivity: f64,

    /// Scan step and cut alignment in pixels
    #[arg(long, default_value = "5")]
    step: u32,

    /// Pixels ignored at each side of a row
    #[arg(long, default_value = "5")]
    margins: u32,

    /// How far above the limit to search, as a fraction of it (0.0-1.0)
    #[arg(long, default_value = "0.5")]
    deviation: f64,

    /// Fail instead of stopping early when detection cannot advance
    #[arg(long)]
    strict: bool,

    /// Watermark image (RGBA) to remove from every slice
    #[arg(long)]
    watermark: Option<PathBuf>,

    /// Watermark top offset; negative aligns it to the bottom edge
    #[arg(long, default_value = "-1", allow_hyphen_values = true)]
    watermark_top: i64,

    /// Watermark left offset; negative aligns it to the right edge
    #[arg(long, default_value = "-1", allow_hyphen_values = true)]
    watermark_left: i64,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum DetectorArg {
    /// Evenly spaced cuts
    Manual,
    /// Content-aware cuts between panels
    Pixel,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    if cli.verbose && cli.quiet {
        eprintln!("Error: Cannot specify both --verbose and --quiet");
        process::exit(1);
    }

    let opts = ProcessOptions {
        detector: match cli.detector {
            DetectorArg::Manual => DetectorKind::Manual,
            DetectorArg::Pixel => DetectorKind::PixelComparison,
        },
        params: DetectorParams {
            max_distance: cli.limit,
            step: cli.step,
            margins: cli.margins,
            sensitivity: cli.sensitivity,
            max_search_deviation_factor: cli.deviation,
            on_stall: if cli.strict {
                StallPolicy::Error
            } else {
                StallPolicy::Stop
            },
        },
    };

    if let Err(e) = opts.params.validate() {
        eprintln!("Error: {e}");
        process::exit(1);
    }

    let mut engine = Cropybara::new();
    if let Some(path) = &cli.watermark {
        let config = UnwatermarkerConfig {
            top: cli.watermark_top,
            left: cli.watermark_left,
            ..UnwatermarkerConfig::default()
        };
        let remover = std::fs::read(path)
            .map_err(cropybara::Error::from)
            .and_then(|bytes| Unwatermarker::from_bytes(&bytes, config));
        match remover {
            Ok(r) => engine = engine.with_pass(Box::new(r)),
            Err(e) => {
                eprintln!("Fatal: Failed to load watermark {}: {e}", path.display());
                process::exit(1);
            }
        }
    }

    for input in &cli.input {
        if !input.exists() {
            eprintln!("Error: Input path does not exist: {}", input.display());
            process::exit(1);
        }
    }

    if !cli.quiet {
        eprintln!(
            "Slicing {} input(s), limit {}px, {} detector",
            cli.input.len(),
            cli.limit,
            match opts.detector {
                DetectorKind::Manual => "manual",
                DetectorKind::PixelComparison => "pixel comparison",
            }
        );
        if engine.pass_count() > 0 {
            eprintln!("Watermark removal enabled");
        }
        eprintln!();
    }

    let result = engine.process_paths(&cli.input, &cli.output, &opts, &cropybara::NeverCancel);
    print_result(&result, &cli);

    if !result.success {
        process::exit(1);
    }
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_result(result: &ProcessResult, cli: &Cli) {
    if !result.success {
        let tag = if result.cancelled { "CANCELLED" } else { "FAIL" };
        eprintln!("[{tag}] {}: {}", result.output_dir.display(), result.message);
        return;
    }

    if cli.quiet {
        return;
    }

    if cli.verbose {
        for path in &result.written {
            eprintln!("  -> {}", path.display());
        }
    }
    eprintln!("[OK] {}: {}", result.output_dir.display(), result.message);
}
