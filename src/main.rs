use anyhow::Context;
use clap::{Parser, Subcommand};
use docextract::{Config, Extractor, FallbackStrategy, RawDocument};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "docextract")]
#[command(about = "Extract text from images and scanned PDFs with OCR engine fallback")]
#[command(version)]
pub struct Args {
    /// Minimum primary confidence accepted without running the secondary engine
    #[arg(long, env = "OCR_CONFIDENCE_THRESHOLD", default_value = "0.75", global = true)]
    pub confidence_threshold: f32,

    /// Per-engine timeout in seconds
    #[arg(long, env = "OCR_ENGINE_TIMEOUT_SECS", default_value = "5", global = true)]
    pub engine_timeout: f64,

    /// Run the preprocessing pipeline before extraction
    #[arg(long, env = "OCR_ENABLE_PREPROCESSING", default_value = "true", action = clap::ArgAction::Set, global = true)]
    pub preprocessing: bool,

    /// How to schedule the engines when both are available (sequential, concurrent)
    #[arg(long, env = "OCR_FALLBACK_STRATEGY", default_value = "sequential", global = true)]
    pub fallback_strategy: FallbackStrategy,

    /// Disable the primary engine
    #[arg(long, global = true)]
    pub no_primary: bool,

    /// Disable the secondary engine
    #[arg(long, global = true)]
    pub no_secondary: bool,

    /// Default language for OCR (e.g., "eng", "deu", "fra")
    #[arg(long, env = "OCR_DEFAULT_LANGUAGE", default_value = "eng", global = true)]
    pub default_language: String,

    /// Maximum file size in bytes (default: 50MB)
    #[arg(long, env = "OCR_MAX_FILE_SIZE", default_value = "52428800", global = true)]
    pub max_file_size: usize,

    /// Path to tessdata directory (uses TESSDATA_PREFIX env var if not set)
    #[arg(long, env = "TESSDATA_PREFIX", global = true)]
    pub tessdata_path: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract text from a document and print the result as JSON
    Extract {
        /// Image or PDF to read
        file: PathBuf,

        /// Declared MIME type (guessed from the extension if omitted)
        #[arg(long)]
        content_type: Option<String>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Report which backends are usable in this environment
    Probe,
}

impl TryFrom<&Args> for Config {
    type Error = anyhow::Error;

    fn try_from(args: &Args) -> anyhow::Result<Self> {
        let engine_timeout = Duration::try_from_secs_f64(args.engine_timeout)
            .with_context(|| format!("invalid engine timeout: {}", args.engine_timeout))?;

        let config = Config {
            confidence_threshold: args.confidence_threshold,
            engine_timeout,
            enable_preprocessing: args.preprocessing,
            fallback_strategy: args.fallback_strategy,
            enable_primary: !args.no_primary,
            enable_secondary: !args.no_secondary,
            default_language: args.default_language.clone(),
            tessdata_path: args.tessdata_path.clone(),
            max_file_size: args.max_file_size,
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Serialize)]
struct ProbeReport<'a> {
    version: &'static str,
    capabilities: docextract::CapabilitySet,
    engines: &'a [docextract::EngineInfo],
    confidence_threshold: f32,
    engine_timeout_seconds: f64,
    fallback_strategy: FallbackStrategy,
    max_file_size_bytes: usize,
    default_language: &'a str,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout carries only the JSON result
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::try_from(&args)?;

    tracing::info!("Starting docextract v{}", env!("CARGO_PKG_VERSION"));

    let extractor = Extractor::from_config(config).context("failed to build extractor")?;

    match &args.command {
        Command::Extract {
            file,
            content_type,
            pretty,
        } => {
            let bytes =
                std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
            let filename = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let content_type = content_type
                .clone()
                .unwrap_or_else(|| guess_content_type(file).to_string());

            let raw = RawDocument::new(bytes, filename, content_type);
            let result = extractor.run_blocking(&raw);
            print_json(&result, *pretty)?;
        }
        Command::Probe => {
            let config = extractor.config();
            let report = ProbeReport {
                version: env!("CARGO_PKG_VERSION"),
                capabilities: extractor.capabilities(),
                engines: extractor.engine_info(),
                confidence_threshold: config.confidence_threshold,
                engine_timeout_seconds: config.engine_timeout.as_secs_f64(),
                fallback_strategy: config.fallback_strategy,
                max_file_size_bytes: config.max_file_size,
                default_language: &config.default_language,
            };
            print_json(&report, true)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}

fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
