//! Geo Event Detector CLI
//!
//! Reads JSON post records line by line and prints event clusters.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use geo_event_detector::{
    config::{Config, OutputFormat},
    core::{SimilarityMode, StreamDriver},
    ingest::{PostParser, PostReader},
    stats::create_shared_stats,
    VERSION,
};
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "geo-events")]
#[command(version = VERSION)]
#[command(about = "Detect localized events in a stream of geotagged posts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a stream of JSON post records
    Run {
        /// Configuration file (defaults to the user config directory)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Input file with one JSON record per line (defaults to stdin)
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Output format, overriding the configuration
        #[arg(long, value_enum)]
        format: Option<FormatArg>,
    },

    /// Write a configuration template
    InitConfig {
        /// Where to write the template
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    ShowConfig {
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            input,
            format,
        } => cmd_run(config.as_deref(), input.as_deref(), format),
        Commands::InitConfig { path, force } => cmd_init_config(path, force),
        Commands::ShowConfig { config } => cmd_show_config(config.as_deref()),
    }
}

/// Log to stderr; stdout carries cluster output.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Config::load().with_context(|| {
            format!(
                "Failed to load config from {} (run `geo-events init-config` first)",
                Config::config_path().display()
            )
        }),
    }
}

fn cmd_run(
    config_path: Option<&Path>,
    input: Option<&Path>,
    format: Option<FormatArg>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let format = format.map_or(config.output.format, OutputFormat::from);

    let mode = SimilarityMode::from_config(&config.similarity)
        .context("Failed to load term embeddings")?;
    let stats = create_shared_stats();
    let mut driver = StreamDriver::new(&config, mode, stats.clone())?;

    eprintln!("Geo Event Detector v{VERSION}");
    eprintln!("  Run ID: {}", driver.run_id());
    eprintln!(
        "  Snapshot interval: {}s",
        config.snapshot_interval.as_secs()
    );
    eprintln!("  History length: {}", config.sequence_length);
    eprintln!("  Window size: {}", config.window_size);
    eprintln!();

    let mut reader = PostReader::new(PostParser::new(config.timezone()?), stats.clone());
    match input {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            reader.start(BufReader::new(file))?;
        }
        None => reader.start(BufReader::new(io::stdin()))?,
    }
    ctrlc_handler(reader.running_flag())?;

    let receiver = reader.receiver().clone();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    // An engine error returns here and drops the reader without joining it.
    for post in receiver.iter() {
        let Some(report) = driver
            .process(post)
            .context("Stream processing stopped")?
        else {
            continue;
        };
        match format {
            OutputFormat::Text => write!(out, "{}", report.to_text(driver.precision()))?,
            OutputFormat::Json => writeln!(out, "{}", report.to_json_line()?)?,
        }
        out.flush()?;
    }

    reader.stop();
    let pending = driver.finish();
    info!(
        snapshot = pending.index,
        posts = pending.post_count,
        "partial slice left unevaluated"
    );

    eprintln!();
    eprintln!("{}", stats.summary());
    Ok(())
}

fn cmd_init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = path.unwrap_or_else(Config::config_path);
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    Config::default()
        .save_to(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Configuration template written to {}", path.display());
    println!("Edit snapshot_interval, start_time and sequence_length before running.");
    Ok(())
}

fn cmd_show_config(path: Option<&Path>) -> Result<()> {
    let config = load_config(path)?;

    println!("Configuration");
    println!("=============");
    println!();
    match path {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: {}", Config::config_path().display()),
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Stop the reader on Ctrl+C; the stream then ends at the next line.
fn ctrlc_handler(running: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")
}
