//! Wildear CLI - serve the web front-end or classify clips from the shell
//!
//! Subcommands:
//! - `serve`: start the upload/record web interface
//! - `predict`: classify a single audio file
//! - `info`: show the configured model, labels and input geometry

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use candle_core::Device;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use wildear::config::development_mode;
use wildear::{AppConfig, LabelSet, Predictor, Server, VERSION};

/// Wildear - identify animal species from field recordings
#[derive(Parser, Debug)]
#[command(name = "wildear")]
#[command(author, version, about, long_about = None)]
#[command(about = "Identify animal species from short audio clips")]
#[command(long_about = "
Wildear classifies short field recordings with a convolutional network over
log-mel spectrograms and serves a small web page for uploads and in-browser
recording.

Examples:
  # Start the web interface on the configured port
  wildear serve

  # Serve with a config file and an explicit port
  wildear serve --config wildear.yaml --port 8080

  # Classify a clip from the shell
  wildear predict meadow_morning.wav

  # Show the configured species list
  wildear info
")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a YAML config file (built-in defaults apply when omitted)
    #[arg(short, long, global = true, env = "WILDEAR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the web front-end
    Serve {
        /// Bind address override
        #[arg(long)]
        host: Option<String>,

        /// Port override (wins over the config file and the PORT variable)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Classify a single audio file
    Predict {
        /// Audio file to classify
        file: PathBuf,
    },

    /// Show model, label and input information
    Info,
}

fn setup_logging(verbose: bool) {
    let default_filter = if verbose || development_mode() {
        "wildear=debug,tower_http=debug"
    } else {
        "wildear=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => {
            let config = AppConfig::load(path)?;
            info!("Loaded configuration from {:?}", path);
            Ok(config)
        }
        None => Ok(AppConfig::default()),
    }
}

fn build_predictor(config: &AppConfig) -> Result<Predictor> {
    let device = Device::Cpu;
    let predictor = Predictor::from_files(
        &config.model.weights,
        &config.model.labels,
        config.features.clone(),
        &device,
    )?;
    Ok(predictor)
}

fn print_info(config: &AppConfig) -> Result<()> {
    let labels = LabelSet::load(&config.model.labels)
        .with_context(|| format!("failed to load labels from {:?}", config.model.labels))?;

    println!("Wildear v{}", VERSION);
    println!();
    println!("Checkpoint: {:?}", config.model.weights);
    if !config.model.weights.exists() {
        println!("  (missing; the server falls back to random weights)");
    }
    println!(
        "Labels: {:?} ({} species)",
        config.model.labels,
        labels.len()
    );

    let features = &config.features;
    println!(
        "Input: {} mel bands x {} frames at {} Hz ({:.1}s clips)",
        features.n_mels,
        features.frames_per_clip(),
        features.sample_rate,
        features.clip_seconds,
    );

    println!();
    println!("Species:");
    for name in labels.names() {
        println!("  {}", name.replace('_', " "));
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    info!("Wildear v{}", VERSION);

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => {
            config.apply_env()?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }

            let predictor = build_predictor(&config)?;
            Server::new(config, predictor).run().await?;
        }

        Commands::Predict { file } => {
            let predictor = build_predictor(&config)?;
            let prediction = predictor
                .predict_file(&file)
                .with_context(|| format!("failed to classify {:?}", file))?;
            println!("{}", prediction.display_text());
            println!("Confidence: {:.1}%", prediction.score * 100.0);
        }

        Commands::Info => {
            print_info(&config)?;
        }
    }

    Ok(())
}
