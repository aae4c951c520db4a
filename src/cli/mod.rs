//! Command-line interface for the clustering pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Instant;

use crate::config::{ClusteringConfig, IndexKind, IngestConfig, PipelineConfig};

#[derive(Parser)]
#[command(name = "cloud-pipeline")]
#[command(about = "3D point cloud density clustering pipeline", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run DBSCAN clustering on a .pts point cloud file
    Cluster {
        /// Input .pts file (whitespace-delimited x y z rows)
        input: PathBuf,
        /// Output directory for the cluster JSON and labels CSV
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Neighborhood radius in normalized coordinates
        #[arg(long)]
        eps: Option<f32>,
        /// Minimum neighborhood size for a core point
        #[arg(long)]
        min_pts: Option<usize>,
        /// Spatial index variant
        #[arg(long, value_enum)]
        index: Option<IndexKind>,
        /// Abort clustering after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Store a point cloud file in the upload directory
    Ingest {
        /// File to store
        file: PathBuf,
        /// Upload directory (overrides config)
        #[arg(short, long)]
        upload_dir: Option<PathBuf>,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.len() > 39 {
            format!("{}...", &value[..36])
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Cluster {
            input,
            output_dir,
            eps,
            min_pts,
            index,
            timeout_secs,
        } => {
            cmd_cluster(&input, output_dir, eps, min_pts, index, timeout_secs, &config);
        }
        Commands::Ingest { file, upload_dir } => {
            cmd_ingest(&file, upload_dir, &config);
        }
    }
}

fn cmd_cluster(
    input: &PathBuf,
    output_dir: Option<PathBuf>,
    eps: Option<f32>,
    min_pts: Option<usize>,
    index: Option<IndexKind>,
    timeout_secs: Option<u64>,
    config: &PipelineConfig,
) {
    use crate::processors::clustering;

    let start = Instant::now();

    // Build clustering config with CLI overrides
    let cluster_config = ClusteringConfig {
        eps: eps.unwrap_or(config.clustering.eps),
        min_pts: min_pts.unwrap_or(config.clustering.min_pts),
        index: index.unwrap_or(config.clustering.index),
        timeout_secs: timeout_secs.or(config.clustering.timeout_secs),
    };

    // Default output directory to same as input
    let effective_output_dir = output_dir.unwrap_or_else(|| {
        input.parent().unwrap_or(&PathBuf::from(".")).to_path_buf()
    });

    println!("Running DBSCAN clustering...");
    println!("Input: {}", input.display());
    println!("Output directory: {}", effective_output_dir.display());
    println!("Parameters:");
    println!("  eps: {}", cluster_config.eps);
    println!("  min_pts: {}", cluster_config.min_pts);
    println!("  index: {}", cluster_config.index);

    let spinner = create_spinner("Clustering point cloud...");

    match clustering::process_pts_clustering(input, Some(&effective_output_dir), &cluster_config) {
        Ok((json_path, outcome)) => {
            spinner.finish_and_clear();

            print_summary(
                "Clustering Complete",
                &[
                    ("Input file", input.display().to_string()),
                    ("Output JSON", json_path.display().to_string()),
                    ("Points processed", outcome.labels.len().to_string()),
                    ("Clusters found", outcome.cluster_count().to_string()),
                    ("Noise points", outcome.noise_count().to_string()),
                    ("eps", cluster_config.eps.to_string()),
                    ("min_pts", cluster_config.min_pts.to_string()),
                    ("Index", cluster_config.index.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Clustering failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_ingest(file: &PathBuf, upload_dir: Option<PathBuf>, config: &PipelineConfig) {
    use crate::core::loaders;

    let start = Instant::now();

    let ingest_config = IngestConfig {
        upload_dir: upload_dir.unwrap_or_else(|| config.ingest.upload_dir.clone()),
        allowed_extensions: config.ingest.allowed_extensions.clone(),
    };

    println!("Storing upload...");
    println!("File: {}", file.display());
    println!("Upload directory: {}", ingest_config.upload_dir.display());

    match loaders::store_upload(file, &ingest_config) {
        Ok(dest) => {
            print_summary(
                "Ingest Complete",
                &[
                    ("Source file", file.display().to_string()),
                    ("Stored as", dest.display().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            error!("Ingest failed: {}", e);
            std::process::exit(1);
        }
    }
}
