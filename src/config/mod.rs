//! Configuration types for the clustering pipeline.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Spatial index variant used for neighbor queries.
///
/// The variant affects build and query performance only; cluster labels are
/// identical for either choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum IndexKind {
    /// Nested bounding spheres, median split on the widest axis.
    #[default]
    BallTree,
    /// kiddo immutable KD-tree.
    KdTree,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::BallTree => write!(f, "ball-tree"),
            IndexKind::KdTree => write!(f, "kd-tree"),
        }
    }
}

/// Configuration for DBSCAN clustering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Neighborhood radius in normalized coordinates
    #[serde(default = "default_eps")]
    pub eps: f32,

    /// Minimum neighborhood size (the point itself included) for a core point
    #[serde(default = "default_min_pts")]
    pub min_pts: usize,

    /// Spatial index variant
    #[serde(default)]
    pub index: IndexKind,

    /// Abort clustering after this many seconds (no limit if absent)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_eps() -> f32 {
    0.02
}

fn default_min_pts() -> usize {
    10
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            eps: default_eps(),
            min_pts: default_min_pts(),
            index: IndexKind::default(),
            timeout_secs: None,
        }
    }
}

/// Configuration for the upload store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Directory uploaded files are stored under
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// File extensions accepted for ingestion (lowercase, without the dot)
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["pts".to_string(), "md".to_string()]
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub clustering: ClusteringConfig,

    #[serde(default)]
    pub ingest: IngestConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
