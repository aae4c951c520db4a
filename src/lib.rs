//! 3D point cloud density clustering pipeline.
//!
//! This crate provides tools for:
//! - Loading whitespace-delimited `.pts` point cloud files
//! - Min-max normalization into the unit cube
//! - Ball-tree / KD-tree radius-neighbor indexes
//! - DBSCAN clustering with deterministic labels
//! - Extracting a cluster-id -> points mapping for downstream consumers
//!
//! # Example
//!
//! ```no_run
//! use cloud_pipeline::config::ClusteringConfig;
//! use cloud_pipeline::core::loaders::load_pts;
//! use cloud_pipeline::processors::clustering::cluster_point_cloud;
//!
//! let cloud = load_pts("scan.pts").unwrap();
//! let outcome = cluster_point_cloud(&cloud, &ClusteringConfig::default()).unwrap();
//! println!("{} clusters", outcome.cluster_count());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use crate::config::{ClusteringConfig, IndexKind, IngestConfig, PipelineConfig};
pub use crate::core::loaders::PointCloud;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
