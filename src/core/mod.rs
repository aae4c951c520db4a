//! Core data types, ingestion, and output writers.

pub mod loaders;
pub mod writers;

pub use loaders::PointCloud;
