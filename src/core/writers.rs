//! Output writers for clustering results.
//!
//! Two exports are supported:
//! - The cluster mapping as a JSON object (cluster id -> array of [x, y, z])
//! - Labeled coordinates as CSV (one row per point, noise label -1 included)

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use thiserror::Error;

use crate::processors::extract::ClusterMap;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize the cluster mapping.
    #[error("failed to serialize JSON to '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Coordinate and label arrays differ in length.
    #[error("array length mismatch: coords has {coords_len} elements, labels has {labels_len} elements")]
    LengthMismatch { coords_len: usize, labels_len: usize },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Write the cluster mapping as a JSON object.
///
/// Keys are cluster ids, values are arrays of `[x, y, z]` triples in
/// ascending point-id order. Noise points are absent by construction of
/// [`ClusterMap`]. An empty mapping writes `{}`.
///
/// # Errors
///
/// Returns an error if directories or the file cannot be created, or
/// serialization fails.
pub fn write_clusters_json(path: &Path, clusters: &ClusterMap) -> Result<()> {
    ensure_parent_dirs(path)?;

    let path_str = path.display().to_string();
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path_str.clone(),
        source: e,
    })?;

    serde_json::to_writer(BufWriter::new(file), clusters).map_err(|e| WriteError::Json {
        path: path_str,
        source: e,
    })
}

/// Write labeled coordinates to CSV with an `x,y,z,label` header.
///
/// # Errors
///
/// Returns an error if `coords` and `labels` differ in length, or the file
/// cannot be written.
pub fn write_labels_csv(path: &Path, coords: &[[f32; 3]], labels: &[i32]) -> Result<()> {
    if coords.len() != labels.len() {
        return Err(WriteError::LengthMismatch {
            coords_len: coords.len(),
            labels_len: labels.len(),
        });
    }

    ensure_parent_dirs(path)?;

    let path_str = path.display().to_string();
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path_str.clone(),
        source: e,
    })?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));

    let csv_err = |e| WriteError::Csv {
        path: path_str.clone(),
        source: e,
    };

    writer.write_record(["x", "y", "z", "label"]).map_err(csv_err)?;

    for (coord, label) in coords.iter().zip(labels.iter()) {
        writer
            .write_record(&[
                format!("{:.6}", coord[0]),
                format!("{:.6}", coord[1]),
                format!("{:.6}", coord[2]),
                label.to_string(),
            ])
            .map_err(|e| WriteError::Csv {
                path: path_str.clone(),
                source: e,
            })?;
    }

    writer.flush().map_err(|e| WriteError::Csv {
        path: path_str.clone(),
        source: csv::Error::from(e),
    })?;

    Ok(())
}
