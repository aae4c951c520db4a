//! Point cloud ingestion.
//!
//! This module provides:
//! - A strict parser for `.pts` files (whitespace-delimited x y z rows, no header)
//! - An upload store that keeps files under a sanitized name, restricted to an
//!   allowed set of extensions

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use regex::Regex;
use thiserror::Error;

use crate::config::IngestConfig;

/// Errors that can occur during ingestion.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("row {row}: expected 3 columns, found {found}")]
    ColumnCount { row: usize, found: usize },

    #[error("row {row}: non-numeric value '{value}'")]
    NonNumeric { row: usize, value: String },

    #[error("file extension not allowed: {0}")]
    ExtensionNotAllowed(PathBuf),

    #[error("file name unusable after sanitizing: {0}")]
    UnusableFileName(PathBuf),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Container for 3D point cloud data.
///
/// Point id is the position in the insertion order; every stage of the
/// pipeline preserves that order.
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    /// X coordinates of all points.
    pub x: Vec<f32>,
    /// Y coordinates of all points.
    pub y: Vec<f32>,
    /// Z coordinates of all points.
    pub z: Vec<f32>,
}

impl PointCloud {
    /// Creates a new empty point cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new point cloud with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of points in the cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Returns true if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Adds a point to the cloud.
    #[inline]
    pub fn push(&mut self, x: f32, y: f32, z: f32) {
        self.x.push(x);
        self.y.push(y);
        self.z.push(z);
    }

    /// Converts point cloud to a vector of [x, y, z] coordinate arrays.
    pub fn to_coords(&self) -> Vec<[f32; 3]> {
        let n = self.len();
        let mut coords = Vec::with_capacity(n);
        for i in 0..n {
            coords.push([self.x[i], self.y[i], self.z[i]]);
        }
        coords
    }
}

/// Load a point cloud from a `.pts` file.
///
/// Each non-blank line must contain exactly three whitespace-delimited
/// numeric columns (x, y, z); there is no header row. A malformed row fails
/// the whole load with a 1-based row number so the offending line can be
/// found; no rows are skipped or coerced. An empty file yields an empty
/// cloud, not an error.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a row has the wrong column
/// count, or a column does not parse as a number.
pub fn load_pts<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);

    let mut cloud = PointCloud::with_capacity(1024);

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let row = idx + 1;

        // Blank lines are not rows
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split_whitespace();
        let mut coord = [0.0f32; 3];
        let mut found = 0usize;

        for slot in coord.iter_mut() {
            match fields.next() {
                Some(field) => {
                    let value: f32 = field.parse().map_err(|_| LoaderError::NonNumeric {
                        row,
                        value: field.to_string(),
                    })?;
                    // Infinities and NaN parse but cannot be clustered
                    if !value.is_finite() {
                        return Err(LoaderError::NonNumeric {
                            row,
                            value: field.to_string(),
                        });
                    }
                    *slot = value;
                    found += 1;
                }
                None => return Err(LoaderError::ColumnCount { row, found }),
            }
        }

        let excess = fields.count();
        if excess > 0 {
            return Err(LoaderError::ColumnCount {
                row,
                found: found + excess,
            });
        }

        cloud.push(coord[0], coord[1], coord[2]);
    }

    Ok(cloud)
}

/// Reduce a client-supplied file name to a safe flat name.
///
/// Path separators and anything outside `[A-Za-z0-9._-]` collapse to `_`,
/// and leading dots are stripped so the result can never escape the upload
/// directory or hide as a dotfile. Returns `None` when nothing usable
/// remains.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let unsafe_chars = Regex::new(r"[^A-Za-z0-9._-]+").unwrap();

    // Only the final path component matters
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned = unsafe_chars.replace_all(base, "_");
    let cleaned = cleaned.trim_start_matches('.').trim_matches('_');

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Returns true if the file name carries one of the allowed extensions.
///
/// Comparison is case-insensitive; a file with no extension is never
/// allowed.
pub fn is_allowed_extension(name: &str, allowed: &[String]) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Copy a file into the upload directory under a sanitized name.
///
/// The upload directory is created if missing. Returns the destination path.
///
/// # Errors
///
/// Returns an error if the extension is not in the allowed set, the name has
/// no usable characters, or the copy itself fails.
pub fn store_upload(src: &Path, config: &IngestConfig) -> Result<PathBuf> {
    let original = src
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| LoaderError::UnusableFileName(src.to_path_buf()))?;

    if !is_allowed_extension(original, &config.allowed_extensions) {
        return Err(LoaderError::ExtensionNotAllowed(src.to_path_buf()));
    }

    let safe_name = sanitize_file_name(original)
        .ok_or_else(|| LoaderError::UnusableFileName(src.to_path_buf()))?;

    fs::create_dir_all(&config.upload_dir)?;
    let dest = config.upload_dir.join(&safe_name);
    fs::copy(src, &dest)?;

    log::info!("stored upload {} -> {}", src.display(), dest.display());
    Ok(dest)
}
