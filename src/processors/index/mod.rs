//! Spatial indexes for radius-neighbor queries.
//!
//! Both variants are built once over the normalized point set and are
//! read-only afterwards, so concurrent queries need no synchronization. An
//! index stores point ids and derived geometry only; it never owns the
//! coordinate data.

use thiserror::Error;

use crate::config::IndexKind;

mod ball_tree;
mod kd_tree;

pub use ball_tree::BallTree;
pub use kd_tree::KdTreeIndex;

/// Errors that can occur during index construction.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("point cloud has {n} points, more than the supported {max}")]
    TooManyPoints { n: usize, max: usize },
}

/// Result type for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Read-only radius-neighbor queries over a fixed point set.
pub trait SpatialIndex: Sync {
    /// Number of indexed points.
    fn len(&self) -> usize;

    /// Returns true if no points are indexed.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of all points within Euclidean distance `eps` of `query`,
    /// the query point itself included when it is indexed.
    fn radius_query(&self, query: &[f32; 3], eps: f32) -> Vec<usize>;
}

/// Build the configured index variant over `coords`.
///
/// The returned index borrows `coords` and must not outlive it.
///
/// # Errors
///
/// Returns an error if the point count exceeds the index id width.
pub fn build_index(kind: IndexKind, coords: &[[f32; 3]]) -> Result<Box<dyn SpatialIndex + '_>> {
    if coords.len() > u32::MAX as usize {
        return Err(IndexError::TooManyPoints {
            n: coords.len(),
            max: u32::MAX as usize,
        });
    }

    match kind {
        IndexKind::BallTree => Ok(Box::new(BallTree::build(coords))),
        IndexKind::KdTree => Ok(Box::new(KdTreeIndex::build(coords))),
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    /// Reference implementation: linear scan.
    pub fn brute_force_radius(coords: &[[f32; 3]], query: &[f32; 3], eps: f32) -> Vec<usize> {
        coords
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                let dx = p[0] - query[0];
                let dy = p[1] - query[1];
                let dz = p[2] - query[2];
                (dx * dx + dy * dy + dz * dz).sqrt() <= eps
            })
            .map(|(i, _)| i)
            .collect()
    }
}
