//! DBSCAN density clustering for 3D point clouds.
//!
//! The pipeline here is: min-max normalize the cloud, build a spatial index
//! over the normalized coordinates, precompute eps-neighborhoods in parallel
//! (`rayon`), then run a sequential breadth-first label expansion. The index
//! is immutable after construction, so the parallel phase needs no locking;
//! the label array has a single owner throughout the sequential phase.
//!
//! Labels are deterministic: points are seeded in ascending id order and
//! cluster ids are allocated in discovery order starting at 0, so identical
//! input and parameters always produce identical labels regardless of the
//! index variant.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use rayon::prelude::*;
use thiserror::Error;

use crate::config::ClusteringConfig;
use crate::core::loaders::PointCloud;
use crate::processors::extract::{extract_clusters, ClusterMap};
use crate::processors::index::{build_index, IndexError, SpatialIndex};
use crate::processors::normalize::{normalize, NormalizationParams};

/// Label for points not density-reachable from any core point.
pub const NOISE: i32 = -1;

// Internal marker for points not yet touched by the expansion.
const UNCLASSIFIED: i32 = -2;

/// Errors that can occur during clustering.
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("invalid eps {0}: must be a positive finite number")]
    InvalidEps(f32),

    #[error("invalid min_pts {0}: must be at least 1")]
    InvalidMinPts(usize),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("clustering deadline exceeded with {assigned} of {total} points labeled")]
    Cancelled { assigned: usize, total: usize },
}

/// Result type for clustering operations.
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Everything one pipeline invocation produces.
#[derive(Debug, Clone)]
pub struct ClusterOutcome {
    /// One label per point id: -1 for noise, otherwise a cluster id.
    pub labels: Vec<i32>,
    /// Normalized coordinates, in point-id order.
    pub normalized: Vec<[f32; 3]>,
    /// Normalization applied to the raw coordinates.
    pub params: NormalizationParams,
    /// Cluster id -> normalized points, noise omitted.
    pub clusters: ClusterMap,
}

impl ClusterOutcome {
    /// Number of clusters found.
    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    /// Number of noise points.
    pub fn noise_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l == NOISE).count()
    }
}

/// Assign a DBSCAN label to every point.
///
/// `index` must be built over `coords`; neighborhoods are looked up through
/// it, so eps is interpreted in the same (normalized) space. A point whose
/// eps-neighborhood (itself included) holds at least `min_pts` points is a
/// core point; every point density-reachable from a core point joins that
/// cluster, everything else is noise.
///
/// Points marked noise early may be absorbed later as border points of a
/// cluster discovered from another seed; border points are labeled but never
/// expand the frontier.
///
/// The optional `deadline` is checked at every frontier-expansion step;
/// exceeding it aborts with [`ClusterError::Cancelled`] rather than
/// returning a silently truncated labeling.
///
/// # Errors
///
/// Returns an error for non-positive `eps`, `min_pts` of zero, or an expired
/// deadline. Empty input yields an empty label vector, not an error.
pub fn dbscan_labels(
    index: &dyn SpatialIndex,
    coords: &[[f32; 3]],
    eps: f32,
    min_pts: usize,
    deadline: Option<Instant>,
) -> Result<Vec<i32>> {
    // Parameter validation happens before any computation
    if !eps.is_finite() || eps <= 0.0 {
        return Err(ClusterError::InvalidEps(eps));
    }
    if min_pts < 1 {
        return Err(ClusterError::InvalidMinPts(min_pts));
    }

    let n = coords.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    debug_assert_eq!(n, index.len());

    // Phase 1: parallel neighbor precompute. The index is read-only, so
    // queries run concurrently without synchronization. Every neighborhood
    // includes the point itself.
    let neighbors: Vec<Vec<usize>> = coords
        .par_iter()
        .map(|coord| index.radius_query(coord, eps))
        .collect();

    // Phase 2: sequential breadth-first expansion. The label array is the
    // only mutable state and has a single owner; an explicit queue replaces
    // recursion so cluster depth never grows the call stack.
    let mut labels = vec![UNCLASSIFIED; n];
    let mut queue: VecDeque<usize> = VecDeque::new();
    let mut cluster_id: i32 = 0;

    for point_id in 0..n {
        check_deadline(deadline, &labels)?;

        if labels[point_id] != UNCLASSIFIED {
            continue;
        }

        if neighbors[point_id].len() < min_pts {
            // Provisional: may be promoted to a border point later
            labels[point_id] = NOISE;
            continue;
        }

        // Core point: the smallest unvisited core id always seeds the next
        // cluster, which fixes the id assignment across runs.
        labels[point_id] = cluster_id;
        queue.clear();
        queue.extend(neighbors[point_id].iter().copied());

        while let Some(next) = queue.pop_front() {
            check_deadline(deadline, &labels)?;

            if labels[next] >= 0 {
                continue;
            }
            let was_noise = labels[next] == NOISE;
            labels[next] = cluster_id;

            // A noise-marked point is already known non-core; border points
            // are labeled but never propagate.
            if !was_noise && neighbors[next].len() >= min_pts {
                for &nn in &neighbors[next] {
                    if labels[nn] == UNCLASSIFIED || labels[nn] == NOISE {
                        queue.push_back(nn);
                    }
                }
            }
        }

        cluster_id += 1;
    }

    Ok(labels)
}

fn check_deadline(deadline: Option<Instant>, labels: &[i32]) -> Result<()> {
    if let Some(deadline) = deadline {
        if Instant::now() >= deadline {
            let assigned = labels.iter().filter(|&&l| l != UNCLASSIFIED).count();
            return Err(ClusterError::Cancelled {
                assigned,
                total: labels.len(),
            });
        }
    }
    Ok(())
}

/// Run the full clustering pipeline on a point cloud.
///
/// Normalizes the coordinates, builds the configured index variant over the
/// normalized set, labels every point, and groups the labeled points into
/// the cluster mapping. All intermediate state is scoped to this call.
///
/// The mapping holds normalized coordinates, matching what the labels were
/// computed over; raw coordinates are recoverable by point id.
pub fn cluster_point_cloud(cloud: &PointCloud, config: &ClusteringConfig) -> Result<ClusterOutcome> {
    let deadline = config
        .timeout_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));

    let coords = cloud.to_coords();
    let (normalized, params) = normalize(&coords);

    // The index borrows the normalized coordinates, so it must go out of
    // scope before they move into the outcome.
    let (labels, clusters) = {
        let index = build_index(config.index, &normalized)?;
        log::debug!(
            "built {} index over {} normalized points",
            config.index,
            normalized.len()
        );

        let labels = dbscan_labels(
            index.as_ref(),
            &normalized,
            config.eps,
            config.min_pts,
            deadline,
        )?;
        let clusters = extract_clusters(&normalized, &labels);
        (labels, clusters)
    };

    Ok(ClusterOutcome {
        labels,
        normalized,
        params,
        clusters,
    })
}

/// Process a `.pts` file: load, cluster, and save results.
///
/// Writes `<stem>_clusters.json` (the cluster mapping) and
/// `<stem>_labels.csv` (normalized coordinates with labels) into
/// `output_dir`, defaulting to the input file's directory.
///
/// # Errors
///
/// Returns an error if loading, clustering, or writing fails.
pub fn process_pts_clustering(
    pts_path: &Path,
    output_dir: Option<&Path>,
    config: &ClusteringConfig,
) -> anyhow::Result<(PathBuf, ClusterOutcome)> {
    use crate::core::loaders::load_pts;
    use crate::core::writers::{write_clusters_json, write_labels_csv};

    let cloud = load_pts(pts_path)
        .with_context(|| format!("failed to load {}", pts_path.display()))?;

    let file_name = pts_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");
    log::info!("{}: clustering {} points", file_name, cloud.len());

    let outcome = cluster_point_cloud(&cloud, config)?;
    log::info!(
        "{}: {} clusters, {} noise points",
        file_name,
        outcome.cluster_count(),
        outcome.noise_count()
    );

    let out_dir = output_dir
        .map(PathBuf::from)
        .unwrap_or_else(|| pts_path.parent().unwrap_or(Path::new(".")).to_path_buf());
    let stem = pts_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");

    let json_path = out_dir.join(format!("{}_clusters.json", stem));
    write_clusters_json(&json_path, &outcome.clusters)
        .with_context(|| format!("failed to write {}", json_path.display()))?;
    log::info!("Cluster mapping -> {}", json_path.display());

    let csv_path = out_dir.join(format!("{}_labels.csv", stem));
    write_labels_csv(&csv_path, &outcome.normalized, &outcome.labels)
        .with_context(|| format!("failed to write {}", csv_path.display()))?;
    log::info!("Labels CSV -> {}", csv_path.display());

    Ok((json_path, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexKind;

    fn run_dbscan(coords: &[[f32; 3]], eps: f32, min_pts: usize) -> Vec<i32> {
        let index = build_index(IndexKind::BallTree, coords).unwrap();
        dbscan_labels(index.as_ref(), coords, eps, min_pts, None).unwrap()
    }

    #[test]
    fn test_tight_triangle_single_cluster() {
        // Pairwise distances all below eps, min_pts met exactly
        let coords = vec![[0.0, 0.0, 0.0], [0.1, 0.0, 0.0], [0.0, 0.1, 0.0]];
        let labels = run_dbscan(&coords, 0.5, 3);
        assert_eq!(labels, vec![0, 0, 0]);
    }

    #[test]
    fn test_triangle_plus_outlier() {
        let coords = vec![
            [0.0, 0.0, 0.0],
            [0.1, 0.0, 0.0],
            [0.0, 0.1, 0.0],
            [10.0, 10.0, 10.0],
        ];
        let labels = run_dbscan(&coords, 0.5, 3);
        assert_eq!(labels, vec![0, 0, 0, NOISE]);
    }

    #[test]
    fn test_empty_input() {
        let labels = run_dbscan(&[], 0.5, 3);
        assert!(labels.is_empty());
    }

    #[test]
    fn test_single_point_is_noise() {
        let labels = run_dbscan(&[[0.0, 0.0, 0.0]], 0.5, 2);
        assert_eq!(labels, vec![NOISE]);
    }

    #[test]
    fn test_min_pts_one_clusters_everything() {
        // With min_pts = 1 every point is core (its neighborhood holds itself)
        let coords = vec![[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [20.0, 0.0, 0.0]];
        let labels = run_dbscan(&coords, 0.5, 1);
        assert_eq!(labels, vec![0, 1, 2]);
    }

    #[test]
    fn test_two_separated_clusters() {
        let coords = vec![
            [0.0, 0.0, 0.0],
            [0.1, 0.0, 0.0],
            [0.0, 0.1, 0.0],
            [0.1, 0.1, 0.0],
            [5.0, 5.0, 0.0],
            [5.1, 5.0, 0.0],
            [5.0, 5.1, 0.0],
            [5.1, 5.1, 0.0],
        ];
        let labels = run_dbscan(&coords, 0.3, 3);

        assert_eq!(labels[..4], [0, 0, 0, 0]);
        assert_eq!(labels[4..], [1, 1, 1, 1]);
    }

    #[test]
    fn test_chain_connects_into_one_cluster() {
        let coords: Vec<[f32; 3]> = (0..10).map(|i| [i as f32 * 0.3, 0.0, 0.0]).collect();
        let labels = run_dbscan(&coords, 0.5, 2);
        assert!(labels.iter().all(|&l| l == 0));
    }

    #[test]
    fn test_noise_promoted_to_border_point() {
        // Points 0 and 1 are visited first, have too few neighbors, and are
        // marked noise; the cluster seeded later from point 2 reaches point 1
        // and must promote it to a border point. Point 0 stays noise.
        let coords = vec![
            [0.0, 0.0, 0.0],
            [0.4, 0.0, 0.0],
            [0.8, 0.0, 0.0],
            [1.2, 0.0, 0.0],
            [0.8, 0.4, 0.0],
        ];
        let labels = run_dbscan(&coords, 0.5, 4);

        // Neighborhoods within 0.5: p0:{0,1}, p1:{0,1,2}, p2:{1,2,3,4},
        // p3:{2,3}, p4:{2,4} -> only p2 is core.
        assert_eq!(labels[2], 0);
        assert_eq!(labels[1], 0);
        assert_eq!(labels[3], 0);
        assert_eq!(labels[4], 0);
        assert_eq!(labels[0], NOISE);
    }

    #[test]
    fn test_labels_are_contiguous_from_zero() {
        let coords = vec![
            [0.0, 0.0, 0.0],
            [0.1, 0.0, 0.0],
            [5.0, 0.0, 0.0],
            [5.1, 0.0, 0.0],
            [10.0, 0.0, 0.0],
            [10.1, 0.0, 0.0],
        ];
        let labels = run_dbscan(&coords, 0.3, 2);

        let max = labels.iter().copied().max().unwrap();
        assert_eq!(max, 2);
        for id in 0..=max {
            assert!(labels.contains(&id), "cluster id {} missing", id);
        }
    }

    #[test]
    fn test_determinism_across_runs_and_variants() {
        let coords: Vec<[f32; 3]> = (0..120)
            .map(|i| {
                let f = i as f32;
                [(f * 0.37).sin(), (f * 0.73).cos(), (f * 0.11).sin()]
            })
            .collect();

        let first = run_dbscan(&coords, 0.2, 4);
        let second = run_dbscan(&coords, 0.2, 4);
        assert_eq!(first, second);

        let kd = build_index(IndexKind::KdTree, &coords).unwrap();
        let kd_labels = dbscan_labels(kd.as_ref(), &coords, 0.2, 4, None).unwrap();
        assert_eq!(first, kd_labels);
    }

    #[test]
    fn test_invalid_parameters() {
        let coords = vec![[0.0, 0.0, 0.0]];
        let index = build_index(IndexKind::BallTree, &coords).unwrap();

        assert!(matches!(
            dbscan_labels(index.as_ref(), &coords, 0.0, 3, None),
            Err(ClusterError::InvalidEps(_))
        ));
        assert!(matches!(
            dbscan_labels(index.as_ref(), &coords, -1.0, 3, None),
            Err(ClusterError::InvalidEps(_))
        ));
        assert!(matches!(
            dbscan_labels(index.as_ref(), &coords, f32::NAN, 3, None),
            Err(ClusterError::InvalidEps(_))
        ));
        assert!(matches!(
            dbscan_labels(index.as_ref(), &coords, 0.5, 0, None),
            Err(ClusterError::InvalidMinPts(0))
        ));
    }

    #[test]
    fn test_expired_deadline_cancels() {
        // Enough connected points that at least one frontier step runs
        let coords: Vec<[f32; 3]> = (0..20).map(|i| [i as f32 * 0.1, 0.0, 0.0]).collect();
        let index = build_index(IndexKind::BallTree, &coords).unwrap();

        let past = Instant::now() - Duration::from_secs(1);
        let result = dbscan_labels(index.as_ref(), &coords, 0.15, 2, Some(past));

        match result {
            Err(ClusterError::Cancelled { assigned, total }) => {
                assert_eq!(total, 20);
                assert!(assigned < total);
            }
            other => panic!("expected Cancelled, got {:?}", other),
        }
    }

    #[test]
    fn test_cluster_point_cloud_identical_points() {
        // Zero extent on every axis: normalization must not fail and all
        // points land within eps of each other.
        let mut cloud = PointCloud::new();
        for _ in 0..12 {
            cloud.push(4.0, 4.0, 4.0);
        }

        let config = ClusteringConfig {
            eps: 0.02,
            min_pts: 10,
            ..Default::default()
        };
        let outcome = cluster_point_cloud(&cloud, &config).unwrap();

        assert!(outcome.labels.iter().all(|&l| l == 0));
        assert_eq!(outcome.cluster_count(), 1);
        assert_eq!(outcome.noise_count(), 0);
        assert_eq!(outcome.clusters[&0].len(), 12);
    }

    #[test]
    fn test_cluster_point_cloud_empty() {
        let cloud = PointCloud::new();
        let outcome = cluster_point_cloud(&cloud, &ClusteringConfig::default()).unwrap();

        assert!(outcome.labels.is_empty());
        assert!(outcome.clusters.is_empty());
    }

    #[test]
    fn test_process_pts_clustering_writes_outputs() {
        use std::io::Write;
        let dir = tempfile::tempdir().unwrap();
        let pts = dir.path().join("scan.pts");
        let mut file = std::fs::File::create(&pts).unwrap();
        // Two tight groups in raw space stay tight after normalization
        for i in 0..10 {
            writeln!(file, "{} 0 0", i as f32 * 0.001).unwrap();
        }
        for i in 0..10 {
            writeln!(file, "{} 100 100", 100.0 + i as f32 * 0.001).unwrap();
        }
        drop(file);

        let config = ClusteringConfig {
            eps: 0.05,
            min_pts: 5,
            ..Default::default()
        };
        let (json_path, outcome) =
            process_pts_clustering(&pts, Some(dir.path()), &config).unwrap();

        assert!(json_path.ends_with("scan_clusters.json"));
        assert!(json_path.exists());
        assert!(dir.path().join("scan_labels.csv").exists());
        assert_eq!(outcome.cluster_count(), 2);
        assert_eq!(outcome.labels.len(), 20);
    }
}
