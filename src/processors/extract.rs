//! Grouping labeled points into the cluster mapping.

use std::collections::BTreeMap;

/// Cluster id -> points assigned that id, in ascending point-id order.
///
/// Noise points (label -1) are deliberately absent: a noise point belongs to
/// no cluster and is not represented under any key. Serializes as a JSON
/// object with cluster ids as keys.
pub type ClusterMap = BTreeMap<i32, Vec<[f32; 3]>>;

/// Group coordinates by cluster label.
///
/// A single ascending pass over point ids, so the order of points inside each
/// cluster is the input order and the result is identical across repeated
/// calls on the same input. Labels must be -1 (noise, dropped) or a
/// nonnegative cluster id.
///
/// # Panics
///
/// Panics if `coords` and `labels` differ in length; the clusterer guarantees
/// one label per point.
pub fn extract_clusters(coords: &[[f32; 3]], labels: &[i32]) -> ClusterMap {
    assert_eq!(coords.len(), labels.len());

    let mut clusters = ClusterMap::new();
    for (coord, &label) in coords.iter().zip(labels.iter()) {
        if label >= 0 {
            clusters.entry(label).or_default().push(*coord);
        }
    }
    clusters
}
