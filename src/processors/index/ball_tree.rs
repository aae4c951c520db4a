//! Ball tree spatial index.
//!
//! Points are partitioned recursively into nested bounding spheres: each node
//! stores the centroid and radius covering every point in its subtree, leaves
//! reference a contiguous run of a permuted point-id array. A radius query
//! skips any subtree whose bounding sphere cannot intersect the query sphere,
//! giving O(log n + k) queries on roughly balanced data.

use super::SpatialIndex;

/// Leaves hold at most this many points.
const LEAF_SIZE: usize = 16;

/// Subtrees at or above this size are built on separate rayon workers.
const PARALLEL_BUILD_MIN: usize = 4096;

/// Ball tree over a borrowed coordinate slice.
///
/// The tree owns only point ids and bounding geometry; coordinates stay with
/// the caller. Immutable after [`BallTree::build`].
pub struct BallTree<'a> {
    coords: &'a [[f32; 3]],
    /// Point ids permuted so each node covers a contiguous range.
    ids: Vec<u32>,
    root: Option<Node>,
}

struct Node {
    centroid: [f32; 3],
    radius: f32,
    kind: NodeKind,
}

enum NodeKind {
    Leaf { start: usize, len: usize },
    Branch { left: Box<Node>, right: Box<Node> },
}

impl<'a> BallTree<'a> {
    /// Build a ball tree over `coords`.
    ///
    /// O(n log n): each level permutes the id array with a linear-time median
    /// partition. Large subtrees are built concurrently.
    pub fn build(coords: &'a [[f32; 3]]) -> Self {
        let mut ids: Vec<u32> = (0..coords.len() as u32).collect();
        let root = if ids.is_empty() {
            None
        } else {
            Some(build_node(coords, &mut ids, 0))
        };
        BallTree { coords, ids, root }
    }
}

impl SpatialIndex for BallTree<'_> {
    fn len(&self) -> usize {
        self.ids.len()
    }

    fn radius_query(&self, query: &[f32; 3], eps: f32) -> Vec<usize> {
        let mut out = Vec::new();
        let Some(root) = &self.root else {
            return out;
        };

        let eps_sq = eps * eps;
        let mut stack = vec![root];

        while let Some(node) = stack.pop() {
            // The query sphere misses this bounding sphere entirely
            if distance(query, &node.centroid) > node.radius + eps {
                continue;
            }

            match &node.kind {
                NodeKind::Leaf { start, len } => {
                    for &id in &self.ids[*start..*start + *len] {
                        if distance_sq(query, &self.coords[id as usize]) <= eps_sq {
                            out.push(id as usize);
                        }
                    }
                }
                NodeKind::Branch { left, right } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }

        out
    }
}

fn build_node(coords: &[[f32; 3]], ids: &mut [u32], offset: usize) -> Node {
    let (centroid, radius) = bounding_sphere(coords, ids);

    if ids.len() <= LEAF_SIZE {
        return Node {
            centroid,
            radius,
            kind: NodeKind::Leaf {
                start: offset,
                len: ids.len(),
            },
        };
    }

    // Split at the median of the axis with the greatest spread. Splitting by
    // position rather than value keeps the halves nonempty even when every
    // coordinate on the axis is equal.
    let axis = widest_axis(coords, ids);
    let mid = ids.len() / 2;
    ids.select_nth_unstable_by(mid, |&a, &b| {
        coords[a as usize][axis].total_cmp(&coords[b as usize][axis])
    });

    let (left_ids, right_ids) = ids.split_at_mut(mid);
    let (left, right) = if left_ids.len() + right_ids.len() >= PARALLEL_BUILD_MIN {
        rayon::join(
            || build_node(coords, left_ids, offset),
            || build_node(coords, right_ids, offset + mid),
        )
    } else {
        (
            build_node(coords, left_ids, offset),
            build_node(coords, right_ids, offset + mid),
        )
    };

    Node {
        centroid,
        radius,
        kind: NodeKind::Branch {
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}

/// Centroid and covering radius of the given points.
fn bounding_sphere(coords: &[[f32; 3]], ids: &[u32]) -> ([f32; 3], f32) {
    let mut centroid = [0.0f64; 3];
    for &id in ids {
        let p = coords[id as usize];
        for axis in 0..3 {
            centroid[axis] += p[axis] as f64;
        }
    }
    let n = ids.len() as f64;
    let centroid = [
        (centroid[0] / n) as f32,
        (centroid[1] / n) as f32,
        (centroid[2] / n) as f32,
    ];

    let mut radius = 0.0f32;
    for &id in ids {
        radius = radius.max(distance(&centroid, &coords[id as usize]));
    }

    (centroid, radius)
}

fn widest_axis(coords: &[[f32; 3]], ids: &[u32]) -> usize {
    let mut min = coords[ids[0] as usize];
    let mut max = min;
    for &id in &ids[1..] {
        let p = coords[id as usize];
        for axis in 0..3 {
            min[axis] = min[axis].min(p[axis]);
            max[axis] = max[axis].max(p[axis]);
        }
    }

    let mut best = 0;
    let mut best_extent = max[0] - min[0];
    for axis in 1..3 {
        let extent = max[axis] - min[axis];
        if extent > best_extent {
            best = axis;
            best_extent = extent;
        }
    }
    best
}

#[inline]
fn distance_sq(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

#[inline]
fn distance(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    distance_sq(a, b).sqrt()
}
