//! KD-tree spatial index backed by kiddo.

use kiddo::{ImmutableKdTree, SquaredEuclidean};

use super::SpatialIndex;

/// kiddo `ImmutableKdTree` wrapper.
///
/// kiddo copies the coordinates into its own node layout at build time, so
/// unlike [`super::BallTree`] this variant holds no borrow of the input.
pub struct KdTreeIndex {
    // kiddo cannot represent an empty tree
    tree: Option<ImmutableKdTree<f32, 3>>,
    len: usize,
}

impl KdTreeIndex {
    /// Build a KD-tree over `coords`.
    pub fn build(coords: &[[f32; 3]]) -> Self {
        let tree = if coords.is_empty() {
            None
        } else {
            Some(ImmutableKdTree::new_from_slice(coords))
        };
        KdTreeIndex {
            tree,
            len: coords.len(),
        }
    }
}

impl SpatialIndex for KdTreeIndex {
    fn len(&self) -> usize {
        self.len
    }

    fn radius_query(&self, query: &[f32; 3], eps: f32) -> Vec<usize> {
        match &self.tree {
            None => Vec::new(),
            Some(tree) => tree
                .within::<SquaredEuclidean>(query, eps * eps)
                .iter()
                .map(|nn| nn.item as usize)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::index::test_util::brute_force_radius;

    #[test]
    fn test_matches_brute_force() {
        let coords: Vec<[f32; 3]> = (0..200)
            .map(|i| {
                let f = i as f32;
                [(f * 0.913).sin(), (f * 0.517).cos(), (f * 1.733).sin()]
            })
            .collect();
        let tree = KdTreeIndex::build(&coords);

        for query in coords.iter().step_by(23) {
            let mut got = tree.radius_query(query, 0.3);
            let mut want = brute_force_radius(&coords, query, 0.3);
            got.sort_unstable();
            want.sort_unstable();
            assert_eq!(got, want);
        }
    }

    #[test]
    fn test_empty_tree() {
        let tree = KdTreeIndex::build(&[]);
        assert!(tree.is_empty());
        assert!(tree.radius_query(&[0.0, 0.0, 0.0], 1.0).is_empty());
    }
}
