//! Shared k-d tree and neighbourhood statistics utilities.
//!
//! Used by the solid-LiDAR extractor and by the registration
//! correspondence search.

use kiddo::SquaredEuclidean;
use nalgebra::{Matrix3, Vector3};

use crate::core::types::PointCloud;

/// K-d tree over point indices, with a bucket size large enough to hold
/// scans containing many points that share an exact coordinate on one
/// axis (e.g. a flat floor plane), which the default bucket size of 32
/// cannot.
pub type Tree = kiddo::float::kdtree::KdTree<f32, u64, 3, 4096, u32>;

/// Build a k-d tree over a point cloud. Items are point indices.
pub fn build_kdtree(cloud: &PointCloud) -> Tree {
    let mut tree: Tree = Tree::new();
    for (i, p) in cloud.points.iter().enumerate() {
        tree.add(&[p.x, p.y, p.z], i as u64);
    }
    tree
}

/// Indices and squared distances of the k nearest neighbours of `query`.
pub fn nearest_n(tree: &Tree, query: &[f32; 3], k: usize) -> Vec<(usize, f32)> {
    tree.nearest_n::<SquaredEuclidean>(query, k)
        .into_iter()
        .map(|n| (n.item as usize, n.distance))
        .collect()
}

/// Eigen-decomposition of a point neighbourhood's covariance.
///
/// Eigenvalues are sorted ascending, with `vectors[i]` the unit
/// eigenvector of `values[i]`. `values[0]` near zero means the
/// neighbourhood is planar; `values[2]` dominating `values[1]` means it
/// is linear.
#[derive(Debug, Clone)]
pub struct NeighborhoodBasis {
    /// Neighbourhood centroid
    pub centroid: Vector3<f64>,
    /// Eigenvalues, ascending
    pub values: [f64; 3],
    /// Unit eigenvectors matching `values`
    pub vectors: [Vector3<f64>; 3],
}

impl NeighborhoodBasis {
    /// Fit from a set of positions. Returns `None` for fewer than 3
    /// points (covariance rank-deficient by construction).
    pub fn fit(positions: &[Vector3<f64>]) -> Option<Self> {
        if positions.len() < 3 {
            return None;
        }

        let n = positions.len() as f64;
        let centroid = positions.iter().sum::<Vector3<f64>>() / n;

        let mut cov = Matrix3::zeros();
        for p in positions {
            let d = p - centroid;
            cov += d * d.transpose();
        }
        cov /= n;

        let eigen = nalgebra::SymmetricEigen::new(cov);
        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| {
            eigen.eigenvalues[a]
                .partial_cmp(&eigen.eigenvalues[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let values = [
            eigen.eigenvalues[order[0]],
            eigen.eigenvalues[order[1]],
            eigen.eigenvalues[order[2]],
        ];
        let vectors = [
            eigen.eigenvectors.column(order[0]).into_owned(),
            eigen.eigenvectors.column(order[1]).into_owned(),
            eigen.eigenvectors.column(order[2]).into_owned(),
        ];

        Some(Self {
            centroid,
            values,
            vectors,
        })
    }

    /// Principal axis (largest eigenvalue direction).
    #[inline]
    pub fn principal_axis(&self) -> Vector3<f64> {
        self.vectors[2]
    }

    /// Plane normal (smallest eigenvalue direction).
    #[inline]
    pub fn normal(&self) -> Vector3<f64> {
        self.vectors[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::LidarPoint;
    use approx::assert_relative_eq;

    #[test]
    fn test_kdtree_nearest() {
        let cloud: PointCloud = (0..10)
            .map(|i| LidarPoint::from_xyz(i as f32, 0.0, 0.0))
            .collect();
        let tree = build_kdtree(&cloud);

        let hits = nearest_n(&tree, &[3.2, 0.0, 0.0], 2);
        assert_eq!(hits[0].0, 3);
        assert_relative_eq!(hits[0].1, 0.04, epsilon = 1e-5);
    }

    #[test]
    fn test_linear_neighbourhood() {
        let positions: Vec<_> = (0..8)
            .map(|i| Vector3::new(i as f64 * 0.1, 0.0, 0.0))
            .collect();
        let basis = NeighborhoodBasis::fit(&positions).unwrap();

        assert!(basis.values[2] > 100.0 * basis.values[1].max(1e-12));
        assert_relative_eq!(basis.principal_axis().x.abs(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_planar_neighbourhood() {
        let mut positions = Vec::new();
        for i in 0..4 {
            for j in 0..4 {
                positions.push(Vector3::new(i as f64 * 0.1, j as f64 * 0.1, 0.0));
            }
        }
        let basis = NeighborhoodBasis::fit(&positions).unwrap();

        assert!(basis.values[0] < 1e-12);
        assert!(basis.values[1] > 1e-4);
        assert_relative_eq!(basis.normal().z.abs(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_degenerate_input() {
        assert!(NeighborhoodBasis::fit(&[Vector3::zeros()]).is_none());
    }
}
