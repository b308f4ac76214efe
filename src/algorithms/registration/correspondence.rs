//! Correspondence search against local-map feature clouds.

use nalgebra::Vector3;
use std::sync::Arc;

use crate::algorithms::knn::{build_kdtree, nearest_n, NeighborhoodBasis, Tree as KdTree};
use crate::core::types::{FeatureObjects, PointCloud};

/// Neighbours used for line and plane fitting.
const FIT_NEIGHBORS: usize = 5;

/// Squared distance gate on the nearest neighbour of a correspondence.
const MAX_DISTANCE_SQ: f32 = 1.0;

/// Largest eigenvalue must dominate the second by this factor for a
/// line fit to be accepted.
const LINE_EIGEN_FACTOR: f64 = 3.0;

/// Smallest eigenvalue must be below this fraction of the
/// second-smallest for a plane fit to be accepted.
const PLANE_EIGEN_RATIO: f64 = 0.1;

/// A correspondence reduced to its residual geometry: unit direction of
/// steepest residual growth and the signed residual value.
#[derive(Debug, Clone, Copy)]
pub struct PointMatch {
    /// Unit residual direction
    pub direction: Vector3<f64>,
    /// Residual value in meters
    pub residual: f64,
}

/// Searchable view over one sensor's local-map feature clouds.
///
/// Holds a k-d tree per populated cloud; built once per registration
/// call and queried every iteration.
pub struct FeatureAdapter {
    line: Option<(Arc<PointCloud>, KdTree)>,
    plane: Option<(Arc<PointCloud>, KdTree)>,
    non_planar: Option<(Arc<PointCloud>, KdTree)>,
}

impl FeatureAdapter {
    /// Index the populated clouds of a feature group.
    pub fn new(features: &FeatureObjects) -> Self {
        let index = |cloud: &Option<Arc<PointCloud>>| {
            cloud
                .as_ref()
                .filter(|c| !c.is_empty())
                .map(|c| (c.clone(), build_kdtree(c)))
        };
        Self {
            line: index(&features.line),
            plane: index(&features.plane),
            non_planar: index(&features.non_planar),
        }
    }

    /// Point-to-line correspondence: fit a line through the k nearest
    /// map line features and measure the perpendicular distance.
    pub fn line_match(&self, q: &Vector3<f64>) -> Option<PointMatch> {
        let (cloud, tree) = self.line.as_ref()?;
        let basis = fit_neighborhood(cloud, tree, q)?;

        if basis.values[2] < LINE_EIGEN_FACTOR * basis.values[1] {
            return None;
        }

        let axis = basis.principal_axis();
        let offset = q - basis.centroid;
        let perp = offset - axis * offset.dot(&axis);
        let distance = perp.norm();
        if distance < 1e-9 {
            return None;
        }

        Some(PointMatch {
            direction: perp / distance,
            residual: distance,
        })
    }

    /// Point-to-plane correspondence: fit a plane through the k nearest
    /// map plane features and measure the signed distance.
    pub fn plane_match(&self, q: &Vector3<f64>) -> Option<PointMatch> {
        let (cloud, tree) = self.plane.as_ref()?;
        let basis = fit_neighborhood(cloud, tree, q)?;

        if basis.values[0] >= PLANE_EIGEN_RATIO * basis.values[1] {
            return None;
        }

        let normal = basis.normal();
        Some(PointMatch {
            direction: normal,
            residual: normal.dot(&(q - basis.centroid)),
        })
    }

    /// Point-to-point correspondence with a distance gate.
    pub fn point_match(&self, q: &Vector3<f64>) -> Option<PointMatch> {
        let (cloud, tree) = self.non_planar.as_ref()?;
        let hits = nearest_n(tree, &[q.x as f32, q.y as f32, q.z as f32], 1);
        let (idx, dist_sq) = *hits.first()?;
        if dist_sq > MAX_DISTANCE_SQ {
            return None;
        }

        let t = &cloud.points[idx];
        let offset = q - Vector3::new(t.x as f64, t.y as f64, t.z as f64);
        let distance = offset.norm();
        if distance < 1e-9 {
            return None;
        }

        Some(PointMatch {
            direction: offset / distance,
            residual: distance,
        })
    }
}

/// Gather the k nearest neighbours of `q` and eigen-decompose them.
///
/// Rejects when the closest neighbour falls outside the distance gate.
fn fit_neighborhood(
    cloud: &PointCloud,
    tree: &KdTree,
    q: &Vector3<f64>,
) -> Option<NeighborhoodBasis> {
    let hits = nearest_n(tree, &[q.x as f32, q.y as f32, q.z as f32], FIT_NEIGHBORS);
    if hits.is_empty() || hits[0].1 > MAX_DISTANCE_SQ {
        return None;
    }

    let positions: Vec<Vector3<f64>> = hits
        .iter()
        .map(|&(idx, _)| {
            let p = &cloud.points[idx];
            Vector3::new(p.x as f64, p.y as f64, p.z as f64)
        })
        .collect();

    NeighborhoodBasis::fit(&positions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::LidarPoint;
    use approx::assert_relative_eq;

    fn pole_cloud() -> FeatureObjects {
        let cloud: PointCloud = (0..20)
            .map(|i| LidarPoint::from_xyz(1.0, 2.0, i as f32 * 0.1))
            .collect();
        FeatureObjects {
            line: Some(Arc::new(cloud)),
            plane: None,
            non_planar: None,
        }
    }

    fn floor_cloud() -> FeatureObjects {
        let mut cloud = PointCloud::new();
        for i in 0..15 {
            for j in 0..15 {
                cloud.push(LidarPoint::from_xyz(i as f32 * 0.2, j as f32 * 0.2, 0.0));
            }
        }
        FeatureObjects {
            line: None,
            plane: Some(Arc::new(cloud)),
            non_planar: None,
        }
    }

    #[test]
    fn test_line_match_perpendicular_distance() {
        let adapter = FeatureAdapter::new(&pole_cloud());
        let m = adapter.line_match(&Vector3::new(1.3, 2.0, 0.5)).unwrap();

        assert_relative_eq!(m.residual, 0.3, epsilon = 1e-6);
        assert_relative_eq!(m.direction.x, 1.0, epsilon = 1e-6);
        // Residual direction is perpendicular to the pole axis.
        assert_relative_eq!(m.direction.z, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_line_match_gated_by_distance() {
        let adapter = FeatureAdapter::new(&pole_cloud());
        assert!(adapter.line_match(&Vector3::new(4.0, 2.0, 0.5)).is_none());
    }

    #[test]
    fn test_plane_match_signed_distance() {
        let adapter = FeatureAdapter::new(&floor_cloud());

        let above = adapter.plane_match(&Vector3::new(1.0, 1.0, 0.2)).unwrap();
        let below = adapter.plane_match(&Vector3::new(1.0, 1.0, -0.2)).unwrap();

        assert_relative_eq!(above.residual.abs(), 0.2, epsilon = 1e-6);
        assert_relative_eq!(below.residual.abs(), 0.2, epsilon = 1e-6);
        assert!(above.residual * below.residual < 0.0, "signs must differ");
    }

    #[test]
    fn test_plane_match_rejects_linear_neighborhood() {
        // Plane cloud that is actually a line: plane fit must refuse.
        let cloud: PointCloud = (0..20)
            .map(|i| LidarPoint::from_xyz(i as f32 * 0.1, 0.0, 0.0))
            .collect();
        let features = FeatureObjects {
            line: None,
            plane: Some(Arc::new(cloud)),
            non_planar: None,
        };
        let adapter = FeatureAdapter::new(&features);
        assert!(adapter.plane_match(&Vector3::new(0.5, 0.1, 0.0)).is_none());
    }

    #[test]
    fn test_point_match() {
        let cloud: PointCloud = vec![
            LidarPoint::from_xyz(1.0, 0.0, 0.0),
            LidarPoint::from_xyz(5.0, 5.0, 5.0),
        ]
        .into_iter()
        .collect();
        let features = FeatureObjects {
            line: None,
            plane: None,
            non_planar: Some(Arc::new(cloud)),
        };
        let adapter = FeatureAdapter::new(&features);

        let m = adapter.point_match(&Vector3::new(1.5, 0.0, 0.0)).unwrap();
        assert_relative_eq!(m.residual, 0.5, epsilon = 1e-6);
        assert_relative_eq!(m.direction.x, 1.0, epsilon = 1e-6);

        // Far from everything: gated out.
        assert!(adapter.point_match(&Vector3::new(20.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn test_missing_cloud_yields_no_match() {
        let adapter = FeatureAdapter::new(&FeatureObjects::default());
        assert!(adapter.line_match(&Vector3::zeros()).is_none());
        assert!(adapter.plane_match(&Vector3::zeros()).is_none());
        assert!(adapter.point_match(&Vector3::zeros()).is_none());
    }
}
