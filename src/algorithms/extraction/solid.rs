//! Solid-LiDAR feature extraction.
//!
//! Partitions a narrow-FoV scan into planar and non-planar points by
//! eigen-decomposition of each point's neighbourhood covariance, then
//! re-expresses both outputs in the spin-LiDAR frame via the sensor
//! extrinsic.

use std::sync::Arc;

use nalgebra::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};

use super::NotEnoughFeatures;
use crate::algorithms::knn::{build_kdtree, nearest_n, NeighborhoodBasis};
use crate::core::types::{FeatureObjects, PointCloud, Transform};

/// Configuration for the solid-LiDAR extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolidExtractorConfig {
    /// Neighbours per plane fit.
    pub neighbors: usize,
    /// Planar when the smallest eigenvalue is below this fraction of
    /// the middle one.
    pub planar_eigen_ratio: f64,
    /// Keep every n-th point as a candidate (1 = all).
    pub stride: usize,
}

impl Default for SolidExtractorConfig {
    fn default() -> Self {
        Self {
            neighbors: 8,
            planar_eigen_ratio: 0.1,
            stride: 1,
        }
    }
}

/// Plane / non-planar partitioner for narrow-FoV scans.
#[derive(Debug)]
pub struct SolidExtractor {
    config: SolidExtractorConfig,
    /// Solid→spin re-framing matrix (rigid inverse of the configured
    /// spin→solid extrinsic).
    extrinsic: Matrix4<f64>,
}

impl SolidExtractor {
    /// Create an extractor. `extrinsic` is the spin→solid 6-vector; the
    /// applied matrix is its rigid inverse so outputs land in the
    /// spin-LiDAR frame.
    pub fn new(config: SolidExtractorConfig, extrinsic: &Transform) -> Self {
        Self {
            config,
            extrinsic: crate::core::types::transform::invert_rigid(&extrinsic.to_matrix()),
        }
    }

    /// The applied solid→spin matrix.
    pub fn extrinsic_matrix(&self) -> &Matrix4<f64> {
        &self.extrinsic
    }

    /// Partition the scan and re-frame the outputs.
    ///
    /// Returns `NotEnoughFeatures` when either partition comes out
    /// empty.
    pub fn extract(&self, cloud: &PointCloud) -> Result<FeatureObjects, NotEnoughFeatures> {
        let mut plane = PointCloud::new();
        let mut non_planar = PointCloud::new();

        if cloud.len() > self.config.neighbors {
            let tree = build_kdtree(cloud);
            let mut positions = Vec::with_capacity(self.config.neighbors);

            for (i, p) in cloud.points.iter().enumerate() {
                if i % self.config.stride != 0 {
                    continue;
                }

                positions.clear();
                for (idx, _) in nearest_n(&tree, &[p.x, p.y, p.z], self.config.neighbors) {
                    let n = &cloud.points[idx];
                    positions.push(Vector3::new(n.x as f64, n.y as f64, n.z as f64));
                }

                match NeighborhoodBasis::fit(&positions) {
                    Some(basis)
                        if basis.values[0]
                            < self.config.planar_eigen_ratio * basis.values[1] =>
                    {
                        plane.push(*p)
                    }
                    _ => non_planar.push(*p),
                }
            }
        }

        if plane.is_empty() || non_planar.is_empty() {
            return Err(NotEnoughFeatures {
                reason: format!(
                    "solid features empty ({} plane, {} non-planar)",
                    plane.len(),
                    non_planar.len()
                ),
            });
        }

        Ok(FeatureObjects {
            line: None,
            plane: Some(Arc::new(plane.transformed(&self.extrinsic))),
            non_planar: Some(Arc::new(non_planar.transformed(&self.extrinsic))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::LidarPoint;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Wall grid plus a diffuse blob: one clearly planar region, one
    /// clearly volumetric region.
    fn wall_and_blob() -> PointCloud {
        let mut cloud = PointCloud::new();
        for i in 0..20 {
            for j in 0..20 {
                cloud.push(LidarPoint::from_xyz(5.0, i as f32 * 0.1, j as f32 * 0.1));
            }
        }
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..150 {
            cloud.push(LidarPoint::from_xyz(
                10.0 + rng.gen_range(-0.5..0.5),
                rng.gen_range(-0.5..0.5),
                rng.gen_range(-0.5..0.5),
            ));
        }
        cloud
    }

    #[test]
    fn test_partition_wall_and_blob() {
        let extractor = SolidExtractor::new(SolidExtractorConfig::default(), &Transform::identity());
        let features = extractor.extract(&wall_and_blob()).unwrap();

        let plane = features.plane.unwrap();
        let non_planar = features.non_planar.unwrap();

        // The wall dominates the planar set, the blob the rest.
        assert!(plane.len() > 300, "plane: {}", plane.len());
        assert!(non_planar.len() > 100, "non-planar: {}", non_planar.len());
        let strays = plane.points.iter().filter(|p| p.x > 6.0).count();
        assert!(strays < 15, "blob points classified planar: {}", strays);
    }

    #[test]
    fn test_extrinsic_reframes_outputs() {
        let extrinsic = Transform::new(0.0, -1.0, 0.0, 0.0, 0.0, 0.0);
        let extractor = SolidExtractor::new(SolidExtractorConfig::default(), &extrinsic);
        let features = extractor.extract(&wall_and_blob()).unwrap();

        // Inverse of a -1 m y offset shifts outputs by +1 m.
        let plane = features.plane.unwrap();
        let wall: Vec<_> = plane.points.iter().filter(|p| p.x < 6.0).collect();
        let mean_y: f32 = wall.iter().map(|p| p.y).sum::<f32>() / wall.len() as f32;
        assert_relative_eq!(mean_y, 0.95 + 1.0, epsilon = 0.05);
    }

    #[test]
    fn test_empty_partition_rejected() {
        // Pure wall: no non-planar points anywhere.
        let mut cloud = PointCloud::new();
        for i in 0..20 {
            for j in 0..20 {
                cloud.push(LidarPoint::from_xyz(5.0, i as f32 * 0.1, j as f32 * 0.1));
            }
        }
        let extractor = SolidExtractor::new(SolidExtractorConfig::default(), &Transform::identity());
        assert!(extractor.extract(&cloud).is_err());
    }
}
