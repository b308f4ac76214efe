//! LiDAR point and point cloud types.

use nalgebra::{Matrix4, Vector4};
use serde::{Deserialize, Serialize};

/// A single LiDAR return.
///
/// The `ring` index identifies the laser line and is meaningful only
/// for the spinning scanner; `time` is the relative offset within the
/// sweep in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LidarPoint {
    /// X coordinate in meters
    pub x: f32,
    /// Y coordinate in meters
    pub y: f32,
    /// Z coordinate in meters
    pub z: f32,
    /// Return intensity
    pub intensity: f32,
    /// Laser line index (spin-LiDAR only)
    pub ring: u16,
    /// Relative timestamp within the sweep, seconds
    pub time: f32,
}

impl LidarPoint {
    /// Create a point with position only.
    #[inline]
    pub fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            ..Default::default()
        }
    }

    /// Squared distance to another point.
    #[inline]
    pub fn distance_squared(&self, other: &LidarPoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }
}

/// A growable buffer of LiDAR points.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PointCloud {
    /// Point storage
    pub points: Vec<LidarPoint>,
}

impl PointCloud {
    /// Create an empty cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cloud with reserved capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    /// Number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Append a point.
    #[inline]
    pub fn push(&mut self, point: LidarPoint) {
        self.points.push(point);
    }

    /// Return a new cloud with every point moved by the homogeneous
    /// transform, attributes preserved.
    pub fn transformed(&self, m: &Matrix4<f64>) -> PointCloud {
        let mut out = PointCloud::with_capacity(self.len());
        out.extend_transformed(self, m);
        out
    }

    /// Append every point of `other` transformed by `m`.
    ///
    /// This is the concatenation primitive of the local-map rebuild:
    /// transformed outputs always land in fresh buffers.
    pub fn extend_transformed(&mut self, other: &PointCloud, m: &Matrix4<f64>) {
        self.points.reserve(other.len());
        for p in &other.points {
            let v = m * Vector4::new(p.x as f64, p.y as f64, p.z as f64, 1.0);
            self.points.push(LidarPoint {
                x: v.x as f32,
                y: v.y as f32,
                z: v.z as f32,
                ..*p
            });
        }
    }
}

impl FromIterator<LidarPoint> for PointCloud {
    fn from_iter<I: IntoIterator<Item = LidarPoint>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Transform;
    use approx::assert_relative_eq;

    #[test]
    fn test_distance_squared() {
        let a = LidarPoint::from_xyz(0.0, 0.0, 0.0);
        let b = LidarPoint::from_xyz(1.0, 2.0, 2.0);
        assert_relative_eq!(a.distance_squared(&b), 9.0);
    }

    #[test]
    fn test_transform_preserves_attributes() {
        let mut cloud = PointCloud::new();
        cloud.push(LidarPoint {
            x: 1.0,
            y: 0.0,
            z: 0.0,
            intensity: 42.0,
            ring: 7,
            time: 0.05,
        });

        let m = Transform::new(0.0, 1.0, 0.0, 0.0, 0.0, 0.0).to_matrix();
        let moved = cloud.transformed(&m);

        assert_relative_eq!(moved.points[0].x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(moved.points[0].y, 1.0, epsilon = 1e-6);
        assert_eq!(moved.points[0].ring, 7);
        assert_relative_eq!(moved.points[0].intensity, 42.0);
    }

    #[test]
    fn test_transform_rotation() {
        let mut cloud = PointCloud::new();
        cloud.push(LidarPoint::from_xyz(1.0, 0.0, 0.0));

        let m = Transform::new(0.0, 0.0, 0.0, 0.0, 0.0, std::f64::consts::FRAC_PI_2).to_matrix();
        let rotated = cloud.transformed(&m);

        assert_relative_eq!(rotated.points[0].x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(rotated.points[0].y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_extend_transformed_concatenates() {
        let mut acc = PointCloud::new();
        acc.push(LidarPoint::from_xyz(0.0, 0.0, 0.0));

        let mut other = PointCloud::new();
        other.push(LidarPoint::from_xyz(1.0, 1.0, 1.0));
        other.push(LidarPoint::from_xyz(2.0, 2.0, 2.0));

        acc.extend_transformed(&other, &Matrix4::identity());
        assert_eq!(acc.len(), 3);
    }
}
