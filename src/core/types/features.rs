//! Feature containers and frame handoff types.

use std::sync::Arc;

use nalgebra::Matrix4;

use super::point::PointCloud;

/// Feature sets extracted from one sensor's frame.
///
/// Spin-LiDAR extraction populates `line` and `plane`; solid-LiDAR
/// extraction populates `plane` and `non_planar`. A disabled sensor
/// branch leaves all three empty.
///
/// Clouds are shared: once extracted they are immutable and travel the
/// pipeline by reference count, never by deep copy.
#[derive(Debug, Clone, Default)]
pub struct FeatureObjects {
    /// Sharp edge features (spin-LiDAR)
    pub line: Option<Arc<PointCloud>>,
    /// Locally planar features (both sensors)
    pub plane: Option<Arc<PointCloud>>,
    /// Residual non-planar features (solid-LiDAR)
    pub non_planar: Option<Arc<PointCloud>>,
}

impl FeatureObjects {
    /// Check whether every populated cloud meets the mapping-side
    /// minimum-yield gate (line ≥ 10, plane ≥ 100, non-planar ≥ 100).
    ///
    /// Absent clouds are not gated; a disabled sensor passes.
    pub fn yield_ok(&self) -> bool {
        if let Some(line) = &self.line {
            if line.len() < 10 {
                return false;
            }
        }
        if let Some(plane) = &self.plane {
            if plane.len() < 100 {
                return false;
            }
        }
        if let Some(non_planar) = &self.non_planar {
            if non_planar.len() < 100 {
                return false;
            }
        }
        true
    }

    /// True when no cloud is populated (disabled branch).
    pub fn is_empty(&self) -> bool {
        self.line.is_none() && self.plane.is_none() && self.non_planar.is_none()
    }
}

/// Extracted features for one synchronized frame, one group per sensor.
#[derive(Debug, Clone, Default)]
pub struct FeatureFrame {
    /// Spinning multi-line scanner features
    pub spin: FeatureObjects,
    /// Solid-state narrow-FoV scanner features
    pub solid: FeatureObjects,
}

/// Time-aligned raw cloud pair delivered by the frame-sync source.
#[derive(Debug, Clone)]
pub struct SyncedFrame {
    /// Raw spin-LiDAR sweep
    pub spin_cloud: Arc<PointCloud>,
    /// Raw solid-LiDAR scan
    pub solid_cloud: Arc<PointCloud>,
    /// Common wall-clock timestamp, microseconds since epoch
    pub timestamp_us: u64,
}

impl SyncedFrame {
    /// Timestamp as floating-point seconds.
    #[inline]
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp_us as f64 / 1e6
    }
}

/// A frame accepted into the local-map window: features plus the world
/// pose at which they were observed.
#[derive(Debug, Clone)]
pub struct Keyframe {
    /// Extracted features, in the sensor frame
    pub features: FeatureFrame,
    /// World pose at capture
    pub world_pose: Matrix4<f64>,
}
