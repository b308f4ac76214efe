//! Scan-to-local-map odometry driver.

use thiserror::Error;

use super::local_map::LocalMapWindow;
use crate::algorithms::registration::{Registration, RegistrationConfig};
use crate::core::types::{FeatureFrame, Transform};
use nalgebra::Matrix4;

/// Reason a frame was rejected by the odometry driver.
///
/// All variants are soft: the frame is dropped and no state advances.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackError {
    #[error("spin features not enough")]
    SpinFeatures,

    #[error("solid features not enough")]
    SolidFeatures,

    #[error("no feature found")]
    NoFeatureFound,
}

/// Per-frame registration driver.
///
/// Owns the local-map window and propagates the previously returned
/// transform as the next initial guess, which keeps the solver in its
/// basin of attraction across consecutive scans.
#[derive(Debug)]
pub struct ScanToMapOdometry {
    window: LocalMapWindow,
    registration: Registration,
    next_initial_guess: Transform,
}

impl ScanToMapOdometry {
    /// Create a driver with an empty window.
    pub fn new(config: RegistrationConfig) -> Self {
        Self {
            window: LocalMapWindow::new(),
            registration: Registration::new(config),
            next_initial_guess: Transform::identity(),
        }
    }

    /// The keyframe window.
    pub fn window(&self) -> &LocalMapWindow {
        &self.window
    }

    /// Mutable access for keyframe insertion and loop-closure rewrites.
    pub fn window_mut(&mut self) -> &mut LocalMapWindow {
        &mut self.window
    }

    /// Register a frame against the aggregate local map.
    ///
    /// Returns the transform relative to the head keyframe. On an empty
    /// window the frame seeds it at identity and the zero transform is
    /// returned.
    pub fn track(&mut self, frame: &FeatureFrame) -> Result<Transform, TrackError> {
        if !frame.spin.yield_ok() {
            return Err(TrackError::SpinFeatures);
        }
        if !frame.solid.yield_ok() {
            return Err(TrackError::SolidFeatures);
        }

        if self.window.is_empty() {
            self.window.push(frame.clone(), Matrix4::identity());
            return Ok(Transform::identity());
        }

        let Self {
            window,
            registration,
            next_initial_guess,
        } = self;

        let local_map = window.local_map();
        let result = registration.solve(frame, local_map, *next_initial_guess);

        if result.rows == 0 {
            return Err(TrackError::NoFeatureFound);
        }

        self.next_initial_guess = result.transform;
        Ok(result.transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{FeatureObjects, LidarPoint, PointCloud};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    /// Feature frame rich enough to pass every yield gate, with
    /// orthogonal structure for registration.
    pub(crate) fn rich_frame() -> FeatureFrame {
        let mut plane = PointCloud::new();
        for i in 0..20 {
            for j in 0..20 {
                let (a, b) = (i as f32 * 0.25, j as f32 * 0.25);
                plane.push(LidarPoint::from_xyz(a, b, 0.0));
                plane.push(LidarPoint::from_xyz(a, 5.0, b));
                plane.push(LidarPoint::from_xyz(5.0, a, b));
            }
        }
        let line: PointCloud = (0..40)
            .map(|i| LidarPoint::from_xyz(1.0, 1.0, i as f32 * 0.1))
            .collect();

        FeatureFrame {
            spin: FeatureObjects {
                line: Some(Arc::new(line)),
                plane: Some(Arc::new(plane)),
                non_planar: None,
            },
            solid: FeatureObjects::default(),
        }
    }

    #[test]
    fn test_identity_seeding() {
        let mut odometry = ScanToMapOdometry::new(RegistrationConfig::default());
        let transform = odometry.track(&rich_frame()).unwrap();

        assert_relative_eq!(transform.translation_norm_squared(), 0.0);
        assert_relative_eq!(transform.rotation_norm_squared(), 0.0);
        assert_eq!(odometry.window().len(), 1);
    }

    #[test]
    fn test_yield_gate_rejects_thin_frames() {
        let mut odometry = ScanToMapOdometry::new(RegistrationConfig::default());

        let thin: PointCloud = (0..5)
            .map(|i| LidarPoint::from_xyz(i as f32, 0.0, 0.0))
            .collect();
        let frame = FeatureFrame {
            spin: FeatureObjects {
                line: Some(Arc::new(thin)),
                plane: None,
                non_planar: None,
            },
            solid: FeatureObjects::default(),
        };

        assert_eq!(odometry.track(&frame), Err(TrackError::SpinFeatures));
        assert_eq!(odometry.window().len(), 0);
    }

    #[test]
    fn test_stationary_tracking_stays_put() {
        let mut odometry = ScanToMapOdometry::new(RegistrationConfig::default());
        let frame = rich_frame();

        odometry.track(&frame).unwrap();
        let transform = odometry.track(&frame).unwrap();

        assert!(transform.translation_norm_squared() < 1e-6);
        assert!(transform.rotation_norm_squared() < 1e-6);
        // No keyframe decision here: the window is driven by the caller.
        assert_eq!(odometry.window().len(), 1);
    }
}
