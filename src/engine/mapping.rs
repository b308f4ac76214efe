//! Mapping engine: keyframe gating, trajectory bookkeeping and loop
//! closure hookup.

use nalgebra::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};

use super::loop_closure::{LoopDetector, LoopManager, LoopManagerConfig};
use super::odometry::ScanToMapOdometry;
use crate::algorithms::registration::RegistrationConfig;
use crate::core::types::{FeatureFrame, PointCloud, Timestamped, Transform};

/// Per-axis keyframe admission thresholds.
///
/// A frame whose transform relative to the head keyframe stays below
/// every threshold is published but not inserted, which bounds memory
/// and keeps the local map from silting up while standing still.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KeyframeGates {
    /// Translation gate on x, meters.
    pub x: f64,
    /// Translation gate on y, meters.
    pub y: f64,
    /// Translation gate on z, meters.
    pub z: f64,
    /// Rotation gate on roll, radians.
    pub roll: f64,
    /// Rotation gate on pitch, radians.
    pub pitch: f64,
    /// Rotation gate on yaw, radians.
    pub yaw: f64,
}

impl Default for KeyframeGates {
    fn default() -> Self {
        Self {
            x: 0.5,
            y: 0.5,
            z: 0.1,
            roll: 0.02,
            pitch: 0.02,
            yaw: 0.02,
        }
    }
}

impl KeyframeGates {
    /// True when every component stays below its gate.
    pub fn below(&self, t: &Transform) -> bool {
        t.x.abs() < self.x
            && t.y.abs() < self.y
            && t.z.abs() < self.z
            && t.roll.abs() < self.roll
            && t.pitch.abs() < self.pitch
            && t.yaw.abs() < self.yaw
    }
}

/// Mapping engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Keyframe admission gates.
    pub keyframe_gates: KeyframeGates,
    /// Registration solver settings.
    pub registration: RegistrationConfig,
    /// Loop-closure settings.
    pub loop_closure: LoopManagerConfig,
    /// Master loop-closure switch.
    pub enable_loop: bool,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            keyframe_gates: KeyframeGates::default(),
            registration: RegistrationConfig::default(),
            loop_closure: LoopManagerConfig::default(),
            enable_loop: true,
        }
    }
}

/// Odometry driver plus trajectory and loop-closure state.
///
/// One instance lives inside the mapping worker; all state is
/// single-threaded.
pub struct MappingEngine {
    odometry: ScanToMapOdometry,
    loop_manager: LoopManager,
    gates: KeyframeGates,
    enable_loop: bool,
    trajectory: Vec<Timestamped<Matrix4<f64>>>,
}

impl MappingEngine {
    /// Create an engine around a loop detector.
    pub fn new(config: MappingConfig, detector: Box<dyn LoopDetector>) -> Self {
        Self {
            odometry: ScanToMapOdometry::new(config.registration),
            loop_manager: LoopManager::new(config.loop_closure, detector),
            gates: config.keyframe_gates,
            enable_loop: config.enable_loop,
            trajectory: Vec::new(),
        }
    }

    /// Stamped world pose per accepted keyframe, insertion order.
    pub fn trajectory(&self) -> &[Timestamped<Matrix4<f64>>] {
        &self.trajectory
    }

    /// Loop-edge marker endpoints, two points per edge.
    pub fn loop_markers(&self) -> &[(Vector3<f64>, Vector3<f64>)] {
        self.loop_manager.markers()
    }

    /// Number of keyframes currently in the local-map window.
    pub fn window_len(&self) -> usize {
        self.odometry.window().len()
    }

    /// Process one feature frame.
    ///
    /// Returns the world pose to publish, or `None` when the frame was
    /// dropped. Keyframe insertion, trajectory growth and loop-closure
    /// rewriting all happen here.
    pub fn process(
        &mut self,
        raw_spin: &PointCloud,
        frame: &FeatureFrame,
        timestamp_us: u64,
    ) -> Option<Matrix4<f64>> {
        let seeding = self.odometry.window().is_empty();

        let relative = match self.odometry.track(frame) {
            Ok(t) => t,
            Err(reason) => {
                log::info!("frame dropped: {}", reason);
                return None;
            }
        };

        let world = if seeding {
            Matrix4::identity()
        } else {
            self.odometry.window().head_pose() * relative.to_matrix()
        };

        // Sub-threshold motion: publish the pose, keep the window as is.
        if !seeding && self.gates.below(&relative) {
            return Some(world);
        }

        if !seeding {
            self.odometry.window_mut().push(frame.clone(), world);
        }
        self.trajectory.push(Timestamped::new(world, timestamp_us));

        if self.enable_loop {
            if let Some(correction) = self.loop_manager.on_keyframe(raw_spin, &frame.spin, &world)
            {
                let window = self.odometry.window_mut();
                for i in 1..=window.len() {
                    window.set(i, self.loop_manager.pose_back(i));
                }
                for i in correction.start_index..self.trajectory.len() {
                    self.trajectory[i].data = self.loop_manager.pose(i);
                }
                return Some(correction.current_pose);
            }
        }

        Some(world)
    }
}
