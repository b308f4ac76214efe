//! Publishing sink contract and message types.
//!
//! The pipeline publishes value-copied messages; the sink decides how
//! to transport them. [`ChannelSink`] fans messages out over a
//! crossbeam channel, [`NullSink`] swallows them (tests, headless
//! runs).

use crossbeam_channel::Sender;
use nalgebra::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};

use crate::core::types::{PointCloud, Transform};

/// Frame id carried by every map-frame message.
pub const MAP_FRAME: &str = "map";

/// Child frame of the pose broadcast.
pub const SPIN_LIDAR_FRAME: &str = "spin_lidar";

/// Which sensor a published cloud came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorKind {
    /// Spinning multi-line scanner.
    Spin,
    /// Solid-state narrow-FoV scanner.
    Solid,
}

/// Pose expressed as translation plus unit quaternion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoseMsg {
    /// Translation, meters
    pub position: [f64; 3],
    /// Orientation quaternion (x, y, z, w)
    pub orientation: [f64; 4],
}

impl PoseMsg {
    /// Convert a homogeneous world pose.
    pub fn from_matrix(m: &Matrix4<f64>) -> Self {
        let t = Transform::from_matrix(m);
        let q = t.to_quaternion();
        Self {
            position: [t.x, t.y, t.z],
            orientation: [q.coords.x, q.coords.y, q.coords.z, q.coords.w],
        }
    }
}

/// Transform broadcast: frame "map" → frame "spin_lidar".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformMsg {
    /// Parent frame id
    pub frame_id: String,
    /// Child frame id
    pub child_frame_id: String,
    /// Timestamp, microseconds
    pub timestamp_us: u64,
    /// The pose
    pub pose: PoseMsg,
}

/// A stamped pose within a path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseStampedMsg {
    /// Timestamp, microseconds
    pub timestamp_us: u64,
    /// The pose
    pub pose: PoseMsg,
}

/// Cumulative trajectory, frame "map".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathMsg {
    /// Frame id, always "map"
    pub frame_id: String,
    /// Timestamp of the latest update, microseconds
    pub timestamp_us: u64,
    /// Stamped keyframe poses, insertion order
    pub poses: Vec<PoseStampedMsg>,
}

/// A globally transformed point cloud, frame "map".
#[derive(Debug, Clone)]
pub struct CloudMsg {
    /// Frame id, always "map"
    pub frame_id: String,
    /// Source sensor
    pub sensor: SensorKind,
    /// Timestamp, microseconds
    pub timestamp_us: u64,
    /// The transformed cloud
    pub cloud: PointCloud,
}

/// Loop-edge marker set: two 3D points per edge, frame "map".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopMarkerMsg {
    /// Frame id, always "map"
    pub frame_id: String,
    /// Timestamp, microseconds
    pub timestamp_us: u64,
    /// Flattened (source, target) endpoint pairs
    pub points: Vec<[f64; 3]>,
}

impl LoopMarkerMsg {
    /// Build from the loop manager's endpoint pairs.
    pub fn from_pairs(pairs: &[(Vector3<f64>, Vector3<f64>)], timestamp_us: u64) -> Self {
        let mut points = Vec::with_capacity(pairs.len() * 2);
        for (source, target) in pairs {
            points.push([source.x, source.y, source.z]);
            points.push([target.x, target.y, target.z]);
        }
        Self {
            frame_id: MAP_FRAME.to_string(),
            timestamp_us,
            points,
        }
    }
}

/// Everything the mapping worker publishes.
#[derive(Debug, Clone)]
pub enum PublishMsg {
    /// Per-frame pose broadcast.
    Transform(TransformMsg),
    /// Cumulative path.
    Path(PathMsg),
    /// Globally transformed sensor cloud.
    Cloud(CloudMsg),
    /// Loop-edge markers.
    LoopMarkers(LoopMarkerMsg),
}

/// Consumer of pipeline output. Implementations must be thread-safe;
/// messages arrive from the mapping worker thread.
pub trait PublishSink: Send + Sync {
    /// Consume one message.
    fn publish(&self, msg: PublishMsg);
}

/// Sink that forwards messages over a crossbeam channel.
pub struct ChannelSink {
    sender: Sender<PublishMsg>,
}

impl ChannelSink {
    /// Wrap a channel sender.
    pub fn new(sender: Sender<PublishMsg>) -> Self {
        Self { sender }
    }
}

impl PublishSink for ChannelSink {
    fn publish(&self, msg: PublishMsg) {
        // A disconnected receiver only means nobody is listening.
        self.sender.send(msg).ok();
    }
}

/// Sink that discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl PublishSink for NullSink {
    fn publish(&self, _msg: PublishMsg) {}
}
