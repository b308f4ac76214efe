//! Core data types for the dual-LiDAR pipeline.
//!
//! - [`Transform`]: 6-DoF pose (x, y, z, roll, pitch, yaw)
//! - [`LidarPoint`] / [`PointCloud`]: 3D points with intensity, ring and
//!   intra-sweep timestamp
//! - [`FeatureObjects`] / [`FeatureFrame`]: extracted feature sets per
//!   sensor and per frame
//! - [`SyncedFrame`]: time-aligned raw cloud pair from the frame-sync
//!   source
//! - [`Timestamped<T>`]: generic timestamp wrapper

mod features;
mod point;
mod timestamped;
pub mod transform;

pub use features::{FeatureFrame, FeatureObjects, Keyframe, SyncedFrame};
pub use point::{LidarPoint, PointCloud};
pub use timestamped::Timestamped;
pub use transform::{invert_rigid, translation_of, Transform};
