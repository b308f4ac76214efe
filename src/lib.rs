//! YugmaSLAM - Dual-LiDAR odometry and mapping.
//!
//! Fuses a spinning multi-line scanner (dense 360° sweeps) and a
//! solid-state narrow-FoV scanner into a continuously refined trajectory
//! and global point-cloud map.
//!
//! # Architecture
//!
//! The crate is organized into logical layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    threads/                         │  ← Worker pipeline
//! │           (feature worker, mapping worker)          │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                      io/                            │  ← Infrastructure
//! │        (synced queue, publish sink, trajectory)     │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                    engine/                          │  ← Orchestration
//! │    (local map, odometry, mapping, loop closure)     │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                  algorithms/                        │  ← Core algorithms
//! │            (extraction, registration)               │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     core/                           │  ← Foundation
//! │                 (types, math)                       │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Pipeline
//!
//! A frame-sync source pushes [`core::types::SyncedFrame`]s into the
//! feature worker's queue. The feature worker extracts line/plane/
//! non-planar features per sensor and hands the pair to the mapping
//! worker, which registers it against a sliding window of keyframes,
//! publishes the resulting pose and transformed clouds, and runs loop
//! closure on keyframe insertion.

pub mod core;

pub mod algorithms;

pub mod engine;

pub mod io;

pub mod threads;

pub mod config;

// Re-export the types most embedders need.
pub use crate::config::{ConfigProvider, MapConfig, PipelineConfig};
pub use crate::core::types::{
    FeatureFrame, FeatureObjects, LidarPoint, PointCloud, SyncedFrame, Transform,
};
pub use crate::io::publisher::{ChannelSink, NullSink, PublishSink};
pub use crate::io::queue::SyncedQueue;
pub use crate::threads::{FeatureWorker, MappingWorker};
