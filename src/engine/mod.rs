//! Orchestration layer.
//!
//! - [`local_map`]: sliding window of recent keyframes with a lazily
//!   rebuilt aggregate
//! - [`odometry`]: per-frame registration driver with initial-guess
//!   propagation
//! - [`mapping`]: keyframe gating, trajectory bookkeeping, loop-closure
//!   hookup
//! - [`loop_closure`]: detection contract, pose-graph optimization,
//!   pose rewriting

pub mod local_map;
pub mod loop_closure;
pub mod mapping;
pub mod odometry;
