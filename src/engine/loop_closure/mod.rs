//! Loop-closure management.
//!
//! The manager owns the per-keyframe pose history (longer than the
//! local-map window), a cooldown counter gating detection attempts, and
//! the accumulated loop-edge list. The geometric matcher itself is
//! pluggable behind [`LoopDetector`]; on an accepted candidate the
//! manager optimizes the pose graph and exposes the corrected history
//! for window and trajectory rewriting.

pub mod pose_graph;

use nalgebra::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};

use crate::core::types::transform::translation_of;
use crate::core::types::{FeatureObjects, PointCloud, Transform};
use pose_graph::{EdgeType, PoseEdge, PoseGraph, PoseGraphConfig};

/// A loop constraint candidate produced by a detector.
#[derive(Debug, Clone)]
pub struct LoopCandidate {
    /// Matched historical keyframe index (> 0).
    pub target_id: usize,
    /// Relative transform: `pose_target · relative ≈ pose_current`.
    pub relative: Transform,
    /// Registration loss of the fitted constraint.
    pub loss: f64,
}

/// Pluggable loop detection contract.
///
/// Called when the cooldown expires, with the current raw spin-LiDAR
/// cloud, its extracted spin features and the current world pose.
/// Implementations keep whatever database they need internally.
pub trait LoopDetector: Send {
    /// Inspect the current keyframe; `None` means no loop.
    fn detect(
        &mut self,
        current_id: usize,
        raw_spin: &PointCloud,
        spin_features: &FeatureObjects,
        world_pose: &Matrix4<f64>,
    ) -> Option<LoopCandidate>;
}

/// Detector that never fires. Used when loop closure is disabled.
#[derive(Debug, Default)]
pub struct NullDetector;

impl LoopDetector for NullDetector {
    fn detect(
        &mut self,
        _current_id: usize,
        _raw_spin: &PointCloud,
        _spin_features: &FeatureObjects,
        _world_pose: &Matrix4<f64>,
    ) -> Option<LoopCandidate> {
        None
    }
}

/// An accepted back-edge. Immutable after insertion.
#[derive(Debug, Clone)]
pub struct LoopEdge {
    /// Current keyframe at detection time.
    pub source_id: usize,
    /// Matched historical keyframe.
    pub target_id: usize,
    /// Relative constraint.
    pub relative: Transform,
    /// Registration loss at acceptance.
    pub loss: f64,
}

/// Loop-closure configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopManagerConfig {
    /// Candidate acceptance threshold on the registration loss.
    pub max_loss: f64,
    /// Cooldown frames between detection attempts.
    pub reset: u32,
    /// Frames before the first detection attempt.
    pub initial_load: u32,
}

impl Default for LoopManagerConfig {
    fn default() -> Self {
        Self {
            max_loss: 0.05,
            reset: 5,
            initial_load: 100,
        }
    }
}

/// Outcome of an accepted loop closure.
#[derive(Debug, Clone)]
pub struct LoopCorrection {
    /// First rewritten trajectory index (the detector's target).
    pub start_index: usize,
    /// Corrected world pose of the current keyframe.
    pub current_pose: Matrix4<f64>,
}

/// Cooldown-gated loop detection with pose-graph back-propagation.
pub struct LoopManager {
    config: LoopManagerConfig,
    graph_config: PoseGraphConfig,
    detector: Box<dyn LoopDetector>,
    cooldown: u32,
    /// World pose per keyframe, insertion order, corrected in place.
    history: Vec<Transform>,
    edges: Vec<LoopEdge>,
    /// Marker endpoints, one (source, target) pair per edge.
    markers: Vec<(Vector3<f64>, Vector3<f64>)>,
}

impl LoopManager {
    /// Create a manager around a detector.
    pub fn new(config: LoopManagerConfig, detector: Box<dyn LoopDetector>) -> Self {
        Self {
            cooldown: config.initial_load,
            config,
            graph_config: PoseGraphConfig::default(),
            detector,
            history: Vec::new(),
            edges: Vec::new(),
            markers: Vec::new(),
        }
    }

    /// Keyframes recorded so far.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Accepted edges.
    pub fn edges(&self) -> &[LoopEdge] {
        &self.edges
    }

    /// Marker endpoints, two 3D points per edge.
    pub fn markers(&self) -> &[(Vector3<f64>, Vector3<f64>)] {
        &self.markers
    }

    /// World pose of keyframe `index` (corrected when a loop fired).
    pub fn pose(&self, index: usize) -> Matrix4<f64> {
        self.history[index].to_matrix()
    }

    /// World pose `back_index` keyframes from the end (1 = newest).
    pub fn pose_back(&self, back_index: usize) -> Matrix4<f64> {
        self.history[self.history.len() - back_index].to_matrix()
    }

    /// Record the new keyframe and, when the cooldown expires, attempt
    /// detection.
    ///
    /// A candidate above the loss gate is rejected silently; an
    /// accepted one triggers pose-graph optimization and returns the
    /// correction to apply.
    pub fn on_keyframe(
        &mut self,
        raw_spin: &PointCloud,
        spin_features: &FeatureObjects,
        world_pose: &Matrix4<f64>,
    ) -> Option<LoopCorrection> {
        self.history.push(Transform::from_matrix(world_pose));
        let current_id = self.history.len() - 1;

        if self.cooldown > 0 {
            self.cooldown -= 1;
            return None;
        }
        self.cooldown = self.config.reset;

        let candidate = self
            .detector
            .detect(current_id, raw_spin, spin_features, world_pose)?;

        if candidate.loss >= self.config.max_loss {
            log::debug!(
                "loop candidate {} -> {} rejected, loss {:.4}",
                current_id,
                candidate.target_id,
                candidate.loss
            );
            return None;
        }

        log::info!(
            "loop closure {} -> {}, loss {:.4}",
            current_id,
            candidate.target_id,
            candidate.loss
        );

        self.edges.push(LoopEdge {
            source_id: current_id,
            target_id: candidate.target_id,
            relative: candidate.relative,
            loss: candidate.loss,
        });

        self.optimize();
        self.rebuild_markers();

        Some(LoopCorrection {
            start_index: candidate.target_id,
            current_pose: self.pose_back(1),
        })
    }

    /// Optimize the full history against consecutive and loop edges,
    /// writing corrected poses back in place.
    fn optimize(&mut self) {
        let mut graph = PoseGraph::new();
        for pose in &self.history {
            graph.add_node(*pose);
        }
        for (i, pair) in self.history.windows(2).enumerate() {
            graph.add_edge(PoseEdge {
                from: i,
                to: i + 1,
                measurement: pair[0].inverse().compose(&pair[1]),
                edge_type: EdgeType::Odometry,
            });
        }
        for edge in &self.edges {
            graph.add_edge(PoseEdge {
                from: edge.target_id,
                to: edge.source_id,
                measurement: edge.relative,
                edge_type: EdgeType::LoopClosure,
            });
        }

        let result = graph.optimize(&self.graph_config);
        log::debug!(
            "pose graph: {} nodes, error {:.5} -> {:.5} in {} iterations",
            graph.num_nodes(),
            result.initial_error,
            result.final_error,
            result.iterations
        );

        self.history.copy_from_slice(graph.nodes());
    }

    fn rebuild_markers(&mut self) {
        self.markers.clear();
        for edge in &self.edges {
            let source = translation_of(&self.pose(edge.source_id));
            let target = translation_of(&self.pose(edge.target_id));
            self.markers.push((source, target));
        }
    }
}
