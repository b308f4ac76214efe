//! Pose graph optimization over the keyframe trajectory.
//!
//! Nodes are 6-DoF keyframe poses, edges are relative-pose constraints:
//! consecutive-keyframe edges from the stored sequence plus loop-closure
//! back-edges. Gauss-Newton minimizes the squared constraint residuals;
//! the first pose is held fixed to remove gauge freedom and the normal
//! equations are solved by dense Cholesky.

use nalgebra::{Matrix3, Vector3};

use crate::core::math::{normalize_angle, rotation_zyx, rotation_zyx_derivatives};
use crate::core::types::Transform;

/// Type of constraint between two poses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeType {
    /// Sequential keyframe constraint.
    Odometry,
    /// Loop closure back-edge.
    LoopClosure,
}

/// A relative-pose constraint: `measurement = T_from⁻¹ · T_to`.
#[derive(Debug, Clone)]
pub struct PoseEdge {
    /// Source node index.
    pub from: usize,
    /// Target node index.
    pub to: usize,
    /// Measured relative transform.
    pub measurement: Transform,
    /// Constraint kind.
    pub edge_type: EdgeType,
}

/// Result of one optimization run.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Iterations performed.
    pub iterations: u32,
    /// Initial squared error.
    pub initial_error: f64,
    /// Final squared error.
    pub final_error: f64,
    /// Whether the error change converged.
    pub converged: bool,
}

/// Configuration for the graph optimizer.
#[derive(Debug, Clone)]
pub struct PoseGraphConfig {
    /// Maximum Gauss-Newton iterations.
    pub max_iterations: u32,
    /// Relative error-change convergence threshold.
    pub convergence_threshold: f64,
    /// Constant diagonal regularization keeping the system positive
    /// definite.
    pub regularization: f64,
}

impl Default for PoseGraphConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            convergence_threshold: 1e-6,
            regularization: 1e-6,
        }
    }
}

/// Pose graph with Gauss-Newton optimization.
#[derive(Debug, Default)]
pub struct PoseGraph {
    nodes: Vec<Transform>,
    edges: Vec<PoseEdge>,
}

impl PoseGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node, returning its index.
    pub fn add_node(&mut self, pose: Transform) -> usize {
        self.nodes.push(pose);
        self.nodes.len() - 1
    }

    /// Add a constraint edge.
    pub fn add_edge(&mut self, edge: PoseEdge) {
        self.edges.push(edge);
    }

    /// Node poses.
    pub fn nodes(&self) -> &[Transform] {
        &self.nodes
    }

    /// Number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Total squared error across all edges.
    pub fn total_error(&self) -> f64 {
        self.edges
            .iter()
            .map(|e| {
                edge_error(&self.nodes[e.from], &self.nodes[e.to], &e.measurement)
                    .iter()
                    .map(|v| v * v)
                    .sum::<f64>()
            })
            .sum()
    }

    /// Optimize in place. The first node is held fixed.
    pub fn optimize(&mut self, config: &PoseGraphConfig) -> OptimizationResult {
        let n = self.nodes.len();
        if self.edges.is_empty() || n < 2 {
            return OptimizationResult {
                iterations: 0,
                initial_error: 0.0,
                final_error: 0.0,
                converged: true,
            };
        }

        let dim = n * 6;
        let initial_error = self.total_error();
        let mut current_error = initial_error;
        let mut iterations = 0;

        for iter in 0..config.max_iterations {
            iterations = iter + 1;

            let (mut h, b) = self.build_linear_system(dim);

            for i in 0..dim {
                h[i * dim + i] += config.regularization;
            }
            // Gauge fix: pin the first pose with a stiff prior.
            for i in 0..6 {
                h[i * dim + i] += 1e10;
            }

            let Some(dx) = solve_cholesky(&h, &b, dim) else {
                return OptimizationResult {
                    iterations,
                    initial_error,
                    final_error: current_error,
                    converged: false,
                };
            };

            for (idx, node) in self.nodes.iter_mut().enumerate().skip(1) {
                let base = idx * 6;
                node.x += dx[base];
                node.y += dx[base + 1];
                node.z += dx[base + 2];
                node.roll = normalize_angle(node.roll + dx[base + 3]);
                node.pitch = normalize_angle(node.pitch + dx[base + 4]);
                node.yaw = normalize_angle(node.yaw + dx[base + 5]);
            }

            let new_error = self.total_error();
            let relative_change = (current_error - new_error).abs() / current_error.max(1e-12);
            current_error = new_error;

            if relative_change < config.convergence_threshold {
                return OptimizationResult {
                    iterations,
                    initial_error,
                    final_error: current_error,
                    converged: true,
                };
            }
        }

        OptimizationResult {
            iterations,
            initial_error,
            final_error: current_error,
            converged: false,
        }
    }

    /// Build the Gauss-Newton system `H·dx = -b` (returned as H, -b).
    fn build_linear_system(&self, dim: usize) -> (Vec<f64>, Vec<f64>) {
        let mut h = vec![0.0; dim * dim];
        let mut b = vec![0.0; dim];

        for edge in &self.edges {
            let from = &self.nodes[edge.from];
            let to = &self.nodes[edge.to];

            let error = edge_error(from, to, &edge.measurement);
            let (ji, jj) = edge_jacobians(from, to);

            let base_i = edge.from * 6;
            let base_j = edge.to * 6;

            for r in 0..6 {
                for c in 0..6 {
                    let mut hii = 0.0;
                    let mut hij = 0.0;
                    let mut hji = 0.0;
                    let mut hjj = 0.0;
                    for k in 0..6 {
                        hii += ji[k * 6 + r] * ji[k * 6 + c];
                        hij += ji[k * 6 + r] * jj[k * 6 + c];
                        hji += jj[k * 6 + r] * ji[k * 6 + c];
                        hjj += jj[k * 6 + r] * jj[k * 6 + c];
                    }
                    h[(base_i + r) * dim + base_i + c] += hii;
                    h[(base_i + r) * dim + base_j + c] += hij;
                    h[(base_j + r) * dim + base_i + c] += hji;
                    h[(base_j + r) * dim + base_j + c] += hjj;
                }
            }

            for r in 0..6 {
                let mut bi = 0.0;
                let mut bj = 0.0;
                for k in 0..6 {
                    bi += ji[k * 6 + r] * error[k];
                    bj += jj[k * 6 + r] * error[k];
                }
                b[base_i + r] += bi;
                b[base_j + r] += bj;
            }
        }

        (h, b)
    }
}

/// Constraint error: translation expressed in the `from` frame minus
/// the measurement, and the Euler-angle rotation difference.
fn edge_error(from: &Transform, to: &Transform, measurement: &Transform) -> [f64; 6] {
    let relative = from.inverse().compose(to);
    [
        relative.x - measurement.x,
        relative.y - measurement.y,
        relative.z - measurement.z,
        normalize_angle(relative.roll - measurement.roll),
        normalize_angle(relative.pitch - measurement.pitch),
        normalize_angle(relative.yaw - measurement.yaw),
    ]
}

/// Jacobians of the edge error with respect to the two node parameter
/// blocks, 6×6 row-major.
///
/// Translation rows are exact; rotation rows use the small-angle
/// identity approximation, which is exact for planar (yaw-only)
/// trajectories and adequate near convergence otherwise.
fn edge_jacobians(from: &Transform, to: &Transform) -> ([f64; 36], [f64; 36]) {
    let rf = rotation_zyx(from.roll, from.pitch, from.yaw);
    let rft: Matrix3<f64> = rf.transpose();
    let d = Vector3::new(to.x - from.x, to.y - from.y, to.z - from.z);
    let derivs = rotation_zyx_derivatives(from.roll, from.pitch, from.yaw);

    let mut ji = [0.0; 36];
    let mut jj = [0.0; 36];

    for r in 0..3 {
        for c in 0..3 {
            // ∂e_t/∂t_from = -R_fᵀ, ∂e_t/∂t_to = R_fᵀ
            ji[r * 6 + c] = -rft[(r, c)];
            jj[r * 6 + c] = rft[(r, c)];
        }
        for (angle, deriv) in derivs.iter().enumerate() {
            // ∂e_t/∂θ_from = (∂R_f/∂θ)ᵀ · (t_to - t_from)
            let col = deriv.transpose() * d;
            ji[r * 6 + 3 + angle] = col[r];
        }
        // Rotation block: -I for the from node, +I for the to node.
        ji[(r + 3) * 6 + (r + 3)] = -1.0;
        jj[(r + 3) * 6 + (r + 3)] = 1.0;
    }

    (ji, jj)
}

/// Dense Cholesky solve of `H·x = -b`; `None` when not positive
/// definite.
fn solve_cholesky(h: &[f64], b: &[f64], dim: usize) -> Option<Vec<f64>> {
    let mut l = vec![0.0; dim * dim];

    for i in 0..dim {
        for j in 0..=i {
            let mut sum = h[i * dim + j];
            for k in 0..j {
                sum -= l[i * dim + k] * l[j * dim + k];
            }
            if i == j {
                if sum <= 0.0 {
                    return None;
                }
                l[i * dim + j] = sum.sqrt();
            } else {
                l[i * dim + j] = sum / l[j * dim + j];
            }
        }
    }

    let mut y = vec![0.0; dim];
    for i in 0..dim {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i * dim + j] * y[j];
        }
        y[i] = sum / l[i * dim + i];
    }

    let mut x = vec![0.0; dim];
    for i in (0..dim).rev() {
        let mut sum = y[i];
        for j in (i + 1)..dim {
            sum -= l[j * dim + i] * x[j];
        }
        x[i] = sum / l[i * dim + i];
    }

    Some(x.iter().map(|v| -v).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_perfect_chain_zero_error() {
        let mut graph = PoseGraph::new();
        let a = graph.add_node(Transform::identity());
        let b = graph.add_node(Transform::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0));
        graph.add_edge(PoseEdge {
            from: a,
            to: b,
            measurement: Transform::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0),
            edge_type: EdgeType::Odometry,
        });

        assert!(graph.total_error() < 1e-10);
        let result = graph.optimize(&PoseGraphConfig::default());
        assert!(result.converged);
        assert!(result.final_error < 1e-10);
    }

    #[test]
    fn test_loop_closure_distributes_drift() {
        // Square path with 0.2 m of accumulated drift at the last node.
        let step = Transform::new(1.0, 0.0, 0.0, 0.0, 0.0, FRAC_PI_2);
        let mut poses = vec![Transform::identity()];
        for i in 0..4 {
            let next = poses[i].compose(&step);
            poses.push(next);
        }
        // Perturb the final pose to simulate drift.
        poses[4].x += 0.2;

        let mut graph = PoseGraph::new();
        for p in &poses {
            graph.add_node(*p);
        }
        for i in 0..4 {
            graph.add_edge(PoseEdge {
                from: i,
                to: i + 1,
                measurement: step,
                edge_type: EdgeType::Odometry,
            });
        }
        // The loop edge says node 4 coincides with node 0.
        graph.add_edge(PoseEdge {
            from: 4,
            to: 0,
            measurement: Transform::identity(),
            edge_type: EdgeType::LoopClosure,
        });

        let before = graph.total_error();
        let result = graph.optimize(&PoseGraphConfig::default());
        assert!(result.final_error < before * 0.5, "{:?}", result);

        // First node pinned.
        let first = graph.nodes()[0];
        assert_relative_eq!(first.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(first.yaw, 0.0, epsilon = 1e-4);

        // Last node pulled toward the first.
        let last = graph.nodes()[4];
        assert!(last.x.abs() < 0.15 && last.y.abs() < 0.15, "{:?}", last);
    }

    #[test]
    fn test_empty_graph_is_noop() {
        let mut graph = PoseGraph::new();
        graph.add_node(Transform::identity());
        let result = graph.optimize(&PoseGraphConfig::default());
        assert!(result.converged);
        assert_eq!(result.iterations, 0);
    }
}
