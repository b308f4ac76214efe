//! Damped Gauss-Newton registration solver.

use nalgebra::Matrix6;
use serde::{Deserialize, Serialize};

use super::correspondence::FeatureAdapter;
use super::residual::assemble;
use crate::core::types::{FeatureFrame, Transform};

/// Configuration for the registration solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// Maximum Gauss-Newton iterations.
    pub max_iterations: u32,
    /// Eigenvalue floor below which the Hessian is considered
    /// degenerate on the first iteration.
    pub degenerate_threshold: f64,
    /// Diagonal damping added while the degeneracy flag is armed.
    pub damping: f64,
    /// Convergence threshold on the squared translation increment.
    pub translation_epsilon_sq: f64,
    /// Convergence threshold on the squared rotation increment.
    pub rotation_epsilon_sq: f64,
    /// Row cap for the residual system.
    pub max_rows: usize,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            degenerate_threshold: 10.0,
            damping: 0.5,
            translation_epsilon_sq: 1e-7,
            rotation_epsilon_sq: 1e-7,
            max_rows: 4000,
        }
    }
}

/// Outcome of one registration call.
#[derive(Debug, Clone, Copy)]
pub struct RegistrationResult {
    /// Final estimate (unchanged from the seed when no correspondence
    /// was found).
    pub transform: Transform,
    /// Rows used in the last assembled system.
    pub rows: usize,
    /// Iterations performed.
    pub iterations: u32,
    /// Whether the increment fell under the epsilons.
    pub converged: bool,
    /// Whether first-iteration eigen inspection armed damping.
    pub degenerate: bool,
}

/// Inspect the eigenvalues of `h` and, when any falls below
/// `threshold`, add `damping` to every diagonal entry.
///
/// Returns whether damping was applied. The caller keeps the flag armed
/// for the remaining iterations of the same solve.
pub fn damp_if_degenerate(h: &mut Matrix6<f64>, threshold: f64, damping: f64) -> bool {
    let eigenvalues = h.symmetric_eigenvalues();
    let degenerate = eigenvalues.iter().any(|&v| v < threshold);
    if degenerate {
        for i in 0..6 {
            h[(i, i)] += damping;
        }
    }
    degenerate
}

/// Scan-to-local-map registration engine.
#[derive(Debug)]
pub struct Registration {
    config: RegistrationConfig,
}

impl Registration {
    /// Create a solver.
    pub fn new(config: RegistrationConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Register `frame` against the local-map feature frame, seeded by
    /// `initial`.
    ///
    /// Deterministic for fixed correspondences. When no correspondence
    /// is found the seed is returned unchanged with `rows == 0`.
    pub fn solve(
        &self,
        frame: &FeatureFrame,
        local_map: &FeatureFrame,
        initial: Transform,
    ) -> RegistrationResult {
        let spin_map = FeatureAdapter::new(&local_map.spin);
        let solid_map = FeatureAdapter::new(&local_map.solid);

        let mut estimate = initial;
        let mut damped = false;
        let mut rows = 0;

        for iteration in 0..self.config.max_iterations {
            let system = assemble(
                frame,
                &spin_map,
                &solid_map,
                &estimate,
                self.config.max_rows,
            );
            rows = system.len();

            if system.is_empty() {
                log::info!("no feature found");
                return RegistrationResult {
                    transform: estimate,
                    rows: 0,
                    iterations: iteration,
                    converged: false,
                    degenerate: damped,
                };
            }

            let (mut h, g) = system.normal_equations();

            if iteration == 0 {
                damped = damp_if_degenerate(
                    &mut h,
                    self.config.degenerate_threshold,
                    self.config.damping,
                );
                if damped {
                    log::debug!("degenerate scene geometry, damping armed");
                }
            } else if damped {
                for i in 0..6 {
                    h[(i, i)] += self.config.damping;
                }
            }

            let Some(delta) = h.qr().solve(&g) else {
                log::warn!("normal equations singular, keeping estimate");
                return RegistrationResult {
                    transform: estimate,
                    rows,
                    iterations: iteration + 1,
                    converged: false,
                    degenerate: damped,
                };
            };

            estimate.x += delta[0];
            estimate.y += delta[1];
            estimate.z += delta[2];
            estimate.roll += delta[3];
            estimate.pitch += delta[4];
            estimate.yaw += delta[5];

            let delta_xyz = delta[0] * delta[0] + delta[1] * delta[1] + delta[2] * delta[2];
            let delta_rpy = delta[3] * delta[3] + delta[4] * delta[4] + delta[5] * delta[5];

            if delta_xyz < self.config.translation_epsilon_sq
                && delta_rpy < self.config.rotation_epsilon_sq
            {
                return RegistrationResult {
                    transform: estimate,
                    rows,
                    iterations: iteration + 1,
                    converged: true,
                    degenerate: damped,
                };
            }
        }

        RegistrationResult {
            transform: estimate,
            rows,
            iterations: self.config.max_iterations,
            converged: false,
            degenerate: damped,
        }
    }
}
