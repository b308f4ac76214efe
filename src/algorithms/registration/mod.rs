//! Scan-to-local-map registration.
//!
//! Estimates a 6-DoF rigid transform by iteratively minimizing a
//! linearized residual system built from point-to-line, point-to-plane
//! and point-to-point correspondences against the aggregate local map.
//!
//! # Algorithm
//!
//! 1. Transform each source feature point by the current estimate
//! 2. Find correspondences in the matching local-map feature cloud
//! 3. Accumulate one Jacobian row per accepted correspondence
//! 4. Solve the damped normal equations and apply the increment
//! 5. Iterate until the increment vanishes
//!
//! Degenerate scene geometry (e.g. a featureless corridor axis) is
//! detected on the first iteration from the eigenvalues of the
//! Gauss-Newton Hessian and countered with diagonal damping.

mod correspondence;
mod residual;
mod solver;

pub use correspondence::FeatureAdapter;
pub use residual::{assemble, ResidualSystem};
pub use solver::{damp_if_degenerate, Registration, RegistrationConfig, RegistrationResult};
