//! Core algorithms layer.
//!
//! - [`knn`]: shared k-d tree construction and neighbourhood
//!   eigen-decomposition
//! - [`extraction`]: per-sensor feature extraction
//! - [`registration`]: scan-to-local-map registration (correspondence,
//!   residual assembly, damped Gauss-Newton solver)

pub mod extraction;
pub mod knn;
pub mod registration;
