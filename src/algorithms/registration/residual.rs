//! Residual system assembly.
//!
//! Builds the overdetermined linear system `A·δ = b` around the current
//! pose estimate, where δ = (tx, ty, tz, droll, dpitch, dyaw). Each
//! accepted correspondence contributes one row: the derivative of its
//! residual with respect to δ (small-angle linearization in rotation)
//! and the negated residual on the right-hand side.

use nalgebra::{Matrix3, Matrix6, Vector3, Vector6};

use super::correspondence::{FeatureAdapter, PointMatch};
use crate::core::math::rotation_zyx_derivatives;
use crate::core::types::{FeatureFrame, PointCloud, Transform};

/// Accumulated rows of the linearized system.
#[derive(Debug, Default)]
pub struct ResidualSystem {
    /// Jacobian rows, one per correspondence
    pub rows: Vec<[f64; 6]>,
    /// Right-hand side, negated residuals
    pub rhs: Vec<f64>,
}

impl ResidualSystem {
    /// Number of accepted rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if no correspondence was accepted.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Normal equations: `H = AᵀA`, `g = Aᵀb`.
    pub fn normal_equations(&self) -> (Matrix6<f64>, Vector6<f64>) {
        let mut h = Matrix6::zeros();
        let mut g = Vector6::zeros();
        for (row, &b) in self.rows.iter().zip(self.rhs.iter()) {
            let a = Vector6::from_row_slice(row);
            h += a * a.transpose();
            g += a * b;
        }
        (h, g)
    }

    fn push(&mut self, jacobian: [f64; 6], residual: f64) {
        self.rows.push(jacobian);
        self.rhs.push(-residual);
    }
}

/// Assemble the residual system for both sensors at the given estimate.
///
/// Spin line features match map line features, plane features match
/// their per-sensor plane clouds, and solid non-planar features match
/// point-to-point. Rows are capped at `max_rows`; the reported length
/// is the number actually used.
pub fn assemble(
    frame: &FeatureFrame,
    spin_map: &FeatureAdapter,
    solid_map: &FeatureAdapter,
    estimate: &Transform,
    max_rows: usize,
) -> ResidualSystem {
    let mut system = ResidualSystem::default();

    let rotation = crate::core::math::rotation_zyx(estimate.roll, estimate.pitch, estimate.yaw);
    let translation = Vector3::new(estimate.x, estimate.y, estimate.z);
    let derivatives = rotation_zyx_derivatives(estimate.roll, estimate.pitch, estimate.yaw);

    let mut add = |cloud: &Option<std::sync::Arc<PointCloud>>,
                   matcher: &dyn Fn(&Vector3<f64>) -> Option<PointMatch>| {
        let Some(cloud) = cloud else { return };
        for p in &cloud.points {
            if system.len() >= max_rows {
                return;
            }
            let source = Vector3::new(p.x as f64, p.y as f64, p.z as f64);
            let moved = rotation * source + translation;
            if let Some(m) = matcher(&moved) {
                system.push(jacobian_row(&m, &source, &derivatives), m.residual);
            }
        }
    };

    add(&frame.spin.line, &|q| spin_map.line_match(q));
    add(&frame.spin.plane, &|q| spin_map.plane_match(q));
    add(&frame.solid.plane, &|q| solid_map.plane_match(q));
    add(&frame.solid.non_planar, &|q| solid_map.point_match(q));

    system
}

/// One Jacobian row: translation columns are the residual direction,
/// rotation columns apply the rotation derivative to the original
/// source point.
fn jacobian_row(m: &PointMatch, source: &Vector3<f64>, derivatives: &[Matrix3<f64>; 3]) -> [f64; 6] {
    [
        m.direction.x,
        m.direction.y,
        m.direction.z,
        m.direction.dot(&(derivatives[0] * source)),
        m.direction.dot(&(derivatives[1] * source)),
        m.direction.dot(&(derivatives[2] * source)),
    ]
}
