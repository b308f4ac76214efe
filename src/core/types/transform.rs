//! 6-DoF rigid transform.

use nalgebra::{Matrix3, Matrix4, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Rigid-body transform as six scalars: translation (x, y, z) in meters
/// and rotation (roll, pitch, yaw) in radians.
///
/// The Euler convention is ZYX intrinsic throughout the pipeline:
/// `R = Rz(yaw) · Ry(pitch) · Rx(roll)`. The same convention is used by
/// the forward conversion, the inverse, and the registration Jacobians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    /// X translation in meters
    pub x: f64,
    /// Y translation in meters
    pub y: f64,
    /// Z translation in meters
    pub z: f64,
    /// Rotation about X in radians
    pub roll: f64,
    /// Rotation about Y in radians
    pub pitch: f64,
    /// Rotation about Z in radians
    pub yaw: f64,
}

impl Transform {
    /// Create a new transform.
    #[inline]
    pub fn new(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        Self {
            x,
            y,
            z,
            roll,
            pitch,
            yaw,
        }
    }

    /// Identity transform.
    #[inline]
    pub fn identity() -> Self {
        Self::default()
    }

    /// Convert to a 4×4 homogeneous matrix.
    pub fn to_matrix(&self) -> Matrix4<f64> {
        let rot = Rotation3::from_euler_angles(self.roll, self.pitch, self.yaw);
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(rot.matrix());
        m[(0, 3)] = self.x;
        m[(1, 3)] = self.y;
        m[(2, 3)] = self.z;
        m
    }

    /// Recover the six scalars from a homogeneous matrix.
    ///
    /// The rotation block is assumed orthonormal (a rigid transform);
    /// pitch is reported in (-π/2, π/2).
    pub fn from_matrix(m: &Matrix4<f64>) -> Self {
        let rot = Rotation3::from_matrix_unchecked(m.fixed_view::<3, 3>(0, 0).into_owned());
        let (roll, pitch, yaw) = rot.euler_angles();
        Self {
            x: m[(0, 3)],
            y: m[(1, 3)],
            z: m[(2, 3)],
            roll,
            pitch,
            yaw,
        }
    }

    /// Compose with another transform: `self ⊕ other`.
    ///
    /// Equivalent to multiplying the homogeneous matrices.
    pub fn compose(&self, other: &Transform) -> Transform {
        Transform::from_matrix(&(self.to_matrix() * other.to_matrix()))
    }

    /// Inverse transform.
    pub fn inverse(&self) -> Transform {
        Transform::from_matrix(&invert_rigid(&self.to_matrix()))
    }

    /// Squared norm of the translation part.
    #[inline]
    pub fn translation_norm_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Squared norm of the rotation part.
    #[inline]
    pub fn rotation_norm_squared(&self) -> f64 {
        self.roll * self.roll + self.pitch * self.pitch + self.yaw * self.yaw
    }

    /// Rotation as a unit quaternion (x, y, z, w coordinates).
    pub fn to_quaternion(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_euler_angles(self.roll, self.pitch, self.yaw)
    }
}

/// Closed-form inverse of a rigid homogeneous matrix: (Rᵀ, −Rᵀ·t).
///
/// Never fails for rigid input, unlike a general matrix inverse.
pub fn invert_rigid(m: &Matrix4<f64>) -> Matrix4<f64> {
    let r: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();
    let t = Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);
    let rt = r.transpose();
    let ti = -(rt * t);

    let mut out = Matrix4::identity();
    out.fixed_view_mut::<3, 3>(0, 0).copy_from(&rt);
    out[(0, 3)] = ti.x;
    out[(1, 3)] = ti.y;
    out[(2, 3)] = ti.z;
    out
}

/// Translation part of a homogeneous matrix.
#[inline]
pub fn translation_of(m: &Matrix4<f64>) -> Vector3<f64> {
    Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_3;

    #[test]
    fn test_identity_matrix() {
        let t = Transform::identity();
        assert_relative_eq!(t.to_matrix(), Matrix4::identity(), epsilon = 1e-12);
    }

    #[test]
    fn test_matrix_roundtrip() {
        let t = Transform::new(1.5, -2.0, 0.3, 0.2, -0.4, 1.1);
        let back = Transform::from_matrix(&t.to_matrix());

        assert_relative_eq!(back.x, t.x, epsilon = 1e-9);
        assert_relative_eq!(back.y, t.y, epsilon = 1e-9);
        assert_relative_eq!(back.z, t.z, epsilon = 1e-9);
        assert_relative_eq!(back.roll, t.roll, epsilon = 1e-9);
        assert_relative_eq!(back.pitch, t.pitch, epsilon = 1e-9);
        assert_relative_eq!(back.yaw, t.yaw, epsilon = 1e-9);
    }

    #[test]
    fn test_matrix_roundtrip_near_gimbal() {
        let t = Transform::new(0.0, 0.0, 0.0, FRAC_PI_3, 1.4, -FRAC_PI_3);
        let back = Transform::from_matrix(&t.to_matrix());
        assert_relative_eq!(back.pitch, 1.4, epsilon = 1e-9);
    }

    #[test]
    fn test_inverse_roundtrip() {
        let t = Transform::new(1.0, 2.0, -0.5, 0.3, -0.1, 0.8);
        let composed = t.compose(&t.inverse());

        assert_relative_eq!(composed.translation_norm_squared(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(composed.rotation_norm_squared(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_invert_rigid_matches_matrix_inverse() {
        let t = Transform::new(0.4, -1.2, 2.5, -0.6, 0.2, 2.1);
        let m = t.to_matrix();
        let expected = m.try_inverse().unwrap();
        assert_relative_eq!(invert_rigid(&m), expected, epsilon = 1e-10);
    }

    #[test]
    fn test_compose_is_matrix_multiplication() {
        let a = Transform::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.5);
        let b = Transform::new(0.0, 1.0, 0.0, 0.1, 0.0, 0.0);

        let composed = a.compose(&b).to_matrix();
        assert_relative_eq!(composed, a.to_matrix() * b.to_matrix(), epsilon = 1e-9);
    }

    #[test]
    fn test_quaternion_matches_rotation_block() {
        let t = Transform::new(0.0, 0.0, 0.0, 0.3, -0.2, 0.7);
        let q = t.to_quaternion();
        let m = t.to_matrix();
        let rot = Rotation3::from_matrix_unchecked(m.fixed_view::<3, 3>(0, 0).into_owned());
        let q_ref = UnitQuaternion::from_rotation_matrix(&rot);

        assert_relative_eq!(q.coords.x, q_ref.coords.x, epsilon = 1e-10);
        assert_relative_eq!(q.coords.w, q_ref.coords.w, epsilon = 1e-10);
    }
}
