//! Mathematical primitives shared across the registration stack.

use nalgebra::Matrix3;
use std::f64::consts::PI;

/// Normalize angle to [-π, π].
///
/// # Example
/// ```
/// use yugma_slam::core::math::normalize_angle;
/// use std::f64::consts::PI;
///
/// assert!((normalize_angle(3.0 * PI) - PI).abs() < 1e-9);
/// assert!((normalize_angle(-3.0 * PI) - (-PI)).abs() < 1e-9);
/// ```
#[inline]
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % (2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    } else if a < -PI {
        a += 2.0 * PI;
    }
    a
}

/// Squared value, the `p2` of the residual accumulation loops.
#[inline]
pub fn sq(v: f64) -> f64 {
    v * v
}

/// Rotation matrix for the ZYX intrinsic convention:
/// `R = Rz(yaw) · Ry(pitch) · Rx(roll)`.
pub fn rotation_zyx(roll: f64, pitch: f64, yaw: f64) -> Matrix3<f64> {
    nalgebra::Rotation3::from_euler_angles(roll, pitch, yaw)
        .matrix()
        .to_owned()
}

/// Partial derivatives of the ZYX rotation with respect to
/// (roll, pitch, yaw), evaluated at the given angles.
///
/// Used to build Jacobian rows: the derivative of a rotated point
/// `R·p` with respect to an Euler angle is `(∂R/∂angle)·p`.
pub fn rotation_zyx_derivatives(roll: f64, pitch: f64, yaw: f64) -> [Matrix3<f64>; 3] {
    let (sa, ca) = roll.sin_cos();
    let (sb, cb) = pitch.sin_cos();
    let (sc, cc) = yaw.sin_cos();

    let rx = Matrix3::new(1.0, 0.0, 0.0, 0.0, ca, -sa, 0.0, sa, ca);
    let ry = Matrix3::new(cb, 0.0, sb, 0.0, 1.0, 0.0, -sb, 0.0, cb);
    let rz = Matrix3::new(cc, -sc, 0.0, sc, cc, 0.0, 0.0, 0.0, 1.0);

    let drx = Matrix3::new(0.0, 0.0, 0.0, 0.0, -sa, -ca, 0.0, ca, -sa);
    let dry = Matrix3::new(-sb, 0.0, cb, 0.0, 0.0, 0.0, -cb, 0.0, -sb);
    let drz = Matrix3::new(-sc, -cc, 0.0, cc, -sc, 0.0, 0.0, 0.0, 0.0);

    [rz * ry * drx, rz * dry * rx, drz * ry * rx]
}
