//! Rotations

use std::ops::Mul;

use serde::{Deserialize, Serialize};

use crate::Vector3D;

/// A unit quaternion describing an orientation in the world frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    pub const IDENTITY: Self = Self { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub fn from_axis_angle(axis: Vector3D, angle_radians: f32) -> Self {
        let half = angle_radians / 2.0;
        let axis = axis.normalize();
        let sin_half = half.sin();

        Self {
            x: axis.x * sin_half,
            y: axis.y * sin_half,
            z: axis.z * sin_half,
            w: half.cos(),
        }
    }

    /// Rotation whose forward (+Z) axis points along `direction`, keeping
    /// its up axis as close to `up` as possible.
    ///
    /// Falls back to world forward as the reference when `direction` is
    /// parallel to `up`, so vertical segments still get a valid rotation.
    pub fn look_rotation(direction: Vector3D, up: Vector3D) -> Self {
        let forward = direction.normalize();
        if forward.magnitude_squared() == 0.0 {
            return Self::IDENTITY;
        }

        let mut right = up.cross(&forward);
        if right.magnitude_squared() < 1e-8 {
            right = Vector3D::FORWARD.cross(&forward);
            if right.magnitude_squared() < 1e-8 {
                right = Vector3D::RIGHT;
            }
        }
        let right = right.normalize();
        let up = forward.cross(&right);

        // Columns of the basis matrix are (right, up, forward).
        let (m00, m01, m02) = (right.x, up.x, forward.x);
        let (m10, m11, m12) = (right.y, up.y, forward.y);
        let (m20, m21, m22) = (right.z, up.z, forward.z);

        let trace = m00 + m11 + m22;
        let q = if trace > 0.0 {
            let s = 0.5 / (trace + 1.0).sqrt();
            Self::new((m21 - m12) * s, (m02 - m20) * s, (m10 - m01) * s, 0.25 / s)
        } else if m00 > m11 && m00 > m22 {
            let s = 2.0 * (1.0 + m00 - m11 - m22).sqrt();
            Self::new(0.25 * s, (m01 + m10) / s, (m02 + m20) / s, (m21 - m12) / s)
        } else if m11 > m22 {
            let s = 2.0 * (1.0 + m11 - m00 - m22).sqrt();
            Self::new((m01 + m10) / s, 0.25 * s, (m12 + m21) / s, (m02 - m20) / s)
        } else {
            let s = 2.0 * (1.0 + m22 - m00 - m11).sqrt();
            Self::new((m02 + m20) / s, (m12 + m21) / s, 0.25 * s, (m10 - m01) / s)
        };

        q.normalize()
    }

    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    pub fn normalize(&self) -> Self {
        let mag = self.magnitude();
        if mag > 0.0 {
            Self::new(self.x / mag, self.y / mag, self.z / mag, self.w / mag)
        } else {
            Self::IDENTITY
        }
    }

    pub fn inverse(&self) -> Self {
        let mag_sq = self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w;
        if mag_sq > 0.0 {
            let inv = 1.0 / mag_sq;
            Self::new(-self.x * inv, -self.y * inv, -self.z * inv, self.w * inv)
        } else {
            Self::IDENTITY
        }
    }

    pub fn rotate_vector(&self, v: Vector3D) -> Vector3D {
        let q_vec = Vector3D::new(self.x, self.y, self.z);
        let uv = q_vec.cross(&v);
        let uuv = q_vec.cross(&uv);
        v + (uv * self.w + uuv) * 2.0
    }

    pub fn forward(&self) -> Vector3D {
        self.rotate_vector(Vector3D::FORWARD)
    }

    pub fn up(&self) -> Vector3D {
        self.rotate_vector(Vector3D::UP)
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Quaternion {
    type Output = Quaternion;

    fn mul(self, rhs: Self) -> Self::Output {
        Quaternion::new(
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn assert_vec_eq(a: Vector3D, b: Vector3D) {
        assert!((a - b).magnitude() < 1e-4, "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_quarter_turn_about_up() {
        let q = Quaternion::from_axis_angle(Vector3D::UP, PI / 2.0);
        assert_vec_eq(q.rotate_vector(Vector3D::FORWARD), Vector3D::RIGHT);
    }

    #[test]
    fn test_inverse_undoes_rotation() {
        let q = Quaternion::from_axis_angle(Vector3D::new(1.0, 1.0, 0.0), 0.7);
        let v = Vector3D::new(0.2, -0.4, 1.5);
        assert_vec_eq(q.inverse().rotate_vector(q.rotate_vector(v)), v);
    }

    #[test]
    fn test_look_rotation_points_forward_along_direction() {
        let dir = Vector3D::new(1.0, 0.0, 1.0);
        let q = Quaternion::look_rotation(dir, Vector3D::UP);
        assert_vec_eq(q.forward(), dir.normalize());
        assert_vec_eq(q.up(), Vector3D::UP);
    }

    #[test]
    fn test_look_rotation_vertical_direction() {
        let q = Quaternion::look_rotation(Vector3D::UP, Vector3D::UP);
        assert_vec_eq(q.forward(), Vector3D::UP);
        assert!((q.magnitude() - 1.0).abs() < 1e-4);
    }
}
