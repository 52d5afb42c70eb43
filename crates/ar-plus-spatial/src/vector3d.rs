//! Directions and offsets

use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::Point3D;

/// A direction or offset in 3D space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3D {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const RIGHT: Self = Self::new(1.0, 0.0, 0.0);
    pub const UP: Self = Self::new(0.0, 1.0, 0.0);
    /// Camera forward (+Z)
    pub const FORWARD: Self = Self::new(0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn magnitude_squared(&self) -> f32 {
        self.dot(self)
    }

    /// Unit vector in the same direction, or zero for a zero vector
    pub fn normalize(&self) -> Self {
        match self.magnitude() {
            mag if mag > 0.0 => *self * mag.recip(),
            _ => Self::ZERO,
        }
    }

    pub fn dot(&self, other: &Vector3D) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Vector3D) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn to_point(&self) -> Point3D {
        Point3D::new(self.x, self.y, self.z)
    }
}

macro_rules! componentwise {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait for Vector3D {
            type Output = Vector3D;

            fn $method(self, rhs: Self) -> Vector3D {
                Vector3D::new(self.x $op rhs.x, self.y $op rhs.y, self.z $op rhs.z)
            }
        }
    };
}

componentwise!(Add, add, +);
componentwise!(Sub, sub, -);

impl Mul<f32> for Vector3D {
    type Output = Vector3D;

    fn mul(self, scale: f32) -> Vector3D {
        Vector3D::new(self.x * scale, self.y * scale, self.z * scale)
    }
}

impl Neg for Vector3D {
    type Output = Vector3D;

    fn neg(self) -> Vector3D {
        self * -1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_zero_stays_zero() {
        assert_eq!(Vector3D::ZERO.normalize(), Vector3D::ZERO);
    }

    #[test]
    fn test_normalize_unit_length() {
        let n = Vector3D::new(0.0, 3.0, 4.0).normalize();
        assert!((n.magnitude() - 1.0).abs() < 1e-6);
        assert!((n.z - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_cross_right_up_is_forward() {
        let f = Vector3D::RIGHT.cross(&Vector3D::UP);
        assert!((f.z - 1.0).abs() < 1e-6);
    }
}
