//! World-space positions

use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use crate::Vector3D;

/// A position in the tracked world frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3D {
    /// World origin, where the session started
    pub const ORIGIN: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point3D) -> f32 {
        (*other - *self).magnitude()
    }

    /// Point halfway between `self` and `other`
    pub fn midpoint(&self, other: &Point3D) -> Self {
        self.lerp(other, 0.5)
    }

    pub fn lerp(&self, other: &Point3D, t: f32) -> Self {
        *self + (*other - *self) * t
    }

    /// Offset of this point from the origin
    pub fn to_vector(&self) -> Vector3D {
        Vector3D::new(self.x, self.y, self.z)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add<Vector3D> for Point3D {
    type Output = Point3D;

    fn add(self, offset: Vector3D) -> Point3D {
        Point3D::new(self.x + offset.x, self.y + offset.y, self.z + offset.z)
    }
}

impl Sub for Point3D {
    type Output = Vector3D;

    fn sub(self, from: Self) -> Vector3D {
        self.to_vector() - from.to_vector()
    }
}
