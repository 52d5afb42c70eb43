//! Rays and bounded planes for hit testing

use serde::{Deserialize, Serialize};

use crate::{Point3D, Pose, Vector3D};

/// A half-line cast into the scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3D,
    /// Unit direction
    pub direction: Vector3D,
}

impl Ray {
    pub fn new(origin: Point3D, direction: Vector3D) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    pub fn point_at(&self, t: f32) -> Point3D {
        self.origin + self.direction * t
    }

    /// Distance along the ray of the point closest to `point`, and the
    /// perpendicular distance from `point` to the ray at that spot.
    pub fn closest_approach(&self, point: Point3D) -> (f32, f32) {
        let t = (point - self.origin).dot(&self.direction);
        (t, self.point_at(t).distance(&point))
    }
}

/// A rectangular bounded plane.
///
/// The plane's normal is the local +Y axis of `center`; its polygon spans
/// `extent_x` by `extent_z` meters around the center on the local X/Z axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub center: Pose,
    pub extent_x: f32,
    pub extent_z: f32,
}

impl Plane {
    pub fn new(center: Pose, extent_x: f32, extent_z: f32) -> Self {
        Self {
            center,
            extent_x,
            extent_z,
        }
    }

    pub fn normal(&self) -> Vector3D {
        self.center.up()
    }

    /// Intersection with the infinite plane, as a distance along the ray.
    ///
    /// Returns `None` for rays parallel to the plane or hits behind the
    /// origin.
    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        let normal = self.normal();
        let denom = normal.dot(&ray.direction);
        if denom.abs() < 1e-6 {
            return None;
        }
        let t = normal.dot(&(self.center.position - ray.origin)) / denom;
        (t >= 0.0).then_some(t)
    }

    /// Whether a world point (assumed on the plane) lies within the polygon
    pub fn contains(&self, point: Point3D) -> bool {
        let local = self.center.inverse_transform_point(point);
        local.x.abs() <= self.extent_x / 2.0 && local.z.abs() <= self.extent_z / 2.0
    }
}
