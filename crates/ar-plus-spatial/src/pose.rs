//! Rigid poses (position + orientation)

use serde::{Deserialize, Serialize};

use crate::{Point3D, Quaternion, Vector3D};

/// A rigid transform from a local frame into the world frame.
///
/// Hit results, anchors and camera placements are all poses; scene nodes
/// carry a pose relative to their parent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point3D,
    pub rotation: Quaternion,
}

impl Pose {
    pub const IDENTITY: Self = Self {
        position: Point3D::ORIGIN,
        rotation: Quaternion::IDENTITY,
    };

    pub fn new(position: Point3D, rotation: Quaternion) -> Self {
        Self { position, rotation }
    }

    pub fn from_position(position: Point3D) -> Self {
        Self::new(position, Quaternion::IDENTITY)
    }

    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        Self::from_position(Point3D::new(x, y, z))
    }

    pub fn forward(&self) -> Vector3D {
        self.rotation.forward()
    }

    pub fn up(&self) -> Vector3D {
        self.rotation.up()
    }

    /// Map a point expressed in this pose's frame into the parent frame
    pub fn transform_point(&self, local: Point3D) -> Point3D {
        self.position + self.rotation.rotate_vector(local.to_vector())
    }

    pub fn transform_direction(&self, direction: Vector3D) -> Vector3D {
        self.rotation.rotate_vector(direction)
    }

    /// Map a parent-frame point into this pose's frame
    pub fn inverse_transform_point(&self, world: Point3D) -> Point3D {
        self.rotation
            .inverse()
            .rotate_vector(world - self.position)
            .to_point()
    }

    /// `self` followed by `child`: the world pose of a node whose local pose
    /// is `child` under a parent at `self`.
    pub fn compose(&self, child: &Pose) -> Pose {
        Pose {
            position: self.transform_point(child.position),
            rotation: (self.rotation * child.rotation).normalize(),
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}
