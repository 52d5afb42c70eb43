//! Spatial primitives shared by the ar-plus plugin and its backends
//!
//! Uses the tracking runtime's right-handed world frame:
//! - X: Right (+) / Left (-)
//! - Y: Up (+) / Down (-)
//! - Z: Camera forward (+) / Backward (-)
//!
//! Distances are in meters.

mod point3d;
mod vector3d;
mod quaternion;
mod pose;
mod ray;
mod projection;

pub use point3d::Point3D;
pub use vector3d::Vector3D;
pub use quaternion::Quaternion;
pub use pose::Pose;
pub use ray::{Plane, Ray};
pub use projection::{Projection, Viewport};
