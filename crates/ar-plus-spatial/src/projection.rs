//! Perspective camera model: screen pixels to world rays and back

use serde::{Deserialize, Serialize};

use crate::{Point3D, Pose, Ray, Vector3D};

/// Size of the AR view in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Center of the view, where measurement shots and the reticle aim
    pub fn center(&self) -> (f32, f32) {
        (self.width as f32 / 2.0, self.height as f32 / 2.0)
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Pinhole projection parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    /// Vertical field of view in radians
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Projection {
    pub fn perspective(fov_degrees: f32) -> Self {
        Self {
            fov: fov_degrees.to_radians(),
            near: 0.05,
            far: 100.0,
        }
    }

    /// Ray leaving `camera` through pixel (`x`, `y`); origin top-left
    pub fn screen_ray(&self, camera: &Pose, viewport: Viewport, x: f32, y: f32) -> Ray {
        let x_ndc = 2.0 * x / viewport.width.max(1) as f32 - 1.0;
        let y_ndc = 1.0 - 2.0 * y / viewport.height.max(1) as f32;
        let tan_half_fov = (self.fov / 2.0).tan();

        let local = Vector3D::new(
            x_ndc * tan_half_fov * viewport.aspect(),
            y_ndc * tan_half_fov,
            1.0,
        );
        Ray::new(camera.position, camera.transform_direction(local))
    }

    /// Pixel position and depth of a world point, if it is inside the frustum
    pub fn project(&self, point: Point3D, camera: &Pose, viewport: Viewport) -> Option<(f32, f32, f32)> {
        let local = camera.inverse_transform_point(point);
        if local.z <= self.near || local.z >= self.far {
            return None;
        }

        let tan_half_fov = (self.fov / 2.0).tan();
        let x_ndc = local.x / (local.z * tan_half_fov * viewport.aspect());
        let y_ndc = local.y / (local.z * tan_half_fov);
        if x_ndc.abs() > 1.0 || y_ndc.abs() > 1.0 {
            return None;
        }

        let x = (x_ndc + 1.0) / 2.0 * viewport.width as f32;
        let y = (1.0 - y_ndc) / 2.0 * viewport.height as f32;
        Some((x, y, local.z))
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::perspective(60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_ray_is_camera_forward() {
        let proj = Projection::default();
        let viewport = Viewport::new(1080, 1920);
        let (cx, cy) = viewport.center();
        let ray = proj.screen_ray(&Pose::IDENTITY, viewport, cx, cy);
        assert!((ray.direction - Vector3D::FORWARD).magnitude() < 1e-5);
    }

    #[test]
    fn test_project_then_ray_passes_through_point() {
        let proj = Projection::default();
        let viewport = Viewport::new(800, 600);
        let camera = Pose::from_translation(0.5, 1.0, -2.0);
        let point = Point3D::new(0.8, 0.7, 1.0);

        let (x, y, _) = proj.project(point, &camera, viewport).unwrap();
        let ray = proj.screen_ray(&camera, viewport, x, y);
        let (_, miss) = ray.closest_approach(point);
        assert!(miss < 1e-3);
    }

    #[test]
    fn test_behind_camera_not_projected() {
        let proj = Projection::default();
        let viewport = Viewport::new(100, 100);
        assert!(proj
            .project(Point3D::new(0.0, 0.0, -5.0), &Pose::IDENTITY, viewport)
            .is_none());
    }
}
