//! Registry of shapes placed on tracked surfaces

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ar_plus_spatial::{Point3D, Pose, Vector3D};

use crate::error::{ArError, Result};
use crate::render::{Argb, Geometry};
use crate::scene::{NodeId, SceneGraph};

/// Primitive geometry the host can place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Cylinder,
    Sphere,
    Cube,
}

impl ShapeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeKind::Cylinder => "cylinder",
            ShapeKind::Sphere => "sphere",
            ShapeKind::Cube => "cube",
        }
    }

    /// Geometry for this kind. Unused dimensions are ignored, e.g. a sphere
    /// only reads `radius`.
    pub fn geometry(&self, dimensions: &ShapeDimensions) -> Geometry {
        match self {
            ShapeKind::Cylinder => Geometry::Cylinder {
                radius: dimensions.radius,
                height: dimensions.height,
            },
            ShapeKind::Sphere => Geometry::Sphere {
                radius: dimensions.radius,
            },
            ShapeKind::Cube => Geometry::Cube {
                size: Vector3D::new(dimensions.width, dimensions.height, dimensions.depth),
            },
        }
    }
}

impl FromStr for ShapeKind {
    type Err = ArError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cylinder" => Ok(ShapeKind::Cylinder),
            "sphere" => Ok(ShapeKind::Sphere),
            "cube" => Ok(ShapeKind::Cube),
            _ => Err(ArError::UnknownShapeKind(s.to_string())),
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Size parameters in meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeDimensions {
    pub radius: f32,
    pub height: f32,
    pub width: f32,
    pub depth: f32,
}

/// Placement request as decoded from the host
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeRequest {
    /// Unparsed kind name; validated before any scene work
    pub shape: String,
    pub dimensions: ShapeDimensions,
    /// View pixel to hit test
    pub screen_x: f32,
    pub screen_y: f32,
    pub color: Argb,
}

/// A shape that finished placement
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedShape {
    pub id: String,
    pub kind: ShapeKind,
    pub dimensions: ShapeDimensions,
    pub color: Argb,
    /// Anchor node fixed at the hit pose
    pub anchor: NodeId,
    /// Geometry node, positioned relative to `anchor`
    pub node: NodeId,
    pub anchor_pose: Pose,
}

/// Owns every placed shape, keyed by its opaque identifier
#[derive(Debug, Default)]
pub struct ShapeRegistry {
    shapes: HashMap<String, PlacedShape>,
}

impl ShapeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a placed shape under a fresh identifier and return it
    pub fn register(
        &mut self,
        kind: ShapeKind,
        dimensions: ShapeDimensions,
        color: Argb,
        anchor: NodeId,
        node: NodeId,
        anchor_pose: Pose,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        self.shapes.insert(
            id.clone(),
            PlacedShape {
                id: id.clone(),
                kind,
                dimensions,
                color,
                anchor,
                node,
                anchor_pose,
            },
        );
        id
    }

    pub fn get(&self, id: &str) -> Option<&PlacedShape> {
        self.shapes.get(id)
    }

    /// Set a shape's offset from its anchor
    pub fn move_shape(&self, scene: &mut SceneGraph, id: &str, offset: Point3D) -> Result<()> {
        let shape = self
            .shapes
            .get(id)
            .ok_or_else(|| ArError::NotFound(id.to_string()))?;
        if !scene.set_local_position(shape.node, offset) {
            return Err(ArError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Detach a shape and its anchor, forgetting the identifier
    pub fn remove(&mut self, scene: &mut SceneGraph, id: &str) -> Result<PlacedShape> {
        let shape = self
            .shapes
            .remove(id)
            .ok_or_else(|| ArError::NotFound(id.to_string()))?;
        scene.detach(shape.anchor);
        Ok(shape)
    }

    /// Detach every shape
    pub fn clear(&mut self, scene: &mut SceneGraph) {
        for (_, shape) in self.shapes.drain() {
            scene.detach(shape.anchor);
        }
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedBackend;
    use crate::scene::NodeKind;
    use std::sync::Arc;

    const DIMS: ShapeDimensions = ShapeDimensions {
        radius: 0.05,
        height: 0.1,
        width: 0.2,
        depth: 0.3,
    };

    fn place(registry: &mut ShapeRegistry, scene: &mut SceneGraph) -> (String, NodeId) {
        let pose = Pose::from_translation(0.0, 0.0, -1.0);
        let anchor = scene.add_anchor(pose);
        let node = scene
            .attach(Some(anchor), NodeKind::Shape, Pose::IDENTITY, None)
            .unwrap();
        let id = registry.register(ShapeKind::Cube, DIMS, Argb::YELLOW, anchor, node, pose);
        (id, node)
    }

    #[test]
    fn test_parse_kind_case_insensitive() {
        assert_eq!("Cube".parse::<ShapeKind>().unwrap(), ShapeKind::Cube);
        assert_eq!("SPHERE".parse::<ShapeKind>().unwrap(), ShapeKind::Sphere);
        assert_eq!(
            "pyramid".parse::<ShapeKind>(),
            Err(ArError::UnknownShapeKind("pyramid".to_string()))
        );
    }

    #[test]
    fn test_geometry_uses_dimensions() {
        assert_eq!(
            ShapeKind::Cube.geometry(&DIMS),
            Geometry::Cube {
                size: Vector3D::new(0.2, 0.1, 0.3)
            }
        );
        assert_eq!(
            ShapeKind::Sphere.geometry(&DIMS),
            Geometry::Sphere { radius: 0.05 }
        );
    }

    #[test]
    fn test_ids_are_unique() {
        let mut scene = SceneGraph::new(Arc::new(SimulatedBackend::new()));
        let mut registry = ShapeRegistry::new();
        let (a, _) = place(&mut registry, &mut scene);
        let (b, _) = place(&mut registry, &mut scene);
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_move_sets_local_offset() {
        let mut scene = SceneGraph::new(Arc::new(SimulatedBackend::new()));
        let mut registry = ShapeRegistry::new();
        let (id, node) = place(&mut registry, &mut scene);

        registry
            .move_shape(&mut scene, &id, Point3D::new(0.1, 0.2, 0.3))
            .unwrap();
        assert_eq!(
            scene.local_pose(node).unwrap().position,
            Point3D::new(0.1, 0.2, 0.3)
        );
    }

    #[test]
    fn test_move_unknown_leaves_scene_untouched() {
        let mut scene = SceneGraph::new(Arc::new(SimulatedBackend::new()));
        let mut registry = ShapeRegistry::new();
        let (_, node) = place(&mut registry, &mut scene);

        let result = registry.move_shape(&mut scene, "missing", Point3D::new(1.0, 1.0, 1.0));
        assert_eq!(result, Err(ArError::NotFound("missing".to_string())));
        assert_eq!(scene.local_pose(node).unwrap(), Pose::IDENTITY);
    }

    #[test]
    fn test_remove_twice() {
        let backend = Arc::new(SimulatedBackend::new());
        let mut scene = SceneGraph::new(backend.clone());
        let mut registry = ShapeRegistry::new();
        let (id, _) = place(&mut registry, &mut scene);

        let removed = registry.remove(&mut scene, &id).unwrap();
        assert_eq!(removed.kind, ShapeKind::Cube);
        assert!(scene.is_empty());
        assert_eq!(backend.node_count(), 0);

        assert_eq!(
            registry.remove(&mut scene, &id),
            Err(ArError::NotFound(id.clone()))
        );
        assert!(registry.get(&id).is_none());
    }
}
