//! Focus reticle that follows the surface under the screen center

use ar_plus_spatial::{Point3D, Pose, Vector3D};

use crate::config::ReticleStyle;
use crate::render::{Geometry, Material, Renderable};
use crate::scene::{NodeId, NodeKind, SceneGraph};

const DISC_HEIGHT: f32 = 0.0003;
const ARM_HEIGHT: f32 = 0.001;

/// One built piece of the reticle, positioned relative to its visual root
#[derive(Debug, Clone, PartialEq)]
pub struct ReticlePart {
    pub local: Pose,
    pub renderable: Renderable,
}

/// Flat disc with four arms, re-anchored every frame.
///
/// The renderables are built once, asynchronously; until they arrive the
/// reticle only tracks its anchor.
#[derive(Debug)]
pub struct Reticle {
    style: ReticleStyle,
    anchor: Option<NodeId>,
    visual: Option<NodeId>,
    parts: Option<Vec<ReticlePart>>,
    visible: bool,
}

impl Reticle {
    pub fn new(style: ReticleStyle) -> Self {
        Self {
            style,
            anchor: None,
            visual: None,
            parts: None,
            visible: true,
        }
    }

    pub fn material(&self) -> Material {
        Material::opaque(self.style.color)
    }

    /// Geometry to build, with each piece's offset from the center
    pub fn part_specs(&self) -> Vec<(Pose, Geometry)> {
        let ReticleStyle {
            radius,
            arm_length,
            arm_width,
            ..
        } = self.style;
        let offset = arm_length / 2.0 + radius;
        let along_x = Vector3D::new(arm_length, ARM_HEIGHT, arm_width);
        let along_z = Vector3D::new(arm_width, ARM_HEIGHT, arm_length);

        let disc = Geometry::Cylinder {
            radius,
            height: DISC_HEIGHT,
        };
        let arms = [
            (offset, 0.0, along_x),
            (-offset, 0.0, along_x),
            (0.0, offset, along_z),
            (0.0, -offset, along_z),
        ];

        let mut specs = vec![(Pose::IDENTITY, disc)];
        specs.extend(
            arms.into_iter()
                .map(|(x, z, size)| (Pose::from_translation(x, 0.0, z), Geometry::Cube { size })),
        );
        specs
    }

    pub fn is_ready(&self) -> bool {
        self.parts.is_some()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn anchor(&self) -> Option<NodeId> {
        self.anchor
    }

    pub fn visual(&self) -> Option<NodeId> {
        self.visual
    }

    /// Store the built pieces, attaching them if the reticle is anchored
    pub fn set_parts(&mut self, scene: &mut SceneGraph, parts: Vec<ReticlePart>) {
        self.parts = Some(parts);
        self.attach_visual(scene);
    }

    /// Re-anchor at a new surface pose
    pub fn place(&mut self, scene: &mut SceneGraph, pose: Pose) {
        match self.anchor {
            Some(anchor) if scene.contains(anchor) => {
                scene.set_local_pose(anchor, pose);
            }
            _ => {
                self.anchor = Some(scene.add_anchor(pose));
                self.visual = None;
                self.attach_visual(scene);
            }
        }
    }

    /// World position of the reticle center, if placed
    pub fn position(&self, scene: &SceneGraph) -> Option<Point3D> {
        self.anchor
            .and_then(|anchor| scene.local_pose(anchor))
            .map(|pose| pose.position)
    }

    pub fn set_visible(&mut self, scene: &mut SceneGraph, visible: bool) {
        self.visible = visible;
        if let Some(visual) = self.visual {
            scene.set_enabled(visual, visible);
        }
    }

    /// Forget scene nodes after the scene was cleared; built parts are kept
    pub fn detach(&mut self, scene: &mut SceneGraph) {
        if let Some(anchor) = self.anchor.take() {
            scene.detach(anchor);
        }
        self.visual = None;
    }

    fn attach_visual(&mut self, scene: &mut SceneGraph) {
        let (Some(anchor), Some(parts)) = (self.anchor, self.parts.as_ref()) else {
            return;
        };
        if self.visual.is_some() {
            return;
        }
        let Some(visual) = scene.attach(Some(anchor), NodeKind::Reticle, Pose::IDENTITY, None)
        else {
            return;
        };
        for part in parts {
            scene.attach(
                Some(visual),
                NodeKind::Reticle,
                part.local,
                Some(part.renderable.clone()),
            );
        }
        if !self.visible {
            scene.set_enabled(visual, false);
        }
        self.visual = Some(visual);
    }
}
