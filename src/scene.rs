//! Scene graph bookkeeping mirrored onto the backend
//!
//! Parents own their children. A child keeps a back-reference to its parent
//! that is only used to unlink it on detachment.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use ar_plus_spatial::{Point3D, Pose};

use crate::backend::{ArBackend, NodeAttachment};
use crate::render::Renderable;

/// Session-unique node identifier; never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Role of a node in the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// World-fixed pose tracked by the runtime
    Anchor,
    Shape,
    MeasurementDot,
    Segment,
    Label,
    Reticle,
}

#[derive(Debug)]
struct SceneNode {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    local: Pose,
    enabled: bool,
}

/// Node tree owned by the session loop
pub struct SceneGraph {
    backend: Arc<dyn ArBackend>,
    nodes: HashMap<NodeId, SceneNode>,
    next_id: u64,
}

impl SceneGraph {
    pub fn new(backend: Arc<dyn ArBackend>) -> Self {
        Self {
            backend,
            nodes: HashMap::new(),
            next_id: 1,
        }
    }

    /// Create an anchor at a world pose under the scene root
    pub fn add_anchor(&mut self, pose: Pose) -> NodeId {
        self.insert(None, NodeKind::Anchor, pose, None)
    }

    /// Attach a node under `parent` (or the root for `None`).
    ///
    /// Returns `None` if `parent` is no longer in the scene, which happens
    /// when an asynchronous build finishes after its anchor was removed.
    pub fn attach(
        &mut self,
        parent: Option<NodeId>,
        kind: NodeKind,
        local: Pose,
        renderable: Option<Renderable>,
    ) -> Option<NodeId> {
        if let Some(parent) = parent {
            if !self.nodes.contains_key(&parent) {
                return None;
            }
        }
        Some(self.insert(parent, kind, local, renderable))
    }

    fn insert(
        &mut self,
        parent: Option<NodeId>,
        kind: NodeKind,
        local: Pose,
        renderable: Option<Renderable>,
    ) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;

        self.nodes.insert(
            id,
            SceneNode {
                kind,
                parent,
                children: Vec::new(),
                local,
                enabled: true,
            },
        );
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.push(id);
        }

        self.backend.attach_node(&NodeAttachment {
            id,
            parent,
            kind,
            local,
            renderable,
        });
        id
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.nodes.get(&id).map(|n| n.kind)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn local_pose(&self, id: NodeId) -> Option<Pose> {
        self.nodes.get(&id).map(|n| n.local)
    }

    pub fn is_enabled(&self, id: NodeId) -> bool {
        self.nodes.get(&id).map(|n| n.enabled).unwrap_or(false)
    }

    pub fn set_local_pose(&mut self, id: NodeId, local: Pose) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        node.local = local;
        self.backend.update_node(id, local);
        true
    }

    /// Move a node relative to its parent, keeping its orientation
    pub fn set_local_position(&mut self, id: NodeId, position: Point3D) -> bool {
        let Some(current) = self.local_pose(id) else {
            return false;
        };
        self.set_local_pose(id, Pose::new(position, current.rotation))
    }

    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        if node.enabled != enabled {
            node.enabled = enabled;
            self.backend.set_node_enabled(id, enabled);
        }
        true
    }

    /// Remove a node and its subtree. Returns the removed ids, or an empty
    /// list if the node was already gone.
    pub fn detach(&mut self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        if let Some(parent) = node.parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|child| *child != id);
        }

        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                stack.extend(node.children);
                removed.push(next);
            }
        }

        self.backend.detach_node(id);
        removed
    }

    /// Detach every node under the root
    pub fn clear(&mut self) {
        let roots: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(id, _)| *id)
            .collect();
        for root in roots {
            self.detach(root);
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of live nodes of a given kind
    pub fn count(&self, kind: NodeKind) -> usize {
        self.nodes.values().filter(|n| n.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedBackend;

    fn graph() -> (Arc<SimulatedBackend>, SceneGraph) {
        let backend = Arc::new(SimulatedBackend::new());
        let graph = SceneGraph::new(backend.clone());
        (backend, graph)
    }

    #[test]
    fn test_attach_under_anchor() {
        let (backend, mut graph) = graph();
        let anchor = graph.add_anchor(Pose::from_translation(0.0, 0.0, -1.0));
        let child = graph
            .attach(Some(anchor), NodeKind::Shape, Pose::IDENTITY, None)
            .unwrap();

        assert_eq!(graph.parent(child), Some(anchor));
        assert_eq!(graph.kind(anchor), Some(NodeKind::Anchor));
        assert_eq!(graph.kind(child), Some(NodeKind::Shape));
        assert_eq!(graph.children(anchor), &[child]);
        assert_eq!(backend.node(child).unwrap().parent, Some(anchor));
    }

    #[test]
    fn test_attach_to_missing_parent_is_refused() {
        let (_, mut graph) = graph();
        let anchor = graph.add_anchor(Pose::IDENTITY);
        graph.detach(anchor);
        assert!(graph
            .attach(Some(anchor), NodeKind::Shape, Pose::IDENTITY, None)
            .is_none());
        assert!(graph.is_empty());
    }

    #[test]
    fn test_detach_removes_subtree_and_unlinks() {
        let (backend, mut graph) = graph();
        let anchor = graph.add_anchor(Pose::IDENTITY);
        let a = graph.attach(Some(anchor), NodeKind::Shape, Pose::IDENTITY, None).unwrap();
        let b = graph.attach(Some(a), NodeKind::Label, Pose::IDENTITY, None).unwrap();

        let removed = graph.detach(a);
        assert_eq!(removed.len(), 2);
        assert!(!graph.contains(b));
        assert!(graph.children(anchor).is_empty());
        assert!(backend.node(a).is_none());
        assert!(backend.node(b).is_none());
        assert!(graph.detach(a).is_empty());
    }

    #[test]
    fn test_ids_never_reused() {
        let (_, mut graph) = graph();
        let first = graph.add_anchor(Pose::IDENTITY);
        graph.detach(first);
        let second = graph.add_anchor(Pose::IDENTITY);
        assert_ne!(first, second);
    }

    #[test]
    fn test_clear_and_count() {
        let (_, mut graph) = graph();
        let anchor = graph.add_anchor(Pose::IDENTITY);
        graph.attach(Some(anchor), NodeKind::MeasurementDot, Pose::IDENTITY, None);
        graph.attach(None, NodeKind::Segment, Pose::IDENTITY, None);
        assert_eq!(graph.count(NodeKind::MeasurementDot), 1);

        graph.clear();
        assert!(graph.is_empty());
    }

    #[test]
    fn test_set_local_position_keeps_rotation() {
        let (backend, mut graph) = graph();
        let rotation = ar_plus_spatial::Quaternion::from_axis_angle(
            ar_plus_spatial::Vector3D::UP,
            1.0,
        );
        let node = graph.add_anchor(Pose::new(Point3D::ORIGIN, rotation));
        assert!(graph.set_local_position(node, Point3D::new(1.0, 0.0, -1.0)));

        let pose = graph.local_pose(node).unwrap();
        assert_eq!(pose.position, Point3D::new(1.0, 0.0, -1.0));
        assert_eq!(pose.rotation, rotation);
        assert_eq!(backend.node(node).unwrap().local.position, pose.position);
    }
}
