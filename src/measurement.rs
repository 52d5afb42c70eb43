//! Point-to-point distance measurement

use ar_plus_spatial::{Point3D, Pose, Quaternion, Vector3D};

use crate::scene::{NodeId, SceneGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementState {
    Empty,
    OnePoint,
    Measuring,
}

/// A recorded shot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementPoint {
    pub anchor: NodeId,
    pub position: Point3D,
}

/// Distance between two consecutive points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measured {
    pub from: Point3D,
    pub to: Point3D,
    pub distance: f32,
}

impl Measured {
    pub fn new(from: Point3D, to: Point3D) -> Self {
        Self {
            from,
            to,
            distance: from.distance(&to),
        }
    }

    pub fn midpoint(&self) -> Point3D {
        self.from.midpoint(&self.to)
    }

    /// Pose for the connecting segment: centered between the points with its
    /// local +Z running from `from` to `to`
    pub fn segment_pose(&self) -> Pose {
        let rotation = Quaternion::look_rotation(self.to - self.from, Vector3D::UP);
        Pose::new(self.midpoint(), rotation)
    }
}

/// Ordered shots plus the decorations drawn between them.
///
/// Dots hang off each point's anchor; segments and labels sit at the scene
/// root. The generation advances on every clear so late renderable builds
/// can tell they belong to a discarded measurement.
#[derive(Debug, Default)]
pub struct MeasurementSession {
    points: Vec<MeasurementPoint>,
    segments: Vec<NodeId>,
    labels: Vec<NodeId>,
    generation: u64,
}

impl MeasurementSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MeasurementState {
        match self.points.len() {
            0 => MeasurementState::Empty,
            1 => MeasurementState::OnePoint,
            _ => MeasurementState::Measuring,
        }
    }

    pub fn points(&self) -> &[MeasurementPoint] {
        &self.points
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Append a point. From the second point on, returns the measurement
    /// against the immediately preceding one.
    pub fn add_point(&mut self, anchor: NodeId, position: Point3D) -> Option<Measured> {
        let previous = self.points.last().map(|p| p.position);
        self.points.push(MeasurementPoint { anchor, position });
        previous.map(|from| Measured::new(from, position))
    }

    pub fn add_segment(&mut self, node: NodeId) {
        self.segments.push(node);
    }

    pub fn add_label(&mut self, node: NodeId) {
        self.labels.push(node);
    }

    pub fn segments(&self) -> &[NodeId] {
        &self.segments
    }

    pub fn labels(&self) -> &[NodeId] {
        &self.labels
    }

    /// Detach every point, segment and label and return to `Empty`
    pub fn clear(&mut self, scene: &mut SceneGraph) {
        for point in self.points.drain(..) {
            scene.detach(point.anchor);
        }
        for node in self.segments.drain(..).chain(self.labels.drain(..)) {
            scene.detach(node);
        }
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedBackend;
    use crate::scene::NodeKind;
    use std::sync::Arc;

    #[test]
    fn test_state_machine() {
        let mut scene = SceneGraph::new(Arc::new(SimulatedBackend::new()));
        let mut session = MeasurementSession::new();
        assert_eq!(session.state(), MeasurementState::Empty);

        let a = scene.add_anchor(Pose::IDENTITY);
        assert!(session.add_point(a, Point3D::ORIGIN).is_none());
        assert_eq!(session.state(), MeasurementState::OnePoint);

        let b = scene.add_anchor(Pose::IDENTITY);
        let measured = session.add_point(b, Point3D::new(3.0, 4.0, 0.0)).unwrap();
        assert_eq!(measured.distance, 5.0);
        assert_eq!(session.state(), MeasurementState::Measuring);
    }

    #[test]
    fn test_distance_only_between_consecutive_points() {
        let mut session = MeasurementSession::new();
        session.add_point(NodeId(1), Point3D::ORIGIN);
        session.add_point(NodeId(2), Point3D::new(1.0, 0.0, 0.0));
        let third = session
            .add_point(NodeId(3), Point3D::new(1.0, 2.0, 0.0))
            .unwrap();
        assert_eq!(third.from, Point3D::new(1.0, 0.0, 0.0));
        assert!((third.distance - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_clear_detaches_everything() {
        let backend = Arc::new(SimulatedBackend::new());
        let mut scene = SceneGraph::new(backend.clone());
        let mut session = MeasurementSession::new();

        let a = scene.add_anchor(Pose::IDENTITY);
        scene.attach(Some(a), NodeKind::MeasurementDot, Pose::IDENTITY, None);
        session.add_point(a, Point3D::ORIGIN);
        let segment = scene
            .attach(None, NodeKind::Segment, Pose::IDENTITY, None)
            .unwrap();
        session.add_segment(segment);
        let label = scene.attach(None, NodeKind::Label, Pose::IDENTITY, None).unwrap();
        session.add_label(label);

        let generation = session.generation();
        session.clear(&mut scene);

        assert_eq!(session.state(), MeasurementState::Empty);
        assert!(session.segments().is_empty());
        assert!(session.labels().is_empty());
        assert!(scene.is_empty());
        assert_eq!(backend.node_count(), 0);
        assert_eq!(session.generation(), generation + 1);
        assert!(session.add_point(NodeId(99), Point3D::ORIGIN).is_none());
    }

    #[test]
    fn test_segment_pose_points_along_measurement() {
        let measured = Measured::new(Point3D::new(0.0, 0.0, 0.0), Point3D::new(2.0, 0.0, 0.0));
        let pose = measured.segment_pose();
        assert_eq!(pose.position, Point3D::new(1.0, 0.0, 0.0));

        let forward = pose.forward();
        assert!((forward.x - 1.0).abs() < 1e-5);
        assert!(forward.y.abs() < 1e-5);
        assert!(forward.z.abs() < 1e-5);
    }

    #[test]
    fn test_segment_pose_degenerate() {
        let p = Point3D::new(1.0, 1.0, 1.0);
        let pose = Measured::new(p, p).segment_pose();
        assert_eq!(pose.rotation, Quaternion::IDENTITY);
        assert_eq!(pose.position, p);
    }
}
