//! Deterministic in-memory AR runtime
//!
//! Ray-casts against configured bounded planes and feature points using a
//! pinhole camera, records the scene nodes the session attaches, and lets
//! callers inject tracking loss or build failures.

use std::collections::HashMap;
use std::f32::consts::PI;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use ar_plus_spatial::{Plane, Point3D, Pose, Projection, Quaternion, Vector3D, Viewport};

use super::{
    ArBackend, CapturedFrame, Frame, NodeAttachment, PlaneId, PlaneUpdate, PointOrientation,
    RawHit, SessionConfig, Trackable, TrackingState,
};
use crate::error::BackendError;
use crate::render::{Geometry, Material, Renderable, RenderableId};
use crate::scene::{NodeId, NodeKind};

/// Angular tolerance (radians) for a ray to pick up a feature point
const FEATURE_POINT_TOLERANCE: f32 = 0.01;

/// A sparse tracked point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimFeaturePoint {
    pub position: Point3D,
    pub orientation: PointOrientation,
}

/// Snapshot of a node the session attached
#[derive(Debug, Clone, PartialEq)]
pub struct SimNode {
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
    pub local: Pose,
    pub renderable: Option<Renderable>,
    pub enabled: bool,
}

#[derive(Debug)]
struct SimPlane {
    id: PlaneId,
    plane: Plane,
    tracking: TrackingState,
    subsumed_by: Option<PlaneId>,
}

#[derive(Debug)]
struct SimState {
    supported: bool,
    permission: bool,
    permission_requests: u32,
    session: Option<SessionConfig>,
    start_failure: Option<String>,
    paused: bool,
    released: bool,

    viewport: Viewport,
    projection: Projection,
    camera: Pose,
    camera_tracking: TrackingState,

    planes: Vec<SimPlane>,
    pending_updates: Vec<PlaneUpdate>,
    points: Vec<SimFeaturePoint>,
    scripted_hits: Option<Vec<RawHit>>,
    next_plane: u64,

    sequence: u64,
    last_frame: Option<Frame>,

    nodes: HashMap<NodeId, SimNode>,
    plane_renderer_visible: bool,
    next_renderable: u64,
    renderable_failure: Option<String>,
    capture_failure: Option<BackendError>,
}

/// In-memory [`ArBackend`]
#[derive(Debug)]
pub struct SimulatedBackend {
    state: Mutex<SimState>,
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBackend {
    /// Supported device, camera permission granted, empty world
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                supported: true,
                permission: true,
                permission_requests: 0,
                session: None,
                start_failure: None,
                paused: false,
                released: false,
                viewport: Viewport::new(1080, 1920),
                projection: Projection::default(),
                camera: Pose::IDENTITY,
                camera_tracking: TrackingState::Tracking,
                planes: Vec::new(),
                pending_updates: Vec::new(),
                points: Vec::new(),
                scripted_hits: None,
                next_plane: 1,
                sequence: 0,
                last_frame: None,
                nodes: HashMap::new(),
                plane_renderer_visible: true,
                next_renderable: 1,
                renderable_failure: None,
                capture_failure: None,
            }),
        }
    }

    /// A room with a floor 1.2 m below the camera and a wall 4 m ahead; the
    /// camera is pitched 30 degrees down so the view center lands on the floor.
    pub fn room() -> Self {
        let backend = Self::new();
        backend.set_camera_pose(Pose::new(
            Point3D::ORIGIN,
            Quaternion::from_axis_angle(Vector3D::RIGHT, PI / 6.0),
        ));
        backend.add_plane(Plane::new(Pose::from_translation(0.0, -1.2, 3.0), 10.0, 10.0));
        backend.add_plane(Plane::new(
            Pose::new(
                Point3D::new(0.0, 0.3, 4.0),
                Quaternion::from_axis_angle(Vector3D::RIGHT, -PI / 2.0),
            ),
            6.0,
            3.0,
        ));
        backend.add_feature_point(SimFeaturePoint {
            position: Point3D::new(0.4, -0.2, 2.5),
            orientation: PointOrientation::EstimatedSurfaceNormal,
        });
        backend
    }

    pub fn with_viewport(self, width: u32, height: u32) -> Self {
        self.state().viewport = Viewport::new(width, height);
        self
    }

    pub fn unsupported(self) -> Self {
        self.state().supported = false;
        self
    }

    pub fn without_camera_permission(self) -> Self {
        self.state().permission = false;
        self
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn grant_camera_permission(&self) {
        self.state().permission = true;
    }

    pub fn fail_session_start(&self, reason: Option<String>) {
        self.state().start_failure = reason;
    }

    /// Add a tracked plane; it is reported as updated in the next frame
    pub fn add_plane(&self, plane: Plane) -> PlaneId {
        let mut state = self.state();
        let id = PlaneId(state.next_plane);
        state.next_plane += 1;
        state.planes.push(SimPlane {
            id,
            plane,
            tracking: TrackingState::Tracking,
            subsumed_by: None,
        });
        state.pending_updates.push(PlaneUpdate {
            id,
            tracking_state: TrackingState::Tracking,
            subsumed_by: None,
        });
        id
    }

    /// Mark `id` as merged into `into`; it stops producing hits
    pub fn subsume_plane(&self, id: PlaneId, into: PlaneId) {
        let mut state = self.state();
        let mut update = None;
        if let Some(plane) = state.planes.iter_mut().find(|p| p.id == id) {
            plane.subsumed_by = Some(into);
            update = Some(PlaneUpdate {
                id,
                tracking_state: plane.tracking,
                subsumed_by: Some(into),
            });
        }
        state.pending_updates.extend(update);
    }

    /// Report a plane update without changing geometry, e.g. a plane that
    /// is still being refined
    pub fn touch_plane(&self, id: PlaneId) {
        let mut state = self.state();
        let update = state.planes.iter().find(|p| p.id == id).map(|p| PlaneUpdate {
            id,
            tracking_state: p.tracking,
            subsumed_by: p.subsumed_by,
        });
        state.pending_updates.extend(update);
    }

    pub fn add_feature_point(&self, point: SimFeaturePoint) {
        self.state().points.push(point);
    }

    pub fn set_camera_pose(&self, pose: Pose) {
        self.state().camera = pose;
    }

    pub fn set_camera_tracking(&self, tracking: TrackingState) {
        self.state().camera_tracking = tracking;
    }

    /// Bypass ray casting and return exactly these candidates
    pub fn script_hits(&self, hits: Vec<RawHit>) {
        self.state().scripted_hits = Some(hits);
    }

    pub fn clear_scripted_hits(&self) {
        self.state().scripted_hits = None;
    }

    pub fn fail_renderables(&self, reason: Option<String>) {
        self.state().renderable_failure = reason;
    }

    pub fn fail_capture(&self, error: Option<BackendError>) {
        self.state().capture_failure = error;
    }

    pub fn node(&self, id: NodeId) -> Option<SimNode> {
        self.state().nodes.get(&id).cloned()
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<(NodeId, SimNode)> {
        let mut nodes: Vec<_> = self
            .state()
            .nodes
            .iter()
            .filter(|(_, n)| n.kind == kind)
            .map(|(id, n)| (*id, n.clone()))
            .collect();
        nodes.sort_by_key(|(id, _)| *id);
        nodes
    }

    pub fn node_count(&self) -> usize {
        self.state().nodes.len()
    }

    pub fn plane_renderer_visible(&self) -> bool {
        self.state().plane_renderer_visible
    }

    pub fn session_config(&self) -> Option<SessionConfig> {
        self.state().session
    }

    pub fn is_paused(&self) -> bool {
        self.state().paused
    }

    pub fn is_released(&self) -> bool {
        self.state().released
    }

    pub fn permission_requests(&self) -> u32 {
        self.state().permission_requests
    }

    fn cast(state: &SimState, frame: &Frame, x: f32, y: f32) -> Vec<RawHit> {
        let ray = state
            .projection
            .screen_ray(&frame.camera_pose, state.viewport, x, y);
        let mut hits = Vec::new();

        for sim in &state.planes {
            if sim.tracking != TrackingState::Tracking || sim.subsumed_by.is_some() {
                continue;
            }
            if let Some(t) = sim.plane.intersect(&ray) {
                let point = ray.point_at(t);
                hits.push(RawHit {
                    pose: Pose::new(point, sim.plane.center.rotation),
                    distance: t,
                    trackable: Trackable::Plane {
                        id: sim.id,
                        pose_in_polygon: sim.plane.contains(point),
                    },
                });
            }
        }

        for point in &state.points {
            let (t, miss) = ray.closest_approach(point.position);
            if t > 0.0 && miss <= t * FEATURE_POINT_TOLERANCE {
                hits.push(RawHit {
                    pose: Pose::from_position(point.position),
                    distance: t,
                    trackable: Trackable::Point {
                        orientation: point.orientation,
                    },
                });
            }
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }
}

#[async_trait]
impl ArBackend for SimulatedBackend {
    fn name(&self) -> &str {
        "simulated"
    }

    fn is_supported(&self) -> bool {
        self.state().supported
    }

    fn has_camera_permission(&self) -> bool {
        self.state().permission
    }

    fn request_camera_permission(&self) {
        self.state().permission_requests += 1;
    }

    fn start_session(&self, config: &SessionConfig) -> Result<(), BackendError> {
        let mut state = self.state();
        if let Some(reason) = state.start_failure.clone() {
            return Err(BackendError::Session(reason));
        }
        state.session = Some(*config);
        state.paused = false;
        state.released = false;
        Ok(())
    }

    fn pause(&self) {
        self.state().paused = true;
    }

    fn resume(&self) -> Result<(), BackendError> {
        let mut state = self.state();
        if state.session.is_none() || state.released {
            return Err(BackendError::Session("no session to resume".to_string()));
        }
        state.paused = false;
        Ok(())
    }

    fn release(&self) {
        let mut state = self.state();
        state.released = true;
        state.session = None;
        state.last_frame = None;
        state.nodes.clear();
    }

    fn viewport(&self) -> Viewport {
        self.state().viewport
    }

    fn update(&self) -> Option<Frame> {
        let mut state = self.state();
        if state.session.is_none() || state.paused || state.released {
            return None;
        }
        state.sequence += 1;
        let frame = Frame {
            sequence: state.sequence,
            camera_tracking: state.camera_tracking,
            camera_pose: state.camera,
            updated_planes: std::mem::take(&mut state.pending_updates),
        };
        state.last_frame = Some(frame.clone());
        Some(frame)
    }

    fn current_frame(&self) -> Option<Frame> {
        let state = self.state();
        if state.released {
            return None;
        }
        state.last_frame.clone()
    }

    fn hit_test(&self, frame: &Frame, x: f32, y: f32) -> Vec<RawHit> {
        let state = self.state();
        match &state.scripted_hits {
            Some(hits) => hits.clone(),
            None => Self::cast(&state, frame, x, y),
        }
    }

    fn attach_node(&self, node: &NodeAttachment) {
        self.state().nodes.insert(
            node.id,
            SimNode {
                parent: node.parent,
                kind: node.kind,
                local: node.local,
                renderable: node.renderable.clone(),
                enabled: true,
            },
        );
    }

    fn update_node(&self, id: NodeId, local: Pose) {
        if let Some(node) = self.state().nodes.get_mut(&id) {
            node.local = local;
        }
    }

    fn set_node_enabled(&self, id: NodeId, enabled: bool) {
        if let Some(node) = self.state().nodes.get_mut(&id) {
            node.enabled = enabled;
        }
    }

    fn detach_node(&self, id: NodeId) {
        let mut state = self.state();
        let mut doomed = vec![id];
        let mut i = 0;
        while i < doomed.len() {
            let current = doomed[i];
            doomed.extend(
                state
                    .nodes
                    .iter()
                    .filter(|(_, n)| n.parent == Some(current))
                    .map(|(child, _)| *child),
            );
            i += 1;
        }
        for node in doomed {
            state.nodes.remove(&node);
        }
    }

    fn set_plane_renderer_visible(&self, visible: bool) {
        self.state().plane_renderer_visible = visible;
    }

    async fn build_renderable(
        &self,
        geometry: Geometry,
        material: Material,
    ) -> Result<Renderable, BackendError> {
        tokio::task::yield_now().await;

        let mut state = self.state();
        if let Some(reason) = state.renderable_failure.clone() {
            return Err(BackendError::Renderable(reason));
        }
        let id = RenderableId(state.next_renderable);
        state.next_renderable += 1;
        Ok(Renderable {
            id,
            geometry,
            material,
        })
    }

    async fn capture_frame(&self) -> Result<CapturedFrame, BackendError> {
        tokio::task::yield_now().await;

        let state = self.state();
        if let Some(error) = state.capture_failure.clone() {
            return Err(error);
        }
        if state.session.is_none() || state.released {
            return Err(BackendError::SurfaceNotReady);
        }
        let Viewport { width, height } = state.viewport;
        let pixels = [32u8, 32, 32, 255].repeat((width * height) as usize);
        Ok(CapturedFrame {
            width,
            height,
            pixels,
        })
    }
}
