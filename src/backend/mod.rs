//! Capability interface over a vendor AR runtime
//!
//! Each platform (ARCore/Sceneform, ARKit/SceneKit) provides one
//! [`ArBackend`]; the session workflow is written once against it.
//! [`SimulatedBackend`] is an in-memory implementation for tests and the
//! `ar-plus-sim` binary.

mod simulated;

pub use simulated::{SimFeaturePoint, SimNode, SimulatedBackend};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ar_plus_spatial::{Pose, Viewport};

use crate::error::BackendError;
use crate::render::{Geometry, Material, Renderable};
use crate::scene::{NodeId, NodeKind};

/// Which plane orientations the runtime should look for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaneFindingMode {
    Disabled,
    Horizontal,
    Vertical,
    HorizontalAndVertical,
}

/// How frame updates are delivered relative to the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    Blocking,
    LatestCameraImage,
}

/// Session configuration passed to [`ArBackend::start_session`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub plane_finding: PlaneFindingMode,
    pub update_mode: UpdateMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            plane_finding: PlaneFindingMode::HorizontalAndVertical,
            update_mode: UpdateMode::LatestCameraImage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    Tracking,
    Paused,
    Stopped,
}

/// Runtime identifier of a detected plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaneId(pub u64);

/// Orientation estimate attached to a feature point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointOrientation {
    InitializedToIdentity,
    EstimatedSurfaceNormal,
}

/// What a raw ray-cast candidate struck
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trackable {
    Plane { id: PlaneId, pose_in_polygon: bool },
    Point { orientation: PointOrientation },
    Other,
}

/// One unfiltered ray-cast candidate, in the runtime's ranking order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawHit {
    pub pose: Pose,
    /// Distance from the camera in meters
    pub distance: f32,
    pub trackable: Trackable,
}

/// A plane whose state changed in the latest frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneUpdate {
    pub id: PlaneId,
    pub tracking_state: TrackingState,
    /// Set when the plane was merged into another one
    pub subsumed_by: Option<PlaneId>,
}

/// One camera frame as seen by the session
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub sequence: u64,
    pub camera_tracking: TrackingState,
    pub camera_pose: Pose,
    pub updated_planes: Vec<PlaneUpdate>,
}

/// RGBA8 pixels copied from the rendered surface
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// A node the session asks the backend to render
#[derive(Debug, Clone, PartialEq)]
pub struct NodeAttachment {
    pub id: NodeId,
    /// `None` attaches directly to the scene root
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
    /// Pose relative to `parent`
    pub local: Pose,
    pub renderable: Option<Renderable>,
}

/// Vendor AR runtime surface used by the session.
///
/// All synchronous methods are called from the session loop only. The two
/// async builders may complete on any executor thread.
#[async_trait]
pub trait ArBackend: Send + Sync {
    /// Short platform name for logs
    fn name(&self) -> &str;

    /// Whether the device can run AR tracking at all
    fn is_supported(&self) -> bool;

    fn has_camera_permission(&self) -> bool;

    fn request_camera_permission(&self);

    fn start_session(&self, config: &SessionConfig) -> Result<(), BackendError>;

    fn pause(&self);

    fn resume(&self) -> Result<(), BackendError>;

    /// Release the tracking resource; the backend is unusable afterwards
    fn release(&self);

    fn viewport(&self) -> Viewport;

    /// Advance to the newest camera frame, returning it
    fn update(&self) -> Option<Frame>;

    /// The frame produced by the last [`ArBackend::update`], if any
    fn current_frame(&self) -> Option<Frame>;

    /// Ray-cast candidates through pixel (`x`, `y`), nearest first
    fn hit_test(&self, frame: &Frame, x: f32, y: f32) -> Vec<RawHit>;

    fn attach_node(&self, node: &NodeAttachment);

    fn update_node(&self, id: NodeId, local: Pose);

    fn set_node_enabled(&self, id: NodeId, enabled: bool);

    /// Remove a node and everything below it
    fn detach_node(&self, id: NodeId);

    fn set_plane_renderer_visible(&self, visible: bool);

    async fn build_renderable(
        &self,
        geometry: Geometry,
        material: Material,
    ) -> Result<Renderable, BackendError>;

    async fn capture_frame(&self) -> Result<CapturedFrame, BackendError>;
}
