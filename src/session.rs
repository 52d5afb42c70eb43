//! The AR session: all scene state, owned by a single loop task
//!
//! Everything here runs on the session loop. Work that has to wait on the
//! backend (renderable builds, frame capture) is spawned with
//! [`ArSession::defer`] and comes back as a [`SessionMessage::Continuation`].

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc::{UnboundedSender, WeakUnboundedSender};
use tokio::sync::oneshot;

use ar_plus_spatial::{Point3D, Pose, Vector3D};

use crate::backend::{ArBackend, TrackingState};
use crate::config::PluginConfig;
use crate::error::{ArError, BackendError, Result};
use crate::events::HostEvent;
use crate::hit_test::{self, HitFilter, HitPosition};
use crate::lifecycle::{LifecycleEvent, SessionLifecycle, SessionState, Transition};
use crate::measurement::MeasurementSession;
use crate::protocol::{MethodCall, Reply};
use crate::render::{Argb, Geometry, Material, Renderable};
use crate::reticle::{Reticle, ReticlePart};
use crate::scene::{NodeKind, SceneGraph};
use crate::screenshot;
use crate::shapes::{ShapeKind, ShapeRegistry, ShapeRequest};

/// Deferred work posted back onto the loop
pub type Continuation = Box<dyn FnOnce(&mut ArSession) + Send>;

/// Messages processed in order by the session loop
pub enum SessionMessage {
    Invoke {
        call: MethodCall,
        reply: Reply,
    },
    /// Pull the next camera frame from the backend
    FrameUpdate,
    /// Touch-up at view pixel (`x`, `y`)
    Touch {
        x: f32,
        y: f32,
    },
    Lifecycle {
        event: LifecycleEvent,
        reply: Option<oneshot::Sender<Result<SessionState>>>,
    },
    Continuation(Continuation),
    /// Answered once every earlier message has been handled
    Barrier(oneshot::Sender<()>),
}

pub struct ArSession {
    backend: Arc<dyn ArBackend>,
    config: PluginConfig,
    events: UnboundedSender<HostEvent>,
    loop_tx: WeakUnboundedSender<SessionMessage>,
    scene: SceneGraph,
    lifecycle: SessionLifecycle,
    shapes: ShapeRegistry,
    measurement: MeasurementSession,
    reticle: Reticle,
    visual_elements_visible: bool,
}

impl ArSession {
    pub fn new(
        backend: Arc<dyn ArBackend>,
        config: PluginConfig,
        events: UnboundedSender<HostEvent>,
        loop_tx: WeakUnboundedSender<SessionMessage>,
    ) -> Self {
        let lifecycle = SessionLifecycle::new(config.session.session_config());
        let reticle = Reticle::new(config.reticle.clone());
        Self {
            scene: SceneGraph::new(backend.clone()),
            backend,
            config,
            events,
            loop_tx,
            lifecycle,
            shapes: ShapeRegistry::new(),
            measurement: MeasurementSession::new(),
            reticle,
            visual_elements_visible: true,
        }
    }

    pub fn backend(&self) -> &Arc<dyn ArBackend> {
        &self.backend
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    pub fn lifecycle(&self) -> &SessionLifecycle {
        &self.lifecycle
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn shapes(&self) -> &ShapeRegistry {
        &self.shapes
    }

    pub fn measurement(&self) -> &MeasurementSession {
        &self.measurement
    }

    pub fn reticle(&self) -> &Reticle {
        &self.reticle
    }

    /// Guidance text to show, if the overlay is currently visible
    pub fn guidance(&self) -> Option<&str> {
        self.lifecycle
            .guidance_visible()
            .then_some(self.config.session.guidance_text.as_str())
    }

    pub fn visual_elements_visible(&self) -> bool {
        self.visual_elements_visible
    }

    fn emit(&self, event: HostEvent) {
        tracing::debug!("Notifying host: {}", event.method_name());
        if self.events.send(event).is_err() {
            tracing::debug!("Host event receiver dropped");
        }
    }

    /// Run `work` off the loop and hand its output to `then` back on it.
    ///
    /// The continuation is discarded when the loop has stopped or the session
    /// that scheduled it is no longer current. Anything it owns, such as a
    /// [`Reply`], is dropped with it.
    pub fn defer<T, W, C>(&self, work: W, then: C)
    where
        T: Send + 'static,
        W: Future<Output = T> + Send + 'static,
        C: FnOnce(&mut ArSession, T) + Send + 'static,
    {
        let loop_tx = self.loop_tx.clone();
        let scheduled_in = self.lifecycle.sessions_started();

        tokio::spawn(async move {
            let output = work.await;
            let Some(tx) = loop_tx.upgrade() else {
                tracing::debug!("Session loop gone; dropping deferred result");
                return;
            };
            let continuation: Continuation = Box::new(move |session: &mut ArSession| {
                if session.lifecycle.is_destroyed()
                    || session.lifecycle.sessions_started() != scheduled_in
                {
                    tracing::debug!("Session replaced; dropping deferred result");
                    return;
                }
                then(session, output);
            });
            if tx.send(SessionMessage::Continuation(continuation)).is_err() {
                tracing::debug!("Session loop stopped; dropping deferred result");
            }
        });
    }

    /// Build a renderable off the loop, then run `then` with it on the loop.
    /// Build failures are logged and `then` is skipped.
    fn build_then<C>(&self, what: &'static str, geometry: Geometry, material: Material, then: C)
    where
        C: FnOnce(&mut ArSession, Renderable) + Send + 'static,
    {
        let backend = self.backend.clone();
        self.defer(
            async move { backend.build_renderable(geometry, material).await },
            move |session, built| match built {
                Ok(renderable) => then(session, renderable),
                Err(err) => tracing::warn!("Failed to build {}: {}", what, err),
            },
        );
    }

    // Lifecycle

    /// Bring the session up when the view is created
    pub fn open(&mut self) -> Result<SessionState> {
        let transition = self.lifecycle.open(self.backend.as_ref());
        self.after_transition(transition)
    }

    pub fn handle_lifecycle(&mut self, event: LifecycleEvent) -> Result<SessionState> {
        let backend = self.backend.clone();
        let transition = match event {
            LifecycleEvent::Resume => self.lifecycle.resume(backend.as_ref()),
            LifecycleEvent::Pause => Ok(self.lifecycle.pause(backend.as_ref())),
            LifecycleEvent::Destroy => {
                if !self.lifecycle.is_destroyed() {
                    self.teardown();
                }
                Ok(self.lifecycle.destroy(backend.as_ref()))
            }
        };
        self.after_transition(transition)
    }

    fn after_transition(&mut self, transition: Result<Transition>) -> Result<SessionState> {
        let transition = transition.map_err(|err| {
            tracing::error!("AR session lifecycle failed: {}", err);
            err
        })?;
        match transition {
            Transition::Started => self.on_session_started(),
            Transition::AwaitingPermission => {
                tracing::info!("Camera permission requested; session not started")
            }
            Transition::Resumed => tracing::info!("AR session resumed"),
            Transition::Paused => tracing::info!("AR session paused"),
            Transition::Destroyed => tracing::info!("AR session destroyed"),
            Transition::None => {}
        }
        Ok(self.lifecycle.state())
    }

    fn on_session_started(&mut self) {
        tracing::info!(
            "AR session started on {} backend ({:?})",
            self.backend.name(),
            self.config.session.plane_finding
        );
        self.backend
            .set_plane_renderer_visible(self.visual_elements_visible);
        self.emit(HostEvent::Created);
        self.build_reticle();
    }

    fn build_reticle(&self) {
        let specs = self.reticle.part_specs();
        let material = self.reticle.material();
        let backend = self.backend.clone();
        self.defer(
            async move {
                let mut parts = Vec::with_capacity(specs.len());
                for (local, geometry) in specs {
                    let renderable = backend.build_renderable(geometry, material).await?;
                    parts.push(ReticlePart { local, renderable });
                }
                Ok::<_, BackendError>(parts)
            },
            |session, built| match built {
                Ok(parts) => session.reticle.set_parts(&mut session.scene, parts),
                Err(err) => tracing::warn!("Focus reticle unavailable: {}", err),
            },
        );
    }

    fn teardown(&mut self) {
        self.shapes.clear(&mut self.scene);
        self.measurement.clear(&mut self.scene);
        self.reticle.detach(&mut self.scene);
        self.scene.clear();
    }

    // Per-frame and touch input

    /// Advance one frame: plane detection, then reticle placement
    pub fn on_frame(&mut self) {
        if !self.lifecycle.is_tracking() {
            return;
        }
        let Some(frame) = self.backend.update() else {
            return;
        };

        if self.lifecycle.observe_planes(&frame) {
            tracing::info!("Planes detected");
            self.emit(HostEvent::DetectedPlanes);
        }

        if frame.camera_tracking != TrackingState::Tracking {
            return;
        }
        let (x, y) = self.backend.viewport().center();
        if let Ok(hit) = hit_test::hit_test_frame(
            self.backend.as_ref(),
            &frame,
            x,
            y,
            HitFilter::SurfaceOrOrientedPoint,
        ) {
            self.reticle.place(&mut self.scene, hit.pose);
        }
    }

    /// Touch-up: notify the host when the finger is over a surface
    pub fn on_touch(&mut self, x: f32, y: f32) {
        if !self.lifecycle.is_tracking() {
            return;
        }
        let hit = hit_test::hit_test(
            self.backend.as_ref(),
            x,
            y,
            HitFilter::SurfaceOrOrientedPoint,
        );
        if hit.is_ok() {
            self.emit(HostEvent::Tap { x, y });
        }
    }

    // Commands

    /// A paused session still holds its last frame, which must not be hit
    /// tested
    fn ensure_not_paused(&self) -> Result<()> {
        if self.lifecycle.state() == SessionState::Paused {
            return Err(ArError::TrackingInvalid);
        }
        Ok(())
    }

    pub fn perform_hit_test(&self, x: f32, y: f32) -> Result<HitPosition> {
        self.ensure_not_paused()?;
        let hit = hit_test::hit_test(
            self.backend.as_ref(),
            x,
            y,
            HitFilter::SurfaceOrOrientedPoint,
        )?;
        Ok(HitPosition::from(&hit))
    }

    /// Place a shape; answers with the new shape id once its renderable exists
    pub fn make_shape(&mut self, request: ShapeRequest, reply: Reply) {
        let kind = match request.shape.parse::<ShapeKind>() {
            Ok(kind) => kind,
            Err(err) => return reply.error(err),
        };
        if let Err(err) = self.ensure_not_paused() {
            return reply.error(err);
        }
        let hit = match hit_test::hit_test(
            self.backend.as_ref(),
            request.screen_x,
            request.screen_y,
            HitFilter::SurfaceOrOrientedPoint,
        ) {
            Ok(hit) => hit,
            Err(err) => return reply.error(err),
        };

        let anchor = self.scene.add_anchor(hit.pose);
        let geometry = kind.geometry(&request.dimensions);
        let material = Material::opaque(request.color);
        let backend = self.backend.clone();

        self.defer(
            async move { backend.build_renderable(geometry, material).await },
            move |session, built| {
                let renderable = match built {
                    Ok(renderable) => renderable,
                    Err(err) => {
                        tracing::warn!("Failed to create {} renderable: {}", kind, err);
                        session.scene.detach(anchor);
                        return reply.error(ArError::RenderableCreationFailed(err.to_string()));
                    }
                };
                let Some(node) = session.scene.attach(
                    Some(anchor),
                    NodeKind::Shape,
                    Pose::IDENTITY,
                    Some(renderable),
                ) else {
                    return reply.error(ArError::RenderableCreationFailed(
                        "anchor was removed before the shape was built".to_string(),
                    ));
                };

                let id = session.shapes.register(
                    kind,
                    request.dimensions,
                    request.color,
                    anchor,
                    node,
                    hit.pose,
                );
                tracing::info!(
                    "Placed {} {} at ({:.3}, {:.3}, {:.3})",
                    kind,
                    id,
                    hit.pose.position.x,
                    hit.pose.position.y,
                    hit.pose.position.z
                );
                reply.success(json!(id));
            },
        );
    }

    pub fn move_shape(&mut self, id: &str, offset: Point3D) -> Result<()> {
        self.shapes.move_shape(&mut self.scene, id, offset)?;
        tracing::debug!("Moved shape {}", id);
        Ok(())
    }

    pub fn remove_shape(&mut self, id: &str) -> Result<()> {
        let shape = self.shapes.remove(&mut self.scene, id)?;
        tracing::info!("Removed {} {}", shape.kind, shape.id);
        Ok(())
    }

    /// Record a measurement point at the screen center. Missing frames,
    /// lost tracking and misses are ignored.
    pub fn shoot(&mut self) {
        if !self.lifecycle.is_tracking() {
            tracing::debug!("Shot ignored: session is not tracking");
            return;
        }
        let hit = match hit_test::hit_test_center(self.backend.as_ref(), HitFilter::BoundedPlaneOnly)
        {
            Ok(hit) => hit,
            Err(err) => {
                tracing::debug!("Shot ignored: {}", err);
                return;
            }
        };

        let style = self.config.measurement.clone();
        let anchor = self.scene.add_anchor(hit.pose);
        let measured = self.measurement.add_point(anchor, hit.pose.position);

        self.build_then(
            "measurement dot",
            Geometry::Cylinder {
                radius: style.dot_radius,
                height: style.dot_height,
            },
            Material::opaque(style.dot_color),
            move |session, renderable| {
                session.scene.attach(
                    Some(anchor),
                    NodeKind::MeasurementDot,
                    Pose::IDENTITY,
                    Some(renderable),
                );
            },
        );

        let Some(measured) = measured else {
            return;
        };
        tracing::info!("Measured {:.3} m", measured.distance);
        self.emit(HostEvent::DistanceMeasured {
            distance: measured.distance,
        });

        let generation = self.measurement.generation();
        let segment_pose = measured.segment_pose();
        self.build_then(
            "measurement segment",
            Geometry::Cube {
                size: Vector3D::new(style.line_thickness, style.line_thickness, measured.distance),
            },
            Material::opaque(style.line_color),
            move |session, renderable| {
                if session.measurement.generation() != generation {
                    return;
                }
                if let Some(node) =
                    session
                        .scene
                        .attach(None, NodeKind::Segment, segment_pose, Some(renderable))
                {
                    session.measurement.add_segment(node);
                }
            },
        );

        let label_pose = Pose::from_position(measured.midpoint());
        self.build_then(
            "distance label",
            Geometry::Text {
                content: style.format_distance(measured.distance),
                background: Argb::SCRIM,
            },
            Material::opaque(Argb::WHITE),
            move |session, renderable| {
                if session.measurement.generation() != generation {
                    return;
                }
                if let Some(node) =
                    session
                        .scene
                        .attach(None, NodeKind::Label, label_pose, Some(renderable))
                {
                    session.measurement.add_label(node);
                }
            },
        );
    }

    pub fn clear_all_points(&mut self) {
        let count = self.measurement.points().len();
        self.measurement.clear(&mut self.scene);
        tracing::debug!("Cleared {} measurement points", count);
    }

    /// Toggle the reticle and plane visualisation; measurements are untouched
    pub fn set_visual_elements_visible(&mut self, visible: bool) {
        self.visual_elements_visible = visible;
        self.backend.set_plane_renderer_visible(visible);
        self.reticle.set_visible(&mut self.scene, visible);
    }

    /// Capture the rendered frame to a PNG; answers with its path
    pub fn take_screenshot(&self, reply: Reply) {
        let backend = self.backend.clone();
        let directory = self.config.screenshot.output_dir();
        let prefix = self.config.screenshot.file_prefix.clone();

        self.defer(
            capture_and_save(backend, directory, prefix),
            move |_, saved| reply.result(saved.map(|path| json!(path.display().to_string()))),
        );
    }
}

async fn capture_and_save(
    backend: Arc<dyn ArBackend>,
    directory: PathBuf,
    prefix: String,
) -> Result<PathBuf> {
    let frame = backend.capture_frame().await.map_err(|err| {
        tracing::warn!("Frame capture failed: {}", err);
        ArError::CaptureFailed(err.to_string())
    })?;
    tokio::task::spawn_blocking(move || screenshot::save_png(frame, Path::new(&directory), &prefix))
        .await
        .map_err(|err| ArError::SaveFailed(err.to_string()))?
}

/// Loop queue for driving a session by hand in tests; holds the strong
/// sender so deferred work can post back
#[cfg(test)]
pub(crate) struct TestLoop {
    _tx: UnboundedSender<SessionMessage>,
    pub rx: tokio::sync::mpsc::UnboundedReceiver<SessionMessage>,
}

#[cfg(test)]
pub(crate) fn test_session(
    backend: Arc<dyn ArBackend>,
) -> (
    ArSession,
    tokio::sync::mpsc::UnboundedReceiver<HostEvent>,
    TestLoop,
) {
    let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();
    let (loop_tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let session = ArSession::new(backend, PluginConfig::default(), event_tx, loop_tx.downgrade());
    (session, event_rx, TestLoop { _tx: loop_tx, rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedBackend;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn drain(events: &mut UnboundedReceiver<HostEvent>) -> Vec<HostEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    /// Run the next `count` continuations posted to the loop
    async fn settle(session: &mut ArSession, test_loop: &mut TestLoop, count: usize) {
        for _ in 0..count {
            match test_loop.rx.recv().await {
                Some(SessionMessage::Continuation(continuation)) => continuation(session),
                Some(_) => panic!("unexpected loop message"),
                None => panic!("loop channel closed"),
            }
        }
    }

    #[tokio::test]
    async fn test_open_emits_created_and_builds_reticle() {
        let backend = Arc::new(SimulatedBackend::room());
        let (mut session, mut events, mut loop_rx) = test_session(backend.clone());

        assert_eq!(session.open().unwrap(), SessionState::Tracking);
        assert_eq!(drain(&mut events), vec![HostEvent::Created]);
        assert!(session.guidance().is_some());

        settle(&mut session, &mut loop_rx, 1).await;
        assert!(session.reticle().is_ready());

        session.on_frame();
        assert_eq!(drain(&mut events), vec![HostEvent::DetectedPlanes]);
        assert!(session.guidance().is_none());
        assert!(session.reticle().visual().is_some());
    }

    #[tokio::test]
    async fn test_measurement_renders_dot_segment_label() {
        let backend = Arc::new(SimulatedBackend::room());
        let (mut session, mut events, mut loop_rx) = test_session(backend.clone());
        session.open().unwrap();
        settle(&mut session, &mut loop_rx, 1).await;
        session.on_frame();
        drain(&mut events);

        session.shoot();
        settle(&mut session, &mut loop_rx, 1).await;
        assert!(drain(&mut events).is_empty());

        backend.set_camera_pose(Pose::new(
            Point3D::new(0.5, 0.0, 0.0),
            backend.current_frame().unwrap().camera_pose.rotation,
        ));
        session.on_frame();
        session.shoot();
        settle(&mut session, &mut loop_rx, 3).await;

        let events = drain(&mut events);
        assert_eq!(events.len(), 1);
        let HostEvent::DistanceMeasured { distance } = events[0] else {
            panic!("expected a distance event");
        };
        assert!((distance - 0.5).abs() < 1e-4);

        assert_eq!(backend.nodes_of_kind(NodeKind::MeasurementDot).len(), 2);
        assert_eq!(session.measurement().segments().len(), 1);
        let labels = backend.nodes_of_kind(NodeKind::Label);
        assert_eq!(labels.len(), 1);
        let renderable = labels[0].1.renderable.clone().unwrap();
        assert!(matches!(renderable.geometry, Geometry::Text { ref content, .. } if content == "0.50 m"));
    }

    #[tokio::test]
    async fn test_late_segment_after_clear_is_discarded() {
        let backend = Arc::new(SimulatedBackend::room());
        let (mut session, mut events, mut loop_rx) = test_session(backend.clone());
        session.open().unwrap();
        settle(&mut session, &mut loop_rx, 1).await;
        session.on_frame();

        session.shoot();
        backend.set_camera_pose(Pose::new(
            Point3D::new(0.2, 0.0, 0.0),
            backend.current_frame().unwrap().camera_pose.rotation,
        ));
        session.on_frame();
        session.shoot();
        session.clear_all_points();
        settle(&mut session, &mut loop_rx, 4).await;

        assert!(session.measurement().points().is_empty());
        assert!(backend.nodes_of_kind(NodeKind::Segment).is_empty());
        assert!(backend.nodes_of_kind(NodeKind::Label).is_empty());
        assert!(backend.nodes_of_kind(NodeKind::MeasurementDot).is_empty());
        drain(&mut events);
    }

    #[tokio::test]
    async fn test_continuation_after_destroy_drops_reply() {
        let backend = Arc::new(SimulatedBackend::room());
        let (mut session, _events, mut loop_rx) = test_session(backend.clone());
        session.open().unwrap();
        settle(&mut session, &mut loop_rx, 1).await;
        session.on_frame();

        let (reply, rx) = Reply::channel();
        let (cx, cy) = backend.viewport().center();
        session.make_shape(
            ShapeRequest {
                shape: "sphere".to_string(),
                dimensions: crate::shapes::ShapeDimensions {
                    radius: 0.1,
                    height: 0.1,
                    width: 0.1,
                    depth: 0.1,
                },
                screen_x: cx,
                screen_y: cy,
                color: Argb::YELLOW,
            },
            reply,
        );
        session.handle_lifecycle(LifecycleEvent::Destroy).unwrap();
        settle(&mut session, &mut loop_rx, 1).await;

        let response = crate::protocol::await_response(rx).await;
        assert_eq!(response.error_code(), Some("SESSION_CLOSED"));
        assert!(session.shapes().is_empty());
    }

    #[tokio::test]
    async fn test_visual_elements_toggle() {
        let backend = Arc::new(SimulatedBackend::room());
        let (mut session, _events, mut loop_rx) = test_session(backend.clone());
        session.open().unwrap();
        settle(&mut session, &mut loop_rx, 1).await;
        session.on_frame();
        let visual = session.reticle().visual().unwrap();

        session.set_visual_elements_visible(false);
        assert!(!backend.plane_renderer_visible());
        assert!(!backend.node(visual).unwrap().enabled);

        session.set_visual_elements_visible(true);
        assert!(backend.plane_renderer_visible());
        assert!(backend.node(visual).unwrap().enabled);
    }
}
