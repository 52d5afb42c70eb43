//! AR session lifecycle state

use serde::{Deserialize, Serialize};

use crate::backend::{ArBackend, Frame, SessionConfig, TrackingState};
use crate::error::{ArError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Tracking,
    Paused,
    Destroyed,
}

/// Lifecycle events delivered by the hosting view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    Resume,
    Pause,
    Destroy,
}

/// Outcome of a lifecycle request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing changed
    None,
    /// A fresh session was started
    Started,
    Resumed,
    Paused,
    /// Camera permission is missing and was requested
    AwaitingPermission,
    Destroyed,
}

/// Session state machine over a backend.
///
/// Plane-detection bookkeeping lives here so that starting a new session
/// re-arms `onDetectedPlanes`.
#[derive(Debug)]
pub struct SessionLifecycle {
    config: SessionConfig,
    state: SessionState,
    planes_notified: bool,
    guidance_visible: bool,
    sessions_started: u64,
}

impl SessionLifecycle {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Uninitialized,
            planes_notified: false,
            guidance_visible: false,
            sessions_started: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_tracking(&self) -> bool {
        self.state == SessionState::Tracking
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == SessionState::Destroyed
    }

    /// Whether the "move your phone" overlay should be shown
    pub fn guidance_visible(&self) -> bool {
        self.guidance_visible
    }

    pub fn planes_notified(&self) -> bool {
        self.planes_notified
    }

    /// Number of sessions started so far; changes whenever a new session
    /// replaces the previous one
    pub fn sessions_started(&self) -> u64 {
        self.sessions_started
    }

    /// Start a session if camera permission is granted, else request it
    pub fn open(&mut self, backend: &dyn ArBackend) -> Result<Transition> {
        if !backend.has_camera_permission() {
            backend.request_camera_permission();
            return Ok(Transition::AwaitingPermission);
        }
        self.initialize(backend)
    }

    /// Check capability and start a fresh session.
    ///
    /// A no-op while a session is already running.
    pub fn initialize(&mut self, backend: &dyn ArBackend) -> Result<Transition> {
        match self.state {
            SessionState::Destroyed => return Err(ArError::SessionClosed),
            SessionState::Tracking | SessionState::Paused => return Ok(Transition::None),
            SessionState::Uninitialized | SessionState::Initializing => {}
        }

        if !backend.is_supported() {
            return Err(ArError::Unsupported);
        }

        self.state = SessionState::Initializing;
        if let Err(err) = backend.start_session(&self.config) {
            self.state = SessionState::Uninitialized;
            return Err(ArError::SessionStartFailed(err.to_string()));
        }

        self.state = SessionState::Tracking;
        self.planes_notified = false;
        self.guidance_visible = true;
        self.sessions_started += 1;
        Ok(Transition::Started)
    }

    /// Resume tracking, initialising first if no session was ever started
    pub fn resume(&mut self, backend: &dyn ArBackend) -> Result<Transition> {
        match self.state {
            SessionState::Destroyed => Err(ArError::SessionClosed),
            SessionState::Tracking => Ok(Transition::None),
            SessionState::Uninitialized | SessionState::Initializing => self.open(backend),
            SessionState::Paused => {
                if !backend.has_camera_permission() {
                    backend.request_camera_permission();
                    return Ok(Transition::AwaitingPermission);
                }
                backend
                    .resume()
                    .map_err(|err| ArError::SessionStartFailed(err.to_string()))?;
                self.state = SessionState::Tracking;
                Ok(Transition::Resumed)
            }
        }
    }

    pub fn pause(&mut self, backend: &dyn ArBackend) -> Transition {
        if self.state != SessionState::Tracking {
            return Transition::None;
        }
        backend.pause();
        self.state = SessionState::Paused;
        Transition::Paused
    }

    /// Release the backend session; terminal
    pub fn destroy(&mut self, backend: &dyn ArBackend) -> Transition {
        if self.state == SessionState::Destroyed {
            return Transition::None;
        }
        backend.release();
        self.state = SessionState::Destroyed;
        self.guidance_visible = false;
        Transition::Destroyed
    }

    /// Inspect a frame's plane updates. Returns `true` exactly once per
    /// session, for the first tracked plane that was not merged into another.
    pub fn observe_planes(&mut self, frame: &Frame) -> bool {
        if self.planes_notified || !self.is_tracking() {
            return false;
        }
        let detected = frame
            .updated_planes
            .iter()
            .any(|plane| plane.tracking_state == TrackingState::Tracking && plane.subsumed_by.is_none());
        if detected {
            self.planes_notified = true;
            self.guidance_visible = false;
        }
        detected
    }
}
