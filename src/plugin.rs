//! Host-facing plugin: spawns the session loop and hands back a handle

use std::sync::Arc;

use anyhow::Result as AnyResult;
use serde_json::Value;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

use crate::backend::ArBackend;
use crate::commands::register_builtin_commands;
use crate::config::PluginConfig;
use crate::dispatcher::CommandRegistry;
use crate::error::{ArError, Result};
use crate::events::HostEvent;
use crate::lifecycle::{LifecycleEvent, SessionState};
use crate::protocol::{await_response, CommandResponse, MethodCall, Reply};
use crate::session::{ArSession, SessionMessage};

/// Channels connecting the host to a running session loop.
///
/// Dropping the handle stops the loop and releases the backend.
pub struct PluginHandle {
    request_tx: UnboundedSender<SessionMessage>,
    event_rx: UnboundedReceiver<HostEvent>,
}

/// Spawn the loop that owns the session and serves host requests.
///
/// The session is opened immediately, as when the host view is created.
/// Must be called from within a Tokio runtime.
pub fn spawn_plugin(backend: Arc<dyn ArBackend>, config: PluginConfig) -> AnyResult<PluginHandle> {
    let mut registry = CommandRegistry::new();
    register_builtin_commands(&mut registry, config.shapes.clone())?;
    Ok(spawn_with_registry(backend, config, registry))
}

/// Like [`spawn_plugin`], serving an already populated command table
pub fn spawn_with_registry(
    backend: Arc<dyn ArBackend>,
    config: PluginConfig,
    registry: CommandRegistry,
) -> PluginHandle {
    let (request_tx, request_rx) = unbounded_channel();
    let (event_tx, event_rx) = unbounded_channel();

    tracing::debug!(
        "Spawning {} view on channel '{}' with {} commands",
        config.channel.view_type,
        config.channel.method_channel,
        registry.len()
    );
    let session = ArSession::new(backend, config, event_tx, request_tx.downgrade());
    tokio::spawn(run_session_loop(session, registry, request_rx));

    PluginHandle {
        request_tx,
        event_rx,
    }
}

async fn run_session_loop(
    mut session: ArSession,
    registry: CommandRegistry,
    mut request_rx: UnboundedReceiver<SessionMessage>,
) {
    if let Err(err) = session.open() {
        tracing::warn!("AR view created without a session: {}", err);
    }

    while let Some(message) = request_rx.recv().await {
        match message {
            SessionMessage::Invoke { call, reply } => registry.dispatch(call, &mut session, reply),
            SessionMessage::FrameUpdate => session.on_frame(),
            SessionMessage::Touch { x, y } => session.on_touch(x, y),
            SessionMessage::Lifecycle { event, reply } => {
                let result = session.handle_lifecycle(event);
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
                if event == LifecycleEvent::Destroy {
                    break;
                }
            }
            SessionMessage::Continuation(continuation) => continuation(&mut session),
            SessionMessage::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }

    if !session.lifecycle().is_destroyed() {
        let _ = session.handle_lifecycle(LifecycleEvent::Destroy);
    }
    tracing::debug!("Session loop stopped");
}

impl PluginHandle {
    /// Invoke a host command by name
    pub async fn invoke(&self, method: &str, arguments: Value) -> CommandResponse {
        self.call(MethodCall::new(method, arguments)).await
    }

    pub async fn call(&self, call: MethodCall) -> CommandResponse {
        let (reply, rx) = Reply::channel();
        if self
            .request_tx
            .send(SessionMessage::Invoke { call, reply })
            .is_err()
        {
            return CommandResponse::error(&ArError::SessionClosed);
        }
        await_response(rx).await
    }

    /// Ask the loop to process the next camera frame
    pub fn frame_update(&self) {
        let _ = self.request_tx.send(SessionMessage::FrameUpdate);
    }

    /// Report a touch-up at view pixel (`x`, `y`)
    pub fn touch_up(&self, x: f32, y: f32) {
        let _ = self.request_tx.send(SessionMessage::Touch { x, y });
    }

    pub async fn resume(&self) -> Result<SessionState> {
        self.lifecycle(LifecycleEvent::Resume).await
    }

    pub async fn pause(&self) -> Result<SessionState> {
        self.lifecycle(LifecycleEvent::Pause).await
    }

    /// Tear the session down; the loop exits afterwards
    pub async fn destroy(&self) -> Result<SessionState> {
        self.lifecycle(LifecycleEvent::Destroy).await
    }

    pub async fn lifecycle(&self, event: LifecycleEvent) -> Result<SessionState> {
        let (tx, rx) = oneshot::channel();
        self.request_tx
            .send(SessionMessage::Lifecycle {
                event,
                reply: Some(tx),
            })
            .map_err(|_| ArError::SessionClosed)?;
        rx.await.map_err(|_| ArError::SessionClosed)?
    }

    /// Wait until every message sent so far has been handled. Work those
    /// messages deferred may still be in flight.
    pub async fn sync(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.request_tx
            .send(SessionMessage::Barrier(tx))
            .map_err(|_| ArError::SessionClosed)?;
        rx.await.map_err(|_| ArError::SessionClosed)
    }

    /// Next host notification; `None` once the loop has stopped
    pub async fn next_event(&mut self) -> Option<HostEvent> {
        self.event_rx.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<HostEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn is_closed(&self) -> bool {
        self.request_tx.is_closed()
    }
}
