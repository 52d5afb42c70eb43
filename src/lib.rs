//! Augmented-reality plugin core.
//!
//! A host view talks to the plugin through [`PluginHandle`]: it invokes
//! named commands (`makeShape`, `shoot`, `takeScreenshot`, ...), forwards
//! frame ticks, touches and lifecycle events, and receives [`HostEvent`]
//! notifications. The AR runtime itself sits behind [`ArBackend`];
//! [`SimulatedBackend`] is an in-memory implementation for tests and the
//! `ar-plus-sim` driver.

pub mod backend;
pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod logging;
pub mod measurement;
pub mod plugin;
pub mod protocol;
pub mod render;
pub mod reticle;
pub mod scene;
pub mod screenshot;
pub mod session;
pub mod shapes;

pub use ar_plus_spatial as spatial;

pub use backend::{ArBackend, SimulatedBackend};
pub use config::PluginConfig;
pub use dispatcher::{CommandHandler, CommandRegistry};
pub use error::{ArError, BackendError, Result};
pub use events::HostEvent;
pub use lifecycle::{LifecycleEvent, SessionState};
pub use plugin::{spawn_plugin, spawn_with_registry, PluginHandle};
pub use protocol::{CommandResponse, MethodCall};
