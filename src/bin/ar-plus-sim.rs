//! Drive the plugin over stdin/stdout against the simulated backend.
//!
//! Each input line is a JSON object:
//!
//! ```text
//! {"type":"invoke","method":"makeShape","arguments":{"shape":"cube"}}
//! {"type":"frame"}
//! {"type":"touch","x":540,"y":960}
//! {"type":"lifecycle","event":"pause"}
//! ```
//!
//! Command responses and host notifications are written to stdout, one JSON
//! object per line. Logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};

use ar_plus::lifecycle::LifecycleEvent;
use ar_plus::logging::init_logging;
use ar_plus::{spawn_plugin, PluginConfig, PluginHandle, SimulatedBackend};

#[derive(Parser)]
#[command(name = "ar-plus-sim")]
#[command(about = "Run the AR plugin against a simulated scene", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Simulated world to start in
    #[arg(long, value_enum, default_value_t = SceneKind::Room)]
    scene: SceneKind,

    /// Advance a frame every N milliseconds (0 = only on request)
    #[arg(long, default_value_t = 0)]
    tick_ms: u64,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SceneKind {
    /// Floor and wall in front of the camera
    Room,
    /// Nothing to hit
    Empty,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Input {
    Invoke {
        method: String,
        #[serde(default)]
        arguments: Value,
    },
    Frame,
    Touch {
        x: f32,
        y: f32,
    },
    Lifecycle {
        event: LifecycleEvent,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = PluginConfig::load_or_default(cli.config.as_deref())?;
    let backend = match cli.scene {
        SceneKind::Room => SimulatedBackend::room(),
        SceneKind::Empty => SimulatedBackend::new(),
    };
    let mut handle = spawn_plugin(Arc::new(backend), config)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = (cli.tick_ms > 0)
        .then(|| tokio::time::interval(Duration::from_millis(cli.tick_ms)));

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("reading stdin")?,
            _ = tick(&mut ticker) => {
                handle.frame_update();
                flush_events(&mut handle).await;
                continue;
            }
        };
        let Some(line) = line else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<Input>(line) {
            Ok(input) => {
                if !handle_input(&handle, input).await {
                    flush_events(&mut handle).await;
                    break;
                }
            }
            Err(err) => emit(json!({ "error": format!("bad input: {}", err) })),
        }
        flush_events(&mut handle).await;
    }

    if !handle.is_closed() {
        flush_events(&mut handle).await;
        let _ = handle.destroy().await;
    }
    Ok(())
}

/// Returns `false` once the session has been destroyed
async fn handle_input(handle: &PluginHandle, input: Input) -> bool {
    match input {
        Input::Invoke { method, arguments } => {
            let response = handle.invoke(&method, arguments).await;
            emit(json!({ "method": method, "response": response }));
        }
        Input::Frame => handle.frame_update(),
        Input::Touch { x, y } => handle.touch_up(x, y),
        Input::Lifecycle { event } => {
            let state = handle.lifecycle(event).await;
            match state {
                Ok(state) => emit(json!({ "lifecycle": event, "state": state })),
                Err(err) => emit(json!({ "lifecycle": event, "error": err.code() })),
            }
            if event == LifecycleEvent::Destroy {
                return false;
            }
        }
    }
    true
}

async fn tick(ticker: &mut Option<tokio::time::Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Let deferred work finish, then print pending notifications
async fn flush_events(handle: &mut PluginHandle) {
    for _ in 0..4 {
        if handle.sync().await.is_err() {
            break;
        }
        tokio::task::yield_now().await;
    }
    while let Some(event) = handle.try_next_event() {
        emit(json!({ "event": event.to_method_call() }));
    }
}

fn emit(value: Value) {
    println!("{}", value);
}
