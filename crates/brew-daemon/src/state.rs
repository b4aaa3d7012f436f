//! Shared runtime state for brew-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The order workflow and
//! the NLU detector are built once at startup and shared read-only; all
//! mutable state lives in the backing stores.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use brew_nlu::IntentDetector;
use brew_order::OrderWorkflow;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::api_types::OrderPlacedEvent;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    OrderPlaced(OrderPlacedEvent),
    LogLine { level: String, msg: String },
}

impl BusMsg {
    /// SSE `event:` name.
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::OrderPlaced(_) => "order_placed",
            BusMsg::LogLine { .. } => "log",
        }
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub workflow: Arc<OrderWorkflow>,
    pub nlu: Arc<dyn IntentDetector>,
    /// Directory holding `index.html` and other static assets.
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn new(
        workflow: Arc<OrderWorkflow>,
        nlu: Arc<dyn IntentDetector>,
        static_dir: impl Into<PathBuf>,
    ) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);

        Self {
            bus,
            build: BuildInfo {
                service: "brew-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            workflow,
            nlu,
            static_dir: static_dir.into(),
        }
    }

    /// Best-effort publish; no subscribers is not an error.
    pub fn publish(&self, msg: BusMsg) {
        let _ = self.bus.send(msg);
    }
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}
