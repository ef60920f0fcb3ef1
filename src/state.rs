use crate::config::AppConfig;
use crate::db::DbPool;
use crate::intake::outcome::OperationalOutcome;
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};

// ── Messages INTO the intake worker (bounded channel, oneshot reply) ──

#[derive(Debug)]
pub struct IntakeRequest {
    pub raw: serde_json::Value,
    pub reply: oneshot::Sender<OperationalOutcome>,
}

// ── Messages OUT to dashboard clients ──

#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    #[serde(rename = "command_outcome")]
    CommandOutcome {
        session_id: String,
        command_id: String,
        status: String,
        error_code: Option<String>,
        state_hash: Option<String>,
        timestamp: String,
    },

    #[serde(rename = "counters")]
    CountersSnapshot {
        commands_received: u64,
        commands_accepted: u64,
        replays_detected: u64,
        conflicts_detected: u64,
        commands_rejected: u64,
    },
}

// ── Performance counters (lock-free) ──

pub struct PerfCounters {
    pub commands_received: AtomicU64,
    pub commands_accepted: AtomicU64,
    pub replays_detected: AtomicU64,
    pub conflicts_detected: AtomicU64,
    pub commands_rejected: AtomicU64,
    pub ws_messages_sent: AtomicU64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            commands_received: AtomicU64::new(0),
            commands_accepted: AtomicU64::new(0),
            replays_detected: AtomicU64::new(0),
            conflicts_detected: AtomicU64::new(0),
            commands_rejected: AtomicU64::new(0),
            ws_messages_sent: AtomicU64::new(0),
        }
    }
}

// ── Application shared state (channels, not locks) ──

pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,

    // Transport -> Intake worker: bounded request channel
    pub intake_tx: mpsc::Sender<IntakeRequest>,

    // Intake worker -> Dashboard: outcome stream (broadcast for WS clients)
    pub ws_tx: broadcast::Sender<WsMessage>,

    // Lock-free performance counters
    pub counters: PerfCounters,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool, intake_tx: mpsc::Sender<IntakeRequest>) -> Arc<Self> {
        let (ws_tx, _) = broadcast::channel(2048);

        Arc::new(Self {
            config,
            db,
            intake_tx,
            ws_tx,
            counters: PerfCounters::new(),
        })
    }

    #[inline]
    pub fn broadcast(&self, msg: WsMessage) {
        self.counters.ws_messages_sent.fetch_add(1, Ordering::Relaxed);
        let _ = self.ws_tx.send(msg);
    }

    pub fn counters_snapshot(&self) -> WsMessage {
        WsMessage::CountersSnapshot {
            commands_received: self.counters.commands_received.load(Ordering::Relaxed),
            commands_accepted: self.counters.commands_accepted.load(Ordering::Relaxed),
            replays_detected: self.counters.replays_detected.load(Ordering::Relaxed),
            conflicts_detected: self.counters.conflicts_detected.load(Ordering::Relaxed),
            commands_rejected: self.counters.commands_rejected.load(Ordering::Relaxed),
        }
    }
}
