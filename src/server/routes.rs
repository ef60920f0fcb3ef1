use crate::db;
use crate::state::{AppState, IntakeRequest};
use axum::extract::{Path, Query, State};
use axum::response::Json;
use std::sync::Arc;
use tokio::sync::oneshot;

#[derive(serde::Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

/// POST /api/commands -- submit one raw command to the intake worker and
/// wait for its outcome. The body is passed through untouched; all shape
/// checking happens inside the pipeline so the error surface stays closed.
pub async fn post_command(
    State(state): State<Arc<AppState>>,
    Json(raw): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    let (reply_tx, reply_rx) = oneshot::channel();
    let request = IntakeRequest { raw, reply: reply_tx };

    if state.intake_tx.send(request).await.is_err() {
        return Json(serde_json::json!({ "error": "intake unavailable" }));
    }

    match reply_rx.await {
        Ok(outcome) => match serde_json::to_value(&outcome) {
            Ok(v) => Json(v),
            Err(e) => Json(serde_json::json!({ "error": e.to_string() })),
        },
        Err(_) => Json(serde_json::json!({ "error": "intake unavailable" })),
    }
}

/// GET /api/sessions/{id} -- durable session state (cold path)
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Json<serde_json::Value> {
    match db::get_session_row(&state.db, &session_id) {
        Ok(row) => Json(serde_json::json!({ "session": row })),
        Err(e) => Json(serde_json::json!({ "error": e.to_string() })),
    }
}

/// GET /api/events -- recent intake audit rows (cold path)
pub async fn get_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventsQuery>,
) -> Json<serde_json::Value> {
    let limit = params.limit.unwrap_or(50).min(200);
    match db::get_recent_events(&state.db, limit) {
        Ok(events) => Json(serde_json::json!({ "events": events })),
        Err(e) => Json(serde_json::json!({ "error": e.to_string() })),
    }
}

/// GET /api/counters -- performance counters (lock-free reads)
pub async fn get_counters(
    State(state): State<Arc<AppState>>,
) -> Json<serde_json::Value> {
    use portable_atomic::Ordering::Relaxed;
    Json(serde_json::json!({
        "commands_received": state.counters.commands_received.load(Relaxed),
        "commands_accepted": state.counters.commands_accepted.load(Relaxed),
        "replays_detected": state.counters.replays_detected.load(Relaxed),
        "conflicts_detected": state.counters.conflicts_detected.load(Relaxed),
        "commands_rejected": state.counters.commands_rejected.load(Relaxed),
        "ws_messages_sent": state.counters.ws_messages_sent.load(Relaxed),
    }))
}
