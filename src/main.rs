mod config;
mod db;
mod errors;
mod intake;
mod server;
mod state;
mod store;

use crate::db::SqliteStore;
use crate::intake::outcome::OutcomeStatus;
use crate::intake::pipeline::{self, IntakePolicy};
use crate::state::*;
use crate::store::SessionStore;
use portable_atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() {
    // Early stderr so container logs capture something even if tracing fails
    eprintln!("[desk_gate] binary started, setting up logging...");

    // Structured logging (line-buffered for container platforms)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("desk_gate intake service starting");

    // Load config
    let cfg = match config::AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    // Init database
    let db_pool = match db::init_db(&cfg.data_dir) {
        Ok(d) => d,
        Err(e) => {
            tracing::error!("database init error: {e}");
            std::process::exit(1);
        }
    };

    // Create bounded request channel
    let (intake_tx, intake_rx) = mpsc::channel::<IntakeRequest>(512);

    // Create shared state
    let app_state = AppState::new(cfg.clone(), db_pool.clone(), intake_tx.clone());

    // ── Spawn tasks ──

    // 1. Intake worker (dedicated, owns the store for writes -- this is the
    //    serialization point that makes classification and ordering sound)
    let worker_state = app_state.clone();
    let worker_store = SqliteStore::new(db_pool.clone());
    let worker_policy = cfg.intake_policy();
    tokio::spawn(async move {
        run_intake(worker_state, worker_store, worker_policy, intake_rx).await;
    });

    // 2. Axum HTTP + WS server
    let server_state = app_state.clone();
    let port = cfg.server_port;

    let app = axum::Router::new()
        .route("/api/commands", axum::routing::post(server::routes::post_command))
        .route("/api/sessions/{id}", axum::routing::get(server::routes::get_session))
        .route("/api/events", axum::routing::get(server::routes::get_events))
        .route("/api/counters", axum::routing::get(server::routes::get_counters))
        .route("/ws", axum::routing::get(server::ws::ws_handler))
        .fallback_service(
            tower_http::services::ServeDir::new("dashboard/dist")
                .fallback(tower_http::services::ServeFile::new("dashboard/dist/index.html")),
        )
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(server_state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("bind error: {e}");
            std::process::exit(1);
        });

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {e}");
    }
}

/// Intake worker loop. Receives raw commands, runs the pipeline over the
/// durable store, applies admissions, replies, broadcasts. Commands are
/// processed one at a time -- the read-then-write window for a given
/// (session, command) identity is never concurrent with another submission.
async fn run_intake(
    state: Arc<AppState>,
    store: SqliteStore,
    policy: IntakePolicy,
    mut rx: mpsc::Receiver<IntakeRequest>,
) {
    tracing::info!(mode = %policy.default_mode, "intake worker started");

    while let Some(request) = rx.recv().await {
        state.counters.commands_received.fetch_add(1, Ordering::Relaxed);

        let decision = match pipeline::process(&request.raw, &store, &policy) {
            Ok(d) => d,
            Err(e) => {
                // Infrastructure failure: no outcome to report. Dropping the
                // reply sender surfaces an error to the transport caller.
                tracing::error!(error = %e, "intake pipeline infrastructure error");
                continue;
            }
        };

        let mut outcome = decision.outcome;

        if let Some(admission) = decision.admission {
            match store.admit(&admission) {
                Ok(hash) => outcome.state_hash = Some(hash),
                Err(e) => {
                    tracing::error!(
                        session = %admission.session_id,
                        command = %admission.command_id,
                        error = %e,
                        "admission failed after acceptance"
                    );
                    continue;
                }
            }
        }

        match outcome.status {
            OutcomeStatus::Accepted => {
                state.counters.commands_accepted.fetch_add(1, Ordering::Relaxed);
            }
            OutcomeStatus::IdempotentReplay => {
                state.counters.replays_detected.fetch_add(1, Ordering::Relaxed);
            }
            OutcomeStatus::Rejected => {
                state.counters.commands_rejected.fetch_add(1, Ordering::Relaxed);
                if outcome
                    .error
                    .as_ref()
                    .is_some_and(|e| e.code == intake::taxonomy::ErrorCode::IdempotencyConflict)
                {
                    state.counters.conflicts_detected.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        tracing::info!(
            session = %outcome.session_id,
            command = %outcome.command_id,
            status = %outcome.status,
            code = outcome.error.as_ref().map(|e| e.code.as_str()).unwrap_or("-"),
            "command processed"
        );

        state.broadcast(WsMessage::CommandOutcome {
            session_id: outcome.session_id.clone(),
            command_id: outcome.command_id.clone(),
            status: outcome.status.to_string(),
            error_code: outcome.error.as_ref().map(|e| e.code.as_str().to_string()),
            state_hash: outcome.state_hash.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        });

        let _ = request.reply.send(outcome);
    }

    tracing::info!("intake worker shutting down");
}
