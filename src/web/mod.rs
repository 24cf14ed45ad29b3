//! HTTP control surface.
//!
//! Exposes the engine to out-of-process collaborators: the configuration UI
//! edits settings and invokes operations by name, and the execution-host
//! shim reports navigation/tab events and receives effects back. The server
//! binds to `127.0.0.1:8799` by default and exposes:
//!
//! - `POST /api/navigation`       — report a navigation attempt, returns the effect
//! - `POST /api/tab-replaced`     — report a tab replacement
//! - `POST /api/invoke`           — name-based operation dispatch (fixed allow-list)
//! - `GET  /api/settings`         — current settings snapshot
//! - `PUT  /api/settings`         — replace settings (and persist when a path is configured)
//! - `GET  /api/decisions`        — recent decision records
//! - `GET  /api/decisions/stream` — real-time SSE decision stream
//! - `GET  /api/status`           — aggregated decision statistics

use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::warn;

use crate::audit::{self, DbPool, DecisionEvent, DecisionStats};
use crate::control::{self, InvokeResponse};
use crate::host::{Effect, TabId};
use crate::policy::config::Settings;
use crate::policy::engine::{Decision, PolicyEngine};

/// Shared application state for all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The one engine instance of this process.
    pub engine: Arc<PolicyEngine>,
    /// SQLite connection pool for the decision audit log.
    pub db: Option<DbPool>,
    /// Broadcast sender for subscribing to real-time decision events.
    pub event_tx: broadcast::Sender<DecisionEvent>,
    /// Where `PUT /api/settings` persists to, if anywhere.
    pub settings_path: Option<PathBuf>,
}

/// Build the axum router with all API endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/navigation", post(post_navigation))
        .route("/api/tab-replaced", post(post_tab_replaced))
        .route("/api/invoke", post(post_invoke))
        .route("/api/settings", get(get_settings).put(put_settings))
        .route("/api/decisions", get(get_decisions))
        .route("/api/decisions/stream", get(get_decisions_stream))
        .route("/api/status", get(get_status))
        .with_state(state)
}

/// Start the web server on the given address.
pub async fn start(listen_addr: &str, state: Arc<AppState>) -> crate::error::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!("control API listening on {}", listen_addr);
    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::NavgateError::Audit(e.to_string()))?;
    Ok(())
}

// ─── Request / Response Types ───────────────────────────────────────────────

/// Body of `POST /api/navigation`.
#[derive(Debug, Deserialize)]
pub struct NavigationReport {
    pub url: String,
    #[serde(default)]
    pub tab_id: TabId,
}

/// Body of `POST /api/tab-replaced`.
#[derive(Debug, Deserialize)]
pub struct TabReplacedReport {
    pub added_tab_id: TabId,
    pub removed_tab_id: TabId,
}

/// Body of `POST /api/invoke`.
#[derive(Debug, Deserialize)]
pub struct InvokeRequest {
    pub operation: String,
    #[serde(default)]
    pub params: Vec<serde_json::Value>,
}

/// Response of `POST /api/navigation`.
#[derive(Debug, Serialize)]
pub struct NavigationResponse {
    #[serde(flatten)]
    pub decision: Decision,
    pub effect: Option<Effect>,
}

/// Query parameters for `GET /api/decisions`.
#[derive(Debug, Deserialize)]
pub struct DecisionsQuery {
    /// Maximum number of records to return (default: 50).
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Aggregated status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub enabled: bool,
    pub total: usize,
    pub noop: usize,
    pub blocked: usize,
    pub redirected: usize,
    pub closed: usize,
}

impl StatusResponse {
    fn new(enabled: bool, stats: DecisionStats) -> Self {
        StatusResponse {
            enabled,
            total: stats.total,
            noop: stats.noop,
            blocked: stats.blocked,
            redirected: stats.redirected,
            closed: stats.closed,
        }
    }
}

// ─── Handlers ───────────────────────────────────────────────────────────────

/// `POST /api/navigation` — evaluate a navigation attempt.
///
/// The decision is audited and broadcast before the effect is returned to
/// the caller for application.
async fn post_navigation(
    State(state): State<Arc<AppState>>,
    Json(report): Json<NavigationReport>,
) -> impl IntoResponse {
    let now = Local::now();
    let effect = state
        .engine
        .report_navigation(&report.url, report.tab_id, now);
    let decision = match effect {
        Some(_) => Decision::Intervene {
            action: state.engine.action(),
        },
        None => Decision::Noop,
    };
    record_decision(&state, &report.url, decision);
    Json(NavigationResponse { decision, effect })
}

/// `POST /api/tab-replaced` — re-evaluate a replaced tab.
async fn post_tab_replaced(
    State(state): State<Arc<AppState>>,
    Json(report): Json<TabReplacedReport>,
) -> impl IntoResponse {
    state
        .engine
        .report_tab_replaced(report.added_tab_id, report.removed_tab_id, Local::now());
    StatusCode::NO_CONTENT
}

/// `POST /api/invoke` — name-based operation dispatch.
async fn post_invoke(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InvokeRequest>,
) -> impl IntoResponse {
    let response = control::invoke(&state.engine, &request.operation, &request.params);
    let status = match &response {
        InvokeResponse::Ok { .. } => StatusCode::OK,
        InvokeResponse::NotFound { .. } => StatusCode::NOT_FOUND,
        InvokeResponse::BadArgs { .. } => StatusCode::BAD_REQUEST,
    };
    (status, Json(response))
}

/// `GET /api/settings` — current settings snapshot as JSON.
async fn get_settings(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.snapshot())
}

/// `PUT /api/settings` — replace the settings and persist them.
async fn put_settings(
    State(state): State<Arc<AppState>>,
    Json(settings): Json<Settings>,
) -> impl IntoResponse {
    state.engine.apply_settings(&settings);
    if let Some(path) = &state.settings_path {
        if let Err(e) = settings.save_to_path(path) {
            warn!("failed to persist settings: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response();
        }
    }
    (
        StatusCode::OK,
        Json(serde_json::json!({"status": "ok"})),
    )
        .into_response()
}

/// `GET /api/decisions` — return recent decision records as JSON.
async fn get_decisions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DecisionsQuery>,
) -> impl IntoResponse {
    let Some(ref pool) = state.db else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "no database"})),
        )
            .into_response();
    };

    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response();
        }
    };

    match audit::query_recent(&conn, params.limit) {
        Ok(records) => {
            let entries: Vec<serde_json::Value> = records
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "id": r.id,
                        "timestamp": r.timestamp,
                        "url": r.url,
                        "host": r.host,
                        "verdict": r.verdict,
                        "reason": r.reason,
                    })
                })
                .collect();
            Json(entries).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

/// `GET /api/decisions/stream` — SSE stream of real-time decision events.
async fn get_decisions_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.event_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let data = serde_json::json!({
                "timestamp": event.timestamp,
                "url": event.url,
                "host": event.host,
                "verdict": event.verdict,
                "reason": event.reason,
            });
            Some(Ok(Event::default().data(data.to_string())))
        }
        Err(_) => None, // lagged receiver — skip
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// `GET /api/status` — engine run state plus aggregated statistics.
async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let enabled = state.engine.is_enabled();
    let Some(ref pool) = state.db else {
        return Json(StatusResponse::new(enabled, DecisionStats::default())).into_response();
    };

    let conn = match pool.get() {
        Ok(c) => c,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response();
        }
    };

    match audit::query_stats(&conn) {
        Ok(stats) => Json(StatusResponse::new(enabled, stats)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

/// Audit and broadcast one decision. Failures are logged, never surfaced to
/// the navigation path.
fn record_decision(state: &AppState, url: &str, decision: Decision) {
    let host = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();
    let reason = match decision {
        Decision::Noop => "no rule applied".to_string(),
        Decision::Intervene { .. } => format!("policy intervened ({})", decision.label()),
    };
    let record = audit::DecisionRecord {
        id: None,
        timestamp: Utc::now().to_rfc3339(),
        url: url.to_string(),
        host: host.clone(),
        verdict: decision.label().to_string(),
        reason: reason.clone(),
    };
    if let Some(pool) = &state.db {
        match pool.get() {
            Ok(conn) => {
                if let Err(e) = audit::log_decision(&conn, &record) {
                    warn!("failed to audit decision: {e}");
                }
            }
            Err(e) => warn!("failed to get audit connection: {e}"),
        }
    }
    let _ = state.event_tx.send(DecisionEvent {
        timestamp: record.timestamp,
        url: record.url,
        host,
        verdict: record.verdict,
        reason,
    });
}
