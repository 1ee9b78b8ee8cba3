//! Web surface of the gateway.
//!
//! Exposes the Intercom webhook intake plus a JSON API for operators:
//!
//! - `POST /webhook`                  — Intercom event intake (signed)
//! - `GET  /api/stats`                — aggregated processing statistics
//! - `GET  /api/messages`             — recent message log (masked text only)
//! - `GET  /api/patterns`             — active pattern catalog
//! - `GET  /api/vault`                — vault entry list
//! - `GET  /api/vault/{id}`           — vault entry by secure link id
//! - `POST /api/vault/{id}/feedback`  — reviewer feedback
//! - `POST /api/vault/{id}/archive`   — archive an entry

pub mod intercom;
pub mod webhook;

use std::sync::{Arc, RwLock};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dlp::{DetectionSettings, MessagePipeline};
use crate::notification::{NotificationEvent, Notifier};
use crate::storage::{self, vault, DbPool};

use intercom::MessagePlatform;

/// Shared application state for all handlers.
pub struct AppState {
    /// SQLite connection pool.
    pub db: DbPool,
    /// Detection pipeline around the immutable pattern catalog.
    pub pipeline: MessagePipeline,
    /// Hot-reloadable block/threshold settings.
    pub settings: Arc<RwLock<DetectionSettings>>,
    /// Messaging platform client; `None` runs the gateway in record-only mode.
    pub platform: Option<Arc<dyn MessagePlatform>>,
    /// Notification backend, if configured.
    pub notifier: Option<Arc<dyn Notifier>>,
    /// Whether block events produce admin notifications.
    pub notify_on_block: bool,
    /// HMAC key for webhook signatures (the Intercom access token).
    pub webhook_secret: String,
    /// Public prefix for vault links.
    pub vault_base_url: String,
    /// Upstream guard applied before the scanner runs.
    pub max_message_length: usize,
}

impl AppState {
    /// Fire-and-forget notification dispatch; never blocks the caller.
    pub fn notify(&self, event: NotificationEvent) {
        let Some(ref notifier) = self.notifier else {
            return;
        };
        if matches!(event, NotificationEvent::MessageBlocked { .. }) && !self.notify_on_block {
            return;
        }
        let notifier = notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&event).await {
                warn!("Notification via {} failed: {}", notifier.name(), e);
            }
        });
    }
}

/// Build the axum router with all endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", post(webhook::handle_webhook))
        .route("/api/stats", get(get_stats))
        .route("/api/messages", get(get_messages))
        .route("/api/patterns", get(get_patterns))
        .route("/api/vault", get(list_vault))
        .route("/api/vault/:id", get(get_vault_entry))
        .route("/api/vault/:id/feedback", post(post_feedback))
        .route("/api/vault/:id/archive", post(post_archive))
        .with_state(state)
}

/// Start the gateway server on the given address.
pub async fn start(listen_addr: &str, state: Arc<AppState>) -> crate::error::Result<()> {
    let app = router(state.clone());
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!("msgshield gateway listening on {}", listen_addr);
    state.notify(NotificationEvent::GatewayStarted {
        listen_addr: listen_addr.to_string(),
    });
    axum::serve(listener, app).await?;
    Ok(())
}

// ─── Query Parameters ───────────────────────────────────────────────────────

/// Query parameters for `GET /api/messages`.
#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    /// Maximum number of entries to return (default: 50).
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Query parameters for `GET /api/vault`.
#[derive(Debug, Deserialize)]
pub struct VaultQuery {
    pub conversation_id: Option<String>,
    pub user_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

// ─── Response Types ─────────────────────────────────────────────────────────

/// A message log entry returned by the API. The original text is omitted;
/// it is only reachable through the vault endpoints.
#[derive(Debug, Serialize)]
pub struct MessageEntryResponse {
    pub id: Option<i64>,
    pub created_at: String,
    pub conversation_id: String,
    pub platform_message_id: String,
    pub blocked: bool,
    pub finding_count: usize,
    pub masked_text: String,
}

/// A catalog rule as returned by `GET /api/patterns`.
#[derive(Debug, Serialize)]
pub struct PatternResponse {
    pub name: String,
    pub pattern: String,
    pub mask: String,
}

/// Request body for `POST /api/vault/{id}/feedback`.
#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub is_positive: bool,
    #[serde(default)]
    pub feedback_notes: String,
    pub reviewed_by: String,
}

// ─── Handlers ───────────────────────────────────────────────────────────────

/// `GET /api/stats` — aggregated processing statistics.
async fn get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let conn = match state.db.get() {
        Ok(conn) => conn,
        Err(e) => return internal_error(e.to_string()),
    };
    match storage::query_stats(&conn) {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => internal_error(e.to_string()),
    }
}

/// `GET /api/messages` — recent message log entries as JSON.
async fn get_messages(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MessagesQuery>,
) -> impl IntoResponse {
    let conn = match state.db.get() {
        Ok(conn) => conn,
        Err(e) => return internal_error(e.to_string()),
    };
    match storage::query_recent(&conn, params.limit) {
        Ok(records) => {
            let entries: Vec<MessageEntryResponse> = records
                .into_iter()
                .map(|r| MessageEntryResponse {
                    id: r.id,
                    created_at: r.created_at,
                    conversation_id: r.conversation_id,
                    platform_message_id: r.platform_message_id,
                    blocked: r.blocked,
                    finding_count: r.finding_count,
                    masked_text: r.masked_text,
                })
                .collect();
            Json(entries).into_response()
        }
        Err(e) => internal_error(e.to_string()),
    }
}

/// `GET /api/patterns` — the active pattern catalog.
async fn get_patterns(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let patterns: Vec<PatternResponse> = state
        .pipeline
        .catalog()
        .rules()
        .iter()
        .map(|rule| PatternResponse {
            name: rule.name.clone(),
            pattern: rule.regex.as_str().to_string(),
            mask: rule.mask_template.clone(),
        })
        .collect();
    Json(patterns).into_response()
}

/// `GET /api/vault` — list vault entries with optional filters.
async fn list_vault(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VaultQuery>,
) -> impl IntoResponse {
    let conn = match state.db.get() {
        Ok(conn) => conn,
        Err(e) => return internal_error(e.to_string()),
    };
    let filter = vault::VaultFilter {
        conversation_id: params.conversation_id,
        user_id: params.user_id,
        limit: Some(params.limit),
    };
    match vault::list_entries(&conn, &filter) {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => internal_error(e.to_string()),
    }
}

/// `GET /api/vault/{id}` — fetch an entry by the secure id from its link.
async fn get_vault_entry(
    State(state): State<Arc<AppState>>,
    Path(secure_id): Path<String>,
) -> impl IntoResponse {
    let conn = match state.db.get() {
        Ok(conn) => conn,
        Err(e) => return internal_error(e.to_string()),
    };
    let link = format!(
        "{}/view/{}",
        state.vault_base_url.trim_end_matches('/'),
        secure_id
    );
    match vault::get_by_link(&conn, &link) {
        Ok(Some(entry)) => {
            let feedback = entry
                .id
                .and_then(|id| vault::get_feedback(&conn, id).ok().flatten());
            Json(serde_json::json!({"entry": entry, "feedback": feedback})).into_response()
        }
        Ok(None) => not_found("vault entry not found"),
        Err(e) => internal_error(e.to_string()),
    }
}

/// `POST /api/vault/{id}/feedback` — record reviewer feedback.
async fn post_feedback(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<i64>,
    Json(request): Json<FeedbackRequest>,
) -> impl IntoResponse {
    let conn = match state.db.get() {
        Ok(conn) => conn,
        Err(e) => return internal_error(e.to_string()),
    };

    let exists: i64 = match conn.query_row(
        "SELECT COUNT(*) FROM vault_entries WHERE id = ?1",
        rusqlite::params![entry_id],
        |row| row.get(0),
    ) {
        Ok(count) => count,
        Err(e) => return internal_error(e.to_string()),
    };
    if exists == 0 {
        return not_found("vault entry not found");
    }

    match vault::add_feedback(
        &conn,
        entry_id,
        request.is_positive,
        &request.feedback_notes,
        &request.reviewed_by,
    ) {
        Ok(feedback) => Json(feedback).into_response(),
        Err(e) => internal_error(e.to_string()),
    }
}

/// `POST /api/vault/{id}/archive` — archive an entry.
async fn post_archive(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<i64>,
) -> impl IntoResponse {
    let conn = match state.db.get() {
        Ok(conn) => conn,
        Err(e) => return internal_error(e.to_string()),
    };
    match vault::archive_entry(&conn, entry_id) {
        Ok(true) => Json(serde_json::json!({"status": "archived", "id": entry_id})).into_response(),
        Ok(false) => not_found("vault entry not found"),
        Err(e) => internal_error(e.to_string()),
    }
}

fn internal_error(detail: String) -> axum::response::Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": detail})),
    )
        .into_response()
}

fn not_found(detail: &str) -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": detail})),
    )
        .into_response()
}
