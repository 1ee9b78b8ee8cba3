//! Intercom webhook intake.
//!
//! One endpoint does the whole inbound flow: verify the webhook signature,
//! dispatch on topic, guard message length, run the detection pipeline,
//! persist the message and findings, vault the original when anything was
//! masked, and either withhold delivery (notifying admins) or push the
//! masked rewrite back to the platform with the vault note attached.
//!
//! The signature is HMAC-SHA256 of the raw request body keyed by the
//! Intercom access token, hex-encoded in the `X-Hub-Signature` header.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{error, info, warn};

use super::{intercom, AppState};
use crate::notification::NotificationEvent;
use crate::storage::{self, vault, MessageRecord};

type HmacSha256 = Hmac<Sha256>;

/// Webhook topics that carry a scannable conversation message.
const MESSAGE_TOPICS: &[&str] = &["conversation.created", "conversation.replied"];

/// Verify an `X-Hub-Signature` header value against the raw request body.
///
/// Accepts the bare hex digest or a `sha256=` prefixed form. Comparison is
/// constant-time via the `hmac` crate's verify.
pub fn verify_signature(secret: &str, body: &[u8], signature: Option<&str>) -> bool {
    let Some(signature) = signature else {
        return false;
    };
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature);
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Compute the hex signature for a body (used by tests and docs).
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[derive(Debug, Deserialize, Default)]
struct WebhookPayload {
    #[serde(default)]
    data: WebhookData,
}

#[derive(Debug, Deserialize, Default)]
struct WebhookData {
    #[serde(default)]
    item: WebhookItem,
}

#[derive(Debug, Deserialize, Default)]
struct WebhookItem {
    #[serde(default)]
    id: String,
    #[serde(default)]
    conversation_id: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    author: Option<WebhookAuthor>,
}

#[derive(Debug, Deserialize, Default)]
struct WebhookAuthor {
    #[serde(default)]
    id: String,
}

/// `POST /webhook` — handle an Intercom webhook event.
pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get("X-Hub-Signature")
        .and_then(|v| v.to_str().ok());
    if !verify_signature(&state.webhook_secret, &body, signature) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "invalid signature"})),
        )
            .into_response();
    }

    let topic = headers
        .get("X-Intercom-Topic")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !MESSAGE_TOPICS.contains(&topic) {
        return Json(serde_json::json!({"status": "ignored", "topic": topic})).into_response();
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": format!("malformed payload: {}", e)})),
            )
                .into_response();
        }
    };
    let item = payload.data.item;
    let user_id = item.author.map(|a| a.id).unwrap_or_default();

    // Intercom redelivers webhooks; a message we have already processed is
    // acknowledged without reprocessing.
    match already_processed(&state, &item.id) {
        Ok(true) => {
            return Json(serde_json::json!({"status": "duplicate", "message_id": item.id}))
                .into_response();
        }
        Ok(false) => {}
        Err(resp) => return resp.into_response(),
    }

    // Upstream size guard: oversized input is withheld without scanning.
    if item.body.len() > state.max_message_length {
        warn!(
            "Message {} exceeds max length ({} > {}), withholding",
            item.id,
            item.body.len(),
            state.max_message_length
        );
        return store_oversized(&state, &item.id, &item.conversation_id, &user_id, &item.body)
            .into_response();
    }

    let settings = *state.settings.read().unwrap();
    let processed = state.pipeline.process(&item.body, &settings);

    let record = MessageRecord::from_processed(&item.id, &item.conversation_id, &processed);
    let conn = match state.db.get() {
        Ok(conn) => conn,
        Err(e) => return storage_failure(e.to_string()).into_response(),
    };
    let message_id = match storage::insert_message(&conn, &record, &processed.findings) {
        Ok(id) => id,
        Err(e) => return storage_failure(e.to_string()).into_response(),
    };

    // Anything masked or withheld keeps its original in the vault.
    let vault_link = if processed.has_findings() || processed.blocked {
        match vault::create_entry(
            &conn,
            message_id,
            &item.conversation_id,
            &user_id,
            &processed.original_text,
            &state.vault_base_url,
        ) {
            Ok(entry) => Some(entry.vault_link),
            Err(e) => {
                error!("Failed to create vault entry for message {}: {}", item.id, e);
                None
            }
        }
    } else {
        None
    };

    if processed.blocked {
        info!(
            "BLOCKED message {} in conversation {} (trigger: {})",
            item.id,
            item.conversation_id,
            processed.trigger_type.as_deref().unwrap_or("internal")
        );
        state.notify(NotificationEvent::MessageBlocked {
            conversation_id: item.conversation_id.clone(),
            platform_message_id: item.id.clone(),
            trigger_type: processed
                .trigger_type
                .clone()
                .unwrap_or_else(|| "internal".to_string()),
            finding_count: processed.findings.len(),
        });
        return Json(serde_json::json!({
            "status": "blocked",
            "message": "Message blocked due to sensitive content",
        }))
        .into_response();
    }

    if processed.has_findings() {
        info!(
            "Masked {} finding(s) in message {} (conversation {})",
            processed.findings.len(),
            item.id,
            item.conversation_id
        );
        deliver_masked(&state, &item.conversation_id, &processed.masked_text, vault_link).await;
        state.notify(NotificationEvent::SensitiveDataFound {
            conversation_id: item.conversation_id.clone(),
            finding_types: processed
                .findings
                .iter()
                .map(|f| f.finding_type.clone())
                .collect(),
        });
        return Json(serde_json::json!({
            "status": "processed",
            "findings": processed.findings.len(),
        }))
        .into_response();
    }

    Json(serde_json::json!({"status": "clean"})).into_response()
}

/// Push the masked rewrite and the vault note to the platform. Failures are
/// logged; the message stays masked in storage either way, and nothing here
/// can un-block or un-mask it.
async fn deliver_masked(
    state: &AppState,
    conversation_id: &str,
    masked_text: &str,
    vault_link: Option<String>,
) {
    let Some(ref platform) = state.platform else {
        return;
    };
    if let Err(e) = platform.replace_message(conversation_id, masked_text).await {
        error!("Failed to deliver masked message to {}: {}", platform.name(), e);
    }
    if let Some(link) = vault_link {
        if let Err(e) = platform
            .add_note(conversation_id, &intercom::vault_note(&link))
            .await
        {
            error!("Failed to attach vault note via {}: {}", platform.name(), e);
        }
    }
}

fn already_processed(
    state: &AppState,
    platform_message_id: &str,
) -> std::result::Result<bool, (StatusCode, Json<serde_json::Value>)> {
    let conn = state
        .db
        .get()
        .map_err(|e| storage_failure(e.to_string()))?;
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM messages WHERE platform_message_id = ?1",
            rusqlite::params![platform_message_id],
            |row| row.get(0),
        )
        .map_err(|e| storage_failure(e.to_string()))?;
    Ok(count > 0)
}

/// Record an oversized message as blocked without running the scanner.
fn store_oversized(
    state: &AppState,
    platform_message_id: &str,
    conversation_id: &str,
    user_id: &str,
    body: &str,
) -> axum::response::Response {
    let conn = match state.db.get() {
        Ok(conn) => conn,
        Err(e) => return storage_failure(e.to_string()).into_response(),
    };
    let record = MessageRecord {
        id: None,
        platform_message_id: platform_message_id.to_string(),
        conversation_id: conversation_id.to_string(),
        original_text: body.to_string(),
        masked_text: String::new(),
        blocked: true,
        finding_count: 0,
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    match storage::insert_message(&conn, &record, &[]) {
        Ok(message_id) => {
            if let Err(e) = vault::create_entry(
                &conn,
                message_id,
                conversation_id,
                user_id,
                body,
                &state.vault_base_url,
            ) {
                error!("Failed to vault oversized message {}: {}", platform_message_id, e);
            }
            state.notify(NotificationEvent::MessageBlocked {
                conversation_id: conversation_id.to_string(),
                platform_message_id: platform_message_id.to_string(),
                trigger_type: "oversized".to_string(),
                finding_count: 0,
            });
            Json(serde_json::json!({
                "status": "blocked",
                "message": "Message exceeds maximum length",
            }))
            .into_response()
        }
        Err(e) => storage_failure(e.to_string()).into_response(),
    }
}

fn storage_failure(detail: String) -> (StatusCode, Json<serde_json::Value>) {
    error!("Storage failure in webhook handler: {}", detail);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": detail})),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_round_trip() {
        let secret = "tok-123";
        let body = br#"{"data":{}}"#;
        let sig = sign(secret, body);
        assert!(verify_signature(secret, body, Some(&sig)));
    }

    #[test]
    fn signature_accepts_sha256_prefix() {
        let secret = "tok-123";
        let body = b"payload";
        let sig = format!("sha256={}", sign(secret, body));
        assert!(verify_signature(secret, body, Some(&sig)));
    }

    #[test]
    fn signature_rejects_wrong_secret() {
        let body = b"payload";
        let sig = sign("right-secret", body);
        assert!(!verify_signature("wrong-secret", body, Some(&sig)));
    }

    #[test]
    fn signature_rejects_tampered_body() {
        let secret = "tok-123";
        let sig = sign(secret, b"original");
        assert!(!verify_signature(secret, b"tampered", Some(&sig)));
    }

    #[test]
    fn signature_rejects_missing_header() {
        assert!(!verify_signature("tok", b"body", None));
    }

    #[test]
    fn signature_rejects_non_hex_garbage() {
        assert!(!verify_signature("tok", b"body", Some("not-hex!")));
    }

    #[test]
    fn payload_parses_with_missing_fields() {
        let payload: WebhookPayload = serde_json::from_str("{}").unwrap();
        assert_eq!(payload.data.item.body, "");
        assert!(payload.data.item.author.is_none());
    }

    #[test]
    fn payload_parses_full_item() {
        let payload: WebhookPayload = serde_json::from_str(
            r#"{"data":{"item":{"id":"msg-1","conversation_id":"conv-1",
                "body":"hello","author":{"id":"user-7"}}}}"#,
        )
        .unwrap();
        assert_eq!(payload.data.item.id, "msg-1");
        assert_eq!(payload.data.item.author.unwrap().id, "user-7");
    }
}
