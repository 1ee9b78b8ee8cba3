//! Gateway integration tests: templates, webhook intake, storage, vault.

use std::sync::{Arc, Mutex, RwLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt as _;

use msgshield::config::AppConfig;
use msgshield::dlp::{DetectionSettings, MessagePipeline, PatternCatalog};
use msgshield::error::Result;
use msgshield::gateway::intercom::MessagePlatform;
use msgshield::gateway::{router, webhook, AppState};
use msgshield::notification::{NotificationEvent, Notifier};
use msgshield::storage::{self, vault};

const SECRET: &str = "integration-secret";
const VAULT_BASE: &str = "https://vault.integration.test";

// ===== Template tests =====

#[test]
fn all_templates_are_valid_toml() {
    let templates = &[
        ("default", include_str!("../templates/default.toml")),
        ("monitor", include_str!("../templates/monitor.toml")),
        ("strict", include_str!("../templates/strict.toml")),
    ];

    for (name, content) in templates {
        let config: AppConfig = toml::from_str(content)
            .unwrap_or_else(|e| panic!("Template '{}' failed to parse: {}", name, e));
        assert!(
            !config.server.listen.is_empty(),
            "Template '{}' has empty listen address",
            name
        );
        config
            .detection
            .build_catalog()
            .unwrap_or_else(|e| panic!("Template '{}' has a bad catalog: {}", name, e));
    }
}

#[test]
fn monitor_template_never_blocks() {
    let config: AppConfig = toml::from_str(include_str!("../templates/monitor.toml")).unwrap();
    assert!(!config.detection.settings().block_enabled);
}

#[test]
fn strict_template_blocks_on_any_finding() {
    let config: AppConfig = toml::from_str(include_str!("../templates/strict.toml")).unwrap();
    let settings = config.detection.settings();
    assert!(settings.block_enabled);
    assert_eq!(settings.confidence_threshold, 0.0);
    assert_eq!(config.server.max_message_length, 5000);
}

#[test]
fn template_apply_creates_loadable_config() {
    std::env::set_var("INTERCOM_ACCESS_TOKEN", "integration-token");
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("msgshield.toml");
    std::fs::write(&config_path, include_str!("../templates/default.toml")).unwrap();

    let config = AppConfig::load_from_path(&config_path).unwrap();
    assert_eq!(config.server.listen, "127.0.0.1:8600");
    assert_eq!(config.intercom.access_token, "integration-token");
}

// ===== Test doubles =====

struct RecordingPlatform {
    replies: Mutex<Vec<(String, String)>>,
    notes: Mutex<Vec<(String, String)>>,
}

impl RecordingPlatform {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(Vec::new()),
            notes: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait::async_trait]
impl MessagePlatform for RecordingPlatform {
    async fn replace_message(&self, conversation_id: &str, masked_body: &str) -> Result<()> {
        self.replies
            .lock()
            .unwrap()
            .push((conversation_id.to_string(), masked_body.to_string()));
        Ok(())
    }

    async fn add_note(&self, conversation_id: &str, note: &str) -> Result<()> {
        self.notes
            .lock()
            .unwrap()
            .push((conversation_id.to_string(), note.to_string()));
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

struct RecordingNotifier {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingNotifier {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

fn gateway_state(
    platform: Arc<RecordingPlatform>,
    notifier: Arc<RecordingNotifier>,
    settings: DetectionSettings,
) -> Arc<AppState> {
    Arc::new(AppState {
        db: storage::open_memory_pool().unwrap(),
        pipeline: MessagePipeline::new(Arc::new(PatternCatalog::builtin())),
        settings: Arc::new(RwLock::new(settings)),
        platform: Some(platform as Arc<dyn MessagePlatform>),
        notifier: Some(notifier as Arc<dyn Notifier>),
        notify_on_block: true,
        webhook_secret: SECRET.to_string(),
        vault_base_url: VAULT_BASE.to_string(),
        max_message_length: 10_000,
    })
}

fn signed_webhook(topic: &str, id: &str, conversation_id: &str, body: &str) -> Request<Body> {
    let payload = serde_json::json!({
        "data": {
            "item": {
                "id": id,
                "conversation_id": conversation_id,
                "body": body,
                "author": {"id": "user-77"},
            }
        }
    });
    let bytes = serde_json::to_vec(&payload).unwrap();
    let sig = webhook::sign(SECRET, &bytes);
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .header("X-Hub-Signature", sig)
        .header("X-Intercom-Topic", topic)
        .body(Body::from(bytes))
        .unwrap()
}

async fn send(state: Arc<AppState>, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let resp = router(state).into_service().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn get(state: Arc<AppState>, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(state, req).await
}

/// Wait for spawned fire-and-forget notification tasks to run.
async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
}

// ===== End-to-end flows =====

#[tokio::test]
async fn blocked_message_is_vaulted_notified_and_not_delivered() {
    let platform = RecordingPlatform::new();
    let notifier = RecordingNotifier::new();
    let state = gateway_state(platform.clone(), notifier.clone(), DetectionSettings::default());

    let req = signed_webhook(
        "conversation.created",
        "msg-1",
        "conv-9",
        "My card is 4111 1111 1111 1111, please charge it.",
    );
    let (status, json) = send(state.clone(), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "blocked");
    settle().await;

    // Nothing went out to the platform.
    assert!(platform.replies.lock().unwrap().is_empty());
    assert!(platform.notes.lock().unwrap().is_empty());

    // Admin notification carries the trigger category.
    let events = notifier.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    match &events[0] {
        NotificationEvent::MessageBlocked {
            conversation_id,
            trigger_type,
            ..
        } => {
            assert_eq!(conversation_id, "conv-9");
            assert_eq!(trigger_type, "credit_card");
        }
        other => panic!("unexpected event {:?}", other),
    }
    drop(events);

    // The original is in the vault, the log shows a blocked message.
    let conn = state.db.get().unwrap();
    let entries = vault::list_entries(&conn, &vault::VaultFilter::default()).unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].original_message.contains("4111 1111 1111 1111"));
    assert_eq!(entries[0].user_id, "user-77");

    let records = storage::query_recent(&conn, 10).unwrap();
    assert!(records[0].blocked);
    assert!(records[0].masked_text.contains("XXXX-XXXX-XXXX-XXXX"));
}

#[tokio::test]
async fn masked_message_is_delivered_with_vault_note() {
    let platform = RecordingPlatform::new();
    let notifier = RecordingNotifier::new();
    let state = gateway_state(
        platform.clone(),
        notifier.clone(),
        DetectionSettings {
            block_enabled: false,
            confidence_threshold: 0.85,
        },
    );

    let req = signed_webhook(
        "conversation.replied",
        "msg-2",
        "conv-3",
        "You can email me at support.user@example.org anytime.",
    );
    let (status, json) = send(state.clone(), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "processed");
    settle().await;

    let replies = platform.replies.lock().unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(
        replies[0].1,
        "You can email me at [email_redacted] anytime."
    );

    let notes = platform.notes.lock().unwrap();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].1.contains(VAULT_BASE));

    let events = notifier.events.lock().unwrap();
    assert!(matches!(
        events[0],
        NotificationEvent::SensitiveDataFound { .. }
    ));
}

#[tokio::test]
async fn clean_message_touches_nothing() {
    let platform = RecordingPlatform::new();
    let notifier = RecordingNotifier::new();
    let state = gateway_state(platform.clone(), notifier.clone(), DetectionSettings::default());

    let req = signed_webhook(
        "conversation.created",
        "msg-3",
        "conv-1",
        "Hello! My order still has not arrived.",
    );
    let (status, json) = send(state.clone(), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "clean");
    settle().await;

    assert!(platform.replies.lock().unwrap().is_empty());
    assert!(notifier.events.lock().unwrap().is_empty());

    let conn = state.db.get().unwrap();
    assert_eq!(storage::query_recent(&conn, 10).unwrap().len(), 1);
    assert!(vault::list_entries(&conn, &vault::VaultFilter::default())
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn unsigned_webhook_is_rejected_before_processing() {
    let platform = RecordingPlatform::new();
    let notifier = RecordingNotifier::new();
    let state = gateway_state(platform, notifier, DetectionSettings::default());

    let payload = serde_json::json!({"data": {"item": {"id": "m", "body": "ssn 123-45-6789"}}});
    let req = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("X-Intercom-Topic", "conversation.created")
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap();
    let (status, _) = send(state.clone(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let conn = state.db.get().unwrap();
    assert!(storage::query_recent(&conn, 10).unwrap().is_empty());
}

#[tokio::test]
async fn vault_review_lifecycle_over_the_api() {
    let platform = RecordingPlatform::new();
    let notifier = RecordingNotifier::new();
    let state = gateway_state(platform, notifier, DetectionSettings::default());

    let req = signed_webhook(
        "conversation.created",
        "msg-4",
        "conv-2",
        "wallet key aabbccddeeff00112233445566778899aabbccddeeff00112233445566778899",
    );
    let (_, json) = send(state.clone(), req).await;
    assert_eq!(json["status"], "blocked");

    // Find the entry through the list API, filtered by conversation.
    let (status, json) = get(state.clone(), "/api/vault?conversation_id=conv-2").await;
    assert_eq!(status, StatusCode::OK);
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    let entry_id = entries[0]["id"].as_i64().unwrap();
    let link = entries[0]["vault_link"].as_str().unwrap();
    let secure_id = link.rsplit('/').next().unwrap();

    // The secure link resolves to the original.
    let (status, json) = get(state.clone(), &format!("/api/vault/{}", secure_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["entry"]["original_message"]
        .as_str()
        .unwrap()
        .contains("aabbccdd"));

    // Leave feedback, then archive.
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/vault/{}/feedback", entry_id))
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({
                "is_positive": false,
                "feedback_notes": "false positive, that is a test vector",
                "reviewed_by": "security-admin",
            })
            .to_string(),
        ))
        .unwrap();
    let (status, json) = send(state.clone(), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["is_positive"], false);

    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/vault/{}/archive", entry_id))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(state.clone(), req).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(state.clone(), &format!("/api/vault/{}", secure_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stats_accumulate_across_the_flow() {
    let platform = RecordingPlatform::new();
    let notifier = RecordingNotifier::new();
    let state = gateway_state(platform, notifier, DetectionSettings::default());

    for (i, body) in [
        "ssn 123-45-6789",
        "plain question about billing",
        "reach me at ops@example.com",
        "second plain question",
    ]
    .iter()
    .enumerate()
    {
        let req = signed_webhook("conversation.created", &format!("msg-{}", i), "conv-1", body);
        send(state.clone(), req).await;
    }

    let (status, json) = get(state.clone(), "/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 4);
    assert_eq!(json["blocked"], 2);
    assert_eq!(json["clean"], 2);
    assert_eq!(json["findings_total"], 2);

    let by_type = json["findings_by_type"].as_array().unwrap();
    assert!(by_type
        .iter()
        .any(|tc| tc["finding_type"] == "ssn" && tc["count"] == 1));
    assert!(by_type
        .iter()
        .any(|tc| tc["finding_type"] == "email" && tc["count"] == 1));
}

#[tokio::test]
async fn hot_settings_swap_changes_behavior_between_messages() {
    let platform = RecordingPlatform::new();
    let notifier = RecordingNotifier::new();
    let state = gateway_state(platform.clone(), notifier, DetectionSettings::default());

    let req = signed_webhook("conversation.created", "msg-a", "conv-1", "mail a@b.com");
    let (_, json) = send(state.clone(), req).await;
    assert_eq!(json["status"], "blocked");

    // Flip to monitor mode the way the reload path does: swap the RwLock.
    *state.settings.write().unwrap() = DetectionSettings {
        block_enabled: false,
        confidence_threshold: 0.85,
    };

    let req = signed_webhook("conversation.created", "msg-b", "conv-1", "mail c@d.com");
    let (_, json) = send(state.clone(), req).await;
    assert_eq!(json["status"], "processed");
    settle().await;

    let replies = platform.replies.lock().unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].1, "mail [email_redacted]");
}
