//! Intercom API client.
//!
//! The [`MessagePlatform`] trait is the seam between the gateway and the
//! messaging platform: replacing a conversation message with its masked
//! rewrite, and attaching the vault note for authorized reviewers. Tests
//! substitute a mock; production uses [`IntercomClient`] against the REST
//! API. Delivery retries are Intercom's concern, not the gateway's:
//! failures here are logged by the caller and never un-block a message.

use async_trait::async_trait;

use crate::error::{MsgShieldError, Result};

/// Operations the gateway needs from the messaging platform.
#[async_trait]
pub trait MessagePlatform: Send + Sync {
    /// Post the masked rewrite as the visible reply in a conversation.
    async fn replace_message(&self, conversation_id: &str, masked_body: &str) -> Result<()>;
    /// Attach an internal note (visible to operators only).
    async fn add_note(&self, conversation_id: &str, note: &str) -> Result<()>;
    /// Backend name (e.g., `"intercom"`).
    fn name(&self) -> &str;
}

/// Intercom REST API client.
pub struct IntercomClient {
    access_token: String,
    base_url: String,
    client: reqwest::Client,
}

impl IntercomClient {
    pub fn new(access_token: String, base_url: String) -> Self {
        Self {
            access_token,
            base_url,
            client: reqwest::Client::new(),
        }
    }

    async fn reply(
        &self,
        conversation_id: &str,
        message_type: &str,
        body: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/conversations/{}/reply",
            self.base_url.trim_end_matches('/'),
            conversation_id
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({
                "message_type": message_type,
                "body": body,
            }))
            .send()
            .await
            .map_err(|e| MsgShieldError::Platform(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_else(|_| "unknown".to_string());
            return Err(MsgShieldError::Platform(format!(
                "Intercom API error {}: {}",
                status, text
            )));
        }

        Ok(())
    }

    /// Retrieve a conversation as raw JSON.
    pub async fn get_conversation(&self, conversation_id: &str) -> Result<serde_json::Value> {
        let url = format!(
            "{}/conversations/{}",
            self.base_url.trim_end_matches('/'),
            conversation_id
        );

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| MsgShieldError::Platform(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(MsgShieldError::Platform(format!(
                "Intercom API error {}",
                resp.status()
            )));
        }

        resp.json()
            .await
            .map_err(|e| MsgShieldError::Platform(e.to_string()))
    }
}

#[async_trait]
impl MessagePlatform for IntercomClient {
    async fn replace_message(&self, conversation_id: &str, masked_body: &str) -> Result<()> {
        self.reply(conversation_id, "comment", masked_body).await
    }

    async fn add_note(&self, conversation_id: &str, note: &str) -> Result<()> {
        self.reply(conversation_id, "note", note).await
    }

    fn name(&self) -> &str {
        "intercom"
    }
}

/// The operator-facing note attached alongside a redacted message.
pub fn vault_note(vault_link: &str) -> String {
    format!(
        "⚠️ Sensitive data was redacted from this message.\n\
         View the original message in the secure vault: {}\n\n\
         This message has been automatically redacted to protect sensitive information.\n\
         Only authorized administrators can view the original content.",
        vault_link
    )
}
