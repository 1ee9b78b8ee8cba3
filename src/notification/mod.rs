//! Notification system for security-relevant events.
//!
//! The gateway can send real-time alerts when a message is blocked or
//! sensitive data is masked. Notifications use a **fire-and-forget**
//! pattern: they are spawned as background tasks and never block webhook
//! processing.
//!
//! The [`Notifier`] trait abstracts over notification backends. Currently,
//! the only implementation is [`telegram::TelegramNotifier`].
//!
//! # Supported Events
//!
//! - [`NotificationEvent::MessageBlocked`] — a message was withheld from delivery
//! - [`NotificationEvent::SensitiveDataFound`] — sensitive data was masked in a delivered message
//! - [`NotificationEvent::GatewayStarted`] — gateway server started
//! - [`NotificationEvent::GatewayShutdown`] — gateway server shutting down

pub mod telegram;

use crate::error::Result;

/// Events that can trigger notifications.
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    /// A message was withheld from delivery.
    MessageBlocked {
        conversation_id: String,
        platform_message_id: String,
        trigger_type: String,
        finding_count: usize,
    },
    /// Sensitive data was masked in a message that was still delivered.
    SensitiveDataFound {
        conversation_id: String,
        finding_types: Vec<String>,
    },
    /// The gateway has started listening.
    GatewayStarted { listen_addr: String },
    /// The gateway is shutting down.
    GatewayShutdown,
}

/// Trait for notification backends (e.g., Telegram, Slack, email).
///
/// Implementations must be `Send + Sync` for use across async tasks.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Send a notification for the given event.
    async fn notify(&self, event: &NotificationEvent) -> Result<()>;
    /// Return the backend name (e.g., `"telegram"`).
    fn name(&self) -> &str;
}

/// Format a [`NotificationEvent`] into a human-readable Markdown message.
pub fn format_message(event: &NotificationEvent) -> String {
    match event {
        NotificationEvent::MessageBlocked {
            conversation_id,
            platform_message_id,
            trigger_type,
            finding_count,
        } => {
            format!(
                "🚫 *Message Blocked*\nConversation `{}`, message `{}`\nTrigger: {} ({} finding{})",
                conversation_id,
                platform_message_id,
                trigger_type,
                finding_count,
                if *finding_count == 1 { "" } else { "s" }
            )
        }
        NotificationEvent::SensitiveDataFound {
            conversation_id,
            finding_types,
        } => {
            format!(
                "🔍 *Sensitive Data Masked*\nConversation `{}`\nCategories: {}",
                conversation_id,
                finding_types.join(", ")
            )
        }
        NotificationEvent::GatewayStarted { listen_addr } => {
            format!("✅ *msgshield Started*\nListening on `{}`", listen_addr)
        }
        NotificationEvent::GatewayShutdown => "⏹ *msgshield Shutdown*".to_string(),
    }
}
