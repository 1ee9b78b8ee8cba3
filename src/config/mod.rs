//! TOML configuration types for msgshield.
//!
//! The top-level [`AppConfig`] is deserialized from `msgshield.toml` and
//! contains sections for the server, detection settings, the Intercom
//! connection, the vault link prefix, and notifications.
//!
//! # Example `msgshield.toml`
//!
//! ```toml
//! [server]
//! listen = "127.0.0.1:8600"
//!
//! [detection]
//! block_enabled = true
//! confidence_threshold = 0.85
//!
//! [intercom]
//! access_token = "${INTERCOM_ACCESS_TOKEN}"
//!
//! [vault]
//! base_url = "https://vault.example.com"
//! ```

pub mod reload;

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::dlp::catalog::{PatternCatalog, RuleSpec};
use crate::dlp::pipeline::DetectionSettings;
use crate::error::{MsgShieldError, Result};

/// HTTP server configuration (`[server]` section).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., `"127.0.0.1:8600"`).
    pub listen: String,
    /// Upstream guard: messages longer than this (in bytes) are withheld
    /// without being scanned.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}

fn default_max_message_length() -> usize {
    10_000
}

/// A detection rule defined in configuration rather than built in.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CustomRule {
    pub name: String,
    pub pattern: String,
    pub mask: String,
}

/// Detection configuration (`[detection]` section).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DetectionConfig {
    /// Block/threshold knobs; hot-reloadable.
    #[serde(flatten)]
    pub settings: DetectionSettings,
    /// Optional subset of built-in rule names to use. If `None`, all
    /// built-in rules are active.
    #[serde(default)]
    pub patterns: Option<Vec<String>>,
    /// Extra rules appended after the built-ins.
    #[serde(default)]
    pub custom_rules: Vec<CustomRule>,
}

impl DetectionConfig {
    pub fn settings(&self) -> DetectionSettings {
        self.settings
    }

    /// Compile the pattern catalog this configuration describes.
    ///
    /// Fails fast on any malformed rule; `msgshield start` treats that as
    /// fatal and refuses to serve.
    pub fn build_catalog(&self) -> Result<PatternCatalog> {
        let custom: Vec<RuleSpec> = self
            .custom_rules
            .iter()
            .map(|r| RuleSpec {
                name: r.name.clone(),
                pattern: r.pattern.clone(),
                mask: r.mask.clone(),
            })
            .collect();
        PatternCatalog::from_config(self.patterns.as_deref(), &custom)
    }
}

/// Intercom connection configuration (`[intercom]` section).
///
/// The access token doubles as the webhook signature key, matching the
/// platform's signing scheme.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IntercomConfig {
    pub access_token: String,
    #[serde(default = "default_intercom_base_url")]
    pub base_url: String,
}

fn default_intercom_base_url() -> String {
    "https://api.intercom.io".to_string()
}

/// Vault configuration (`[vault]` section).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VaultConfig {
    /// Public prefix for generated secure links.
    pub base_url: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            base_url: "https://vault.example.com".to_string(),
        }
    }
}

/// Telegram Bot API configuration (nested under `[notification.telegram]`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramConfig {
    /// Bot API token from @BotFather.
    pub bot_token: String,
    /// Target chat or channel ID.
    pub chat_id: String,
}

/// Notification configuration (`[notification]` section).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    /// Whether notifications are active.
    #[serde(default)]
    pub enabled: bool,
    /// Send an admin notification when a message is blocked.
    #[serde(default = "default_notify_on_block")]
    pub notify_on_block: bool,
    /// Optional Telegram backend configuration.
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
}

// Mirror the serde-declared field defaults so that an omitted `[notification]`
// section (which resolves via `Default`) matches a present-but-empty one.
impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: bool::default(),
            notify_on_block: default_notify_on_block(),
            telegram: None,
        }
    }
}

fn default_notify_on_block() -> bool {
    true
}

/// Top-level application configuration deserialized from `msgshield.toml`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    pub intercom: IntercomConfig,
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
}

impl AppConfig {
    /// Load and parse the configuration from a TOML file at the given path.
    ///
    /// Before parsing, `${VAR}` and `$VAR` placeholders in the TOML text are
    /// replaced with the corresponding environment variable values. An error
    /// is returned if a referenced variable is not set.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let content = substitute_env_vars(&content)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Replace `${VAR_NAME}` and `$VAR_NAME` placeholders with environment
/// variable values.
///
/// Returns an error containing the variable name if the variable is not set.
fn substitute_env_vars(input: &str) -> Result<String> {
    // Match ${VAR_NAME} (braces form)
    let re_braces = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    // Match $VAR_NAME (no braces, uppercase + underscore only to avoid false positives)
    let re_bare = Regex::new(r"\$([A-Z_][A-Z0-9_]*)").unwrap();

    let mut result = input.to_string();

    for cap in re_braces.captures_iter(input) {
        let var_name = &cap[1];
        let value = std::env::var(var_name)
            .map_err(|_| MsgShieldError::ConfigEnvVar(var_name.to_string()))?;
        result = result.replace(&cap[0], &value);
    }

    let intermediate = result.clone();
    for cap in re_bare.captures_iter(&intermediate) {
        let full_match = &cap[0];
        let var_name = &cap[1];
        let value = std::env::var(var_name)
            .map_err(|_| MsgShieldError::ConfigEnvVar(var_name.to_string()))?;
        result = result.replace(full_match, &value);
    }

    Ok(result)
}
