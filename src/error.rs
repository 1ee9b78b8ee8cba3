use thiserror::Error;

/// Unified error type for the msgshield library.
#[derive(Debug, Error)]
pub enum MsgShieldError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Environment variable not set: {0}")]
    ConfigEnvVar(String),

    #[error("Pattern configuration error: {0}")]
    PatternConfig(String),

    #[error("Detection precondition violated: {0}")]
    Precondition(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Notification error: {0}")]
    Notification(String),
}

pub type Result<T> = std::result::Result<T, MsgShieldError>;
