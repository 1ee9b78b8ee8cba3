//! Detection-settings hot reload.
//!
//! Watches the TOML configuration file for changes and reloads the
//! [`DetectionSettings`] (block switch, confidence threshold) without
//! restarting the gateway. The settings live behind an
//! `Arc<RwLock<DetectionSettings>>` so concurrent webhook handlers are never
//! blocked for more than the brief write-lock duration during a reload.
//!
//! The pattern catalog is deliberately not reloadable: it is validated once
//! at startup and stays immutable for the process lifetime.
//!
//! Reload triggers:
//!
//! - **File change**: [`start_file_watcher`] uses the [`notify`] crate to
//!   detect modifications to `msgshield.toml`.
//! - **SIGHUP** (Unix only): [`start_sighup_handler`] listens for the HUP
//!   signal for manual reload via `kill -HUP <pid>`.
//!
//! Invalid configuration is handled fail-safe: the old settings are retained
//! and a warning is logged.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use super::AppConfig;
use crate::dlp::pipeline::DetectionSettings;

/// Reload the detection settings from disk, replacing the `RwLock` contents.
///
/// On success the new settings are swapped in atomically. On failure (I/O
/// error, invalid TOML, missing env vars) the old settings are retained and
/// the error is returned.
pub fn reload_settings(
    settings_lock: &Arc<RwLock<DetectionSettings>>,
    config_path: &Path,
) -> crate::error::Result<()> {
    let config = AppConfig::load_from_path(config_path)?;
    let new_settings = config.detection.settings();
    let mut settings = settings_lock.write().unwrap();
    *settings = new_settings;
    info!(
        "Detection settings reloaded from {} (block_enabled={}, threshold={})",
        config_path.display(),
        settings.block_enabled,
        settings.confidence_threshold
    );
    Ok(())
}

/// Start a file-system watcher that triggers [`reload_settings`] on config
/// changes.
///
/// Returns a [`RecommendedWatcher`] handle that must be kept alive for the
/// duration of the watch. Dropping the handle stops the watcher.
pub fn start_file_watcher(
    config_path: PathBuf,
    settings_lock: Arc<RwLock<DetectionSettings>>,
) -> notify::Result<RecommendedWatcher> {
    let path = config_path.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                info!("Config file changed, reloading detection settings...");
                if let Err(e) = reload_settings(&settings_lock, &path) {
                    warn!("Settings reload failed (keeping old settings): {}", e);
                }
            }
        }
        Err(e) => {
            warn!("File watcher error: {}", e);
        }
    })?;

    watcher.watch(&config_path, RecursiveMode::NonRecursive)?;
    info!("Watching {} for changes", config_path.display());
    Ok(watcher)
}

/// Start a SIGHUP handler that reloads the settings on signal.
#[cfg(unix)]
pub fn start_sighup_handler(
    config_path: PathBuf,
    settings_lock: Arc<RwLock<DetectionSettings>>,
) {
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sig = signal(SignalKind::hangup()).expect("Failed to register SIGHUP handler");
        loop {
            sig.recv().await;
            info!("SIGHUP received, reloading detection settings...");
            if let Err(e) = reload_settings(&settings_lock, &config_path) {
                warn!("Settings reload on SIGHUP failed (keeping old settings): {}", e);
            }
        }
    });
}

/// No-op SIGHUP handler for non-Unix platforms.
#[cfg(not(unix))]
pub fn start_sighup_handler(
    _config_path: PathBuf,
    _settings_lock: Arc<RwLock<DetectionSettings>>,
) {
    // SIGHUP is not available on this platform
}
