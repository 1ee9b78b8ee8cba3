use std::path::Path;
use std::sync::{Arc, RwLock};

use clap::Parser;
use msgshield::cli::{Cli, Commands, ConfigAction};
use msgshield::config::{reload, AppConfig};
use msgshield::dlp::{MessagePipeline, PatternCatalog};
use msgshield::gateway::intercom::{IntercomClient, MessagePlatform};
use msgshield::gateway::{self, AppState};
use msgshield::notification::telegram::TelegramNotifier;
use msgshield::notification::{NotificationEvent, Notifier};
use msgshield::storage;

fn db_path() -> std::path::PathBuf {
    dirs_path().join("msgshield.db")
}

fn dirs_path() -> std::path::PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let dir = std::path::PathBuf::from(home).join(".msgshield");
    std::fs::create_dir_all(&dir).ok();
    dir
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start => {
            cmd_start(&cli.config).await?;
        }
        Commands::Status => {
            cmd_status()?;
        }
        Commands::Logs {
            tail,
            export,
            format,
        } => {
            cmd_logs(tail, export, &format)?;
        }
        Commands::Scan { text } => {
            cmd_scan(&cli.config, &text)?;
        }
        Commands::Patterns => {
            cmd_patterns(&cli.config)?;
        }
        Commands::Init => {
            cmd_init(&cli.config)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => cmd_config_show(&cli.config)?,
            ConfigAction::Template { name } => cmd_config_template(&cli.config, &name)?,
        },
    }

    Ok(())
}

async fn cmd_start(config_path: &Path) -> anyhow::Result<()> {
    let config = AppConfig::load_from_path(config_path)?;
    // A malformed catalog must prevent the gateway from serving traffic.
    let catalog = config.detection.build_catalog()?;

    println!("msgshield starting...");
    println!("Config: {}", config_path.display());
    println!("Listen: {}", config.server.listen);
    println!("Patterns loaded: {}", catalog.len());
    println!(
        "Blocking: {} (threshold {})",
        if config.detection.settings().block_enabled {
            "enabled"
        } else {
            "disabled"
        },
        config.detection.settings().confidence_threshold
    );

    let pool = storage::open_pool(&db_path())?;
    let settings = Arc::new(RwLock::new(config.detection.settings()));

    let notifier: Option<Arc<dyn Notifier>> = if config.notification.enabled {
        config
            .notification
            .telegram
            .as_ref()
            .map(|t| Arc::new(TelegramNotifier::from_config(t)) as Arc<dyn Notifier>)
    } else {
        None
    };

    let platform: Option<Arc<dyn MessagePlatform>> = if config.intercom.access_token.is_empty() {
        println!("No Intercom access token configured; running in record-only mode.");
        None
    } else {
        Some(Arc::new(IntercomClient::new(
            config.intercom.access_token.clone(),
            config.intercom.base_url.clone(),
        )) as Arc<dyn MessagePlatform>)
    };

    let state = Arc::new(AppState {
        db: pool,
        pipeline: MessagePipeline::new(Arc::new(catalog)),
        settings: settings.clone(),
        platform,
        notifier,
        notify_on_block: config.notification.notify_on_block,
        webhook_secret: config.intercom.access_token.clone(),
        vault_base_url: config.vault.base_url.clone(),
        max_message_length: config.server.max_message_length,
    });

    // Keep the watcher handle alive for the lifetime of the server.
    let _watcher = reload::start_file_watcher(config_path.to_path_buf(), settings.clone())?;
    reload::start_sighup_handler(config_path.to_path_buf(), settings);

    let listen = config.server.listen.clone();
    let server_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = gateway::start(&listen, server_state).await {
            tracing::error!("Gateway server error: {}", e);
        }
    });

    println!("Gateway running on {}", config.server.listen);
    println!("Point the Intercom webhook at http://{}/webhook", config.server.listen);

    // Keep running until interrupted
    tokio::signal::ctrl_c().await?;
    println!("\nShutting down...");
    state.notify(NotificationEvent::GatewayShutdown);
    Ok(())
}

fn cmd_status() -> anyhow::Result<()> {
    let db = db_path();
    if db.exists() {
        let conn = storage::open_db(&db)?;
        let stats = storage::query_stats(&conn)?;

        println!("msgshield Status");
        println!("────────────────");
        println!("Messages processed: {}", stats.total);
        println!("  Blocked: {}", stats.blocked);
        println!("  Masked:  {}", stats.masked);
        println!("  Clean:   {}", stats.clean);
        println!("Findings: {}", stats.findings_total);
        for tc in &stats.findings_by_type {
            println!("  {:<18} {}", tc.finding_type, tc.count);
        }
    } else {
        println!("msgshield Status: No message database found.");
        println!("Run 'msgshield start' to begin processing.");
    }
    Ok(())
}

fn cmd_logs(tail: usize, export: bool, format: &str) -> anyhow::Result<()> {
    let db = db_path();
    if !db.exists() {
        println!("No message database found. Run 'msgshield start' first.");
        return Ok(());
    }

    let conn = storage::open_db(&db)?;

    if export {
        match format {
            "csv" => {
                let csv = storage::export::export_csv(&conn)?;
                print!("{}", csv);
            }
            _ => {
                let json = storage::export::export_json(&conn)?;
                println!("{}", json);
            }
        }
    } else {
        let records = storage::query_recent(&conn, tail)?;
        if records.is_empty() {
            println!("No log entries found.");
        } else {
            println!(
                "{:<25} {:<15} {:<15} {:<10} {:<8} {}",
                "TIMESTAMP", "CONVERSATION", "MESSAGE", "BLOCKED", "FINDINGS", "MASKED TEXT"
            );
            println!("{}", "─".repeat(110));
            for record in &records {
                println!(
                    "{:<25} {:<15} {:<15} {:<10} {:<8} {}",
                    record.created_at,
                    record.conversation_id,
                    record.platform_message_id,
                    record.blocked,
                    record.finding_count,
                    record.masked_text,
                );
            }
        }
    }
    Ok(())
}

fn cmd_scan(config_path: &Path, text: &str) -> anyhow::Result<()> {
    // A config file is optional for local scans; fall back to defaults.
    let (catalog, settings) = if config_path.exists() {
        let config = AppConfig::load_from_path(config_path)?;
        (config.detection.build_catalog()?, config.detection.settings())
    } else {
        (PatternCatalog::builtin(), Default::default())
    };

    let pipeline = MessagePipeline::new(Arc::new(catalog));
    let processed = pipeline.process(text, &settings);

    if processed.findings.is_empty() {
        println!("No sensitive data found.");
        return Ok(());
    }

    println!("Findings ({}):", processed.findings.len());
    for finding in &processed.findings {
        println!(
            "  [{}] {}..{} {:?} -> {}",
            finding.finding_type,
            finding.start_offset,
            finding.end_offset,
            finding.original_value,
            finding.mask_value,
        );
    }
    println!("\nMasked: {}", processed.masked_text);
    println!("Blocked: {}", processed.blocked);
    Ok(())
}

fn cmd_patterns(config_path: &Path) -> anyhow::Result<()> {
    let catalog = if config_path.exists() {
        let config = AppConfig::load_from_path(config_path)?;
        config.detection.build_catalog()?
    } else {
        PatternCatalog::builtin()
    };

    println!("Pattern catalog ({} rules):", catalog.len());
    for rule in catalog.rules() {
        println!("  {:<18} {:<28} {}", rule.name, rule.mask_template, rule.regex.as_str());
    }
    Ok(())
}

fn cmd_init(config_path: &Path) -> anyhow::Result<()> {
    println!("Initializing msgshield...");

    let data_dir = dirs_path();
    std::fs::create_dir_all(&data_dir)?;
    println!("  Created data dir: {}", data_dir.display());

    let db = db_path();
    storage::open_db(&db)?;
    println!("  Initialized database: {}", db.display());

    if !config_path.exists() {
        let default_config = include_str!("../templates/default.toml");
        std::fs::write(config_path, default_config)?;
        println!("  Created config: {}", config_path.display());
    } else {
        println!("  Config already exists: {}", config_path.display());
    }

    println!("\nDone! Next steps:");
    println!("  1. Export your token:  export INTERCOM_ACCESS_TOKEN=...");
    println!("  2. Start the gateway:  msgshield start");
    println!("  3. Point the Intercom webhook at /webhook");
    Ok(())
}

fn cmd_config_show(config_path: &Path) -> anyhow::Result<()> {
    let config = AppConfig::load_from_path(config_path)?;
    let catalog = config.detection.build_catalog()?;
    println!("Current Configuration ({})", config_path.display());
    println!("═══════════════════════════════════════");
    println!("Listen: {}", config.server.listen);
    println!("Max message length: {}", config.server.max_message_length);
    println!(
        "Blocking: {} (threshold {})",
        config.detection.settings().block_enabled,
        config.detection.settings().confidence_threshold
    );
    println!("Patterns: {}", catalog.len());
    println!("Intercom base URL: {}", config.intercom.base_url);
    println!("Vault base URL: {}", config.vault.base_url);
    println!(
        "Notifications: {} (telegram: {})",
        config.notification.enabled,
        config.notification.telegram.is_some()
    );
    Ok(())
}

fn cmd_config_template(config_path: &Path, name: &str) -> anyhow::Result<()> {
    let template_content = match name {
        "default" => include_str!("../templates/default.toml"),
        "monitor" => include_str!("../templates/monitor.toml"),
        "strict" => include_str!("../templates/strict.toml"),
        _ => {
            println!("Unknown template: {}", name);
            println!("Available templates: default, monitor, strict");
            return Ok(());
        }
    };

    std::fs::write(config_path, template_content)?;
    println!("Applied template '{}' to {}", name, config_path.display());
    Ok(())
}
