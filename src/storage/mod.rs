//! SQLite-backed message storage.
//!
//! Every processed message is recorded with its masked text, disposition,
//! and the findings that were applied. The database is accessed through an
//! [`r2d2`] connection pool ([`DbPool`]) for thread-safe concurrent writes
//! from async handlers.
//!
//! The [`vault`] submodule holds the restricted originals and reviewer
//! feedback; [`export`] provides JSON and CSV export of the message log.

pub mod export;
pub mod vault;

use rusqlite::Connection;

use crate::dlp::{Finding, ProcessedMessage};
use crate::error::Result;

/// SQLite connection pool type alias (r2d2 + r2d2-sqlite).
pub type DbPool = r2d2::Pool<r2d2_sqlite::SqliteConnectionManager>;

/// Open a connection pool for the given database file path.
///
/// Creates the database and tables if they don't exist. The pool is
/// configured with a maximum of 4 connections.
pub fn open_pool(path: &std::path::Path) -> Result<DbPool> {
    let manager = r2d2_sqlite::SqliteConnectionManager::file(path);
    let pool = r2d2::Pool::builder()
        .max_size(4)
        .build(manager)
        .map_err(|e| crate::error::MsgShieldError::Storage(e.to_string()))?;
    let conn = pool
        .get()
        .map_err(|e| crate::error::MsgShieldError::Storage(e.to_string()))?;
    init_db(&conn)?;
    Ok(pool)
}

/// Open an in-memory connection pool (for testing).
pub fn open_memory_pool() -> Result<DbPool> {
    let manager = r2d2_sqlite::SqliteConnectionManager::memory();
    let pool = r2d2::Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| crate::error::MsgShieldError::Storage(e.to_string()))?;
    let conn = pool
        .get()
        .map_err(|e| crate::error::MsgShieldError::Storage(e.to_string()))?;
    init_db(&conn)?;
    Ok(pool)
}

/// A processed message as stored in the `messages` table.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    /// Auto-incremented row ID (`None` for new records before insert).
    pub id: Option<i64>,
    /// The platform's message ID (unique per message).
    pub platform_message_id: String,
    /// The platform's conversation ID.
    pub conversation_id: String,
    /// Original message body. Restricted material; only the vault API and
    /// authorized review paths read it back.
    pub original_text: String,
    /// The rewrite that was (or would have been) delivered.
    pub masked_text: String,
    /// Whether delivery was withheld.
    pub blocked: bool,
    /// Number of findings applied to this message.
    pub finding_count: usize,
    /// ISO 8601 timestamp.
    pub created_at: String,
}

impl MessageRecord {
    /// Build a record from a pipeline result and the platform identifiers.
    pub fn from_processed(
        platform_message_id: &str,
        conversation_id: &str,
        processed: &ProcessedMessage,
    ) -> Self {
        Self {
            id: None,
            platform_message_id: platform_message_id.to_string(),
            conversation_id: conversation_id.to_string(),
            original_text: processed.original_text.clone(),
            masked_text: processed.masked_text.clone(),
            blocked: processed.blocked,
            finding_count: processed.findings.len(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Initialize the SQLite database and create all tables if they don't exist.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS messages (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            platform_message_id TEXT NOT NULL UNIQUE,
            conversation_id     TEXT NOT NULL,
            original_text       TEXT NOT NULL,
            masked_text         TEXT NOT NULL,
            blocked             INTEGER NOT NULL,
            finding_count       INTEGER NOT NULL,
            created_at          TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id);
        CREATE INDEX IF NOT EXISTS idx_messages_created ON messages(created_at);

        CREATE TABLE IF NOT EXISTS findings (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id       INTEGER NOT NULL REFERENCES messages(id),
            finding_type     TEXT NOT NULL,
            original_value   TEXT NOT NULL,
            masked_value     TEXT NOT NULL,
            start_offset     INTEGER NOT NULL,
            end_offset       INTEGER NOT NULL,
            confidence       REAL NOT NULL,
            detection_method TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_findings_message ON findings(message_id);
        CREATE INDEX IF NOT EXISTS idx_findings_type ON findings(finding_type);

        CREATE TABLE IF NOT EXISTS vault_entries (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id       INTEGER NOT NULL UNIQUE REFERENCES messages(id),
            conversation_id  TEXT NOT NULL,
            user_id          TEXT NOT NULL,
            original_message TEXT NOT NULL,
            vault_link       TEXT NOT NULL UNIQUE,
            archived         INTEGER NOT NULL DEFAULT 0,
            created_at       TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_vault_conversation ON vault_entries(conversation_id);
        CREATE INDEX IF NOT EXISTS idx_vault_user ON vault_entries(user_id);

        CREATE TABLE IF NOT EXISTS vault_feedback (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            vault_entry_id INTEGER NOT NULL UNIQUE REFERENCES vault_entries(id),
            is_positive    INTEGER NOT NULL,
            feedback_notes TEXT NOT NULL,
            reviewed_by    TEXT NOT NULL,
            reviewed_at    TEXT NOT NULL
        );",
    )?;
    Ok(())
}

/// Insert a message and its findings atomically. Returns the message row ID.
pub fn insert_message(
    conn: &Connection,
    record: &MessageRecord,
    findings: &[Finding],
) -> Result<i64> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO messages
            (platform_message_id, conversation_id, original_text, masked_text,
             blocked, finding_count, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            record.platform_message_id,
            record.conversation_id,
            record.original_text,
            record.masked_text,
            record.blocked,
            record.finding_count as i64,
            record.created_at,
        ],
    )?;
    let message_id = tx.last_insert_rowid();

    for finding in findings {
        tx.execute(
            "INSERT INTO findings
                (message_id, finding_type, original_value, masked_value,
                 start_offset, end_offset, confidence, detection_method)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                message_id,
                finding.finding_type,
                finding.original_value,
                finding.mask_value,
                finding.start_offset as i64,
                finding.end_offset as i64,
                finding.confidence,
                finding.detection_method.as_str(),
            ],
        )?;
    }

    tx.commit()?;
    Ok(message_id)
}

/// Query the most recent N message records.
pub fn query_recent(conn: &Connection, limit: usize) -> Result<Vec<MessageRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, platform_message_id, conversation_id, original_text, masked_text,
                blocked, finding_count, created_at
         FROM messages ORDER BY id DESC LIMIT ?1",
    )?;

    let rows = stmt.query_map(rusqlite::params![limit as i64], |row| {
        Ok(MessageRecord {
            id: Some(row.get(0)?),
            platform_message_id: row.get(1)?,
            conversation_id: row.get(2)?,
            original_text: row.get(3)?,
            masked_text: row.get(4)?,
            blocked: row.get(5)?,
            finding_count: row.get::<_, i64>(6)? as usize,
            created_at: row.get(7)?,
        })
    })?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

/// Per-category finding count.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TypeCount {
    pub finding_type: String,
    pub count: usize,
}

/// Aggregated processing statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct GatewayStats {
    /// Total messages processed.
    pub total: usize,
    /// Messages withheld from delivery.
    pub blocked: usize,
    /// Messages delivered with at least one masked finding.
    pub masked: usize,
    /// Messages with no findings.
    pub clean: usize,
    /// Total findings across all messages.
    pub findings_total: usize,
    /// Finding counts grouped by category, most frequent first.
    pub findings_by_type: Vec<TypeCount>,
}

/// Query aggregated statistics without loading all rows into memory.
pub fn query_stats(conn: &Connection) -> Result<GatewayStats> {
    let mut stats = GatewayStats::default();

    let (total, blocked, masked): (i64, i64, i64) = conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(blocked), 0),
                COALESCE(SUM(CASE WHEN blocked = 0 AND finding_count > 0 THEN 1 ELSE 0 END), 0)
         FROM messages",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;
    stats.total = total as usize;
    stats.blocked = blocked as usize;
    stats.masked = masked as usize;
    stats.clean = stats.total - stats.blocked - stats.masked;

    let mut stmt = conn.prepare(
        "SELECT finding_type, COUNT(*) FROM findings
         GROUP BY finding_type ORDER BY COUNT(*) DESC, finding_type ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        let finding_type: String = row.get(0)?;
        let count: i64 = row.get(1)?;
        Ok((finding_type, count as usize))
    })?;
    for row in rows {
        let (finding_type, count) = row?;
        stats.findings_total += count;
        stats.findings_by_type.push(TypeCount {
            finding_type,
            count,
        });
    }

    Ok(stats)
}

/// Open or create a SQLite database at the given path.
pub fn open_db(path: &std::path::Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    init_db(&conn)?;
    Ok(conn)
}

/// Open an in-memory SQLite database (for testing).
pub fn open_memory_db() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_db(&conn)?;
    Ok(conn)
}
