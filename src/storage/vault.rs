//! Restricted vault for original message content.
//!
//! When a message is masked or blocked, the unredacted original is retained
//! here, addressable only through a generated secure link. Reviewers can
//! leave feedback on entries (was the redaction correct?) and archive them;
//! archived entries disappear from lookups and listings.

use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;

/// A vault entry holding the original (unmasked) message.
#[derive(Debug, Clone, Serialize)]
pub struct VaultEntry {
    pub id: Option<i64>,
    pub message_id: i64,
    pub conversation_id: String,
    pub user_id: String,
    pub original_message: String,
    /// Full secure link (`<base>/view/<uuid>`), unique per entry.
    pub vault_link: String,
    pub archived: bool,
    pub created_at: String,
}

/// Reviewer feedback on a vault entry.
#[derive(Debug, Clone, Serialize)]
pub struct VaultFeedback {
    pub id: Option<i64>,
    pub vault_entry_id: i64,
    /// `true` when the reviewer confirms the redaction was correct.
    pub is_positive: bool,
    pub feedback_notes: String,
    pub reviewed_by: String,
    pub reviewed_at: String,
}

/// Filters for [`list_entries`]. Default lists everything unarchived.
#[derive(Debug, Clone, Default)]
pub struct VaultFilter {
    pub conversation_id: Option<String>,
    pub user_id: Option<String>,
    pub limit: Option<usize>,
}

/// Create a vault entry for a stored message, generating its secure link.
pub fn create_entry(
    conn: &Connection,
    message_id: i64,
    conversation_id: &str,
    user_id: &str,
    original_message: &str,
    base_url: &str,
) -> Result<VaultEntry> {
    let secure_id = Uuid::new_v4();
    let vault_link = format!("{}/view/{}", base_url.trim_end_matches('/'), secure_id);
    let created_at = chrono::Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO vault_entries
            (message_id, conversation_id, user_id, original_message, vault_link,
             archived, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        rusqlite::params![
            message_id,
            conversation_id,
            user_id,
            original_message,
            vault_link,
            created_at,
        ],
    )?;

    Ok(VaultEntry {
        id: Some(conn.last_insert_rowid()),
        message_id,
        conversation_id: conversation_id.to_string(),
        user_id: user_id.to_string(),
        original_message: original_message.to_string(),
        vault_link,
        archived: false,
        created_at,
    })
}

/// Look up an unarchived entry by its full secure link.
pub fn get_by_link(conn: &Connection, vault_link: &str) -> Result<Option<VaultEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, message_id, conversation_id, user_id, original_message,
                vault_link, archived, created_at
         FROM vault_entries WHERE vault_link = ?1 AND archived = 0",
    )?;
    let mut rows = stmt.query_map(rusqlite::params![vault_link], row_to_entry)?;
    match rows.next() {
        Some(entry) => Ok(Some(entry?)),
        None => Ok(None),
    }
}

/// List unarchived entries, newest first, with optional filters.
pub fn list_entries(conn: &Connection, filter: &VaultFilter) -> Result<Vec<VaultEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, message_id, conversation_id, user_id, original_message,
                vault_link, archived, created_at
         FROM vault_entries
         WHERE archived = 0
           AND (?1 IS NULL OR conversation_id = ?1)
           AND (?2 IS NULL OR user_id = ?2)
         ORDER BY id DESC LIMIT ?3",
    )?;
    let limit = filter.limit.unwrap_or(50) as i64;
    let rows = stmt.query_map(
        rusqlite::params![filter.conversation_id, filter.user_id, limit],
        row_to_entry,
    )?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

/// Archive an entry. Returns `false` if no such entry exists.
pub fn archive_entry(conn: &Connection, vault_entry_id: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE vault_entries SET archived = 1 WHERE id = ?1",
        rusqlite::params![vault_entry_id],
    )?;
    Ok(changed > 0)
}

/// Record reviewer feedback for an entry. A second review replaces the first.
pub fn add_feedback(
    conn: &Connection,
    vault_entry_id: i64,
    is_positive: bool,
    feedback_notes: &str,
    reviewed_by: &str,
) -> Result<VaultFeedback> {
    let reviewed_at = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO vault_feedback
            (vault_entry_id, is_positive, feedback_notes, reviewed_by, reviewed_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(vault_entry_id) DO UPDATE SET
            is_positive = excluded.is_positive,
            feedback_notes = excluded.feedback_notes,
            reviewed_by = excluded.reviewed_by,
            reviewed_at = excluded.reviewed_at",
        rusqlite::params![
            vault_entry_id,
            is_positive,
            feedback_notes,
            reviewed_by,
            reviewed_at,
        ],
    )?;

    Ok(VaultFeedback {
        id: None,
        vault_entry_id,
        is_positive,
        feedback_notes: feedback_notes.to_string(),
        reviewed_by: reviewed_by.to_string(),
        reviewed_at,
    })
}

/// Fetch the feedback for an entry, if any.
pub fn get_feedback(conn: &Connection, vault_entry_id: i64) -> Result<Option<VaultFeedback>> {
    let mut stmt = conn.prepare(
        "SELECT id, vault_entry_id, is_positive, feedback_notes, reviewed_by, reviewed_at
         FROM vault_feedback WHERE vault_entry_id = ?1",
    )?;
    let mut rows = stmt.query_map(rusqlite::params![vault_entry_id], |row| {
        Ok(VaultFeedback {
            id: Some(row.get(0)?),
            vault_entry_id: row.get(1)?,
            is_positive: row.get(2)?,
            feedback_notes: row.get(3)?,
            reviewed_by: row.get(4)?,
            reviewed_at: row.get(5)?,
        })
    })?;
    match rows.next() {
        Some(feedback) => Ok(Some(feedback?)),
        None => Ok(None),
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<VaultEntry> {
    Ok(VaultEntry {
        id: Some(row.get(0)?),
        message_id: row.get(1)?,
        conversation_id: row.get(2)?,
        user_id: row.get(3)?,
        original_message: row.get(4)?,
        vault_link: row.get(5)?,
        archived: row.get(6)?,
        created_at: row.get(7)?,
    })
}
