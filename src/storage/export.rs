use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;

use super::MessageRecord;

/// One row of the exported message log. The original text is deliberately
/// excluded: exports leave the gateway, originals stay in the vault.
#[derive(Debug, Serialize)]
struct LogEntry {
    id: i64,
    created_at: String,
    conversation_id: String,
    platform_message_id: String,
    disposition: String,
    finding_count: usize,
    masked_text: String,
}

impl From<&MessageRecord> for LogEntry {
    fn from(record: &MessageRecord) -> Self {
        LogEntry {
            id: record.id.unwrap_or(0),
            created_at: record.created_at.clone(),
            conversation_id: record.conversation_id.clone(),
            platform_message_id: record.platform_message_id.clone(),
            disposition: if record.blocked {
                "blocked".to_string()
            } else {
                "delivered".to_string()
            },
            finding_count: record.finding_count,
            masked_text: record.masked_text.clone(),
        }
    }
}

/// Export all message records as a JSON string.
pub fn export_json(conn: &Connection) -> Result<String> {
    let records = super::query_recent(conn, usize::MAX)?;
    let entries: Vec<LogEntry> = records.iter().map(LogEntry::from).collect();
    let json = serde_json::to_string_pretty(&entries)?;
    Ok(json)
}

/// Export all message records as a CSV string.
pub fn export_csv(conn: &Connection) -> Result<String> {
    let records = super::query_recent(conn, usize::MAX)?;
    let mut output = String::from(
        "id,created_at,conversation_id,platform_message_id,disposition,finding_count\n",
    );
    for record in &records {
        let entry = LogEntry::from(record);
        output.push_str(&format!(
            "{},{},{},{},{},{}\n",
            entry.id,
            entry.created_at,
            entry.conversation_id,
            entry.platform_message_id,
            entry.disposition,
            entry.finding_count,
        ));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{insert_message, open_memory_db};

    fn sample_record(platform_id: &str, blocked: bool) -> MessageRecord {
        MessageRecord {
            id: None,
            platform_message_id: platform_id.to_string(),
            conversation_id: "conv-1".to_string(),
            original_text: "ssn 123-45-6789".to_string(),
            masked_text: "ssn XXX-XX-XXXX".to_string(),
            blocked,
            finding_count: 1,
            created_at: "2026-08-01T10:00:00Z".to_string(),
        }
    }

    #[test]
    fn export_json_format() {
        let conn = open_memory_db().unwrap();
        insert_message(&conn, &sample_record("msg-1", true), &[]).unwrap();

        let json = export_json(&conn).unwrap();
        assert!(json.contains("\"disposition\": \"blocked\""));
        assert!(json.contains("\"conversation_id\": \"conv-1\""));
        // Originals never leave through exports.
        assert!(!json.contains("123-45-6789"));

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 1);
    }

    #[test]
    fn export_csv_format() {
        let conn = open_memory_db().unwrap();
        insert_message(&conn, &sample_record("msg-1", true), &[]).unwrap();
        insert_message(&conn, &sample_record("msg-2", false), &[]).unwrap();

        let csv = export_csv(&conn).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "id,created_at,conversation_id,platform_message_id,disposition,finding_count"
        );
        assert_eq!(lines.len(), 3); // header + 2 data rows
        assert!(lines[1].contains("delivered") || lines[2].contains("delivered"));
    }

    #[test]
    fn export_empty_db() {
        let conn = open_memory_db().unwrap();

        let json = export_json(&conn).unwrap();
        assert_eq!(json, "[]");

        let csv = export_csv(&conn).unwrap();
        assert_eq!(csv.lines().count(), 1); // header only
    }
}
