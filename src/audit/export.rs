use rusqlite::Connection;
use serde::Serialize;

use crate::error::Result;

use super::DecisionRecord;

#[derive(Debug, Serialize)]
struct ExportEntry {
    id: i64,
    timestamp: String,
    url: String,
    host: String,
    verdict: String,
    reason: String,
}

impl From<&DecisionRecord> for ExportEntry {
    fn from(record: &DecisionRecord) -> Self {
        ExportEntry {
            id: record.id.unwrap_or(0),
            timestamp: record.timestamp.clone(),
            url: record.url.clone(),
            host: record.host.clone(),
            verdict: record.verdict.clone(),
            reason: record.reason.clone(),
        }
    }
}

/// Export all decisions as a JSON string.
pub fn export_json(conn: &Connection) -> Result<String> {
    let records = super::query_recent(conn, usize::MAX)?;
    let entries: Vec<ExportEntry> = records.iter().map(ExportEntry::from).collect();
    let json = serde_json::to_string_pretty(&entries)?;
    Ok(json)
}

/// Export all decisions as a CSV string.
pub fn export_csv(conn: &Connection) -> Result<String> {
    let records = super::query_recent(conn, usize::MAX)?;
    let mut csv = String::from("id,timestamp,url,host,verdict,reason\n");
    for record in &records {
        csv.push_str(&format!(
            "{},{},{},{},{},{}\n",
            record.id.unwrap_or(0),
            csv_field(&record.timestamp),
            csv_field(&record.url),
            csv_field(&record.host),
            csv_field(&record.verdict),
            csv_field(&record.reason),
        ));
    }
    Ok(csv)
}

/// Quote a CSV field if it contains a comma, quote, or newline.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{log_decision, open_memory_db};

    fn populate(conn: &Connection) {
        for (url, verdict) in [
            ("https://a.com/x", "noop"),
            ("https://b.com/y,z", "block-tab"),
        ] {
            log_decision(
                conn,
                &DecisionRecord {
                    id: None,
                    timestamp: "2026-06-01T10:00:00Z".to_string(),
                    url: url.to_string(),
                    host: url::Url::parse(url).unwrap().host_str().unwrap().to_string(),
                    verdict: verdict.to_string(),
                    reason: "rule matched".to_string(),
                },
            )
            .unwrap();
        }
    }

    #[test]
    fn json_export_contains_all_records() {
        let conn = open_memory_db().unwrap();
        populate(&conn);

        let json = export_json(&conn).unwrap();
        let entries: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["verdict"], "block-tab");
    }

    #[test]
    fn csv_export_quotes_commas() {
        let conn = open_memory_db().unwrap();
        populate(&conn);

        let csv = export_csv(&conn).unwrap();
        assert!(csv.starts_with("id,timestamp,url,host,verdict,reason\n"));
        assert!(csv.contains("\"https://b.com/y,z\""));
    }

    #[test]
    fn empty_db_exports_cleanly() {
        let conn = open_memory_db().unwrap();
        assert_eq!(export_json(&conn).unwrap(), "[]");
        assert_eq!(export_csv(&conn).unwrap(), "id,timestamp,url,host,verdict,reason\n");
    }
}
