//! SQLite-backed decision audit log.
//!
//! Every navigation report handled by the daemon surface is recorded with
//! its timestamp, URL, hostname, verdict (noop/block-tab/redirect-to-url/
//! close-tab), and reason. The database is accessed through an [`r2d2`]
//! connection pool ([`DbPool`]) for thread-safe concurrent writes from
//! async tasks.
//!
//! The [`export`] submodule provides JSON and CSV export of all records.

pub mod export;

use rusqlite::Connection;

use crate::error::{NavgateError, Result};

/// SQLite connection pool type alias (r2d2 + r2d2-sqlite).
pub type DbPool = r2d2::Pool<r2d2_sqlite::SqliteConnectionManager>;

/// Open a connection pool for the given database file path.
///
/// Creates the database and `decisions` table if they don't exist.
/// The pool is configured with a maximum of 4 connections.
pub fn open_pool(path: &std::path::Path) -> Result<DbPool> {
    let manager = r2d2_sqlite::SqliteConnectionManager::file(path);
    let pool = r2d2::Pool::builder()
        .max_size(4)
        .build(manager)
        .map_err(|e| NavgateError::Audit(e.to_string()))?;
    let conn = pool.get().map_err(|e| NavgateError::Audit(e.to_string()))?;
    init_db(&conn)?;
    Ok(pool)
}

/// Open an in-memory connection pool (for testing).
pub fn open_memory_pool() -> Result<DbPool> {
    let manager = r2d2_sqlite::SqliteConnectionManager::memory();
    let pool = r2d2::Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| NavgateError::Audit(e.to_string()))?;
    let conn = pool.get().map_err(|e| NavgateError::Audit(e.to_string()))?;
    init_db(&conn)?;
    Ok(pool)
}

/// A real-time decision event broadcast to subscribers (e.g. SSE stream).
///
/// Created alongside each [`DecisionRecord`] insert and sent via a
/// `tokio::sync::broadcast` channel. Subscribers that lag behind
/// automatically skip missed events.
#[derive(Debug, Clone)]
pub struct DecisionEvent {
    /// ISO 8601 timestamp.
    pub timestamp: String,
    /// Full URL of the navigation attempt.
    pub url: String,
    /// Hostname of the navigation attempt, if the URL had one.
    pub host: String,
    /// Verdict label: `"noop"`, `"block-tab"`, etc.
    pub verdict: String,
    /// Human-readable reason.
    pub reason: String,
}

/// A single logged decision stored in the `decisions` table.
#[derive(Debug, Clone)]
pub struct DecisionRecord {
    /// Auto-incremented row ID (`None` for new records before insert).
    pub id: Option<i64>,
    /// ISO 8601 timestamp (e.g., `"2026-06-01T10:00:00Z"`).
    pub timestamp: String,
    /// Full URL of the navigation attempt.
    pub url: String,
    /// Hostname of the navigation attempt, empty if the URL had none.
    pub host: String,
    /// Verdict label: `"noop"`, `"block-tab"`, `"redirect-to-url"`, or
    /// `"close-tab"`.
    pub verdict: String,
    /// Human-readable reason for the decision.
    pub reason: String,
}

/// Initialize the database and create the decisions table if missing.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS decisions (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            url       TEXT NOT NULL,
            host      TEXT NOT NULL,
            verdict   TEXT NOT NULL,
            reason    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_decisions_timestamp ON decisions(timestamp);
        CREATE INDEX IF NOT EXISTS idx_decisions_host ON decisions(host);",
    )?;
    Ok(())
}

/// Log a decision to the database.
pub fn log_decision(conn: &Connection, record: &DecisionRecord) -> Result<i64> {
    conn.execute(
        "INSERT INTO decisions (timestamp, url, host, verdict, reason)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            record.timestamp,
            record.url,
            record.host,
            record.verdict,
            record.reason,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Query the most recent N decisions.
pub fn query_recent(conn: &Connection, limit: usize) -> Result<Vec<DecisionRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, timestamp, url, host, verdict, reason
         FROM decisions ORDER BY id DESC LIMIT ?1",
    )?;

    let rows = stmt.query_map(rusqlite::params![limit as i64], |row| {
        Ok(DecisionRecord {
            id: Some(row.get(0)?),
            timestamp: row.get(1)?,
            url: row.get(2)?,
            host: row.get(3)?,
            verdict: row.get(4)?,
            reason: row.get(5)?,
        })
    })?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

/// Aggregated decision counts from the `decisions` table.
#[derive(Debug, Clone, Default)]
pub struct DecisionStats {
    /// Total number of logged decisions.
    pub total: usize,
    /// Navigations left untouched.
    pub noop: usize,
    /// Navigations steered to the blocked page.
    pub blocked: usize,
    /// Navigations steered to the custom redirect target.
    pub redirected: usize,
    /// Navigations whose tab was closed.
    pub closed: usize,
}

/// Query aggregated decision counts grouped by verdict.
///
/// Uses SQL `COUNT(*) GROUP BY verdict` for efficient aggregation without
/// loading all rows into memory.
pub fn query_stats(conn: &Connection) -> Result<DecisionStats> {
    let mut stmt = conn.prepare("SELECT verdict, COUNT(*) FROM decisions GROUP BY verdict")?;
    let rows = stmt.query_map([], |row| {
        let verdict: String = row.get(0)?;
        let count: i64 = row.get(1)?;
        Ok((verdict, count as usize))
    })?;

    let mut stats = DecisionStats::default();
    for row in rows {
        let (verdict, count) = row?;
        stats.total += count;
        match verdict.as_str() {
            "noop" => stats.noop = count,
            "block-tab" => stats.blocked = count,
            "redirect-to-url" => stats.redirected = count,
            "close-tab" => stats.closed = count,
            _ => {} // unknown verdicts still count in total
        }
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

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(url: &str, verdict: &str) -> DecisionRecord {
        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        DecisionRecord {
            id: None,
            timestamp: "2026-06-01T10:00:00Z".to_string(),
            url: url.to_string(),
            host,
            verdict: verdict.to_string(),
            reason: "test reason".to_string(),
        }
    }

    #[test]
    fn init_and_insert() {
        let conn = open_memory_db().unwrap();
        let id = log_decision(&conn, &sample("https://example.com/", "noop")).unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn query_recent_returns_in_desc_order() {
        let conn = open_memory_db().unwrap();
        log_decision(&conn, &sample("https://first.com/", "noop")).unwrap();
        log_decision(&conn, &sample("https://second.com/", "block-tab")).unwrap();
        log_decision(&conn, &sample("https://third.com/", "close-tab")).unwrap();

        let records = query_recent(&conn, 2).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].host, "third.com");
        assert_eq!(records[1].host, "second.com");
    }

    #[test]
    fn query_recent_with_limit_larger_than_data() {
        let conn = open_memory_db().unwrap();
        log_decision(&conn, &sample("https://only.com/", "noop")).unwrap();

        let records = query_recent(&conn, 100).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn open_pool_creates_table() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("pool_test.db");
        let pool = open_pool(&db_path).unwrap();
        let conn = pool.get().unwrap();
        let id = log_decision(&conn, &sample("https://pool.com/", "noop")).unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn pool_sequential_writes() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("writes.db");
        let pool = open_pool(&db_path).unwrap();

        for i in 0..10 {
            let conn = pool.get().unwrap();
            log_decision(&conn, &sample(&format!("https://host{i}.com/"), "noop")).unwrap();
        }

        let conn = pool.get().unwrap();
        let records = query_recent(&conn, 100).unwrap();
        assert_eq!(records.len(), 10);
    }

    #[test]
    fn query_stats_mixed_entries() {
        let conn = open_memory_db().unwrap();
        log_decision(&conn, &sample("https://a.com/", "noop")).unwrap();
        log_decision(&conn, &sample("https://b.com/", "noop")).unwrap();
        log_decision(&conn, &sample("https://c.com/", "block-tab")).unwrap();
        log_decision(&conn, &sample("https://d.com/", "block-tab")).unwrap();
        log_decision(&conn, &sample("https://e.com/", "block-tab")).unwrap();
        log_decision(&conn, &sample("https://f.com/", "redirect-to-url")).unwrap();
        log_decision(&conn, &sample("https://g.com/", "close-tab")).unwrap();
        log_decision(&conn, &sample("https://h.com/", "close-tab")).unwrap();

        let stats = query_stats(&conn).unwrap();
        assert_eq!(stats.total, 8);
        assert_eq!(stats.noop, 2);
        assert_eq!(stats.blocked, 3);
        assert_eq!(stats.redirected, 1);
        assert_eq!(stats.closed, 2);
    }

    #[test]
    fn query_stats_empty_db() {
        let conn = open_memory_db().unwrap();
        let stats = query_stats(&conn).unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.blocked, 0);
    }

    #[test]
    fn open_db_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let conn = open_db(&db_path).unwrap();
        log_decision(&conn, &sample("https://test.com/", "noop")).unwrap();

        // Re-open and verify
        let conn2 = open_db(&db_path).unwrap();
        let records = query_recent(&conn2, 10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].host, "test.com");
    }
}
