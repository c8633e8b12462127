use std::path::Path;

use anyhow::Result;
use rusqlite::Connection;

pub const DEFAULT_DB_PATH: &str = "data/fl_opinions.sqlite";

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS captures (
            id          INTEGER PRIMARY KEY,
            court_key   TEXT NOT NULL,
            label       TEXT NOT NULL,
            url         TEXT NOT NULL,
            html        TEXT,
            status      INTEGER,
            error       TEXT,
            latency_ms  INTEGER,
            captured_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_captures_court ON captures(court_key);

        -- Latest cascade result per capture
        CREATE TABLE IF NOT EXISTS extractions (
            capture_id    INTEGER PRIMARY KEY REFERENCES captures(id),
            strategy      TEXT,
            opinion_count INTEGER NOT NULL,
            parsed_at     TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    Ok(())
}

// ── Capture ──

pub struct CaptureRow {
    pub court_key: String,
    pub label: String,
    pub url: String,
    pub html: Option<String>,
    pub status: Option<i32>,
    pub error: Option<String>,
    pub latency_ms: Option<i64>,
}

pub fn save_capture(conn: &Connection, row: &CaptureRow) -> Result<i64> {
    conn.execute(
        "INSERT INTO captures (court_key, label, url, html, status, error, latency_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            row.court_key, row.label, row.url, row.html, row.status, row.error, row.latency_ms,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

// ── Reparse ──

pub struct StoredCapture {
    pub id: i64,
    pub court_key: String,
    pub label: String,
    pub url: String,
    pub html: String,
    pub captured_at: String,
}

/// Captures that have HTML, oldest first.
pub fn fetch_captures(
    conn: &Connection,
    court: Option<&str>,
    limit: Option<usize>,
) -> Result<Vec<StoredCapture>> {
    let sql = format!(
        "SELECT id, court_key, label, url, html, captured_at
         FROM captures
         WHERE html IS NOT NULL AND (?1 IS NULL OR court_key = ?1)
         ORDER BY id{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([court], |row| {
            Ok(StoredCapture {
                id: row.get(0)?,
                court_key: row.get(1)?,
                label: row.get(2)?,
                url: row.get(3)?,
                html: row.get(4)?,
                captured_at: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct ExtractionRow {
    pub capture_id: i64,
    pub strategy: Option<String>,
    pub opinion_count: usize,
}

pub fn save_extractions(conn: &Connection, rows: &[ExtractionRow]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO extractions (capture_id, strategy, opinion_count)
             VALUES (?1, ?2, ?3)",
        )?;
        for r in rows {
            stmt.execute(rusqlite::params![r.capture_id, r.strategy, r.opinion_count as i64])?;
        }
    }
    tx.commit()?;
    Ok(())
}

// ── Stats ──

pub struct Stats {
    pub captures: usize,
    pub errors: usize,
    pub courts: usize,
    pub parsed: usize,
    pub with_opinions: usize,
    pub by_strategy: Vec<(String, usize)>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let captures: usize = conn.query_row("SELECT COUNT(*) FROM captures", [], |r| r.get(0))?;
    let errors: usize = conn.query_row(
        "SELECT COUNT(*) FROM captures WHERE error IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let courts: usize =
        conn.query_row("SELECT COUNT(DISTINCT court_key) FROM captures", [], |r| r.get(0))?;
    let parsed: usize = conn.query_row("SELECT COUNT(*) FROM extractions", [], |r| r.get(0))?;
    let with_opinions: usize = conn.query_row(
        "SELECT COUNT(*) FROM extractions WHERE opinion_count > 0",
        [],
        |r| r.get(0),
    )?;

    let mut stmt = conn.prepare(
        "SELECT COALESCE(strategy, 'none'), COUNT(*)
         FROM extractions
         GROUP BY 1
         ORDER BY 2 DESC, 1",
    )?;
    let by_strategy = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Stats {
        captures,
        errors,
        courts,
        parsed,
        with_opinions,
        by_strategy,
    })
}
