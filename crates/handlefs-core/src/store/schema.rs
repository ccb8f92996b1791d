use rusqlite::Connection;
use tracing::info;

use crate::error::{HandleFsError, Result};

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS handlefs_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Granted roots, keyed by application-level project id
CREATE TABLE IF NOT EXISTS root_handles (
    project_id TEXT PRIMARY KEY,
    reference  TEXT NOT NULL,
    root_name  TEXT NOT NULL,
    saved_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f', 'now'))
);

-- Two-phase log for copy-then-delete moves
CREATE TABLE IF NOT EXISTS move_journal (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    root_ref   TEXT NOT NULL,
    source     TEXT NOT NULL,
    dest       TEXT NOT NULL,
    phase      TEXT NOT NULL DEFAULT 'copying',  -- copying, copied
    started_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_move_journal_root ON move_journal(root_ref);
"#;

/// Create the schema if missing. Returns `true` when it was newly created.
pub fn init_schema(conn: &Connection) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='handlefs_meta'",
        [],
        |row| row.get(0),
    )?;

    if exists {
        let version = get_schema_version(conn)?;
        if version == SCHEMA_VERSION {
            return Ok(false);
        }
        return Err(HandleFsError::SchemaMismatch {
            expected: SCHEMA_VERSION,
            found: version,
        });
    }

    conn.execute_batch(SCHEMA_V1)?;
    conn.execute(
        "INSERT INTO handlefs_meta (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;
    conn.execute(
        "INSERT INTO handlefs_meta (key, value) VALUES ('created_at', strftime('%Y-%m-%dT%H:%M:%f', 'now'))",
        [],
    )?;

    info!("state schema v{SCHEMA_VERSION} initialized");
    Ok(true)
}

pub fn get_schema_version(conn: &Connection) -> Result<u32> {
    let version_str: String = conn.query_row(
        "SELECT value FROM handlefs_meta WHERE key = 'schema_version'",
        [],
        |row| row.get(0),
    )?;
    version_str
        .parse::<u32>()
        .map_err(|_| HandleFsError::Other(format!("invalid schema version: {version_str}")))
}
