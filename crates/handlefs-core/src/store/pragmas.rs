use rusqlite::Connection;

use crate::error::Result;

/// Apply the PRAGMAs for the state database.
pub fn apply_pragmas(conn: &Connection) -> Result<()> {
    // WAL must be set before the rest
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // The move journal is only useful if it survives a crash.
    conn.pragma_update(None, "synchronous", "FULL")?;

    conn.pragma_update(None, "busy_timeout", "5000")?;
    Ok(())
}
