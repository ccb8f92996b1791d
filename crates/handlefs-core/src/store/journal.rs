//! Two-phase log for copy-then-delete moves.
//!
//! A move writes `copying` before the copy starts and `copied` once the
//! destination is complete; the row is deleted after the source is gone.
//! Whatever is left behind after a crash tells recovery which half to redo.

use std::fmt;
use std::str::FromStr;

use crate::error::{HandleFsError, Result};
use crate::store::StateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovePhase {
    /// Copy started; the destination may be partial.
    Copying,
    /// Copy finished; the source delete is pending.
    Copied,
}

impl fmt::Display for MovePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Copying => write!(f, "copying"),
            Self::Copied => write!(f, "copied"),
        }
    }
}

impl FromStr for MovePhase {
    type Err = HandleFsError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "copying" => Ok(Self::Copying),
            "copied" => Ok(Self::Copied),
            other => Err(HandleFsError::Other(format!("unknown move phase: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MoveRecord {
    pub id: i64,
    pub root_ref: String,
    pub source: String,
    pub dest: String,
    pub phase: MovePhase,
    pub started_at: String,
}

pub struct MoveJournal {
    store: StateStore,
}

impl MoveJournal {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// Record a move about to start. Returns the journal id.
    pub async fn begin(&self, root_ref: &str, source: &str, dest: &str) -> Result<i64> {
        self.store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO move_journal (root_ref, source, dest, phase) VALUES (?1, ?2, ?3, 'copying')",
                    rusqlite::params![root_ref, source, dest],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
    }

    pub async fn mark_copied(&self, id: i64) -> Result<()> {
        self.store
            .with_conn(|conn| {
                conn.execute("UPDATE move_journal SET phase = 'copied' WHERE id = ?1", [id])?;
                Ok(())
            })
            .await
    }

    /// The move is fully applied; drop its row.
    pub async fn complete(&self, id: i64) -> Result<()> {
        self.store
            .with_conn(|conn| {
                conn.execute("DELETE FROM move_journal WHERE id = ?1", [id])?;
                Ok(())
            })
            .await
    }

    /// Unfinished moves under `root_ref`, oldest first.
    pub async fn pending(&self, root_ref: &str) -> Result<Vec<MoveRecord>> {
        self.store
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, root_ref, source, dest, phase, started_at FROM move_journal \
                     WHERE root_ref = ?1 ORDER BY id",
                )?;
                let rows = stmt.query_map([root_ref], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                })?;
                let mut out = Vec::new();
                for row in rows {
                    let (id, root_ref, source, dest, phase, started_at) = row?;
                    out.push(MoveRecord {
                        id,
                        root_ref,
                        source,
                        dest,
                        phase: phase.parse()?,
                        started_at,
                    });
                }
                Ok(out)
            })
            .await
    }
}
