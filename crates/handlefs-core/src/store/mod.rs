//! Persisted session state in SQLite: granted roots and the move journal.

pub mod journal;
pub mod pragmas;
pub mod registry;
pub mod schema;

use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::Mutex;

use crate::error::Result;

pub use journal::{MoveJournal, MovePhase, MoveRecord};
pub use registry::{HandleRegistry, RootRecord};

/// Exclusive connection to the state database behind a tokio Mutex.
#[derive(Clone)]
pub struct StateStore {
    conn: Arc<Mutex<Connection>>,
}

impl StateStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        pragmas::apply_pragmas(&conn)?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure on the connection while holding the lock.
    ///
    /// SQLite calls here are short, so they run on the current task.
    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let guard = self.conn.lock().await;
        f(&guard)
    }

    pub fn registry(&self) -> HandleRegistry {
        HandleRegistry::new(self.clone())
    }

    pub fn journal(&self) -> MoveJournal {
        MoveJournal::new(self.clone())
    }
}
