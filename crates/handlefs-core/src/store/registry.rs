use crate::error::{HandleFsError, Result};
use crate::store::StateStore;

/// A persisted root grant.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RootRecord {
    pub project_id: String,
    /// Host locator from `DirectoryHandle::reference`.
    pub reference: String,
    pub root_name: String,
    pub saved_at: String,
}

/// Project id → root handle reference.
pub struct HandleRegistry {
    store: StateStore,
}

impl HandleRegistry {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// Insert or replace the root saved for `project_id`.
    pub async fn save(&self, project_id: &str, reference: &str, root_name: &str) -> Result<()> {
        self.store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO root_handles (project_id, reference, root_name) VALUES (?1, ?2, ?3) \
                     ON CONFLICT(project_id) DO UPDATE SET reference = excluded.reference, \
                     root_name = excluded.root_name, saved_at = strftime('%Y-%m-%dT%H:%M:%f', 'now')",
                    rusqlite::params![project_id, reference, root_name],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, project_id: &str) -> Result<Option<RootRecord>> {
        self.store
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT project_id, reference, root_name, saved_at FROM root_handles WHERE project_id = ?1",
                )?;
                let mut rows = stmt.query_map([project_id], row_to_record)?;
                match rows.next() {
                    Some(row) => Ok(Some(row?)),
                    None => Ok(None),
                }
            })
            .await
    }

    /// Returns `true` if a row was removed.
    pub async fn remove(&self, project_id: &str) -> Result<bool> {
        self.store
            .with_conn(|conn| {
                let n = conn.execute("DELETE FROM root_handles WHERE project_id = ?1", [project_id])?;
                Ok(n > 0)
            })
            .await
    }

    /// Remove and return the saved root, failing if none was saved.
    pub async fn forget(&self, project_id: &str) -> Result<RootRecord> {
        let record = self.get(project_id).await?.ok_or_else(|| HandleFsError::ProjectNotFound {
            project: project_id.to_string(),
        })?;
        self.remove(project_id).await?;
        Ok(record)
    }

    pub async fn list(&self) -> Result<Vec<RootRecord>> {
        self.store
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT project_id, reference, root_name, saved_at FROM root_handles ORDER BY project_id",
                )?;
                let rows = stmt.query_map([], row_to_record)?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<RootRecord> {
    Ok(RootRecord {
        project_id: row.get(0)?,
        reference: row.get(1)?,
        root_name: row.get(2)?,
        saved_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_get_remove_list() {
        let store = StateStore::open_in_memory().unwrap();
        let reg = store.registry();

        assert!(reg.get("p").await.unwrap().is_none());
        reg.save("p", "memory:one", "one").await.unwrap();
        reg.save("q", "memory:two", "two").await.unwrap();
        // Replacing keeps one row per project
        reg.save("p", "memory:three", "three").await.unwrap();

        let rec = reg.get("p").await.unwrap().unwrap();
        assert_eq!(rec.reference, "memory:three");
        assert_eq!(rec.root_name, "three");

        let all: Vec<String> = reg.list().await.unwrap().into_iter().map(|r| r.project_id).collect();
        assert_eq!(all, vec!["p", "q"]);

        assert!(reg.remove("p").await.unwrap());
        assert!(!reg.remove("p").await.unwrap());
        assert_eq!(reg.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn forget_unknown_project() {
        let store = StateStore::open_in_memory().unwrap();
        let reg = store.registry();
        reg.save("p", "memory:one", "one").await.unwrap();

        assert_eq!(reg.forget("p").await.unwrap().root_name, "one");
        let err = reg.forget("p").await.unwrap_err();
        assert!(matches!(err, HandleFsError::ProjectNotFound { .. }));
    }
}
