use crate::handle::{AccessMode, PermissionState};

/// All errors produced by handlefs-core.
#[derive(Debug, thiserror::Error)]
pub enum HandleFsError {
    #[error("no filesystem access: no root directory has been granted")]
    NoAccess,

    #[error("invalid path: {path}")]
    InvalidPath { path: String },

    #[error("not found: {path}")]
    NotFound { path: String },

    #[error("not a file: {path}")]
    NotAFile { path: String },

    #[error("not a directory: {path}")]
    NotADirectory { path: String },

    #[error("directory not empty: {path}")]
    DirectoryNotEmpty { path: String },

    #[error("permission {state} for {mode} access")]
    Permission {
        mode: AccessMode,
        state: PermissionState,
    },

    #[error("host I/O error: {0}")]
    HostIo(#[from] std::io::Error),

    #[error("directory nesting under {path} exceeds {limit} levels")]
    DepthExceeded { path: String, limit: usize },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no saved root for project: {project}")]
    ProjectNotFound { project: String },

    #[error("schema version mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: u32, found: u32 },

    #[error("{0}")]
    Other(String),
}

impl HandleFsError {
    /// True for the "entry does not exist" family, which path resolution
    /// treats as a cue to try the other entry kind.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, HandleFsError>;
