//! Capability handles: the host-provided, permission-gated view of storage.
//!
//! There is no path-addressed access here. A host hands out a root
//! [`DirectoryHandle`], and everything else is reached by walking from it
//! one name at a time. Any handle may stop working at any moment (the
//! entry was removed underneath it, or access was revoked), so callers
//! must treat every method as fallible at the point of use.

pub mod local;
pub mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// Access level requested from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccessMode {
    Read,
    ReadWrite,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::ReadWrite => write!(f, "readwrite"),
        }
    }
}

/// Answer to a permission query or request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Granted => write!(f, "granted"),
            Self::Denied => write!(f, "denied"),
            Self::Prompt => write!(f, "prompt"),
        }
    }
}

/// Host-reported metadata for a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub size: u64,
    /// Milliseconds since the Unix epoch.
    pub last_modified: u64,
    /// MIME type if the host knows one; empty otherwise.
    pub content_type: String,
}

pub type DirHandle = Arc<dyn DirectoryHandle>;
pub type FileRef = Arc<dyn FileHandle>;

/// A directory node in host storage.
#[async_trait]
pub trait DirectoryHandle: Send + Sync {
    fn name(&self) -> &str;

    /// A locator the host can later turn back into this handle via
    /// [`Host::restore_directory`]. `None` if the host cannot persist it.
    fn reference(&self) -> Option<String> {
        None
    }

    /// Direct children, in whatever order the host enumerates them.
    async fn entries(&self) -> Result<Vec<Handle>>;

    /// Child directory `name`. With `create`, missing directories are made.
    async fn get_directory(&self, name: &str, create: bool) -> Result<DirHandle>;

    /// Child file `name`. With `create`, a missing file is made empty.
    async fn get_file(&self, name: &str, create: bool) -> Result<FileRef>;

    /// Remove child `name`; directories need `recursive` unless empty.
    async fn remove_entry(&self, name: &str, recursive: bool) -> Result<()>;

    async fn query_permission(&self, mode: AccessMode) -> Result<PermissionState>;

    /// May prompt the user; resolves once they answer.
    async fn request_permission(&self, mode: AccessMode) -> Result<PermissionState>;
}

/// A file node in host storage.
#[async_trait]
pub trait FileHandle: Send + Sync {
    fn name(&self) -> &str;

    async fn metadata(&self) -> Result<FileMetadata>;

    async fn read(&self) -> Result<Vec<u8>>;

    /// Replace the whole content.
    async fn write(&self, data: &[u8]) -> Result<()>;
}

/// Either kind of capability handle.
#[derive(Clone)]
pub enum Handle {
    Directory(DirHandle),
    File(FileRef),
}

impl Handle {
    pub fn name(&self) -> &str {
        match self {
            Self::Directory(d) => d.name(),
            Self::File(f) => f.name(),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory(_))
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory(d) => write!(f, "Directory({:?})", d.name()),
            Self::File(h) => write!(f, "File({:?})", h.name()),
        }
    }
}

impl fmt::Debug for dyn DirectoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Directory({:?})", self.name())
    }
}

impl fmt::Debug for dyn FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File({:?})", self.name())
    }
}

/// The host environment: grants root directories.
#[async_trait]
pub trait Host: Send + Sync {
    /// The directory picker. May prompt; fails if the user cancels.
    async fn pick_directory(&self, mode: AccessMode) -> Result<DirHandle>;

    /// Rebuild a root handle from [`DirectoryHandle::reference`].
    /// `Ok(None)` means the location no longer exists.
    async fn restore_directory(&self, reference: &str) -> Result<Option<DirHandle>>;
}

/// Best-effort MIME type from a file name's extension. Empty when unknown.
pub fn guess_content_type(name: &str) -> &'static str {
    let ext = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => return "",
    };
    match ext.as_str() {
        "txt" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "js" | "mjs" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "wasm" => "application/wasm",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        _ => "",
    }
}
