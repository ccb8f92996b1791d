//! Path resolution over capability handles.
//!
//! Every call re-walks from the root. Intermediate handles are never
//! cached, so a stale handle can only fail the one call that obtained it.

use crate::error::{HandleFsError, Result};
use crate::handle::{DirHandle, FileRef, Handle};

/// A path split into non-empty segments, relative to the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelPath<'a> {
    segments: Vec<&'a str>,
}

impl<'a> RelPath<'a> {
    /// Split on `/`, drop empty and `.` segments, and drop a leading
    /// segment equal to the root's own name.
    pub fn parse(root_name: &str, path: &'a str) -> Result<Self> {
        let mut segments: Vec<&str> = path
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .collect();
        if segments.iter().any(|s| *s == "..") {
            return Err(HandleFsError::InvalidPath {
                path: path.to_string(),
            });
        }
        if !root_name.is_empty() && segments.first() == Some(&root_name) {
            segments.remove(0);
        }
        Ok(Self { segments })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[&'a str] {
        &self.segments
    }

    /// Normalized string form (`a/b/c`, empty for the root).
    pub fn joined(&self) -> String {
        self.segments.join("/")
    }

    fn prefix(&self, len: usize) -> String {
        self.segments[..len].join("/")
    }

    /// Parent segments and terminal name. The root has neither.
    pub fn split_last(&self) -> Result<(RelPath<'a>, &'a str)> {
        match self.segments.split_last() {
            Some((name, parent)) => Ok((
                RelPath {
                    segments: parent.to_vec(),
                },
                *name,
            )),
            None => Err(HandleFsError::InvalidPath {
                path: String::new(),
            }),
        }
    }

    /// True if `self` equals `other` or lies underneath it.
    pub fn starts_with(&self, other: &RelPath<'_>) -> bool {
        self.segments.len() >= other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a == b)
    }
}

/// Rewrite the path carried by a host error to the full relative path.
pub(crate) fn at_path(err: HandleFsError, path: String) -> HandleFsError {
    match err {
        HandleFsError::NotFound { .. } => HandleFsError::NotFound { path },
        HandleFsError::NotAFile { .. } => HandleFsError::NotAFile { path },
        HandleFsError::NotADirectory { .. } => HandleFsError::NotADirectory { path },
        HandleFsError::DirectoryNotEmpty { .. } => HandleFsError::DirectoryNotEmpty { path },
        other => other,
    }
}

/// Walk every segment as a directory, optionally creating missing ones.
///
/// A non-terminal segment that is a file is `InvalidPath`; a terminal one
/// is `NotADirectory`.
pub async fn resolve_directory(root: &DirHandle, path: &RelPath<'_>, create: bool) -> Result<DirHandle> {
    let mut current = root.clone();
    let last = path.segments.len();
    for (i, segment) in path.segments.iter().enumerate() {
        current = match current.get_directory(segment, create).await {
            Ok(dir) => dir,
            Err(HandleFsError::NotADirectory { .. }) if i + 1 < last => {
                return Err(HandleFsError::InvalidPath {
                    path: path.joined(),
                })
            }
            Err(e) => return Err(at_path(e, path.prefix(i + 1))),
        };
    }
    Ok(current)
}

/// Resolve a path to whatever handle it names.
///
/// The terminal segment is looked up as a file first and as a directory
/// only if no file by that name exists.
pub async fn resolve(root: &DirHandle, path: &RelPath<'_>) -> Result<Handle> {
    let (parent, name) = match path.split_last() {
        Ok(split) => split,
        Err(_) => return Ok(Handle::Directory(root.clone())),
    };
    let dir = resolve_directory(root, &parent, false).await.map_err(|e| match e {
        HandleFsError::NotADirectory { .. } => HandleFsError::InvalidPath { path: path.joined() },
        other => other,
    })?;
    match dir.get_file(name, false).await {
        Ok(file) => Ok(Handle::File(file)),
        Err(HandleFsError::NotFound { .. }) | Err(HandleFsError::NotAFile { .. }) => dir
            .get_directory(name, false)
            .await
            .map(Handle::Directory)
            .map_err(|e| at_path(e, path.joined())),
        Err(e) => Err(at_path(e, path.joined())),
    }
}

/// Resolve a path that must name a file.
pub async fn resolve_file(root: &DirHandle, path: &RelPath<'_>) -> Result<FileRef> {
    match resolve(root, path).await? {
        Handle::File(file) => Ok(file),
        Handle::Directory(_) => Err(HandleFsError::NotAFile { path: path.joined() }),
    }
}
