//! Host storage backed by a real directory on disk.
//!
//! Symlinks are never enumerated or followed, which keeps the entry graph
//! acyclic for the recursive walks.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;

use crate::error::{HandleFsError, Result};
use crate::handle::{
    guess_content_type, AccessMode, DirHandle, DirectoryHandle, FileHandle, FileMetadata,
    FileRef, Handle, Host, PermissionState,
};

fn map_io(err: io::Error, path: &Path) -> HandleFsError {
    match err.kind() {
        io::ErrorKind::NotFound => HandleFsError::NotFound {
            path: path.display().to_string(),
        },
        io::ErrorKind::PermissionDenied => HandleFsError::Permission {
            mode: AccessMode::ReadWrite,
            state: PermissionState::Denied,
        },
        _ => HandleFsError::HostIo(err),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(|c: char| c == '/' || c == '\\') {
        return Err(HandleFsError::InvalidPath {
            path: name.to_string(),
        });
    }
    Ok(())
}

/// A directory on the local filesystem.
pub struct LocalDirectory {
    path: PathBuf,
    name: String,
}

impl LocalDirectory {
    /// Open an existing directory as a root handle.
    pub async fn open(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        let path = tokio::fs::canonicalize(path.as_ref())
            .await
            .map_err(|e| map_io(e, path.as_ref()))?;
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| map_io(e, &path))?;
        if !meta.is_dir() {
            return Err(HandleFsError::NotADirectory {
                path: path.display().to_string(),
            });
        }
        Ok(Arc::new(Self {
            name: file_name(&path),
            path,
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn permission(&self, mode: AccessMode) -> Result<PermissionState> {
        let meta = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| map_io(e, &self.path))?;
        if mode == AccessMode::ReadWrite && meta.permissions().readonly() {
            return Ok(PermissionState::Denied);
        }
        Ok(PermissionState::Granted)
    }
}

#[async_trait]
impl DirectoryHandle for LocalDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn reference(&self) -> Option<String> {
        Some(self.path.display().to_string())
    }

    async fn entries(&self) -> Result<Vec<Handle>> {
        let mut rd = tokio::fs::read_dir(&self.path)
            .await
            .map_err(|e| map_io(e, &self.path))?;
        let mut out = Vec::new();
        while let Some(entry) = rd.next_entry().await.map_err(|e| map_io(e, &self.path))? {
            let file_type = entry.file_type().await.map_err(|e| map_io(e, &entry.path()))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if file_type.is_dir() {
                out.push(Handle::Directory(Arc::new(LocalDirectory {
                    path: entry.path(),
                    name,
                })));
            } else if file_type.is_file() {
                out.push(Handle::File(Arc::new(LocalFile {
                    path: entry.path(),
                    name,
                })));
            }
        }
        Ok(out)
    }

    async fn get_directory(&self, name: &str, create: bool) -> Result<DirHandle> {
        check_name(name)?;
        let path = self.path.join(name);
        match tokio::fs::symlink_metadata(&path).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(HandleFsError::NotADirectory {
                    path: name.to_string(),
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound && create => {
                tokio::fs::create_dir(&path)
                    .await
                    .map_err(|e| map_io(e, &path))?;
            }
            Err(e) => return Err(map_io(e, &path)),
        }
        Ok(Arc::new(LocalDirectory {
            path,
            name: name.to_string(),
        }))
    }

    async fn get_file(&self, name: &str, create: bool) -> Result<FileRef> {
        check_name(name)?;
        let path = self.path.join(name);
        match tokio::fs::symlink_metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(HandleFsError::NotAFile {
                    path: name.to_string(),
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound && create => {
                tokio::fs::write(&path, b"")
                    .await
                    .map_err(|e| map_io(e, &path))?;
            }
            Err(e) => return Err(map_io(e, &path)),
        }
        Ok(Arc::new(LocalFile {
            path,
            name: name.to_string(),
        }))
    }

    async fn remove_entry(&self, name: &str, recursive: bool) -> Result<()> {
        check_name(name)?;
        let path = self.path.join(name);
        let meta = tokio::fs::symlink_metadata(&path)
            .await
            .map_err(|e| map_io(e, &path))?;
        if !meta.is_dir() {
            return tokio::fs::remove_file(&path)
                .await
                .map_err(|e| map_io(e, &path));
        }
        if recursive {
            return tokio::fs::remove_dir_all(&path)
                .await
                .map_err(|e| map_io(e, &path));
        }
        let mut rd = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| map_io(e, &path))?;
        if rd.next_entry().await.map_err(|e| map_io(e, &path))?.is_some() {
            return Err(HandleFsError::DirectoryNotEmpty {
                path: name.to_string(),
            });
        }
        tokio::fs::remove_dir(&path)
            .await
            .map_err(|e| map_io(e, &path))
    }

    async fn query_permission(&self, mode: AccessMode) -> Result<PermissionState> {
        self.permission(mode).await
    }

    async fn request_permission(&self, mode: AccessMode) -> Result<PermissionState> {
        // The OS has no prompt to show; the answer is whatever the mode bits say.
        self.permission(mode).await
    }
}

/// A regular file on the local filesystem.
pub struct LocalFile {
    path: PathBuf,
    name: String,
}

#[async_trait]
impl FileHandle for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn metadata(&self) -> Result<FileMetadata> {
        let meta = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| map_io(e, &self.path))?;
        if !meta.is_file() {
            return Err(HandleFsError::NotAFile {
                path: self.name.clone(),
            });
        }
        let last_modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Ok(FileMetadata {
            size: meta.len(),
            last_modified,
            content_type: guess_content_type(&self.name).to_string(),
        })
    }

    async fn read(&self) -> Result<Vec<u8>> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| map_io(e, &self.path))
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        // The handle must still point at something; writes never resurrect
        // a file that was removed underneath it.
        tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| map_io(e, &self.path))?;
        tokio::fs::write(&self.path, data)
            .await
            .map_err(|e| map_io(e, &self.path))
    }
}

/// Host whose picker always answers with one configured directory.
pub struct LocalHost {
    root: PathBuf,
}

impl LocalHost {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Host for LocalHost {
    async fn pick_directory(&self, _mode: AccessMode) -> Result<DirHandle> {
        Ok(LocalDirectory::open(&self.root).await? as DirHandle)
    }

    async fn restore_directory(&self, reference: &str) -> Result<Option<DirHandle>> {
        match LocalDirectory::open(reference).await {
            Ok(dir) => Ok(Some(dir as DirHandle)),
            Err(HandleFsError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn create_and_enumerate() {
        let tmp = TempDir::new().unwrap();
        let root = LocalDirectory::open(tmp.path()).await.unwrap();

        let sub = root.get_directory("src", true).await.unwrap();
        let file = sub.get_file("main.txt", true).await.unwrap();
        file.write(b"hello").await.unwrap();

        let entries = root.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_dir());

        let meta = file.metadata().await.unwrap();
        assert_eq!(meta.size, 5);
        assert_eq!(meta.content_type, "text/plain");
        assert!(meta.last_modified > 0);
        assert_eq!(file.read().await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn mismatches_and_missing() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("f.txt"), "x").unwrap();
        std::fs::create_dir(tmp.path().join("d")).unwrap();
        let root = LocalDirectory::open(tmp.path()).await.unwrap();

        assert!(matches!(
            root.get_directory("f.txt", false).await,
            Err(HandleFsError::NotADirectory { .. })
        ));
        assert!(matches!(
            root.get_file("d", false).await,
            Err(HandleFsError::NotAFile { .. })
        ));
        assert!(matches!(
            root.get_file("nope", false).await,
            Err(HandleFsError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn remove_requires_recursive_for_nonempty() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("d/e")).unwrap();
        let root = LocalDirectory::open(tmp.path()).await.unwrap();

        assert!(matches!(
            root.remove_entry("d", false).await,
            Err(HandleFsError::DirectoryNotEmpty { .. })
        ));
        root.remove_entry("d", true).await.unwrap();
        assert!(!tmp.path().join("d").exists());
    }

    #[tokio::test]
    async fn host_restores_by_path() {
        let tmp = TempDir::new().unwrap();
        let host = LocalHost::new(tmp.path());
        let root = host.pick_directory(AccessMode::ReadWrite).await.unwrap();
        let reference = root.reference().unwrap();
        assert!(host.restore_directory(&reference).await.unwrap().is_some());
        assert!(host
            .restore_directory(&format!("{reference}/gone"))
            .await
            .unwrap()
            .is_none());
    }
}
