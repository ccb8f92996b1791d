//! MutationOps: create, delete, read/write and copy over capability handles.
//!
//! Each function takes the root handle and an already-parsed [`RelPath`].
//! None of them refresh cached state; the session does that afterwards.

use tracing::debug;

use crate::error::{HandleFsError, Result};
use crate::filesystem::resolver::{at_path, resolve, resolve_directory, resolve_file, RelPath};
use crate::filesystem::{join_path, BoxFuture};
use crate::handle::{DirHandle, Handle};

/// Create (or overwrite) a file, making any missing parent directories.
pub async fn create_file(root: &DirHandle, path: &RelPath<'_>, content: &[u8]) -> Result<()> {
    let (parent, name) = path.split_last()?;
    let dir = resolve_parent(root, path, &parent, true).await?;
    let file = dir
        .get_file(name, true)
        .await
        .map_err(|e| at_path(e, path.joined()))?;
    file.write(content).await?;
    debug!(path = %path.joined(), bytes = content.len(), "file created");
    Ok(())
}

/// Create every missing directory along `path`. Existing ones are fine.
pub async fn create_directory(root: &DirHandle, path: &RelPath<'_>) -> Result<()> {
    resolve_directory(root, path, true).await?;
    debug!(path = %path.joined(), "directory created");
    Ok(())
}

/// Remove the entry at `path`, recursively for directories.
pub async fn delete_entry(root: &DirHandle, path: &RelPath<'_>) -> Result<()> {
    let (parent, name) = path.split_last()?;
    let dir = resolve_parent(root, path, &parent, false).await?;
    dir.remove_entry(name, true)
        .await
        .map_err(|e| at_path(e, path.joined()))?;
    debug!(path = %path.joined(), "entry deleted");
    Ok(())
}

/// The directory holding `path`. A file standing where a parent should be
/// makes the whole path invalid.
async fn resolve_parent(
    root: &DirHandle,
    path: &RelPath<'_>,
    parent: &RelPath<'_>,
    create: bool,
) -> Result<DirHandle> {
    resolve_directory(root, parent, create).await.map_err(|e| match e {
        HandleFsError::NotADirectory { .. } => HandleFsError::InvalidPath { path: path.joined() },
        other => other,
    })
}

pub async fn read_file(root: &DirHandle, path: &RelPath<'_>) -> Result<Vec<u8>> {
    resolve_file(root, path).await?.read().await
}

/// Replace the content of an existing file.
pub async fn write_file(root: &DirHandle, path: &RelPath<'_>, content: &[u8]) -> Result<()> {
    resolve_file(root, path).await?.write(content).await?;
    debug!(path = %path.joined(), bytes = content.len(), "file written");
    Ok(())
}

/// Copy a file or a whole directory tree from `source` to `dest`.
///
/// Not transactional: a failure partway leaves whatever was already
/// copied in place. `dest` may not be `source` or lie inside it.
pub async fn copy_entry(
    root: &DirHandle,
    source: &RelPath<'_>,
    dest: &RelPath<'_>,
    max_depth: usize,
) -> Result<()> {
    if dest.starts_with(source) {
        return Err(HandleFsError::InvalidPath { path: dest.joined() });
    }
    match resolve(root, source).await? {
        Handle::File(file) => {
            let content = file.read().await?;
            create_file(root, dest, &content).await?;
        }
        Handle::Directory(dir) => {
            let target = resolve_directory(root, dest, true).await?;
            copy_tree(&dir, &target, &dest.joined(), max_depth, 0).await?;
        }
    }
    debug!(from = %source.joined(), to = %dest.joined(), "entry copied");
    Ok(())
}

fn copy_tree<'a>(
    from: &'a DirHandle,
    to: &'a DirHandle,
    to_path: &'a str,
    max_depth: usize,
    depth: usize,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        if depth > max_depth {
            return Err(HandleFsError::DepthExceeded {
                path: to_path.to_string(),
                limit: max_depth,
            });
        }
        for entry in from.entries().await? {
            let path = join_path(to_path, entry.name());
            match entry {
                Handle::File(file) => {
                    let content = file.read().await?;
                    let copy = to
                        .get_file(file.name(), true)
                        .await
                        .map_err(|e| at_path(e, path.clone()))?;
                    copy.write(&content).await?;
                }
                Handle::Directory(sub) => {
                    let copy = to
                        .get_directory(sub.name(), true)
                        .await
                        .map_err(|e| at_path(e, path.clone()))?;
                    copy_tree(&sub, &copy, &path, max_depth, depth + 1).await?;
                }
            }
        }
        Ok(())
    })
}

/// Every file path under `path`, depth-first in name order. A path that
/// names a file yields just that path.
pub async fn collect_files(root: &DirHandle, path: &RelPath<'_>, max_depth: usize) -> Result<Vec<String>> {
    let mut out = Vec::new();
    match resolve(root, path).await? {
        Handle::File(_) => out.push(path.joined()),
        Handle::Directory(dir) => {
            let prefix = path.joined();
            collect_into(&dir, &prefix, max_depth, 0, &mut out).await?;
        }
    }
    Ok(out)
}

fn collect_into<'a>(
    dir: &'a DirHandle,
    prefix: &'a str,
    max_depth: usize,
    depth: usize,
    out: &'a mut Vec<String>,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        if depth > max_depth {
            return Err(HandleFsError::DepthExceeded {
                path: prefix.to_string(),
                limit: max_depth,
            });
        }
        let mut entries = dir.entries().await?;
        entries.sort_by(|a, b| a.name().cmp(b.name()));
        for entry in entries {
            let path = join_path(prefix, entry.name());
            match entry {
                Handle::File(_) => out.push(path),
                Handle::Directory(sub) => collect_into(&sub, &path, max_depth, depth + 1, out).await?,
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::memory::MemoryDirectory;

    fn p(path: &str) -> RelPath<'_> {
        RelPath::parse("proj", path).unwrap()
    }

    fn root() -> DirHandle {
        MemoryDirectory::new_root("proj")
    }

    #[tokio::test]
    async fn create_read_overwrite() {
        let root = root();
        create_file(&root, &p("x/y/z.txt"), b"one").await.unwrap();
        assert_eq!(read_file(&root, &p("x/y/z.txt")).await.unwrap(), b"one");
        create_file(&root, &p("x/y/z.txt"), b"two").await.unwrap();
        assert_eq!(read_file(&root, &p("x/y/z.txt")).await.unwrap(), b"two");

        write_file(&root, &p("x/y/z.txt"), b"").await.unwrap();
        assert!(read_file(&root, &p("x/y/z.txt")).await.unwrap().is_empty());

        let err = write_file(&root, &p("x/y"), b"no").await.unwrap_err();
        assert!(matches!(err, HandleFsError::NotAFile { .. }));
        let err = write_file(&root, &p("x/missing.txt"), b"no").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn file_in_parent_position_is_invalid_path() {
        let root = root();
        create_file(&root, &p("f.txt"), b"x").await.unwrap();

        let err = create_file(&root, &p("f.txt/child"), b"y").await.unwrap_err();
        assert!(matches!(err, HandleFsError::InvalidPath { ref path } if path == "f.txt/child"));
        let err = create_file(&root, &p("f.txt/a/b"), b"y").await.unwrap_err();
        assert!(matches!(err, HandleFsError::InvalidPath { .. }));
        create_file(&root, &p("g.txt"), b"g").await.unwrap();
        let err = copy_entry(&root, &p("g.txt"), &p("f.txt/copy"), 16).await.unwrap_err();
        assert!(matches!(err, HandleFsError::InvalidPath { .. }));
        // Untouched by the failed attempts.
        assert_eq!(read_file(&root, &p("f.txt")).await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn create_directory_is_idempotent() {
        let root = root();
        create_directory(&root, &p("a/b")).await.unwrap();
        create_directory(&root, &p("a/b")).await.unwrap();
        create_directory(&root, &p("")).await.unwrap();
        assert!(resolve(&root, &p("a/b")).await.unwrap().is_dir());
    }

    #[tokio::test]
    async fn delete_paths() {
        let root = root();
        create_file(&root, &p("d/e/f.txt"), b"x").await.unwrap();
        delete_entry(&root, &p("d")).await.unwrap();
        assert!(resolve(&root, &p("d")).await.unwrap_err().is_not_found());

        let err = delete_entry(&root, &p("d")).await.unwrap_err();
        assert!(matches!(err, HandleFsError::NotFound { ref path } if path == "d"));
        let err = delete_entry(&root, &p("nope/x")).await.unwrap_err();
        assert!(err.is_not_found());
        let err = delete_entry(&root, &p("")).await.unwrap_err();
        assert!(matches!(err, HandleFsError::InvalidPath { .. }));
    }

    #[tokio::test]
    async fn copy_directory_recursively() {
        let root = root();
        create_file(&root, &p("src/a.txt"), b"A").await.unwrap();
        create_file(&root, &p("src/nested/b.bin"), &[0, 159, 146, 150]).await.unwrap();
        create_directory(&root, &p("src/empty")).await.unwrap();

        copy_entry(&root, &p("src"), &p("dst/copy"), 16).await.unwrap();
        assert_eq!(read_file(&root, &p("dst/copy/a.txt")).await.unwrap(), b"A");
        assert_eq!(
            read_file(&root, &p("dst/copy/nested/b.bin")).await.unwrap(),
            vec![0, 159, 146, 150]
        );
        assert!(resolve(&root, &p("dst/copy/empty")).await.unwrap().is_dir());
        assert_eq!(read_file(&root, &p("src/a.txt")).await.unwrap(), b"A");
    }

    #[tokio::test]
    async fn copy_into_itself_rejected() {
        let root = root();
        create_file(&root, &p("src/a.txt"), b"A").await.unwrap();
        let err = copy_entry(&root, &p("src"), &p("src/inner"), 16).await.unwrap_err();
        assert!(matches!(err, HandleFsError::InvalidPath { .. }));
        let err = copy_entry(&root, &p("src"), &p("src"), 16).await.unwrap_err();
        assert!(matches!(err, HandleFsError::InvalidPath { .. }));
    }

    #[tokio::test]
    async fn collects_all_files() {
        let root = root();
        create_file(&root, &p("a/2.txt"), b"").await.unwrap();
        create_file(&root, &p("a/1.txt"), b"").await.unwrap();
        create_file(&root, &p("a/sub/3.txt"), b"").await.unwrap();
        create_file(&root, &p("top.txt"), b"").await.unwrap();

        let files = collect_files(&root, &p("a"), 16).await.unwrap();
        assert_eq!(files, vec!["a/1.txt", "a/2.txt", "a/sub/3.txt"]);
        let all = collect_files(&root, &p(""), 16).await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(collect_files(&root, &p("top.txt"), 16).await.unwrap(), vec!["top.txt"]);
    }
}
