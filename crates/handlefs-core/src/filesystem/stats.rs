//! StatsCollector: flat path → [`FileStat`] map over the same walk as the tree.

use crate::error::{HandleFsError, Result};
use crate::filesystem::{join_path, BoxFuture, FileStat, StatsMap, WalkOptions};
use crate::handle::{DirHandle, FileHandle, Handle};

/// Metadata for a single file, falling back to `default_content_type`
/// when the host reports none.
pub async fn file_stat(file: &dyn FileHandle, default_content_type: &str) -> Result<FileStat> {
    let meta = file.metadata().await?;
    let content_type = if meta.content_type.is_empty() {
        default_content_type.to_string()
    } else {
        meta.content_type
    };
    Ok(FileStat {
        size: meta.size,
        last_modified: meta.last_modified,
        content_type,
    })
}

/// Full rebuild of the stat map under `dir`.
pub async fn collect_stats(dir: &DirHandle, prefix: &str, opts: WalkOptions<'_>) -> Result<StatsMap> {
    let mut out = StatsMap::new();
    collect_into(dir, prefix, opts, 0, &mut out).await?;
    Ok(out)
}

fn collect_into<'a>(
    dir: &'a DirHandle,
    prefix: &'a str,
    opts: WalkOptions<'a>,
    depth: usize,
    out: &'a mut StatsMap,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        if depth > opts.max_depth {
            return Err(HandleFsError::DepthExceeded {
                path: prefix.to_string(),
                limit: opts.max_depth,
            });
        }
        for entry in dir.entries().await? {
            let path = join_path(prefix, entry.name());
            if opts.ignore.is_ignored(&path, entry.is_dir()) {
                continue;
            }
            match entry {
                Handle::File(file) => {
                    let stat = file_stat(file.as_ref(), opts.default_content_type).await?;
                    out.insert(path, stat);
                }
                Handle::Directory(sub) => collect_into(&sub, &path, opts, depth + 1, out).await?,
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IgnoreMode;
    use crate::handle::memory::MemoryDirectory;
    use crate::handle::DirectoryHandle;
    use crate::ignore::IgnoreFilter;

    #[tokio::test]
    async fn collects_every_leaf() {
        let root = MemoryDirectory::new_root("proj");
        let a = root.get_directory("a", true).await.unwrap();
        a.get_file("b.txt", true).await.unwrap().write(b"hi").await.unwrap();
        root.get_file("Makefile", true).await.unwrap().write(b"all:").await.unwrap();
        root.get_file("skip.log", true).await.unwrap();

        let dir: DirHandle = root;
        let ignore = IgnoreFilter::parse("*.log", IgnoreMode::Gitignore);
        let opts = WalkOptions {
            ignore: &ignore,
            max_depth: 8,
            default_content_type: "text/plain",
        };
        let stats = collect_stats(&dir, "", opts).await.unwrap();

        assert_eq!(stats.len(), 2);
        let b = &stats["a/b.txt"];
        assert_eq!(b.size, 2);
        assert_eq!(b.content_type, "text/plain");
        assert!(b.last_modified > 0);
        // No extension mapping: the configured default applies.
        assert_eq!(stats["Makefile"].content_type, "text/plain");
        assert!(!stats.contains_key("skip.log"));
    }

    #[tokio::test]
    async fn single_file_stat_uses_host_type() {
        let root = MemoryDirectory::new_root("proj");
        let file = root.get_file("data.json", true).await.unwrap();
        file.write(b"{}").await.unwrap();
        let stat = file_stat(file.as_ref(), "application/octet-stream").await.unwrap();
        assert_eq!(stat.content_type, "application/json");
        assert_eq!(stat.size, 2);
    }
}
