pub mod fs;
pub mod recover;
pub mod roots;
pub mod stats;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use handlefs_core::config::{IgnoreMode, SessionConfig, SessionConfigBuilder};
use handlefs_core::filesystem::{TreeEntry, TreeNode};
use handlefs_core::handle::local::LocalHost;
use handlefs_core::FileSystemSession;
use tracing::info;

/// Options shared by every subcommand.
pub struct Context {
    pub json: bool,
    pub state: Option<PathBuf>,
    pub project: Option<String>,
    pub ignore_mode: IgnoreMode,
}

impl Context {
    pub fn config(&self) -> SessionConfigBuilder {
        let mut builder = SessionConfig::builder().ignore_mode(self.ignore_mode);
        if let Some(state) = &self.state {
            builder = builder.state_path(state);
        }
        if let Some(project) = &self.project {
            builder = builder.project_id(project.clone());
        }
        builder
    }
}

pub async fn open_session(root: &Path, ctx: &Context) -> anyhow::Result<FileSystemSession> {
    open_session_with(root, ctx, ctx.config()).await
}

/// Open a session on `root`, restoring a saved grant when `--state` and
/// `--project` are both given.
pub async fn open_session_with(
    root: &Path,
    ctx: &Context,
    config: SessionConfigBuilder,
) -> anyhow::Result<FileSystemSession> {
    let session = FileSystemSession::new(Arc::new(LocalHost::new(root)), config.build());
    if ctx.state.is_some() {
        session.open_state()?;
    }
    let restored = ctx.state.is_some() && ctx.project.is_some() && session.restore_access().await?;
    if restored {
        info!("restored saved root");
    } else {
        session.request_access().await?;
    }
    Ok(session)
}

/// Descend the cached tree to the directory at `path` ("" is the root).
pub fn subtree<'a>(tree: &'a TreeNode, path: &str) -> Option<&'a TreeNode> {
    let mut node = tree;
    for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
        match node.get(segment)? {
            TreeEntry::Directory(child) => node = child,
            TreeEntry::File(_) => return None,
        }
    }
    Some(node)
}

pub fn print_tree(node: &TreeNode, prefix: &str) {
    let count = node.len();
    for (i, (name, entry)) in node.iter().enumerate() {
        let is_last = i + 1 == count;
        let connector = if is_last { "└── " } else { "├── " };
        match entry {
            TreeEntry::File(_) => println!("{prefix}{connector}{name}"),
            TreeEntry::Directory(child) => {
                println!("{prefix}{connector}{name}/");
                let child_prefix = if is_last {
                    format!("{prefix}    ")
                } else {
                    format!("{prefix}│   ")
                };
                print_tree(child, &child_prefix);
            }
        }
    }
}
