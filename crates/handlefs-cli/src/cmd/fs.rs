use std::io::{Read, Write};
use std::path::PathBuf;

use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};
use handlefs_core::filesystem::TreeEntry;

use super::{open_session, print_tree, subtree, Context};

#[derive(Subcommand)]
pub enum FsCommands {
    /// Print the directory tree under the root
    Tree {
        root: PathBuf,
    },
    /// List one directory level
    Ls {
        root: PathBuf,
        /// Directory relative to the root
        #[arg(default_value = "")]
        path: String,
    },
    /// Print a file's contents
    Cat {
        root: PathBuf,
        path: String,
    },
    /// Replace a file's contents ("-" reads stdin)
    Write {
        root: PathBuf,
        path: String,
        content: String,
    },
    /// Create a file, and any missing parent directories
    Touch {
        root: PathBuf,
        path: String,
        /// Initial content
        #[arg(default_value = "")]
        content: String,
    },
    /// Create a directory, and any missing parents
    Mkdir {
        root: PathBuf,
        path: String,
    },
    /// Delete a file or a whole directory
    Rm {
        root: PathBuf,
        path: String,
    },
    /// Move a file or directory
    Mv {
        root: PathBuf,
        from: String,
        to: String,
    },
    /// Rename a file or directory
    Rename {
        root: PathBuf,
        from: String,
        to: String,
    },
    /// Copy a file or directory
    Cp {
        root: PathBuf,
        from: String,
        to: String,
    },
    /// Show size, modification time and content type of a file
    Stat {
        root: PathBuf,
        path: String,
    },
    /// Every file under a directory, ignore rules not applied
    Files {
        root: PathBuf,
        #[arg(default_value = "")]
        path: String,
    },
    /// Entries whose name contains the query, case-insensitive
    Search {
        root: PathBuf,
        query: String,
    },
}

pub async fn run(cmd: FsCommands, ctx: &Context) -> anyhow::Result<()> {
    let json = ctx.json;
    match cmd {
        FsCommands::Tree { root } => {
            let session = open_session(&root, ctx).await?;
            let tree = session.file_tree().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&tree)?);
            } else {
                let name = session.root_name().await.unwrap_or_default();
                println!("{name}/");
                print_tree(&tree, "");
            }
            session.close().await;
        }
        FsCommands::Ls { root, path } => {
            let session = open_session(&root, ctx).await?;
            let tree = session.file_tree().await;
            let stats = session.file_stats().await;
            let node = subtree(&tree, &path).ok_or_else(|| anyhow::anyhow!("not a directory: {path}"))?;

            if json {
                println!("{}", serde_json::to_string_pretty(node)?);
            } else {
                let mut table = Table::new();
                table.load_preset(UTF8_FULL_CONDENSED);
                table.set_header(vec!["Name", "Type", "Size"]);
                for (name, entry) in node.iter() {
                    match entry {
                        TreeEntry::File(full) => {
                            let size = stats.get(full).map(|s| s.size.to_string()).unwrap_or_default();
                            table.add_row(vec![name.as_str(), "file", size.as_str()]);
                        }
                        TreeEntry::Directory(_) => {
                            table.add_row(vec![name.as_str(), "dir", ""]);
                        }
                    }
                }
                println!("{table}");
            }
            session.close().await;
        }
        FsCommands::Cat { root, path } => {
            let session = open_session(&root, ctx).await?;
            let data = session.read_file_bytes(&path).await?;
            if json {
                let content = String::from_utf8_lossy(&data);
                println!("{}", serde_json::json!({ "path": path, "content": content }));
            } else {
                std::io::stdout().write_all(&data)?;
            }
            session.close().await;
        }
        FsCommands::Write { root, path, content } => {
            let data = if content == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                content
            };
            let session = open_session(&root, ctx).await?;
            session.write_file_content(&path, &data).await?;
            if json {
                println!("{}", serde_json::json!({ "written": data.len(), "path": path }));
            } else {
                println!("Wrote {} bytes to {path}", data.len());
            }
            session.close().await;
        }
        FsCommands::Touch { root, path, content } => {
            let session = open_session(&root, ctx).await?;
            session.create_file(&path, &content).await?;
            if json {
                println!("{}", serde_json::json!({ "created": path }));
            } else {
                println!("Created {path}");
            }
            session.close().await;
        }
        FsCommands::Mkdir { root, path } => {
            let session = open_session(&root, ctx).await?;
            session.create_directory(&path).await?;
            if json {
                println!("{}", serde_json::json!({ "created_dir": path }));
            } else {
                println!("Created directory {path}");
            }
            session.close().await;
        }
        FsCommands::Rm { root, path } => {
            let session = open_session(&root, ctx).await?;
            session.delete_entry(&path).await?;
            if json {
                println!("{}", serde_json::json!({ "deleted": path }));
            } else {
                println!("Deleted {path}");
            }
            session.close().await;
        }
        FsCommands::Mv { root, from, to } => {
            let session = open_session(&root, ctx).await?;
            session.move_entry(&from, &to).await?;
            if json {
                println!("{}", serde_json::json!({ "moved": { "from": from, "to": to } }));
            } else {
                println!("Moved {from} → {to}");
            }
            session.close().await;
        }
        FsCommands::Rename { root, from, to } => {
            let session = open_session(&root, ctx).await?;
            session.rename_entry(&from, &to).await?;
            if json {
                println!("{}", serde_json::json!({ "renamed": { "from": from, "to": to } }));
            } else {
                println!("Renamed {from} → {to}");
            }
            session.close().await;
        }
        FsCommands::Cp { root, from, to } => {
            let session = open_session(&root, ctx).await?;
            session.copy_entry(&from, &to).await?;
            if json {
                println!("{}", serde_json::json!({ "copied": { "from": from, "to": to } }));
            } else {
                println!("Copied {from} → {to}");
            }
            session.close().await;
        }
        FsCommands::Stat { root, path } => {
            let session = open_session(&root, ctx).await?;
            let stat = session.get_file_stats(&path).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stat)?);
            } else {
                println!("Path:     {path}");
                println!("Size:     {} bytes", stat.size);
                println!("Modified: {} ms", stat.last_modified);
                println!("Type:     {}", stat.content_type);
            }
            session.close().await;
        }
        FsCommands::Files { root, path } => {
            let session = open_session(&root, ctx).await?;
            let files = session.get_all_files_in_directory(&path).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else {
                for file in &files {
                    println!("{file}");
                }
            }
            session.close().await;
        }
        FsCommands::Search { root, query } => {
            let session = open_session(&root, ctx).await?;
            let hits = session.search_files(&query).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else if hits.is_empty() {
                println!("No matches for {query:?}");
            } else {
                for hit in &hits {
                    println!("{hit}");
                }
            }
            session.close().await;
        }
    }
    Ok(())
}
