use std::path::PathBuf;

use clap::Args;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};
use handlefs_core::filesystem::query::{largest_files, recent_files, StatsFilter};
use handlefs_core::filesystem::FileStat;

use super::{open_session, Context};

#[derive(Args)]
pub struct StatsArgs {
    root: PathBuf,
    /// Only files with this extension
    #[arg(long)]
    ext: Option<String>,
    /// Minimum size in bytes
    #[arg(long)]
    min_size: Option<u64>,
    /// Maximum size in bytes
    #[arg(long)]
    max_size: Option<u64>,
    /// Newest N files
    #[arg(long, value_name = "N", conflicts_with = "largest")]
    recent: Option<usize>,
    /// Biggest N files
    #[arg(long, value_name = "N")]
    largest: Option<usize>,
}

pub async fn run(args: StatsArgs, ctx: &Context) -> anyhow::Result<()> {
    let session = open_session(&args.root, ctx).await?;
    let filter = StatsFilter {
        extension: args.ext,
        min_size: args.min_size,
        max_size: args.max_size,
        ..Default::default()
    };
    let stats = filter.apply(&session.file_stats().await);

    let rows: Vec<(String, FileStat)> = match (args.recent, args.largest) {
        (Some(n), _) => recent_files(&stats, n),
        (_, Some(n)) => largest_files(&stats, n),
        _ => stats.into_iter().collect(),
    };

    if ctx.json {
        let out: Vec<_> = rows
            .iter()
            .map(|(path, stat)| {
                serde_json::json!({
                    "path": path,
                    "size": stat.size,
                    "lastModified": stat.last_modified,
                    "type": stat.content_type,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        let total: u64 = rows.iter().map(|(_, s)| s.size).sum();
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec!["Path", "Size", "Modified (ms)", "Type"]);
        for (path, stat) in &rows {
            table.add_row(vec![
                path.clone(),
                stat.size.to_string(),
                stat.last_modified.to_string(),
                stat.content_type.clone(),
            ]);
        }
        println!("{table}");
        println!("{} files, {total} bytes", rows.len());
    }
    session.close().await;
    Ok(())
}
