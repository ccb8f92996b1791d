use std::path::PathBuf;

use clap::Args;
use handlefs_core::config::ChangeDetection;

use super::{open_session_with, Context};

#[derive(Args)]
pub struct WatchArgs {
    root: PathBuf,
    /// Poll interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,
    /// Also report in-place edits (size or mtime changes)
    #[arg(long)]
    content: bool,
}

pub async fn run(args: WatchArgs, ctx: &Context) -> anyhow::Result<()> {
    let detection = if args.content {
        ChangeDetection::Content
    } else {
        ChangeDetection::Structure
    };
    let config = ctx.config().poll_interval_ms(args.interval_ms).change_detection(detection);
    let session = open_session_with(&args.root, ctx, config).await?;
    session.poll_now().await?;

    let json = ctx.json;
    let handle = session.watch_file_changes(move |root: &str| {
        if json {
            println!("{}", serde_json::json!({ "changed": root }));
        } else {
            println!("Changed: {root}");
        }
    });

    if !json {
        let name = session.root_name().await.unwrap_or_default();
        eprintln!("Watching {name} every {}ms, Ctrl-C to stop", args.interval_ms);
    }
    tokio::signal::ctrl_c().await?;

    handle.cancel();
    session.close().await;
    Ok(())
}
