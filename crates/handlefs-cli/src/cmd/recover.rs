use std::path::PathBuf;

use clap::Args;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};

use super::{open_session, Context};

#[derive(Args)]
pub struct RecoverArgs {
    root: PathBuf,
}

pub async fn run(args: RecoverArgs, ctx: &Context) -> anyhow::Result<()> {
    if ctx.state.is_none() {
        anyhow::bail!("recover needs --state <db>");
    }
    let session = open_session(&args.root, ctx).await?;
    let report = session.recover_pending_moves().await?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.is_empty() {
        println!("No interrupted moves");
    } else {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec!["Source", "Destination", "Phase", "Outcome"]);
        let outcomes = [
            ("finished", &report.finished),
            ("rolled back", &report.rolled_back),
            ("failed", &report.failed),
        ];
        for (outcome, records) in outcomes {
            for record in records.iter() {
                table.add_row(vec![
                    record.source.clone(),
                    record.dest.clone(),
                    record.phase.to_string(),
                    outcome.to_string(),
                ]);
            }
        }
        println!("{table}");
    }
    session.close().await;
    Ok(())
}
