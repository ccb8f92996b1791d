use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};
use handlefs_core::store::StateStore;

use super::Context;

#[derive(Subcommand)]
pub enum RootsCommands {
    /// List saved root grants
    List,
    /// Drop the saved grant for --project
    Forget,
}

pub async fn run(cmd: RootsCommands, ctx: &Context) -> anyhow::Result<()> {
    let Some(state) = &ctx.state else {
        anyhow::bail!("roots needs --state <db>");
    };
    let registry = StateStore::open(state)?.registry();

    match cmd {
        RootsCommands::List => {
            let roots = registry.list().await?;
            if ctx.json {
                println!("{}", serde_json::to_string_pretty(&roots)?);
            } else {
                let mut table = Table::new();
                table.load_preset(UTF8_FULL_CONDENSED);
                table.set_header(vec!["Project", "Root", "Reference", "Saved"]);
                for r in &roots {
                    table.add_row(vec![&r.project_id, &r.root_name, &r.reference, &r.saved_at]);
                }
                println!("{table}");
            }
        }
        RootsCommands::Forget => {
            let Some(project) = &ctx.project else {
                anyhow::bail!("forget needs --project <id>");
            };
            let record = registry.forget(project).await?;
            if ctx.json {
                println!("{}", serde_json::json!({ "forgotten": record }));
            } else {
                println!("Forgot {} ({})", record.project_id, record.reference);
            }
        }
    }
    Ok(())
}
