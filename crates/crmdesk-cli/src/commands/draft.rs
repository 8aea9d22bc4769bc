//! Saved wizard draft commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use crmdesk_core::config::CrmConfig;
use crmdesk_core::wizard::WizardDraft;
use crmdesk_core::EntityKind;
use dialoguer::Confirm;

use super::{draft_store, parse_kind, wizard::schema_for};
use crate::output;

#[derive(Subcommand)]
pub enum DraftCommands {
    /// Print the saved draft for an entity
    Show(DraftArgs),

    /// Delete the saved draft for an entity
    Discard(DiscardArgs),
}

#[derive(Args)]
pub struct DraftArgs {
    /// Entity (lead, deal)
    #[arg(value_parser = parse_kind)]
    pub kind: EntityKind,
}

#[derive(Args)]
pub struct DiscardArgs {
    /// Entity (lead, deal)
    #[arg(value_parser = parse_kind)]
    pub kind: EntityKind,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

pub async fn execute(cmd: DraftCommands, config: &CrmConfig) -> Result<()> {
    match cmd {
        DraftCommands::Show(args) => {
            let store = draft_store(config).await;
            let key = config.drafts.key_for(args.kind);
            let Some(raw) = store.get(&key).await? else {
                println!("{}", format!("No saved {} draft.", args.kind).dimmed());
                return Ok(());
            };
            let draft: WizardDraft = serde_json::from_str(&raw)
                .with_context(|| format!("Draft at {key} is not readable; discard it with 'crmdesk draft discard {}'", args.kind))?;
            output::print_draft(&key, &draft, schema_for(args.kind).as_ref());
        }

        DraftCommands::Discard(args) => {
            let key = config.drafts.key_for(args.kind);
            if !args.yes {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Discard the saved {} draft?", args.kind))
                    .default(false)
                    .interact()
                    .context("Failed to read confirmation")?;
                if !confirmed {
                    return Ok(());
                }
            }
            let store = draft_store(config).await;
            store.remove(&key).await?;
            println!("{} Discarded draft {}", "✓".green().bold(), key.dimmed());
        }
    }

    Ok(())
}
