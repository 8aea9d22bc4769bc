//! Stage board and move commands.

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use crmdesk_core::client::RestRecordStore;
use crmdesk_core::collection::RecordCollection;
use crmdesk_core::config::CrmConfig;
use crmdesk_core::{CrmError, EntityKind, RecordStore};

use super::parse_kind;
use crate::output;

#[derive(Args)]
pub struct BoardArgs {
    /// Entity (lead, deal, account, contact)
    #[arg(value_parser = parse_kind)]
    pub kind: EntityKind,
}

#[derive(Args)]
pub struct MoveArgs {
    /// Entity (lead, deal, account, contact)
    #[arg(value_parser = parse_kind)]
    pub kind: EntityKind,

    /// Record ID
    pub record_id: String,

    /// Target stage ID
    pub stage: String,
}

/// Fetch a collection through the REST API behind a spinner.
pub async fn load_collection(kind: EntityKind, config: &CrmConfig) -> Result<(Arc<dyn RecordStore>, RecordCollection)> {
    let store: Arc<dyn RecordStore> = Arc::new(RestRecordStore::from_config(&config.api));
    let mut collection =
        RecordCollection::new(kind, Arc::clone(&store)).with_threshold(config.search.threshold);

    let spinner = output::spinner(format!("Loading {}...", kind.resource()));
    let result = collection.refresh().await;
    spinner.finish_and_clear();
    result?;

    Ok((store, collection))
}

pub async fn board(args: BoardArgs, config: &CrmConfig) -> Result<()> {
    let (_, collection) = load_collection(args.kind, config).await?;
    let board = collection.board();
    output::print_board(args.kind, &board.columns());
    Ok(())
}

pub async fn move_record(args: MoveArgs, config: &CrmConfig) -> Result<()> {
    let (store, collection) = load_collection(args.kind, config).await?;
    let mut board = collection.board();

    if !board.stages().iter().any(|s| s.id == args.stage) {
        let known: Vec<&str> = board.stages().iter().map(|s| s.id.as_str()).collect();
        bail!("Unknown stage '{}' (expected one of: {})", args.stage, known.join(", "));
    }

    match board.drop_on_column(store.as_ref(), &args.record_id, &args.stage).await {
        Ok(Some(txn)) => {
            println!(
                "{} Moved {} from {} to {}",
                "✓".green().bold(),
                txn.record_id.dimmed(),
                txn.from_stage.yellow(),
                txn.to_stage.cyan()
            );
        }
        Ok(None) => {
            println!(
                "{} {} is already in {}",
                "·".dimmed(),
                args.record_id.dimmed(),
                args.stage.cyan()
            );
        }
        Err(CrmError::Reconciliation(err)) => {
            println!(
                "{} Move to {} rejected; {} restored to {}",
                "✗".red().bold(),
                err.attempted_stage.cyan(),
                err.record_id.dimmed(),
                err.restored_stage.yellow()
            );
            return Err(err.into());
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
