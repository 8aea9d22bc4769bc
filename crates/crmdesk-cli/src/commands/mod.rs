//! CLI command definitions and handlers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use crmdesk_core::config::{CrmConfig, CONFIG_FILE};
use crmdesk_core::store::MemoryDraftStore;
use crmdesk_core::{DraftStore, EntityKind};
use crmdesk_redis::RedisDraftStore;
use tracing::warn;

pub mod draft;
pub mod pipeline;
pub mod search;
pub mod serve;
pub mod wizard;

/// CRMDesk - pipeline board, search and record wizards
#[derive(Parser)]
#[command(name = "crmdesk")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true, default_value = CONFIG_FILE, env = "CRMDESK_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP service
    Serve(serve::ServeArgs),

    /// Display the stage board for an entity
    Board(pipeline::BoardArgs),

    /// Fuzzy search a collection with optional exact filters
    Search(search::SearchArgs),

    /// Move a record to another stage
    Move(pipeline::MoveArgs),

    /// Lead wizard
    #[command(subcommand)]
    Lead(wizard::WizardCommands),

    /// Deal wizard
    #[command(subcommand)]
    Deal(wizard::WizardCommands),

    /// Inspect or discard saved wizard drafts
    #[command(subcommand)]
    Draft(draft::DraftCommands),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = CrmConfig::resolve(&self.config)
            .with_context(|| format!("Failed to load {}", self.config.display()))?;

        match self.command {
            Commands::Serve(args) => serve::execute(args, &config).await,
            Commands::Board(args) => pipeline::board(args, &config).await,
            Commands::Search(args) => search::execute(args, &config).await,
            Commands::Move(args) => pipeline::move_record(args, &config).await,
            Commands::Lead(cmd) => wizard::execute(cmd, EntityKind::Lead, &config).await,
            Commands::Deal(cmd) => wizard::execute(cmd, EntityKind::Deal, &config).await,
            Commands::Draft(cmd) => draft::execute(cmd, &config).await,
        }
    }
}

/// Parse an entity kind argument (`lead`, `deals`, ...).
pub fn parse_kind(s: &str) -> Result<EntityKind, String> {
    EntityKind::from_str(s).ok_or_else(|| format!("unknown entity '{s}' (expected lead, deal, account or contact)"))
}

/// Redis-backed draft store, or an in-memory one when Redis is unreachable.
pub async fn draft_store(config: &CrmConfig) -> Arc<dyn DraftStore> {
    match crmdesk_redis::init_pool(&config.redis.url).await {
        Ok(pool) => Arc::new(RedisDraftStore::new(pool)),
        Err(e) => {
            warn!(url = %config.redis.url, error = %e, "Redis unavailable, drafts will not persist");
            println!(
                "{} Redis unavailable; drafts are kept for this session only",
                "!".yellow().bold()
            );
            Arc::new(MemoryDraftStore::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind("deals"), Ok(EntityKind::Deal));
        assert_eq!(parse_kind("Lead"), Ok(EntityKind::Lead));
        assert!(parse_kind("ticket").is_err());
    }

    #[test]
    fn test_cli_parses_filters() {
        let cli = Cli::try_parse_from([
            "crmdesk", "search", "lead", "acme", "--filter", "status=new", "--filter", "industry=Tech",
        ])
        .unwrap();
        let Commands::Search(args) = cli.command else {
            panic!("expected search");
        };
        assert_eq!(args.kind, EntityKind::Lead);
        assert_eq!(args.filters.len(), 2);
    }

    #[test]
    fn test_config_defaults_to_local_file() {
        let cli = Cli::try_parse_from(["crmdesk", "board", "deal"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(CONFIG_FILE));
    }
}
