//! Composed fuzzy search command.

use anyhow::Result;
use clap::Args;
use crmdesk_core::config::CrmConfig;
use crmdesk_core::search::ExactFilters;
use crmdesk_core::EntityKind;

use super::{parse_kind, pipeline::load_collection};
use crate::output;

#[derive(Args)]
pub struct SearchArgs {
    /// Entity (lead, deal, account, contact)
    #[arg(value_parser = parse_kind)]
    pub kind: EntityKind,

    /// Free-text query; empty lists everything
    #[arg(default_value = "")]
    pub query: String,

    /// Exact filter as field=value (repeatable)
    #[arg(short, long = "filter", value_parser = parse_filter)]
    pub filters: Vec<(String, String)>,

    /// Maximum rows to print
    #[arg(long, default_value = "50")]
    pub limit: usize,
}

fn parse_filter(s: &str) -> Result<(String, String), String> {
    let (field, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got '{s}'"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in '{s}'"));
    }
    Ok((field.to_string(), value.trim().to_string()))
}

pub async fn execute(args: SearchArgs, config: &CrmConfig) -> Result<()> {
    let (_, mut collection) = load_collection(args.kind, config).await?;
    let filters: ExactFilters = args.filters.into_iter().collect();

    let outcome = collection.search(&args.query, &filters);
    output::print_search(args.kind, &outcome, args.limit);
    Ok(())
}
