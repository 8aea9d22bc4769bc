//! HTTP service command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use crmdesk_core::config::CrmConfig;
use crmdesk_core::store::MemoryRecordStore;
use crmdesk_core::RecordStore;
use crmdesk_redis::RedisRecordStore;
use crmdesk_web::AppState;

#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on (defaults to server.port)
    #[arg(long)]
    pub port: Option<u16>,

    /// Host to bind to (defaults to server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Keep records in memory instead of Redis
    #[arg(long)]
    pub memory: bool,

    /// Also write logs to a file
    #[arg(long)]
    pub log: bool,

    /// Log file path (default: logs/serve.log)
    #[arg(long, requires = "log")]
    pub log_file: Option<PathBuf>,
}

pub async fn execute(args: ServeArgs, config: &CrmConfig) -> Result<()> {
    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);

    let (store, backend): (Arc<dyn RecordStore>, String) = if args.memory {
        (Arc::new(MemoryRecordStore::new()), "memory".to_string())
    } else {
        let pool = crmdesk_redis::init_pool(&config.redis.url)
            .await
            .with_context(|| format!("Failed to connect to Redis at {}", config.redis.url))?;
        (Arc::new(RedisRecordStore::new(pool)), config.redis.url.clone())
    };

    println!();
    println!("  {} {}", "CRMDesk".cyan().bold(), "Service".bold());
    println!();
    println!("  {}       http://{}:{}/api", "API".green(), host, port);
    println!("  {}  ws://{}:{}/ws", "WebSocket".green(), host, port);
    println!("  {}    {}", "Storage".green(), backend);
    println!();
    println!("  {}", "Ctrl+C to stop".dimmed());
    println!();

    let state = AppState::new(store).with_search_threshold(config.search.threshold);
    crmdesk_web::run_server(state, &host, port).await?;

    Ok(())
}
