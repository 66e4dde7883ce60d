//! Cache registry command implementation.
//!
//! These commands only touch the local registry file and work without an
//! API key.

use clap::Subcommand;
use colored::Colorize;
use glosa_core::{CacheRegistry, Config, JsonFileRegistry};

/// Cache registry subcommands.
#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// List the recorded caches, oldest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Forget every recorded cache (remote caches expire on their own)
    Clear,
}

/// Execute a cache subcommand.
pub async fn execute(config: Config, command: CacheCommand) -> anyhow::Result<()> {
    let registry = JsonFileRegistry::new(config.storage.registry_path());

    match command {
        CacheCommand::List { json } => list(&registry, json).await,
        CacheCommand::Clear => {
            registry.clear().await?;
            println!("{}", "Cache info cleared".green());
            Ok(())
        }
    }
}

async fn list(registry: &JsonFileRegistry, json_output: bool) -> anyhow::Result<()> {
    let records = registry.list().await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("{}", "No caches configured".yellow());
        println!("  {}", "Create one with: glosa setup-cache <DIR>".dimmed());
        return Ok(());
    }

    println!("{}", "Caches".bold().cyan());
    println!();
    let last = records.len() - 1;
    for (index, record) in records.iter().enumerate() {
        let marker = if index == last { "*".green().to_string() } else { " ".to_string() };
        println!("{} {}", marker, record.cache_handle.bold());
        println!("    Model:   {}", record.model);
        println!("    Created: {}", record.created_at.to_rfc3339());
        println!("    TTL:     {}s", record.ttl_seconds);
        if let Some(name) = &record.display_name {
            println!("    Name:    {}", name);
        }
        if let Some(rule) = &record.rule_id {
            println!("    Rule:    {}", rule.cyan());
        }
    }
    println!();
    println!("{}", "* used when no cache is named".dimmed());

    Ok(())
}
