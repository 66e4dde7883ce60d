//! Setup-rules command implementation.

use std::path::PathBuf;

use colored::Colorize;
use glosa_core::{BatchOptions, DirectoryScan, Glosa, rules::load_manifest};

/// Arguments of `glosa setup-rules`.
#[derive(Debug)]
pub struct SetupRulesArgs {
    pub model: Option<String>,
    pub ttl: Option<u64>,
    pub manifest: Option<PathBuf>,
    pub sources_root: Option<PathBuf>,
    pub extension: Option<String>,
}

/// Execute the setup-rules command.
///
/// One cache is created per rule. A failing rule is reported and the batch
/// continues with the next one.
pub async fn execute(config: glosa_core::Config, args: SetupRulesArgs) -> anyhow::Result<()> {
    let manifest = args.manifest.unwrap_or_else(|| config.storage.rules_manifest.clone());
    let rules = load_manifest(&manifest)?;

    let mut scan = DirectoryScan::recursive();
    scan.extension = args.extension;
    let options = BatchOptions {
        sources_root: args.sources_root.unwrap_or_else(|| config.storage.sources_path()),
        scan,
        model: args
            .model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| config.defaults.model.clone()),
        ttl_seconds: args.ttl.unwrap_or(config.defaults.ttl_seconds),
    };

    println!(
        "{} {} rule(s) from {}",
        "Processing".bold().cyan(),
        rules.len(),
        manifest.display().to_string().dimmed()
    );

    let glosa = Glosa::from_config(config)?;
    let report = glosa.rules_batch().run(&rules, &options).await;

    println!();
    for record in &report.created {
        println!(
            "  {} {} {}",
            "✓".green(),
            record.rule_id.as_deref().unwrap_or("-").bold(),
            record.cache_handle.dimmed()
        );
    }
    for id in &report.skipped {
        println!("  {} {} {}", "-".yellow(), id.bold(), "no source files".yellow());
    }
    for (id, reason) in &report.failed {
        println!("  {} {} {}", "✗".red(), id.bold(), reason.red());
    }

    println!();
    println!(
        "Created {}, skipped {}, failed {}",
        report.created.len().to_string().green(),
        report.skipped.len().to_string().yellow(),
        report.failed.len().to_string().red()
    );

    Ok(())
}
