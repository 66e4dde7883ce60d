//! Setup-cache command implementation.

use std::path::PathBuf;

use colored::Colorize;
use glosa_core::{DirectoryScan, Glosa, SourceFile, discover_files};

/// Arguments of `glosa setup-cache`.
#[derive(Debug)]
pub struct SetupCacheArgs {
    pub sources_dir: Option<PathBuf>,
    pub display_name: Option<String>,
    pub model: Option<String>,
    pub ttl: Option<u64>,
    pub system_instruction: Option<String>,
    pub recursive: bool,
    pub extension: Option<String>,
}

/// Execute the setup-cache command.
///
/// The source directory is checked before any backend is configured, so a
/// missing directory fails without touching the network.
pub async fn execute(config: glosa_core::Config, args: SetupCacheArgs) -> anyhow::Result<()> {
    let sources_dir = args.sources_dir.unwrap_or_else(|| config.storage.sources_path());
    let scan = DirectoryScan {
        recursive: args.recursive,
        max_depth: None,
        extension: args.extension,
    };

    let files = discover_files(&sources_dir, &scan)?;
    if files.is_empty() {
        anyhow::bail!("No files found in {}", sources_dir.display());
    }

    println!(
        "{} {} file(s) from {}",
        "Uploading".bold().cyan(),
        files.len(),
        sources_dir.display().to_string().dimmed()
    );

    let glosa = Glosa::from_config(config)?;
    let spec = glosa.cache_spec(args.display_name, args.model, args.ttl, args.system_instruction);
    let sources: Vec<SourceFile> = files.into_iter().map(SourceFile::from).collect();
    let record = glosa.setup().from_files(&sources, &spec).await?;

    println!();
    println!("{}", "Cache created".bold().green());
    println!("  Name:  {}", record.cache_handle.green());
    println!("  Model: {}", record.model);
    println!("  TTL:   {}s", record.ttl_seconds);
    println!("  Saved: {}", glosa.config().storage.registry_path().display().to_string().dimmed());

    Ok(())
}
