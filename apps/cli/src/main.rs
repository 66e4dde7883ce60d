//! Glosa CLI - Command-line interface for context caches and isolated queries
//!
//! This CLI provides a `glosa` command for uploading reference documents into
//! a context cache, managing the local cache registry, asking questions about
//! active documents, and running the HTTP server.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{ask, cache, serve, setup_cache, setup_rules};

/// Glosa CLI - Context caches with source-isolated document queries
#[derive(Parser, Debug)]
#[command(
    name = "glosa",
    author,
    version,
    about = "Glosa - Context caches with source-isolated document queries",
    long_about = "Glosa uploads reference documents into a server-side context cache and answers\nquestions about freshly supplied active documents without mixing the two."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Data directory (overrides GLOSA_DATA_DIR and config files)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a context cache from the files in a directory
    ///
    /// Uploads every file, waits for each to become active, creates one cache
    /// and records it in the local registry.
    SetupCache {
        /// Directory with the files to cache (default: <data-dir>/cache_sources)
        sources_dir: Option<PathBuf>,

        /// Cache display name (default: Context_Cache)
        display_name: Option<String>,

        /// Model the cache is bound to
        model: Option<String>,

        /// Cache lifetime in seconds
        ttl: Option<u64>,

        /// System instruction stored with the cache
        system_instruction: Option<String>,

        /// Include files in subdirectories
        #[arg(long)]
        recursive: bool,

        /// Only upload files with this extension (e.g. pdf)
        #[arg(long)]
        extension: Option<String>,
    },

    /// Create one cache per rule of a rules manifest
    SetupRules {
        /// Model every cache is bound to
        model: Option<String>,

        /// Cache lifetime in seconds
        ttl: Option<u64>,

        /// Rules manifest (default: prompts/master-rules.json)
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Directory rule sources are resolved against (default: <data-dir>/cache_sources)
        #[arg(long)]
        sources_root: Option<PathBuf>,

        /// Only upload files with this extension (e.g. pdf)
        #[arg(long)]
        extension: Option<String>,
    },

    /// Manage the local cache registry
    #[command(subcommand)]
    Cache(cache::CacheCommand),

    /// Ask a question against a cache
    ///
    /// Files and URLs are attached as active documents; the answer draws its
    /// facts from them only.
    Ask {
        /// The question
        question: String,

        /// Cache handle (default: most recently created cache)
        #[arg(long)]
        cache: Option<String>,

        /// Model (must match the cache's model)
        #[arg(long)]
        model: Option<String>,

        /// Local file to attach (repeatable)
        #[arg(long = "file", value_name = "PATH")]
        files: Vec<PathBuf>,

        /// Remote document to attach (repeatable)
        #[arg(long = "url", value_name = "URL")]
        urls: Vec<String>,

        /// Context text placed before the documents
        #[arg(long)]
        context: Option<String>,
    },

    /// Run the HTTP server
    Serve {
        /// Address to bind (default: 127.0.0.1:3000)
        #[arg(long)]
        address: Option<std::net::SocketAddr>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber =
        FmtSubscriber::builder().with_max_level(level).without_time().with_target(false).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = config::load_config(args.data_dir)?;

    match args.command {
        Command::SetupCache {
            sources_dir,
            display_name,
            model,
            ttl,
            system_instruction,
            recursive,
            extension,
        } => {
            setup_cache::execute(
                config,
                setup_cache::SetupCacheArgs {
                    sources_dir,
                    display_name,
                    model,
                    ttl,
                    system_instruction,
                    recursive,
                    extension,
                },
            )
            .await
        }
        Command::SetupRules { model, ttl, manifest, sources_root, extension } => {
            setup_rules::execute(
                config,
                setup_rules::SetupRulesArgs { model, ttl, manifest, sources_root, extension },
            )
            .await
        }
        Command::Cache(command) => cache::execute(config, command).await,
        Command::Ask { question, cache, model, files, urls, context } => {
            ask::execute(config, ask::AskArgs { question, cache, model, files, urls, context })
                .await
        }
        Command::Serve { address } => serve::execute(config, address).await,
    }
}
