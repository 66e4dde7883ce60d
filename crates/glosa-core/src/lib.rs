//! Glosa Core - context-cache lifecycle and source-isolated document queries.
//!
//! This crate provides the core functionality for Glosa, including:
//! - File ingestion with bounded readiness polling
//! - Context cache creation and the local cache registry
//! - Query routing that keeps active documents apart from cached context
//! - Batch cache creation from a rules manifest
//! - Configuration management and error handling
//! - HTTP server for client communication
//!
//! # Example
//!
//! ```rust,no_run
//! use glosa_core::{Glosa, QueryRequest, ActiveDocument, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> glosa_core::error::Result<()> {
//!     let glosa = Glosa::from_config(Config::load()?)?;
//!     let answer = glosa
//!         .router()
//!         .answer(
//!             QueryRequest::new("List the line items")
//!                 .with_document(ActiveDocument::local("invoice.pdf")),
//!         )
//!         .await?;
//!     println!("{answer}");
//!     Ok(())
//! }
//! ```

pub mod answer;
pub mod app;
pub mod builder;
pub mod config;
pub mod error;
pub mod ingest;
pub mod prompts;
pub mod registry;
pub mod router;
pub mod rules;
pub mod sanitize;
pub mod server;
pub mod setup;

pub use answer::AnswerArchive;
pub use app::Glosa;
pub use builder::{CacheBuilder, CacheSpec};
pub use config::Config;
pub use error::{GlosaError, Result};
pub use ingest::{DirectoryScan, FileIngestor, PollPolicy, UploadedFile, discover_files};
pub use registry::{CacheRecord, CacheRegistry, InMemoryRegistry, JsonFileRegistry};
pub use router::{ActiveDocument, QueryRequest, QueryRouter};
pub use rules::{BatchOptions, BatchReport, Rule, RulesBatch};
pub use sanitize::sanitize_text;
pub use setup::{CacheSetup, SourceFile};
