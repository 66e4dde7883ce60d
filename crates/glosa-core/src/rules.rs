//! Batch cache creation from a rules manifest.
//!
//! A manifest is a JSON array of rules. Each rule names one or more source
//! directories (comma separated, relative to a sources root) and a prompt;
//! the batch creates one cache per rule with the prompt as its system
//! instruction. Rules fail independently.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::builder::CacheSpec;
use crate::error::{GlosaError, Result};
use crate::ingest::{DirectoryScan, discover_files};
use crate::prompts::DEFAULT_CACHE_DISPLAY_NAME;
use crate::registry::CacheRecord;
use crate::setup::{CacheSetup, SourceFile};

/// One manifest entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Rule identifier, also used as cache display name.
    #[serde(default)]
    pub id: String,
    /// Comma-separated source directory names.
    #[serde(default)]
    pub source: String,
    /// System instruction for the rule's cache.
    #[serde(default)]
    pub prompt: String,
}

impl Rule {
    /// Source directory names, trimmed, empties dropped.
    pub fn sources(&self) -> Vec<String> {
        self.source
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect()
    }
}

/// Reads and validates a manifest.
///
/// # Errors
///
/// * `Precondition` if the file is missing or holds no rules
/// * `Manifest` if the file is not a JSON array of rules
pub fn load_manifest(path: &Path) -> Result<Vec<Rule>> {
    if !path.is_file() {
        return Err(GlosaError::Precondition(format!(
            "Rules manifest not found: {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    let rules: Vec<Rule> = serde_json::from_str(&content)
        .map_err(|e| GlosaError::Manifest(format!("{}: {}", path.display(), e)))?;
    if rules.is_empty() {
        return Err(GlosaError::Precondition(format!(
            "Rules manifest {} contains no rules",
            path.display()
        )));
    }
    Ok(rules)
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Records of the caches created, in manifest order.
    pub created: Vec<CacheRecord>,
    /// Ids of rules without source files.
    pub skipped: Vec<String>,
    /// Ids of rules that failed, with the reason.
    pub failed: Vec<(String, String)>,
}

/// Settings shared by every rule of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    /// Directory rule sources are resolved against.
    pub sources_root: PathBuf,
    /// How each source directory is scanned.
    pub scan: DirectoryScan,
    /// Model for every cache.
    pub model: String,
    /// Lifetime for every cache.
    pub ttl_seconds: u64,
}

/// Runs a manifest through the setup pipeline.
#[derive(Debug, Clone)]
pub struct RulesBatch {
    setup: CacheSetup,
}

impl RulesBatch {
    /// Creates a batch runner over `setup`.
    pub fn new(setup: CacheSetup) -> Self {
        Self { setup }
    }

    /// Loads `manifest` and creates one cache per rule.
    pub async fn run_manifest(&self, manifest: &Path, options: &BatchOptions) -> Result<BatchReport> {
        let rules = load_manifest(manifest)?;
        info!(manifest = %manifest.display(), rules = rules.len(), "Loaded rules manifest");
        Ok(self.run(&rules, options).await)
    }

    /// Creates one cache per rule. Failures are collected, never propagated.
    pub async fn run(&self, rules: &[Rule], options: &BatchOptions) -> BatchReport {
        let mut report = BatchReport::default();

        for rule in rules {
            let sources = rule.sources();
            let files = collect_files(&options.sources_root, &sources, &options.scan);
            if files.is_empty() {
                warn!(rule = %rule.id, "No source files for rule, skipping");
                report.skipped.push(rule.id.clone());
                continue;
            }

            let spec = CacheSpec {
                display_name: if rule.id.trim().is_empty() {
                    DEFAULT_CACHE_DISPLAY_NAME.to_string()
                } else {
                    rule.id.clone()
                },
                model: options.model.clone(),
                system_instruction: rule.prompt.clone(),
                ttl_seconds: options.ttl_seconds,
            };

            let rule_id = rule.id.clone();
            let tag_sources = sources.clone();
            match self
                .setup
                .build_and_register(&files, &spec, move |record| record.with_rule(rule_id, tag_sources))
                .await
            {
                Ok(record) => {
                    info!(rule = %rule.id, cache = %record.cache_handle, "Cache created for rule");
                    report.created.push(record);
                }
                Err(e) => {
                    warn!(rule = %rule.id, error = %e, "Rule failed");
                    report.failed.push((rule.id.clone(), e.to_string()));
                }
            }
        }

        info!(
            created = report.created.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Rules batch finished"
        );
        report
    }
}

fn collect_files(root: &Path, sources: &[String], scan: &DirectoryScan) -> Vec<SourceFile> {
    let mut files = Vec::new();
    for name in sources {
        let dir = root.join(name);
        match discover_files(&dir, scan) {
            Ok(found) => files.extend(found.into_iter().map(SourceFile::from)),
            Err(e) => warn!(dir = %dir.display(), error = %e, "Skipping source directory"),
        }
    }
    files
}
