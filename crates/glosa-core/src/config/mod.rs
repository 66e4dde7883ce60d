//! Configuration module for Glosa Core.
//!
//! Configuration precedence (highest first):
//! 1. CLI arguments (applied by the binary)
//! 2. Environment variables (a `.env` file in the working directory is loaded first)
//! 3. Local config file (`./.glosarc`)
//! 4. Global config file (`~/.glosa/config.toml`)
//! 5. Defaults

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GlosaError, Result};
use crate::ingest::PollPolicy;

/// Model used when neither the request nor the configuration names one.
pub const DEFAULT_MODEL: &str = "models/gemini-2.5-flash";

/// Default cache lifetime in seconds.
pub const DEFAULT_TTL_SECONDS: u64 = 3600;

/// Backend connection settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// API key (normally supplied through `GEMINI_API_KEY`).
    pub api_key: Option<String>,
    /// Root URL override for proxies and test servers.
    pub base_url: Option<String>,
}

/// Defaults applied to cache setup and queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Model new caches are bound to.
    pub model: String,
    /// Lifetime requested for new caches.
    pub ttl_seconds: u64,
    /// Cache handle queries bind to when they name none.
    pub cache_name: Option<String>,
    /// System instruction override for new caches.
    pub system_instruction: Option<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            ttl_seconds: DEFAULT_TTL_SECONDS,
            cache_name: None,
            system_instruction: None,
        }
    }
}

/// Local persistence layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for registry, answers and cache sources.
    pub data_dir: PathBuf,
    /// Registry file override (defaults to `<data_dir>/cache.json`).
    pub registry_file: Option<PathBuf>,
    /// Answer directory override (defaults to `<data_dir>/answer`).
    pub answer_dir: Option<PathBuf>,
    /// Whether generated answers are archived as markdown.
    pub persist_answers: bool,
    /// Cache sources override (defaults to `<data_dir>/cache_sources`).
    pub sources_dir: Option<PathBuf>,
    /// Rules manifest used by the batch setup.
    pub rules_manifest: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            registry_file: None,
            answer_dir: None,
            persist_answers: true,
            sources_dir: None,
            rules_manifest: PathBuf::from("prompts/master-rules.json"),
        }
    }
}

impl StorageConfig {
    /// Path of the registry JSON document.
    pub fn registry_path(&self) -> PathBuf {
        self.registry_file.clone().unwrap_or_else(|| self.data_dir.join("cache.json"))
    }

    /// Directory receiving `answer-<millis>.md` files.
    pub fn answer_path(&self) -> PathBuf {
        self.answer_dir.clone().unwrap_or_else(|| self.data_dir.join("answer"))
    }

    /// Directory holding cache source files.
    pub fn sources_path(&self) -> PathBuf {
        self.sources_dir.clone().unwrap_or_else(|| self.data_dir.join("cache_sources"))
    }
}

/// File readiness polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Delay between status checks in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum number of status checks.
    pub max_attempts: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { poll_interval_ms: 2000, max_attempts: 60 }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// The address to bind the HTTP server to.
    pub address: SocketAddr,
    /// Maximum number of files accepted by `/chat/upload`.
    pub max_upload_files: usize,
    /// Parent of the per-request upload directories (system temp dir if unset).
    pub upload_dir: Option<PathBuf>,
    /// Whether `/chat` may attach files by server-side path.
    pub allow_local_paths: bool,
}

fn default_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            max_upload_files: 10,
            upload_dir: None,
            allow_local_paths: false,
        }
    }
}

/// Root configuration for Glosa.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend connection.
    pub backend: BackendConfig,
    /// Cache and query defaults.
    pub defaults: DefaultsConfig,
    /// Local persistence.
    pub storage: StorageConfig,
    /// File readiness polling.
    pub ingest: IngestConfig,
    /// HTTP server.
    pub server: ServerConfig,
}

impl Config {
    /// Get default global configuration file path.
    pub fn default_global_path() -> PathBuf {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".glosa")
            .join("config.toml")
    }

    /// Get default local configuration file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from(".glosarc")
    }

    /// Loads `.env`, the global and local config files, then environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed, or an
    /// environment override is malformed.
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenv::dotenv() {
            debug!(path = %path.display(), "Loaded .env file");
        }
        let mut config =
            Self::load_from_paths(&[Self::default_global_path(), Self::default_local_path()])?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Loads and deep-merges the given TOML files; later files win and
    /// missing files are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load_from_paths(paths: &[PathBuf]) -> Result<Self> {
        let mut merged = toml::Table::new();
        for path in paths {
            if let Some(table) = Self::read_table(path)? {
                debug!(path = %path.display(), "Merging config file");
                merge_tables(&mut merged, table);
            }
        }
        toml::Value::Table(merged)
            .try_into()
            .map_err(|e| GlosaError::Config(format!("Invalid configuration: {}", e)))
    }

    fn read_table(path: &Path) -> Result<Option<toml::Table>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| GlosaError::Config(format!("{}: {}", path.display(), e)))?;
        content
            .parse::<toml::Table>()
            .map(Some)
            .map_err(|e| GlosaError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Applies environment overrides through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if `GLOSA_ADDRESS` is not a socket address.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(api_key) = lookup("GEMINI_API_KEY") {
            self.backend.api_key = Some(api_key);
        }
        if let Some(base_url) = lookup("GEMINI_BASE_URL") {
            self.backend.base_url = Some(base_url);
        }
        if let Some(model) = lookup("GLOSA_MODEL") {
            self.defaults.model = model;
        }
        if let Some(cache_name) = lookup("GLOSA_CACHE_NAME") {
            self.defaults.cache_name = Some(cache_name);
        }
        if let Some(data_dir) = lookup("GLOSA_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(data_dir);
        }
        if let Some(address) = lookup("GLOSA_ADDRESS") {
            self.server.address = address
                .parse()
                .map_err(|e| GlosaError::Config(format!("GLOSA_ADDRESS={}: {}", address, e)))?;
        }
        Ok(())
    }

    /// Polling policy derived from the `[ingest]` section.
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.ingest.poll_interval_ms),
            max_attempts: self.ingest.max_attempts,
        }
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
