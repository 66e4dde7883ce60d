//! Component wiring shared by the CLI and the HTTP server.

use std::sync::Arc;

use glosa_abstraction::GenerativeBackend;
use glosa_models::GeminiBackend;

use crate::answer::AnswerArchive;
use crate::builder::{CacheBuilder, CacheSpec};
use crate::config::Config;
use crate::error::{GlosaError, Result};
use crate::ingest::FileIngestor;
use crate::prompts::{DEFAULT_CACHE_DISPLAY_NAME, DEFAULT_SYSTEM_INSTRUCTION};
use crate::registry::{CacheRegistry, JsonFileRegistry};
use crate::router::QueryRouter;
use crate::rules::RulesBatch;
use crate::setup::CacheSetup;

/// Configuration plus the backend and registry every component shares.
#[derive(Clone)]
pub struct Glosa {
    config: Config,
    backend: Arc<dyn GenerativeBackend>,
    registry: Arc<dyn CacheRegistry>,
}

impl std::fmt::Debug for Glosa {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Glosa")
            .field("config", &self.config)
            .field("backend", &self.backend.provider())
            .finish_non_exhaustive()
    }
}

impl Glosa {
    /// Wires explicit components.
    pub fn new(
        config: Config,
        backend: Arc<dyn GenerativeBackend>,
        registry: Arc<dyn CacheRegistry>,
    ) -> Self {
        Self { config, backend, registry }
    }

    /// Wires the Gemini backend and the file registry described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `Config` if no API key is configured.
    pub fn from_config(config: Config) -> Result<Self> {
        let api_key = config
            .backend
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| GlosaError::Config("GEMINI_API_KEY is not set".to_string()))?;
        let backend = match &config.backend.base_url {
            Some(base_url) => GeminiBackend::with_base_url(api_key, base_url.clone()),
            None => GeminiBackend::with_api_key(api_key),
        };
        let registry = JsonFileRegistry::new(config.storage.registry_path());
        Ok(Self::new(config, Arc::new(backend), Arc::new(registry)))
    }

    /// Active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared backend.
    pub fn backend(&self) -> Arc<dyn GenerativeBackend> {
        Arc::clone(&self.backend)
    }

    /// Shared registry.
    pub fn registry(&self) -> Arc<dyn CacheRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn ingestor(&self) -> FileIngestor {
        FileIngestor::new(self.backend(), self.config.poll_policy())
    }

    pub fn builder(&self) -> CacheBuilder {
        CacheBuilder::new(self.backend())
    }

    pub fn setup(&self) -> CacheSetup {
        CacheSetup::new(self.ingestor(), self.builder(), self.registry())
    }

    pub fn rules_batch(&self) -> RulesBatch {
        RulesBatch::new(self.setup())
    }

    /// Query router, archiving answers when `storage.persist_answers` is set
    /// and falling back to `defaults.cache_name` when a question names no cache.
    pub fn router(&self) -> QueryRouter {
        let mut router = QueryRouter::new(self.backend(), self.registry(), self.ingestor());
        if let Some(cache_name) = &self.config.defaults.cache_name {
            router = router.with_default_cache(cache_name.clone());
        }
        if self.config.storage.persist_answers {
            router = router.with_archive(AnswerArchive::new(self.config.storage.answer_path()));
        }
        router
    }

    /// Cache parameters with configured defaults filled in.
    pub fn cache_spec(
        &self,
        display_name: Option<String>,
        model: Option<String>,
        ttl_seconds: Option<u64>,
        system_instruction: Option<String>,
    ) -> CacheSpec {
        let defaults = &self.config.defaults;
        CacheSpec {
            display_name: display_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CACHE_DISPLAY_NAME.to_string()),
            model: model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| defaults.model.clone()),
            system_instruction: system_instruction
                .filter(|s| !s.trim().is_empty())
                .or_else(|| defaults.system_instruction.clone())
                .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.to_string()),
            ttl_seconds: ttl_seconds.unwrap_or(defaults.ttl_seconds),
        }
    }
}
