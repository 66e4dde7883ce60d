//! Cache creation from ingested files.

use std::sync::Arc;

use glosa_abstraction::{Content, CreateCacheRequest, GenerativeBackend, normalize_model_id};
use tracing::{error, info};

use crate::config::{DEFAULT_MODEL, DEFAULT_TTL_SECONDS};
use crate::error::{GlosaError, Result};
use crate::ingest::UploadedFile;
use crate::prompts::{DEFAULT_CACHE_DISPLAY_NAME, DEFAULT_SYSTEM_INSTRUCTION};
use crate::registry::CacheRecord;
use crate::sanitize::sanitize_text;

/// Parameters of a cache to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSpec {
    /// Display name shown by the backend.
    pub display_name: String,
    /// Model the cache is bound to.
    pub model: String,
    /// Instruction stored with the cache.
    pub system_instruction: String,
    /// Requested lifetime in seconds.
    pub ttl_seconds: u64,
}

impl Default for CacheSpec {
    fn default() -> Self {
        Self {
            display_name: DEFAULT_CACHE_DISPLAY_NAME.to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            ttl_seconds: DEFAULT_TTL_SECONDS,
        }
    }
}

/// Creates context caches on the backend.
#[derive(Clone)]
pub struct CacheBuilder {
    backend: Arc<dyn GenerativeBackend>,
}

impl std::fmt::Debug for CacheBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheBuilder").field("backend", &self.backend.provider()).finish()
    }
}

impl CacheBuilder {
    /// Creates a builder over `backend`.
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }

    /// Creates one cache holding every file in `files` as a single user turn.
    ///
    /// The returned record is not persisted; appending it to a registry is
    /// the caller's decision.
    ///
    /// # Errors
    ///
    /// * `Precondition` if `files` is empty (no remote call is made)
    /// * `CacheCreation` if the backend rejects the cache or returns no handle
    pub async fn build(&self, files: &[UploadedFile], spec: &CacheSpec) -> Result<CacheRecord> {
        if files.is_empty() {
            return Err(GlosaError::Precondition(
                "At least one file is required to build a cache".to_string(),
            ));
        }

        let model = normalize_model_id(&spec.model);
        let display_name = sanitize_text(&spec.display_name);
        let system_instruction = sanitize_text(&spec.system_instruction);
        let parts = files.iter().map(UploadedFile::to_part).collect();

        info!(model = %model, files = files.len(), ttl = spec.ttl_seconds, "Creating context cache");

        let cached = self
            .backend
            .create_cache(CreateCacheRequest {
                model: model.clone(),
                display_name: Some(display_name.clone()).filter(|name| !name.trim().is_empty()),
                system_instruction: Some(system_instruction).filter(|text| !text.trim().is_empty()),
                contents: vec![Content::user(parts)],
                ttl_seconds: spec.ttl_seconds,
            })
            .await
            .map_err(|e| {
                error!(model = %model, error = %e, "Cache creation rejected");
                GlosaError::CacheCreation(e.to_string())
            })?;

        if cached.name.trim().is_empty() {
            return Err(GlosaError::CacheCreation("Backend returned no cache handle".to_string()));
        }

        info!(cache = %cached.name, tokens = ?cached.total_token_count, "Context cache created");

        let mut record = CacheRecord::new(cached.name, &model, spec.ttl_seconds);
        if !display_name.trim().is_empty() {
            record = record.with_display_name(display_name);
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glosa_abstraction::BackendError;
    use glosa_models::MockBackend;
    use std::path::PathBuf;

    fn uploaded(n: u32) -> UploadedFile {
        UploadedFile {
            path: PathBuf::from(format!("doc-{n}.pdf")),
            mime_type: "application/pdf".to_string(),
            display_name: format!("doc-{n}.pdf"),
            name: format!("files/{n}"),
            uri: format!("https://files/{n}"),
        }
    }

    #[tokio::test]
    async fn test_build_empty_makes_no_remote_call() {
        let backend = Arc::new(MockBackend::new());
        let builder = CacheBuilder::new(backend.clone());

        let err = builder.build(&[], &CacheSpec::default()).await.unwrap_err();

        assert!(matches!(err, GlosaError::Precondition(_)));
        assert_eq!(backend.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_build_single_user_turn() {
        let backend = Arc::new(MockBackend::new());
        let builder = CacheBuilder::new(backend.clone());
        let spec = CacheSpec {
            display_name: "Reglas \u{2014} aduana".to_string(),
            model: "gemini-2.5-flash".to_string(),
            system_instruction: "Use \u{201C}only\u{201D} the rules".to_string(),
            ttl_seconds: 3600,
        };

        let record = builder.build(&[uploaded(1), uploaded(2)], &spec).await.unwrap();

        assert!(record.cache_handle.starts_with("cachedContents/"));
        assert_eq!(record.model, "models/gemini-2.5-flash");
        assert_eq!(record.ttl_seconds, 3600);
        assert_eq!(record.display_name.as_deref(), Some("Reglas - aduana"));

        let request = &backend.cache_requests()[0];
        assert_eq!(request.contents.len(), 1);
        assert_eq!(request.contents[0].role, "user");
        let uris: Vec<_> = request.contents[0].parts.iter().filter_map(|p| p.file_uri()).collect();
        assert_eq!(uris, vec!["https://files/1", "https://files/2"]);
        assert_eq!(request.system_instruction.as_deref(), Some("Use \"only\" the rules"));
        assert_eq!(request.model, "models/gemini-2.5-flash");
    }

    #[tokio::test]
    async fn test_build_rejected() {
        let backend = Arc::new(MockBackend::new().with_cache_error(BackendError::ResponseError {
            status: 400,
            message: "Model does not support createCachedContent".to_string(),
        }));
        let builder = CacheBuilder::new(backend);

        let err = builder.build(&[uploaded(1)], &CacheSpec::default()).await.unwrap_err();
        match err {
            GlosaError::CacheCreation(message) => assert!(message.contains("createCachedContent")),
            other => panic!("Expected CacheCreation, got {other:?}"),
        }
    }
}
