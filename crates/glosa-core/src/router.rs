//! Query routing with source isolation.
//!
//! Every question is bound to exactly one cache. The cache contributes
//! background (rules, formats) through the backend's cached-content
//! mechanism; the documents the question is actually about travel inline in
//! the live user turn and are never mixed into the cache. When active
//! documents are present the question is wrapped in an instruction telling
//! the model to draw facts from them alone.

use std::path::PathBuf;
use std::sync::Arc;

use glosa_abstraction::{Content, GenerateRequest, GenerativeBackend, Part, normalize_model_id};
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::answer::AnswerArchive;
use crate::error::{GlosaError, Result};
use crate::ingest::{FALLBACK_MIME_TYPE, FileIngestor, mime_type_for};
use crate::prompts::isolation_prompt;
use crate::registry::CacheRegistry;
use crate::sanitize::sanitize_text;

/// A document a single question is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveDocument {
    /// A local file, uploaded through the ingestor.
    Local {
        /// File to upload.
        path: PathBuf,
        /// MIME type override.
        mime_type: Option<String>,
        /// Display name override.
        display_name: Option<String>,
    },
    /// A document downloaded over HTTP(S) and embedded inline.
    Remote {
        /// Document URL.
        url: String,
    },
}

impl ActiveDocument {
    /// A local file with MIME type and display name derived from its path.
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::Local { path: path.into(), mime_type: None, display_name: None }
    }

    /// A remote document.
    pub fn remote(url: impl Into<String>) -> Self {
        Self::Remote { url: url.into() }
    }
}

/// One question against one cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRequest {
    /// The question.
    pub question: String,
    /// Cache handle; the most recent cache when `None`.
    pub cache: Option<String>,
    /// Documents the question is about.
    pub documents: Vec<ActiveDocument>,
    /// Model override; must name the cache's model.
    pub model: Option<String>,
    /// Free text placed before everything else in the live turn.
    pub context: Option<String>,
}

impl QueryRequest {
    /// A question bound to the most recent cache with no documents.
    pub fn new(question: impl Into<String>) -> Self {
        Self { question: question.into(), ..Self::default() }
    }

    /// Binds the question to a specific cache.
    #[must_use]
    pub fn with_cache(mut self, cache: impl Into<String>) -> Self {
        self.cache = Some(cache.into());
        self
    }

    /// Attaches an active document.
    #[must_use]
    pub fn with_document(mut self, document: ActiveDocument) -> Self {
        self.documents.push(document);
        self
    }

    /// Sets the model override.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the leading context text.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Answers questions against registered caches.
pub struct QueryRouter {
    backend: Arc<dyn GenerativeBackend>,
    registry: Arc<dyn CacheRegistry>,
    ingestor: FileIngestor,
    http: reqwest::Client,
    archive: Option<AnswerArchive>,
    default_cache: Option<String>,
}

impl std::fmt::Debug for QueryRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryRouter")
            .field("backend", &self.backend.provider())
            .field("ingestor", &self.ingestor)
            .field("archive", &self.archive)
            .field("default_cache", &self.default_cache)
            .finish_non_exhaustive()
    }
}

impl QueryRouter {
    /// Creates a router. Answers are not archived unless
    /// [`with_archive`](Self::with_archive) is used.
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        registry: Arc<dyn CacheRegistry>,
        ingestor: FileIngestor,
    ) -> Self {
        Self {
            backend,
            registry,
            ingestor,
            http: reqwest::Client::new(),
            archive: None,
            default_cache: None,
        }
    }

    /// Archives every answer into `archive`.
    #[must_use]
    pub fn with_archive(mut self, archive: AnswerArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Binds questions that name no cache to `handle` instead of the most
    /// recently registered one. A blank handle is ignored.
    #[must_use]
    pub fn with_default_cache(mut self, handle: impl Into<String>) -> Self {
        let handle = handle.into();
        self.default_cache = if handle.trim().is_empty() { None } else { Some(handle) };
        self
    }

    /// Answers `request`.
    ///
    /// The cache is the one the request names, else the router's default
    /// cache, else the most recently registered one.
    ///
    /// An answer without text is returned as an empty string. Archiving
    /// failures are logged and do not affect the result.
    ///
    /// # Errors
    ///
    /// * `Precondition` for an empty question or an unsupported document URL
    /// * `NoCacheConfigured` / `CacheNotFound` if no cache can be resolved
    /// * `ModelMismatch` if the model override differs from the cache's model
    /// * ingestion, download and backend errors for the documents and the call
    pub async fn answer(&self, request: QueryRequest) -> Result<String> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(GlosaError::Precondition("question is required".to_string()));
        }
        for document in &request.documents {
            if let ActiveDocument::Remote { url } = document {
                parse_document_url(url)?;
            }
        }

        let handle = request
            .cache
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .or(self.default_cache.as_deref());
        let record = self.registry.resolve(handle).await?;
        let model = normalize_model_id(&record.model);
        if let Some(requested) = request.model.as_deref().filter(|m| !m.trim().is_empty()) {
            let requested = normalize_model_id(requested);
            if requested != model {
                return Err(GlosaError::ModelMismatch {
                    cache: record.cache_handle,
                    cache_model: model,
                    requested,
                });
            }
        }

        let mut parts = Vec::with_capacity(request.documents.len() + 2);
        if let Some(context) = request.context.as_deref().map(sanitize_text) {
            if !context.trim().is_empty() {
                parts.push(Part::text(context));
            }
        }
        for document in &request.documents {
            parts.push(self.to_inline_part(document).await?);
        }
        let prompt =
            if request.documents.is_empty() { question.to_string() } else { isolation_prompt(question) };
        parts.push(Part::text(sanitize_text(&prompt)));

        info!(
            cache = %record.cache_handle,
            model = %model,
            documents = request.documents.len(),
            "Routing question"
        );

        let response = self
            .backend
            .generate(GenerateRequest {
                model,
                cached_content: Some(record.cache_handle),
                contents: vec![Content::user(parts)],
            })
            .await?;

        if let Some(usage) = &response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                cached_tokens = usage.cached_tokens,
                completion_tokens = usage.completion_tokens,
                "Generation usage"
            );
        }

        let text = response.text.unwrap_or_default();
        if let Some(archive) = &self.archive {
            match archive.write(&text).await {
                Ok(path) => info!(path = %path.display(), "Answer saved"),
                Err(e) => warn!(error = %e, "Failed to archive answer"),
            }
        }
        Ok(text)
    }

    /// Turns an active document into a part of the live turn.
    ///
    /// Local files become `fileData` references to a fresh upload; remote
    /// documents are downloaded and embedded as base64 `inlineData`.
    pub async fn to_inline_part(&self, document: &ActiveDocument) -> Result<Part> {
        match document {
            ActiveDocument::Local { path, mime_type, display_name } => {
                let uploaded = self
                    .ingestor
                    .ingest_with(path, mime_type.as_deref(), display_name.as_deref())
                    .await?;
                Ok(uploaded.to_part())
            }
            ActiveDocument::Remote { url } => {
                let (mime_type, bytes) = self.fetch(url).await?;
                Ok(Part::inline(mime_type, &bytes))
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<(String, Vec<u8>)> {
        let parsed = parse_document_url(url)?;
        let fetch_error =
            |reason: String| GlosaError::Fetch { url: url.to_string(), reason };

        debug!(url = %parsed, "Downloading active document");
        let response =
            self.http.get(parsed.clone()).send().await.map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {}", status)));
        }

        let header_mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty() && v != FALLBACK_MIME_TYPE);
        let mime_type =
            header_mime.unwrap_or_else(|| mime_type_for(std::path::Path::new(parsed.path())).to_string());

        let bytes = response.bytes().await.map_err(|e| fetch_error(e.to_string()))?;
        Ok((mime_type, bytes.to_vec()))
    }
}

fn parse_document_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| GlosaError::Precondition(format!("Invalid document URL {}: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(GlosaError::Precondition(format!(
            "Unsupported URL scheme '{}' for {}",
            scheme, url
        ))),
    }
}
