//! Google Gemini backend implementation.
//!
//! This module provides an implementation of the `GenerativeBackend` trait for
//! the Gemini REST API. File uploads live in [`file_api`], cached-content
//! management in [`cached_content`]; generation is implemented here.

pub mod cached_content;
pub mod file_api;

use async_trait::async_trait;
use glosa_abstraction::{
    BackendError, CachedContent, Content, CreateCacheRequest, FileUpload, GenerateRequest,
    GenerateResponse, GenerativeBackend, RemoteFile, TokenUsage, normalize_model_id,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, error};

use cached_content::GeminiCachedContents;
use file_api::GeminiFileApi;

/// Root URL of the public Gemini API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// API version used for every endpoint.
const API_VERSION: &str = "v1beta";

/// Provider name reported by this backend.
const PROVIDER: &str = "gemini";

/// Shared connection details for the Gemini sub-APIs.
#[derive(Debug, Clone)]
pub(crate) struct Endpoint {
    /// API key for authentication.
    api_key: String,
    /// Root URL (scheme + host, no version).
    base_url: String,
    /// HTTP client for making requests.
    client: Client,
}

impl Endpoint {
    fn new(api_key: String, base_url: String) -> Self {
        Self { api_key, base_url: base_url.trim_end_matches('/').to_string(), client: Client::new() }
    }

    /// Versioned URL for a resource path, authenticated with the API key.
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}/{}?key={}", self.base_url, API_VERSION, path, self.api_key)
    }

    /// Versioned upload URL for the File API.
    pub(crate) fn upload_url(&self, path: &str) -> String {
        format!("{}/upload/{}/{}?key={}", self.base_url, API_VERSION, path, self.api_key)
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }
}

/// Maps HTTP status codes to appropriate `BackendError` variants.
pub(crate) fn map_http_error(
    status: reqwest::StatusCode,
    error_text: &str,
    operation: &str,
) -> BackendError {
    match status.as_u16() {
        401 | 403 => BackendError::AuthenticationError(format!(
            "Authentication failed for {}: {}",
            operation, error_text
        )),
        404 => BackendError::NotFound(format!("Not found for {}: {}", operation, error_text)),
        402 | 429 => BackendError::QuotaExceeded {
            provider: PROVIDER.to_string(),
            message: Some(format!("Rate limit exceeded for {}: {}", operation, error_text)),
        },
        code => BackendError::ResponseError {
            status: code,
            message: format!("{} failed: {}", operation, error_text),
        },
    }
}

/// Google Gemini backend.
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    endpoint: Endpoint,
    files: GeminiFileApi,
    caches: GeminiCachedContents,
}

impl GeminiBackend {
    /// Creates a backend reading the API key from `GEMINI_API_KEY`.
    ///
    /// # Errors
    /// Returns a `BackendError` if the API key is not found in environment variables.
    pub fn new() -> Result<Self, BackendError> {
        let api_key = env::var("GEMINI_API_KEY").map_err(|_| {
            BackendError::AuthenticationError(
                "GEMINI_API_KEY environment variable not set".to_string(),
            )
        })?;
        Ok(Self::with_api_key(api_key))
    }

    /// Creates a backend with an explicit API key against the public endpoint.
    #[must_use]
    pub fn with_api_key(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// Creates a backend against a custom root URL (proxies, test servers).
    #[must_use]
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let endpoint = Endpoint::new(api_key, base_url);
        Self {
            files: GeminiFileApi::new(endpoint.clone()),
            caches: GeminiCachedContents::new(endpoint.clone()),
            endpoint,
        }
    }

    async fn generate_content(
        &self,
        request: GenerateRequest,
    ) -> Result<GenerateResponse, BackendError> {
        let model = normalize_model_id(&request.model);
        debug!(
            model = %model,
            cached_content = ?request.cached_content,
            turns = request.contents.len(),
            "Gemini generating content"
        );

        let url = self.endpoint.url(&format!("{model}:generateContent"));
        let body = GeminiGenerateRequest {
            contents: request.contents,
            cached_content: request.cached_content,
        };

        let response =
            self.endpoint.client().post(&url).json(&body).send().await.map_err(|e| {
                let e = e.without_url();
                error!(error = %e, "Failed to send request to Gemini API");
                BackendError::RequestError(format!("Network error: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "Gemini API returned error status");
            return Err(map_http_error(status, &error_text, "generate content"));
        }

        let gemini_response: GeminiGenerateResponse = response.json().await.map_err(|e| {
            let e = e.without_url();
            error!(error = %e, "Failed to parse Gemini API response");
            BackendError::SerializationError(format!("Failed to parse response: {}", e))
        })?;

        Ok(gemini_response.into_response())
    }
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    async fn upload_file(&self, upload: FileUpload) -> Result<RemoteFile, BackendError> {
        self.files.upload_file(upload).await
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile, BackendError> {
        self.files.get_file(name).await
    }

    async fn create_cache(
        &self,
        request: CreateCacheRequest,
    ) -> Result<CachedContent, BackendError> {
        self.caches.create(request).await
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, BackendError> {
        self.generate_content(request).await
    }

    fn provider(&self) -> &str {
        PROVIDER
    }
}

// Gemini API request/response structures

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cached_content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerateResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

/// Response parts are read leniently: only text matters, and tool or thought
/// parts must not break parsing.
#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_field_names)] // Matches API naming
struct GeminiUsageMetadata {
    prompt_token_count: Option<u32>,
    cached_content_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    total_token_count: Option<u32>,
}

impl GeminiGenerateResponse {
    fn into_response(self) -> GenerateResponse {
        let text = self
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter(|part| !part.thought)
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .filter(|text| !text.is_empty());

        let usage = self.usage_metadata.map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count.unwrap_or(0),
            cached_tokens: u.cached_content_token_count.unwrap_or(0),
            completion_tokens: u.candidates_token_count.unwrap_or(0),
            total_tokens: u.total_token_count.unwrap_or(0),
        });

        GenerateResponse { text, model_version: self.model_version, usage }
    }
}
