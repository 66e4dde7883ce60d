//! Backend abstraction layer for Glosa.
//!
//! This module defines the narrow capability interface the rest of the
//! workspace uses to talk to a generative backend (file upload, file status,
//! cached-content creation and generation), together with the content types
//! that travel through it.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Represents an error that can occur when interacting with the generative backend.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendError {
    /// An error occurred while sending the request (e.g., network issues).
    #[error("Request Error: {0}")]
    RequestError(String),

    /// The backend answered with a non-success status.
    #[error("Backend Response Error ({status}): {message}")]
    ResponseError {
        /// HTTP status code returned by the backend.
        status: u16,
        /// Error text returned by the backend.
        message: String,
    },

    /// An error occurred during serialization or deserialization.
    #[error("Serialization Error: {0}")]
    SerializationError(String),

    /// The credential was missing or rejected.
    #[error("Authentication Error: {0}")]
    AuthenticationError(String),

    /// The requested resource does not exist on the backend.
    #[error("Not Found: {0}")]
    NotFound(String),

    /// Provider quota exceeded or rate limit hit (hard stop error).
    #[error("Provider '{provider}' quota exceeded{}", message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default())]
    QuotaExceeded {
        /// The provider name (e.g., "gemini").
        provider: String,
        /// Optional error message from the provider.
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Other unexpected errors.
    #[error("Other Backend Error: {0}")]
    Other(String),
}

/// Role used for every content turn Glosa sends.
pub const USER_ROLE: &str = "user";

/// Prefix the backend expects on model resource names.
pub const MODEL_PREFIX: &str = "models/";

/// Normalizes a model identifier to its resource form (`models/<id>`).
///
/// `gemini-2.5-flash` and `models/gemini-2.5-flash` name the same model, and
/// caches are bound to exactly one of them, so every comparison and every
/// request goes through this function.
pub fn normalize_model_id(model: &str) -> String {
    let trimmed = model.trim();
    if trimmed.starts_with(MODEL_PREFIX) {
        trimmed.to_string()
    } else {
        format!("{MODEL_PREFIX}{trimmed}")
    }
}

/// One conversational turn: a role plus an ordered list of parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    /// The role of the turn author (Glosa only ever sends "user").
    pub role: String,
    /// The parts making up this turn.
    pub parts: Vec<Part>,
}

impl Content {
    /// Creates a user turn holding the given parts.
    #[must_use]
    pub fn user(parts: Vec<Part>) -> Self {
        Self { role: USER_ROLE.to_string(), parts }
    }
}

/// A single piece of content inside a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    /// Plain text.
    Text {
        /// The text itself.
        text: String,
    },
    /// Bytes embedded directly in the request, base64 encoded.
    InlineData {
        /// The embedded blob.
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
    /// A reference to a file previously uploaded to the backend.
    FileData {
        /// The file reference.
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

impl Part {
    /// Creates a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Creates an inline part, base64-encoding `bytes`.
    pub fn inline(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::InlineData {
            inline_data: Blob {
                mime_type: mime_type.into(),
                data: base64::engine::general_purpose::STANDARD.encode(bytes),
            },
        }
    }

    /// Creates a reference to an uploaded file.
    pub fn file(mime_type: impl Into<String>, file_uri: impl Into<String>) -> Self {
        Self::FileData {
            file_data: FileData { mime_type: mime_type.into(), file_uri: file_uri.into() },
        }
    }

    /// Returns the text if this is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Returns the file URI if this part references an uploaded file.
    pub fn file_uri(&self) -> Option<&str> {
        match self {
            Self::FileData { file_data } => Some(&file_data.file_uri),
            _ => None,
        }
    }
}

/// Inline bytes with their MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    /// MIME type of the data.
    pub mime_type: String,
    /// Base64-encoded bytes.
    pub data: String,
}

/// Reference to an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    /// MIME type of the file.
    pub mime_type: String,
    /// Backend URI of the file.
    pub file_uri: String,
}

/// Processing state of an uploaded file as reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    /// The backend has not reported a state yet.
    #[default]
    StateUnspecified,
    /// File is being processed.
    Processing,
    /// File is ready to use.
    Active,
    /// File processing failed.
    Failed,
    /// Any state this client does not know about.
    #[serde(other)]
    Unknown,
}

impl FileState {
    /// Whether the file is still on its way to a terminal state.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::StateUnspecified | Self::Processing)
    }
}

/// A file as known by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    /// Resource name in format "files/{file-id}".
    pub name: String,
    /// URI used to reference the file from content parts.
    #[serde(default)]
    pub uri: String,
    /// MIME type recorded by the backend.
    #[serde(default)]
    pub mime_type: String,
    /// Current processing state.
    #[serde(default)]
    pub state: FileState,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// A local file ready to be sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    /// File name (without directories).
    pub file_name: String,
    /// MIME type to upload with.
    pub mime_type: String,
    /// Optional display name shown by the backend.
    pub display_name: Option<String>,
    /// File contents.
    pub bytes: Vec<u8>,
}

/// Request to create a cached-content resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCacheRequest {
    /// Model resource name the cache is bound to.
    pub model: String,
    /// Optional display name for the cache.
    pub display_name: Option<String>,
    /// Optional system instruction stored with the cache.
    pub system_instruction: Option<String>,
    /// Contents to cache.
    pub contents: Vec<Content>,
    /// Requested lifetime in seconds.
    pub ttl_seconds: u64,
}

/// A cached-content resource as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedContent {
    /// Cache name (e.g., "cachedContents/abc123").
    pub name: String,
    /// Model the cache is bound to.
    pub model: String,
    /// Display name, if the backend echoed one.
    pub display_name: Option<String>,
    /// Expiration time (RFC 3339) reported by the backend.
    pub expire_time: Option<String>,
    /// Number of tokens held in the cache.
    pub total_token_count: Option<u32>,
}

/// Request for a single generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    /// Model resource name.
    pub model: String,
    /// Cache to bind the request to.
    pub cached_content: Option<String>,
    /// Live contents of this request.
    pub contents: Vec<Content>,
}

/// Usage statistics for a generation call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt (cached tokens included).
    pub prompt_tokens: u32,
    /// Tokens served from the cache.
    pub cached_tokens: u32,
    /// Tokens in the completion.
    pub completion_tokens: u32,
    /// Total number of tokens used.
    pub total_tokens: u32,
}

/// The result of a generation call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateResponse {
    /// Concatenated text of the first candidate, if any.
    pub text: Option<String>,
    /// Model version reported by the backend.
    pub model_version: Option<String>,
    /// Optional usage statistics.
    pub usage: Option<TokenUsage>,
}

/// Capability interface over the generative backend.
///
/// All backends must be `Send + Sync` so they can be shared behind an `Arc`
/// between the CLI, the HTTP server and the core services.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Uploads a file. The returned file may still be processing.
    ///
    /// # Errors
    /// Returns a `BackendError` if the backend rejects the upload.
    async fn upload_file(&self, upload: FileUpload) -> Result<RemoteFile, BackendError>;

    /// Fetches the current metadata (and state) of an uploaded file.
    ///
    /// # Errors
    /// Returns a `BackendError` if the file cannot be retrieved.
    async fn get_file(&self, name: &str) -> Result<RemoteFile, BackendError>;

    /// Creates a cached-content resource.
    ///
    /// # Errors
    /// Returns a `BackendError` if the backend rejects the model or contents.
    async fn create_cache(&self, request: CreateCacheRequest) -> Result<CachedContent, BackendError>;

    /// Runs one generation call.
    ///
    /// # Errors
    /// Returns a `BackendError` if generation fails.
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, BackendError>;

    /// Returns the provider name (e.g., "gemini").
    fn provider(&self) -> &str;
}
