//! HTTP request handlers.

use std::path::PathBuf;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};

use super::AppState;
use crate::error::GlosaError;
use crate::registry::CacheRecord;
use crate::router::{ActiveDocument, QueryRequest};
use crate::setup::SourceFile;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

/// A failed request: status plus message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }
}

impl ApiError {
    /// Client errors keep their message. Anything else is logged and answered
    /// with `fallback` only, since backend errors may describe credentials or
    /// server paths.
    fn from_glosa(err: GlosaError, fallback: &str) -> Self {
        if err.is_client_error() {
            return Self::bad_request(err.to_string());
        }
        error!(error = %err, "Request failed");
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, message: fallback.to_string() }
    }
}

impl From<GlosaError> for ApiError {
    fn from(err: GlosaError) -> Self {
        Self::from_glosa(err, "Internal server error")
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Request body for POST /cache/setup.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupRequest {
    pub file_path: Option<String>,
    pub mime_type: Option<String>,
    pub display_name: Option<String>,
    pub model: Option<String>,
    pub ttl_seconds: Option<u64>,
    pub system_instruction: Option<String>,
    pub cache_display_name: Option<String>,
}

/// Response body for POST /cache/setup.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupResponse {
    pub message: String,
    pub cache_name: String,
    pub info: CacheRecord,
}

/// An entry of `files` in POST /chat: a URL or a local file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ChatFile {
    Url(String),
    #[serde(rename_all = "camelCase")]
    Local {
        path: PathBuf,
        mime_type: Option<String>,
        display_name: Option<String>,
    },
}

impl From<ChatFile> for ActiveDocument {
    fn from(file: ChatFile) -> Self {
        match file {
            ChatFile::Url(url) => Self::Remote { url },
            ChatFile::Local { path, mime_type, display_name } => {
                Self::Local { path, mime_type, display_name }
            }
        }
    }
}

/// Request body for POST /chat.
///
/// `files` entries given as server-side paths are refused unless
/// `server.allow_local_paths` is set.
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    pub question: Option<String>,
    pub cache: Option<String>,
    pub model: Option<String>,
    pub context: Option<String>,
    #[serde(default)]
    pub files: Vec<ChatFile>,
}

/// Response body for the chat endpoints.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Temp file name for the `index`th upload, keeping a plain extension so the
/// MIME table still applies when the client sent no content type.
fn upload_file_name(index: usize, original: Option<&str>) -> String {
    let extension = original
        .and_then(|name| std::path::Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    match extension {
        Some(ext) => format!("upload-{index}.{ext}"),
        None => format!("upload-{index}"),
    }
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started.elapsed().as_secs(),
    }))
}

/// POST /cache/setup
///
/// Uploads one file and creates a cache from it.
pub async fn setup_cache(
    State(state): State<AppState>,
    body: Result<Json<SetupRequest>, JsonRejection>,
) -> ApiResult<Json<SetupResponse>> {
    let Json(body) = body?;
    let (Some(file_path), Some(mime_type)) = (required(body.file_path), required(body.mime_type))
    else {
        return Err(ApiError::bad_request("filePath and mimeType are required"));
    };

    let glosa = &state.glosa;
    let spec = glosa.cache_spec(
        body.cache_display_name,
        body.model,
        body.ttl_seconds,
        body.system_instruction,
    );
    let file = SourceFile {
        path: PathBuf::from(file_path),
        mime_type: Some(mime_type),
        display_name: body.display_name,
    };
    let record = glosa
        .setup()
        .from_files(&[file], &spec)
        .await
        .map_err(|e| ApiError::from_glosa(e, "Failed to setup cache"))?;

    Ok(Json(SetupResponse {
        message: "Cache created".to_string(),
        cache_name: record.cache_handle.clone(),
        info: record,
    }))
}

/// GET /cache
pub async fn list_caches(State(state): State<AppState>) -> ApiResult<Json<Vec<CacheRecord>>> {
    let records = state
        .glosa
        .registry()
        .list()
        .await
        .map_err(|e| ApiError::from_glosa(e, "Failed to read cache info"))?;
    if records.is_empty() {
        return Err(ApiError { status: StatusCode::NOT_FOUND, message: "No cache configured".into() });
    }
    Ok(Json(records))
}

/// DELETE /cache
///
/// Forgets local records; remote caches expire on their own.
pub async fn clear_caches(State(state): State<AppState>) -> impl IntoResponse {
    if let Err(e) = state.glosa.registry().clear().await {
        warn!(error = %e, "Failed to clear cache registry");
    }
    Json(json!({ "message": "Cache info cleared" }))
}

/// POST /chat
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Json<ChatResponse>> {
    let Json(body) = body?;
    let question =
        required(body.question).ok_or_else(|| ApiError::bad_request("question is required"))?;
    if !state.glosa.config().server.allow_local_paths
        && body.files.iter().any(|file| matches!(file, ChatFile::Local { .. }))
    {
        return Err(ApiError::bad_request(
            "Local file paths are disabled; send files to /chat/upload or by URL",
        ));
    }

    let request = QueryRequest {
        question,
        cache: body.cache,
        documents: body.files.into_iter().map(ActiveDocument::from).collect(),
        model: body.model,
        context: body.context,
    };
    let answer = state
        .router
        .answer(request)
        .await
        .map_err(|e| ApiError::from_glosa(e, "Failed to generate answer"))?;
    Ok(Json(ChatResponse { answer }))
}

/// POST /chat/upload
///
/// Multipart form with `question`, optional `context`, `model` and `cache`
/// fields, and up to the configured number of `files`. Uploaded files live in
/// a temporary directory that is removed once the answer is produced, whether
/// or not that succeeded.
pub async fn chat_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<ChatResponse>> {
    let server = &state.glosa.config().server;
    let max_files = server.max_upload_files;
    let temp_dir = match &server.upload_dir {
        Some(root) => {
            tokio::fs::create_dir_all(root).await.map_err(GlosaError::from)?;
            tempfile::TempDir::new_in(root)
        }
        None => tempfile::TempDir::new(),
    }
    .map_err(GlosaError::from)?;

    let mut request = QueryRequest::default();
    let mut file_count = 0usize;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart field: {}", e)))?
    {
        let name = field.name().map(ToString::to_string).unwrap_or_default();
        if name == "files" {
            file_count += 1;
            if file_count > max_files {
                return Err(ApiError::bad_request(format!(
                    "At most {} files may be uploaded",
                    max_files
                )));
            }

            let original_name = field.file_name().map(ToString::to_string);
            let mime_type = field.content_type().map(ToString::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Invalid multipart file: {}", e)))?;

            let path = temp_dir.path().join(upload_file_name(file_count, original_name.as_deref()));
            tokio::fs::write(&path, &bytes).await.map_err(GlosaError::from)?;
            request.documents.push(ActiveDocument::Local {
                path,
                mime_type,
                display_name: original_name.or_else(|| Some("chat-file".to_string())),
            });
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart field text: {}", e)))?;
        match name.as_str() {
            "question" => request.question = text,
            "context" => request.context = Some(text),
            "model" => request.model = Some(text),
            "cache" => request.cache = Some(text),
            _ => {}
        }
    }

    let result = if request.question.trim().is_empty() {
        Err(ApiError::bad_request("question is required"))
    } else {
        state
            .router
            .answer(request)
            .await
            .map_err(|e| ApiError::from_glosa(e, "Failed to generate answer"))
    };

    let temp_path = temp_dir.path().to_path_buf();
    if let Err(e) = temp_dir.close() {
        warn!(path = %temp_path.display(), error = %e, "Failed to remove uploaded files");
    }

    result.map(|answer| Json(ChatResponse { answer }))
}
