//! Gemini File API implementation.
//!
//! Uploads use the resumable protocol in a single chunk: a `start` request
//! carrying the file metadata returns an upload session URL, and one
//! `upload, finalize` request sends the bytes. The returned file may still be
//! `PROCESSING`; waiting for `ACTIVE` is the caller's job.

use glosa_abstraction::{BackendError, FileUpload, RemoteFile};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Endpoint, map_http_error};

/// Response header carrying the resumable session URL.
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// Client for the Gemini File API.
#[derive(Debug, Clone)]
pub struct GeminiFileApi {
    endpoint: Endpoint,
}

#[derive(Debug, Serialize)]
struct StartUploadRequest<'a> {
    file: StartUploadFile<'a>,
}

#[derive(Debug, Serialize)]
struct StartUploadFile<'a> {
    #[serde(rename = "displayName", skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: RemoteFile,
}

impl GeminiFileApi {
    pub(crate) fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    /// Uploads a file to the Gemini File API.
    ///
    /// # Errors
    /// Returns `BackendError` if either step of the upload is rejected.
    pub async fn upload_file(&self, upload: FileUpload) -> Result<RemoteFile, BackendError> {
        debug!(
            file_name = %upload.file_name,
            mime_type = %upload.mime_type,
            size = upload.bytes.len(),
            "Uploading file to Gemini File API"
        );

        let start_body = StartUploadRequest {
            file: StartUploadFile {
                display_name: upload.display_name.as_deref().or(Some(&upload.file_name)),
            },
        };

        let response = self
            .endpoint
            .client()
            .post(self.endpoint.upload_url("files"))
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", upload.bytes.len())
            .header("X-Goog-Upload-Header-Content-Type", &upload.mime_type)
            .json(&start_body)
            .send()
            .await
            .map_err(|e| {
                BackendError::RequestError(format!("Failed to start upload: {}", e.without_url()))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(map_http_error(status, &error_text, "file upload"));
        }

        let session_url = response
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
            .ok_or_else(|| {
                BackendError::SerializationError(
                    "Upload session response carried no upload URL".to_string(),
                )
            })?;

        let response = self
            .endpoint
            .client()
            .post(&session_url)
            .header("X-Goog-Upload-Command", "upload, finalize")
            .header("X-Goog-Upload-Offset", 0)
            .header(reqwest::header::CONTENT_TYPE, &upload.mime_type)
            .body(upload.bytes)
            .send()
            .await
            .map_err(|e| {
                BackendError::RequestError(format!("Failed to upload file: {}", e.without_url()))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(map_http_error(status, &error_text, "file upload"));
        }

        let uploaded: UploadResponse = response.json().await.map_err(|e| {
            let e = e.without_url();
            BackendError::SerializationError(format!("Failed to parse upload response: {}", e))
        })?;

        debug!(
            file_name = %uploaded.file.name,
            state = ?uploaded.file.state,
            "File uploaded successfully"
        );

        Ok(uploaded.file)
    }

    /// Retrieves file metadata by name/ID.
    ///
    /// # Arguments
    /// * `file_name` - File name/ID in format "files/{file-id}"
    ///
    /// # Errors
    /// Returns `BackendError` if the file cannot be retrieved.
    pub async fn get_file(&self, file_name: &str) -> Result<RemoteFile, BackendError> {
        debug!(file_name = %file_name, "Retrieving file metadata");

        let response = self
            .endpoint
            .client()
            .get(self.endpoint.url(file_name))
            .send()
            .await
            .map_err(|e| {
                BackendError::RequestError(format!("Failed to retrieve file: {}", e.without_url()))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(map_http_error(status, &error_text, &format!("retrieve file {}", file_name)));
        }

        response.json().await.map_err(|e| {
            let e = e.without_url();
            BackendError::SerializationError(format!("Failed to parse file response: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glosa_abstraction::FileState;

    fn api(url: String) -> GeminiFileApi {
        GeminiFileApi::new(Endpoint::new("test-key".to_string(), url))
    }

    #[test]
    fn test_remote_file_deserialization() {
        let json = r#"{
            "name": "files/abc123",
            "uri": "https://generativelanguage.googleapis.com/v1beta/files/abc123",
            "state": "ACTIVE",
            "sizeBytes": "1048576",
            "displayName": "test.pdf",
            "mimeType": "application/pdf"
        }"#;

        let file: RemoteFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.name, "files/abc123");
        assert_eq!(file.state, FileState::Active);
        assert_eq!(file.mime_type, "application/pdf");
        assert_eq!(file.display_name, Some("test.pdf".to_string()));
    }

    #[tokio::test]
    async fn test_upload_file_two_step() {
        let mut server = mockito::Server::new_async().await;
        let session_url = format!("{}/upload-session/xyz", server.url());

        let start = server
            .mock("POST", "/upload/v1beta/files")
            .match_query(mockito::Matcher::UrlEncoded("key".into(), "test-key".into()))
            .match_header("x-goog-upload-command", "start")
            .match_header("x-goog-upload-header-content-type", "application/pdf")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "file": {"displayName": "invoice.pdf"}
            })))
            .with_status(200)
            .with_header("x-goog-upload-url", &session_url)
            .create_async()
            .await;

        let finalize = server
            .mock("POST", "/upload-session/xyz")
            .match_header("x-goog-upload-command", "upload, finalize")
            .match_body("%PDF-1.4")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"file": {"name": "files/xyz", "uri": "https://files/xyz", "mimeType": "application/pdf", "state": "PROCESSING"}}"#,
            )
            .create_async()
            .await;

        let file = api(server.url())
            .upload_file(FileUpload {
                file_name: "invoice.pdf".to_string(),
                mime_type: "application/pdf".to_string(),
                display_name: None,
                bytes: b"%PDF-1.4".to_vec(),
            })
            .await
            .unwrap();

        start.assert_async().await;
        finalize.assert_async().await;
        assert_eq!(file.name, "files/xyz");
        assert_eq!(file.state, FileState::Processing);
    }

    #[tokio::test]
    async fn test_upload_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _start = server
            .mock("POST", "/upload/v1beta/files")
            .match_query(mockito::Matcher::Any)
            .with_status(413)
            .with_body("too large")
            .create_async()
            .await;

        let err = api(server.url())
            .upload_file(FileUpload {
                file_name: "big.bin".to_string(),
                mime_type: "application/octet-stream".to_string(),
                display_name: Some("big".to_string()),
                bytes: vec![0; 16],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::ResponseError { status: 413, .. }));
    }

    #[tokio::test]
    async fn test_get_file() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1beta/files/abc")
            .match_query(mockito::Matcher::UrlEncoded("key".into(), "test-key".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"name": "files/abc", "uri": "u", "mimeType": "text/plain", "state": "ACTIVE"}"#)
            .create_async()
            .await;

        let file = api(server.url()).get_file("files/abc").await.unwrap();
        assert_eq!(file.state, FileState::Active);
        assert_eq!(file.uri, "u");
    }
}
