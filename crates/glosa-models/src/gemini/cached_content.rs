//! Gemini cached-content API.
//!
//! Gemini uses the cachedContent API to create cached content resources that
//! generation requests can reference by name.
//!
//! # Cache Behavior
//!
//! - Explicit cache creation via POST /v1beta/cachedContents
//! - Cache names follow format: "cachedContents/{cache-id}"
//! - TTL is sent in seconds (e.g., "3600s"); the backend owns actual expiry

use glosa_abstraction::{
    BackendError, CachedContent, Content, CreateCacheRequest, Part, normalize_model_id,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{Endpoint, map_http_error};

/// Client for the cachedContents resource.
#[derive(Debug, Clone)]
pub struct GeminiCachedContents {
    endpoint: Endpoint,
}

/// Request to create cached content.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateCachedContentRequest {
    /// Model name (e.g., "models/gemini-2.5-flash").
    model: String,
    /// Display name shown in the console.
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    /// System instruction stored with the cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    /// Contents to cache.
    contents: Vec<Content>,
    /// Time-to-live in seconds (e.g., "300s").
    ttl: String,
}

/// System instruction payload; Gemini takes parts only, no role.
#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<Part>,
}

/// Response from cachedContent API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedContentResponse {
    /// Cache name (e.g., "cachedContents/abc123").
    #[serde(default)]
    name: String,
    /// Model used for caching.
    #[serde(default)]
    model: String,
    #[serde(default)]
    display_name: Option<String>,
    /// Expiration time (RFC3339).
    #[serde(default)]
    expire_time: Option<String>,
    /// Usage metadata.
    #[serde(default)]
    usage_metadata: Option<CacheUsageMetadata>,
}

/// Usage metadata for cached content.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheUsageMetadata {
    /// Total token count in cached content.
    #[serde(default)]
    total_token_count: Option<u32>,
}

impl GeminiCachedContents {
    pub(crate) fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    /// Creates a cached-content resource.
    ///
    /// # Errors
    /// Returns `BackendError` if the backend rejects the request, typically
    /// because the model does not support explicit caching or the contents
    /// are below its minimum token count.
    pub async fn create(&self, request: CreateCacheRequest) -> Result<CachedContent, BackendError> {
        let body = CreateCachedContentRequest {
            model: normalize_model_id(&request.model),
            display_name: request.display_name,
            system_instruction: request
                .system_instruction
                .filter(|text| !text.trim().is_empty())
                .map(|text| GeminiSystemInstruction { parts: vec![Part::text(text)] }),
            contents: request.contents,
            ttl: format!("{}s", request.ttl_seconds),
        };

        debug!(model = %body.model, ttl = %body.ttl, "Creating Gemini cached content");

        let response = self
            .endpoint
            .client()
            .post(self.endpoint.url("cachedContents"))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                BackendError::RequestError(format!("Failed to create cache: {}", e.without_url()))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "Gemini rejected cache creation");
            return Err(map_http_error(status, &error_text, "create cached content"));
        }

        let cached: CachedContentResponse = response.json().await.map_err(|e| {
            let e = e.without_url();
            BackendError::SerializationError(format!("Failed to parse response: {}", e))
        })?;

        Ok(CachedContent {
            name: cached.name,
            model: if cached.model.is_empty() { body.model } else { cached.model },
            display_name: cached.display_name,
            expire_time: cached.expire_time,
            total_token_count: cached.usage_metadata.and_then(|m| m.total_token_count),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let body = CreateCachedContentRequest {
            model: "models/gemini-2.5-flash".to_string(),
            display_name: Some("Rules".to_string()),
            system_instruction: Some(GeminiSystemInstruction { parts: vec![Part::text("be terse")] }),
            contents: vec![Content::user(vec![Part::file("application/pdf", "uri-1")])],
            ttl: "3600s".to_string(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["displayName"], "Rules");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be terse");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"][0]["parts"][0]["fileData"]["fileUri"], "uri-1");
        assert_eq!(json["ttl"], "3600s");
    }

    #[tokio::test]
    async fn test_create_cache() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/cachedContents")
            .match_query(mockito::Matcher::UrlEncoded("key".into(), "test-key".into()))
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "models/gemini-2.5-flash",
                "ttl": "600s"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "name": "cachedContents/abc123",
                    "model": "models/gemini-2.5-flash",
                    "displayName": "Rules",
                    "expireTime": "2026-10-16T12:00:00Z",
                    "usageMetadata": {"totalTokenCount": 4096}
                }"#,
            )
            .create_async()
            .await;

        let caches =
            GeminiCachedContents::new(Endpoint::new("test-key".to_string(), server.url()));
        let cached = caches
            .create(CreateCacheRequest {
                model: "gemini-2.5-flash".to_string(),
                display_name: Some("Rules".to_string()),
                system_instruction: Some("rules".to_string()),
                contents: vec![Content::user(vec![Part::file("application/pdf", "uri-1")])],
                ttl_seconds: 600,
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(cached.name, "cachedContents/abc123");
        assert_eq!(cached.total_token_count, Some(4096));
    }

    #[tokio::test]
    async fn test_create_cache_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/cachedContents")
            .match_query(mockito::Matcher::Any)
            .with_status(400)
            .with_body("Model does not support createCachedContent")
            .create_async()
            .await;

        let caches =
            GeminiCachedContents::new(Endpoint::new("test-key".to_string(), server.url()));
        let err = caches
            .create(CreateCacheRequest {
                model: "gemini-pro".to_string(),
                display_name: None,
                system_instruction: None,
                contents: vec![],
                ttl_seconds: 60,
            })
            .await
            .unwrap_err();

        match err {
            BackendError::ResponseError { status, message } => {
                assert_eq!(status, 400);
                assert!(message.contains("createCachedContent"));
            }
            other => panic!("Expected ResponseError, got {other:?}"),
        }
    }
}
