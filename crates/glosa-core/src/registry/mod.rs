//! Local registry of created context caches.
//!
//! The registry is the only place Glosa remembers which caches exist. It is
//! an append-only log as far as callers are concerned: records are never
//! rewritten, and [`CacheRegistry::clear`] forgets local records without
//! touching the backend (remote caches expire through their TTL).

mod json_file;
mod memory;

pub use json_file::JsonFileRegistry;
pub use memory::InMemoryRegistry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use glosa_abstraction::normalize_model_id;
use serde::{Deserialize, Serialize};

use crate::error::{GlosaError, Result};

/// A cache created on the backend, as remembered locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    /// Backend handle (`cachedContents/...`).
    #[serde(rename = "cacheName", alias = "cacheHandle")]
    pub cache_handle: String,
    /// Model the cache is bound to (`models/...`).
    pub model: String,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// Lifetime requested at creation.
    pub ttl_seconds: u64,
    /// Manifest rule that produced the cache, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// Source directory names the cache was built from, in manifest order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    /// Display name the cache was created with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl CacheRecord {
    /// Creates a record stamped with the current time.
    pub fn new(cache_handle: impl Into<String>, model: &str, ttl_seconds: u64) -> Self {
        Self {
            cache_handle: cache_handle.into(),
            model: normalize_model_id(model),
            created_at: Utc::now(),
            ttl_seconds,
            rule_id: None,
            sources: None,
            display_name: None,
        }
    }

    /// Tags the record with the manifest rule and sources that produced it.
    #[must_use]
    pub fn with_rule(mut self, rule_id: impl Into<String>, sources: Vec<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self.sources = Some(sources);
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }
}

/// Storage for [`CacheRecord`]s.
///
/// Implementations must serialize writes so that concurrent appends are
/// never lost.
#[async_trait]
pub trait CacheRegistry: Send + Sync {
    /// Appends `record`; existing records are left untouched.
    async fn append(&self, record: CacheRecord) -> Result<()>;

    /// Returns every record in insertion order.
    async fn list(&self) -> Result<Vec<CacheRecord>>;

    /// Forgets every local record. No backend call is made.
    async fn clear(&self) -> Result<()>;

    /// Picks the cache a request binds to.
    ///
    /// With no handle this is the most recently appended record
    /// (`NoCacheConfigured` if there is none). With a handle it is the
    /// matching record (`CacheNotFound` if absent).
    async fn resolve(&self, handle: Option<&str>) -> Result<CacheRecord> {
        let records = self.list().await?;
        match handle.map(str::trim).filter(|h| !h.is_empty()) {
            None => records.into_iter().next_back().ok_or(GlosaError::NoCacheConfigured),
            Some(handle) => records
                .into_iter()
                .rev()
                .find(|record| record.cache_handle == handle)
                .ok_or_else(|| GlosaError::CacheNotFound(handle.to_string())),
        }
    }
}
