//! Registry persisted as a JSON array on disk.
//!
//! Every mutation is a read-modify-write of the whole document. Writers are
//! serialized twice over: an async mutex inside the process, and an exclusive
//! `<registry>.lock` file across processes (CLI and server may share one
//! registry). The new document is written to a temporary file in the same
//! directory and renamed over the old one, so readers never see a partial
//! write.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{CacheRecord, CacheRegistry};
use crate::error::{GlosaError, Result};

/// Lock files older than this are considered abandoned.
const STALE_LOCK_AGE: Duration = Duration::from_secs(30);

/// Delay between attempts to take the lock file.
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Attempts before giving up on the lock file (about 10 seconds).
const LOCK_MAX_ATTEMPTS: u32 = 200;

/// Accepted on-disk shapes. Early registries stored a single object.
#[derive(Deserialize)]
#[serde(untagged)]
enum RegistryDocument {
    Records(Vec<CacheRecord>),
    Legacy(CacheRecord),
}

/// File-backed [`CacheRegistry`].
#[derive(Debug)]
pub struct JsonFileRegistry {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileRegistry {
    /// Creates a registry stored at `path`. Nothing is touched until the
    /// first operation.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    /// Location of the registry document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    async fn read_records(&self) -> Result<Vec<CacheRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(GlosaError::Registry(format!("{}: {}", self.path.display(), e)));
            }
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let document: RegistryDocument = serde_json::from_str(&content)
            .map_err(|e| GlosaError::Registry(format!("{}: {}", self.path.display(), e)))?;
        Ok(match document {
            RegistryDocument::Records(records) => records,
            RegistryDocument::Legacy(record) => vec![record],
        })
    }

    /// Persists `records` through a same-directory temp file and an atomic
    /// rename, on the blocking pool.
    async fn write_records(&self, records: &[CacheRecord]) -> Result<()> {
        let json = serde_json::to_string_pretty(records)
            .map_err(|e| GlosaError::Registry(format!("Failed to serialize registry: {}", e)))?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || persist_document(&path, json.as_bytes()))
            .await
            .map_err(|e| GlosaError::Registry(format!("Registry writer failed: {}", e)))?
    }

    /// Runs `mutate` over the current records under both locks and persists
    /// the result.
    async fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<CacheRecord>) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let _lock_file = LockFile::acquire(self.lock_path()).await?;

        let mut records = self.read_records().await?;
        mutate(&mut records);
        self.write_records(&records).await?;
        debug!(path = %self.path.display(), records = records.len(), "Registry written");
        Ok(())
    }
}

#[async_trait]
impl CacheRegistry for JsonFileRegistry {
    async fn append(&self, record: CacheRecord) -> Result<()> {
        self.update(|records| records.push(record)).await
    }

    async fn list(&self) -> Result<Vec<CacheRecord>> {
        self.read_records().await
    }

    async fn clear(&self) -> Result<()> {
        self.update(Vec::clear).await
    }
}

fn persist_document(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.persist(path).map_err(|e| {
        GlosaError::Registry(format!("Failed to replace {}: {}", path.display(), e))
    })?;
    Ok(())
}

/// Exclusive lock file, removed on drop.
#[derive(Debug)]
struct LockFile {
    path: PathBuf,
}

impl LockFile {
    async fn acquire(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        for _ in 0..LOCK_MAX_ATTEMPTS {
            match tokio::fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&path).await {
                        warn!(path = %path.display(), "Breaking stale registry lock");
                        let _ = tokio::fs::remove_file(&path).await;
                        continue;
                    }
                    tokio::time::sleep(LOCK_RETRY_INTERVAL).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(GlosaError::Registry(format!("Timed out waiting for lock {}", path.display())))
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to release registry lock");
        }
    }
}

async fn is_stale(path: &Path) -> bool {
    let Ok(metadata) = tokio::fs::metadata(path).await else {
        return false;
    };
    metadata
        .modified()
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_LOCK_AGE)
}
