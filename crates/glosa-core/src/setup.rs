//! Cache setup pipeline: ingest, build, register.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info};

use crate::builder::{CacheBuilder, CacheSpec};
use crate::error::{GlosaError, Result};
use crate::ingest::{DirectoryScan, FileIngestor, discover_files};
use crate::registry::{CacheRecord, CacheRegistry};

/// A file to upload with optional MIME type and display name overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Local path.
    pub path: PathBuf,
    /// MIME type override.
    pub mime_type: Option<String>,
    /// Display name override.
    pub display_name: Option<String>,
}

impl SourceFile {
    /// A file with everything derived from its path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), mime_type: None, display_name: None }
    }
}

impl From<PathBuf> for SourceFile {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

/// Creates caches from local files and records them in the registry.
#[derive(Clone)]
pub struct CacheSetup {
    ingestor: FileIngestor,
    builder: CacheBuilder,
    registry: Arc<dyn CacheRegistry>,
}

impl std::fmt::Debug for CacheSetup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheSetup")
            .field("ingestor", &self.ingestor)
            .field("builder", &self.builder)
            .finish_non_exhaustive()
    }
}

impl CacheSetup {
    /// Creates a pipeline over the given components.
    pub fn new(
        ingestor: FileIngestor,
        builder: CacheBuilder,
        registry: Arc<dyn CacheRegistry>,
    ) -> Self {
        Self { ingestor, builder, registry }
    }

    /// Uploads `files` one after another, builds a cache from them and
    /// appends its record.
    ///
    /// Any ingestion failure aborts the setup before a cache is created. A
    /// failure to append the record is logged and the record is still
    /// returned, since the remote cache exists either way.
    pub async fn from_files(&self, files: &[SourceFile], spec: &CacheSpec) -> Result<CacheRecord> {
        self.build_and_register(files, spec, |record| record).await
    }

    /// Like [`from_files`](Self::from_files) over the files found in `dir`.
    ///
    /// # Errors
    ///
    /// Returns `Precondition` if `dir` does not exist or holds no matching files.
    pub async fn from_directory(
        &self,
        dir: &Path,
        scan: &DirectoryScan,
        spec: &CacheSpec,
    ) -> Result<CacheRecord> {
        let files = discover_files(dir, scan)?;
        if files.is_empty() {
            return Err(GlosaError::Precondition(format!("No files in {}", dir.display())));
        }
        info!(dir = %dir.display(), files = files.len(), "Uploading cache sources");
        let files: Vec<SourceFile> = files.into_iter().map(SourceFile::from).collect();
        self.from_files(&files, spec).await
    }

    /// Shared pipeline; `tag` decorates the record before it is appended.
    pub(crate) async fn build_and_register<F>(
        &self,
        files: &[SourceFile],
        spec: &CacheSpec,
        tag: F,
    ) -> Result<CacheRecord>
    where
        F: FnOnce(CacheRecord) -> CacheRecord + Send,
    {
        if files.is_empty() {
            return Err(GlosaError::Precondition(
                "At least one file is required to build a cache".to_string(),
            ));
        }

        let mut uploaded = Vec::with_capacity(files.len());
        for file in files {
            let result = self
                .ingestor
                .ingest_with(&file.path, file.mime_type.as_deref(), file.display_name.as_deref())
                .await?;
            info!(path = %file.path.display(), uri = %result.uri, "Uploaded");
            uploaded.push(result);
        }

        let record = tag(self.builder.build(&uploaded, spec).await?);
        if let Err(e) = self.registry.append(record.clone()).await {
            error!(cache = %record.cache_handle, error = %e, "Failed to record cache locally");
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::PollPolicy;
    use crate::registry::{InMemoryRegistry, JsonFileRegistry};
    use glosa_abstraction::BackendError;
    use glosa_models::MockBackend;
    use std::time::Duration;
    use tempfile::TempDir;

    fn pipeline(backend: Arc<MockBackend>, registry: Arc<dyn CacheRegistry>) -> CacheSetup {
        let ingestor = FileIngestor::new(
            backend.clone(),
            PollPolicy { interval: Duration::from_millis(1), max_attempts: 3 },
        );
        CacheSetup::new(ingestor, CacheBuilder::new(backend), registry)
    }

    #[tokio::test]
    async fn test_from_directory_registers_record() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"a").unwrap();
        std::fs::write(dir.path().join("b.txt"), b"b").unwrap();
        let backend = Arc::new(MockBackend::new());
        let registry = Arc::new(InMemoryRegistry::new());
        let setup = pipeline(backend.clone(), registry.clone());

        let record = setup
            .from_directory(dir.path(), &DirectoryScan::recursive(), &CacheSpec::default())
            .await
            .unwrap();

        assert_eq!(backend.calls().upload_file, 2);
        assert_eq!(registry.list().await.unwrap(), vec![record]);
        let mimes: Vec<_> = backend.uploads().into_iter().map(|u| u.mime_type).collect();
        assert_eq!(mimes, vec!["application/pdf", "text/plain"]);
    }

    #[tokio::test]
    async fn test_ingest_failure_aborts_build() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"a").unwrap();
        let backend = Arc::new(
            MockBackend::new().with_upload_error(BackendError::RequestError("down".to_string())),
        );
        let registry = Arc::new(InMemoryRegistry::new());
        let setup = pipeline(backend.clone(), registry.clone());

        let err = setup
            .from_files(&[SourceFile::new(dir.path().join("a.pdf"))], &CacheSpec::default())
            .await
            .unwrap_err();

        assert!(matches!(err, GlosaError::Upload { .. }));
        assert_eq!(backend.calls().create_cache, 0);
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_directory_and_missing_directory() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(MockBackend::new());
        let setup = pipeline(backend.clone(), Arc::new(InMemoryRegistry::new()));

        let err = setup
            .from_directory(dir.path(), &DirectoryScan::recursive(), &CacheSpec::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GlosaError::Precondition(_)));

        let err = setup
            .from_directory(&dir.path().join("nope"), &DirectoryScan::recursive(), &CacheSpec::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GlosaError::Precondition(_)));
        assert_eq!(backend.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_registry_failure_is_not_escalated() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"a").unwrap();
        let corrupt = dir.path().join("cache.json");
        std::fs::write(&corrupt, "garbage").unwrap();
        let backend = Arc::new(MockBackend::new());
        let setup = pipeline(backend.clone(), Arc::new(JsonFileRegistry::new(&corrupt)));

        let record = setup
            .from_files(&[SourceFile::new(dir.path().join("a.pdf"))], &CacheSpec::default())
            .await
            .unwrap();

        assert!(record.cache_handle.starts_with("cachedContents/"));
        assert_eq!(backend.calls().create_cache, 1);
    }
}
