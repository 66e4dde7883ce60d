//! File ingestion: local file to an `ACTIVE` backend file reference.
//!
//! Uploading is a two-phase affair. The backend accepts the bytes and
//! answers with a file that is usually still `PROCESSING`; the ingestor then
//! polls the file's state on a fixed interval until it becomes `ACTIVE`,
//! fails, or the attempt budget runs out. Callers only ever see references
//! the backend has declared usable.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use glosa_abstraction::{FileState, FileUpload, GenerativeBackend, Part, RemoteFile};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{GlosaError, Result};
use crate::sanitize::sanitize_text;

/// MIME type used for extensions outside the fixed table.
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Returns the MIME type for `path` from its (case-insensitive) extension.
pub fn mime_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        _ => FALLBACK_MIME_TYPE,
    }
}

/// A file the backend has accepted and declared `ACTIVE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Local path the bytes were read from.
    pub path: PathBuf,
    /// MIME type the file was uploaded with.
    pub mime_type: String,
    /// Sanitized display name.
    pub display_name: String,
    /// Remote handle (`files/...`).
    pub name: String,
    /// Remote URI used to reference the file from content parts.
    pub uri: String,
}

impl UploadedFile {
    /// The `fileData` part referencing this upload.
    pub fn to_part(&self) -> Part {
        Part::file(&self.mime_type, &self.uri)
    }
}

/// Bounded readiness polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay before each status check.
    pub interval: Duration,
    /// Maximum number of status checks.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self { interval: Duration::from_millis(2000), max_attempts: 60 }
    }
}

/// Uploads local files and waits for them to become usable.
#[derive(Clone)]
pub struct FileIngestor {
    backend: Arc<dyn GenerativeBackend>,
    policy: PollPolicy,
}

impl std::fmt::Debug for FileIngestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileIngestor")
            .field("backend", &self.backend.provider())
            .field("policy", &self.policy)
            .finish()
    }
}

impl FileIngestor {
    /// Creates an ingestor over `backend`.
    pub fn new(backend: Arc<dyn GenerativeBackend>, policy: PollPolicy) -> Self {
        Self { backend, policy }
    }

    /// Ingests `path` with the MIME type from its extension and its file
    /// name as display name.
    pub async fn ingest(&self, path: &Path) -> Result<UploadedFile> {
        self.ingest_with(path, None, None).await
    }

    /// Ingests `path`, overriding the MIME type and display name when given.
    ///
    /// # Errors
    ///
    /// * `Precondition` if `path` is not a readable file (no remote call is made)
    /// * `Upload` if the backend rejects the bytes
    /// * `FileNotReady` if processing ends in any state other than `ACTIVE`
    /// * `Timeout` if the file is still processing after the last poll
    pub async fn ingest_with(
        &self,
        path: &Path,
        mime_type: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<UploadedFile> {
        let is_file = tokio::fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false);
        if !is_file {
            return Err(GlosaError::Precondition(format!("File not found: {}", path.display())));
        }
        let bytes = tokio::fs::read(path).await?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let mime_type = mime_type
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| mime_type_for(path))
            .to_string();
        let display_name = display_name
            .map(sanitize_text)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| sanitize_text(&file_name));

        info!(path = %path.display(), mime_type = %mime_type, size = bytes.len(), "Uploading file");

        let remote = self
            .backend
            .upload_file(FileUpload {
                file_name,
                mime_type: mime_type.clone(),
                display_name: Some(display_name.clone()),
                bytes,
            })
            .await
            .map_err(|source| GlosaError::Upload { path: path.display().to_string(), source })?;

        let remote = self.wait_until_active(remote).await?;
        info!(path = %path.display(), file = %remote.name, "File is active");

        Ok(UploadedFile {
            path: path.to_path_buf(),
            mime_type,
            display_name,
            name: remote.name,
            uri: remote.uri,
        })
    }

    async fn wait_until_active(&self, mut file: RemoteFile) -> Result<RemoteFile> {
        let mut attempts = 0;
        loop {
            if file.state == FileState::Active {
                return Ok(file);
            }
            if !file.state.is_pending() {
                warn!(file = %file.name, state = ?file.state, "File processing failed");
                return Err(GlosaError::FileNotReady { name: file.name, state: file.state });
            }
            if attempts >= self.policy.max_attempts {
                warn!(file = %file.name, attempts, "File still processing, giving up");
                return Err(GlosaError::Timeout { name: file.name, attempts });
            }

            tokio::time::sleep(self.policy.interval).await;
            attempts += 1;
            debug!(file = %file.name, attempt = attempts, "Checking file state");
            file = self.backend.get_file(&file.name).await?;
        }
    }
}

/// How a source directory is walked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryScan {
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Depth limit when recursive (`None` means unlimited).
    pub max_depth: Option<usize>,
    /// Only keep files with this extension (case-insensitive, leading dot optional).
    pub extension: Option<String>,
}

impl DirectoryScan {
    /// Recursive scan without limits or filters.
    pub fn recursive() -> Self {
        Self { recursive: true, ..Self::default() }
    }

    /// Restricts the scan to one extension.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    fn matches(&self, path: &Path) -> bool {
        let Some(wanted) = &self.extension else {
            return true;
        };
        let wanted = wanted.trim_start_matches('.');
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
    }
}

/// Lists the files under `dir`.
///
/// Entries are visited depth-first with siblings in file-name order, so a
/// directory's own files and subdirectories interleave by name and every
/// subdirectory is exhausted before the next sibling.
///
/// # Errors
///
/// Returns `Precondition` if `dir` is not a directory.
pub fn discover_files(dir: &Path, scan: &DirectoryScan) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(GlosaError::Precondition(format!("Directory not found: {}", dir.display())));
    }

    let max_depth = if scan.recursive { scan.max_depth.unwrap_or(usize::MAX) } else { 1 };
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(max_depth).sort_by_file_name() {
        let entry = entry.map_err(|e| GlosaError::Io(std::io::Error::other(e.to_string())))?;
        if entry.file_type().is_file() && scan.matches(entry.path()) {
            files.push(entry.into_path());
        }
    }

    debug!(dir = %dir.display(), count = files.len(), "Discovered source files");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glosa_abstraction::BackendError;
    use glosa_models::MockBackend;
    use tempfile::TempDir;

    fn fast_policy(max_attempts: u32) -> PollPolicy {
        PollPolicy { interval: Duration::from_millis(1), max_attempts }
    }

    fn write_file(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"%PDF-1.4 test").unwrap();
        path
    }

    #[test]
    fn test_mime_table() {
        assert_eq!(mime_type_for(Path::new("a.pdf")), "application/pdf");
        assert_eq!(mime_type_for(Path::new("A.PDF")), "application/pdf");
        assert_eq!(mime_type_for(Path::new("notes.txt")), "text/plain");
        assert_eq!(mime_type_for(Path::new("README.Md")), "text/markdown");
        assert_eq!(mime_type_for(Path::new("image.png")), FALLBACK_MIME_TYPE);
        assert_eq!(mime_type_for(Path::new("no_extension")), FALLBACK_MIME_TYPE);
    }

    #[tokio::test]
    async fn test_ingest_active_without_polling() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "invoice.pdf");
        let backend = Arc::new(MockBackend::new());
        let ingestor = FileIngestor::new(backend.clone(), fast_policy(5));

        let uploaded = ingestor.ingest(&path).await.unwrap();

        assert_eq!(uploaded.mime_type, "application/pdf");
        assert_eq!(uploaded.display_name, "invoice.pdf");
        assert!(uploaded.name.starts_with("files/"));
        assert_eq!(backend.calls().get_file, 0);
        assert_eq!(backend.uploads()[0].bytes, b"%PDF-1.4 test");
    }

    #[tokio::test]
    async fn test_ingest_polls_until_active() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "bl.pdf");
        let backend = Arc::new(MockBackend::new().with_processing_polls(3));
        let ingestor = FileIngestor::new(backend.clone(), fast_policy(5));

        let uploaded = ingestor.ingest(&path).await.unwrap();

        assert!(!uploaded.uri.is_empty());
        assert_eq!(backend.calls().get_file, 4);
    }

    #[tokio::test]
    async fn test_ingest_times_out() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "slow.pdf");
        let backend = Arc::new(MockBackend::new().with_processing_polls(u32::MAX));
        let ingestor = FileIngestor::new(backend.clone(), fast_policy(3));

        let err = ingestor.ingest(&path).await.unwrap_err();

        assert!(matches!(err, GlosaError::Timeout { attempts: 3, .. }));
        assert_eq!(backend.calls().get_file, 3);
    }

    #[tokio::test]
    async fn test_ingest_failed_state() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "broken.pdf");
        let backend =
            Arc::new(MockBackend::new().with_processing_polls(1).with_final_state(FileState::Failed));
        let ingestor = FileIngestor::new(backend, fast_policy(5));

        let err = ingestor.ingest(&path).await.unwrap_err();
        assert!(matches!(err, GlosaError::FileNotReady { state: FileState::Failed, .. }));
    }

    #[tokio::test]
    async fn test_ingest_missing_file_makes_no_remote_call() {
        let backend = Arc::new(MockBackend::new());
        let ingestor = FileIngestor::new(backend.clone(), fast_policy(5));

        let err = ingestor.ingest(Path::new("/nonexistent/file.pdf")).await.unwrap_err();

        assert!(matches!(err, GlosaError::Precondition(_)));
        assert_eq!(backend.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_ingest_upload_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.pdf");
        let backend = Arc::new(
            MockBackend::new()
                .with_upload_error(BackendError::ResponseError { status: 413, message: "big".into() }),
        );
        let ingestor = FileIngestor::new(backend, fast_policy(5));

        let err = ingestor.ingest(&path).await.unwrap_err();
        assert!(matches!(err, GlosaError::Upload { .. }));
    }

    #[tokio::test]
    async fn test_ingest_with_overrides_and_sanitizes() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "upload-1234");
        let backend = Arc::new(MockBackend::new());
        let ingestor = FileIngestor::new(backend.clone(), fast_policy(5));

        let uploaded = ingestor
            .ingest_with(&path, Some("application/pdf"), Some("Factura \u{201C}A\u{201D} 📄"))
            .await
            .unwrap();

        assert_eq!(uploaded.mime_type, "application/pdf");
        assert_eq!(uploaded.display_name, "Factura \"A\" ");
        assert_eq!(backend.uploads()[0].display_name.as_deref(), Some("Factura \"A\" "));
    }

    #[test]
    fn test_discover_files_order_and_filter() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("b_sub/deeper")).unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"a").unwrap();
        std::fs::write(dir.path().join("c.PDF"), b"c").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"n").unwrap();
        std::fs::write(dir.path().join("b_sub/x.pdf"), b"x").unwrap();
        std::fs::write(dir.path().join("b_sub/deeper/y.pdf"), b"y").unwrap();

        let all = discover_files(dir.path(), &DirectoryScan::recursive()).unwrap();
        let names: Vec<_> = all
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.pdf", "b_sub/deeper/y.pdf", "b_sub/x.pdf", "c.PDF", "notes.txt"]);

        let pdfs = discover_files(dir.path(), &DirectoryScan::recursive().with_extension(".pdf"))
            .unwrap();
        assert_eq!(pdfs.len(), 4);

        let shallow = discover_files(dir.path(), &DirectoryScan::default()).unwrap();
        assert_eq!(shallow.len(), 3);

        let depth_two = DirectoryScan { recursive: true, max_depth: Some(2), extension: None };
        assert_eq!(discover_files(dir.path(), &depth_two).unwrap().len(), 4);
    }

    #[test]
    fn test_discover_missing_directory() {
        let err = discover_files(Path::new("/nonexistent/dir"), &DirectoryScan::recursive())
            .unwrap_err();
        assert!(matches!(err, GlosaError::Precondition(_)));
    }
}
