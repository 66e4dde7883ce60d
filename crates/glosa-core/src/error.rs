//! Error types for Glosa Core.

use glosa_abstraction::{BackendError, FileState};
use thiserror::Error;

/// Core error type for Glosa operations.
#[derive(Error, Debug)]
pub enum GlosaError {
    /// A required input is missing or invalid; no remote call was made.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// The backend rejected a file upload.
    #[error("Upload failed for {path}: {source}")]
    Upload {
        /// Local path of the rejected file.
        path: String,
        /// Backend error behind the rejection.
        #[source]
        source: BackendError,
    },

    /// The backend reported a terminal state other than `ACTIVE`.
    #[error("File {name} is not usable (state {state:?})")]
    FileNotReady {
        /// Remote file name.
        name: String,
        /// Last reported state.
        state: FileState,
    },

    /// The file was still processing after every allowed poll.
    #[error("File {name} still processing after {attempts} status checks")]
    Timeout {
        /// Remote file name.
        name: String,
        /// Number of status checks performed.
        attempts: u32,
    },

    /// The backend rejected cache creation.
    #[error("Cache creation failed (check that the model supports explicit caching): {0}")]
    CacheCreation(String),

    /// The registry holds no cache records.
    #[error("No cache configured. Run cache setup first.")]
    NoCacheConfigured,

    /// An explicit cache handle is not present in the registry.
    #[error("Cache not found: {0}")]
    CacheNotFound(String),

    /// A request named a model other than the one its cache is bound to.
    #[error("Cache {cache} is bound to {cache_model}, not {requested}")]
    ModelMismatch {
        /// Cache handle.
        cache: String,
        /// Model the cache was created for.
        cache_model: String,
        /// Model the request asked for.
        requested: String,
    },

    /// The rules manifest could not be parsed.
    #[error("Invalid rules manifest: {0}")]
    Manifest(String),

    /// A remote active document could not be downloaded.
    #[error("Failed to fetch {url}: {reason}")]
    Fetch {
        /// Document URL.
        url: String,
        /// Why the download failed.
        reason: String,
    },

    /// The local registry could not be read or written.
    #[error("Registry error: {0}")]
    Registry(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend errors outside of upload and cache creation
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GlosaError {
    /// Whether the error is caused by the caller's input rather than by the
    /// backend or the server. These map to `400`-class responses.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Precondition(_)
                | Self::NoCacheConfigured
                | Self::CacheNotFound(_)
                | Self::ModelMismatch { .. }
                | Self::Manifest(_)
        )
    }
}

/// Result type alias for Glosa operations.
pub type Result<T> = std::result::Result<T, GlosaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert!(GlosaError::Precondition("question is required".to_string()).is_client_error());
        assert!(GlosaError::NoCacheConfigured.is_client_error());
        assert!(GlosaError::CacheNotFound("cachedContents/x".to_string()).is_client_error());
        assert!(
            GlosaError::ModelMismatch {
                cache: "c".to_string(),
                cache_model: "models/a".to_string(),
                requested: "models/b".to_string(),
            }
            .is_client_error()
        );
    }

    #[test]
    fn test_server_errors() {
        assert!(!GlosaError::CacheCreation("rejected".to_string()).is_client_error());
        assert!(
            !GlosaError::Timeout { name: "files/a".to_string(), attempts: 60 }.is_client_error()
        );
        let backend: GlosaError = BackendError::RequestError("down".to_string()).into();
        assert!(!backend.is_client_error());
    }

    #[test]
    fn test_glosa_error_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: GlosaError = io_err.into();
        match err {
            GlosaError::Io(_) => {}
            _ => panic!("Expected Io error variant"),
        }
    }

    #[test]
    fn test_upload_error_display_keeps_backend_message() {
        let err = GlosaError::Upload {
            path: "data/a.pdf".to_string(),
            source: BackendError::ResponseError { status: 413, message: "too large".to_string() },
        };
        let text = err.to_string();
        assert!(text.contains("data/a.pdf"));
        assert!(text.contains("too large"));
    }
}
