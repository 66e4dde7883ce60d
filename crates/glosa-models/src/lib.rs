//! Backend implementations for Glosa.
//!
//! This crate provides concrete implementations of the `GenerativeBackend` trait.
//!
//! # Supported Providers
//!
//! - **Mock**: Testing and development (recording, in-memory)
//! - **Gemini**: Google's Gemini REST API (API key required)

pub mod gemini;

use async_trait::async_trait;
use glosa_abstraction::{
    BackendError, CachedContent, CreateCacheRequest, FileState, FileUpload, GenerateRequest,
    GenerateResponse, GenerativeBackend, RemoteFile, TokenUsage, normalize_model_id,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

pub use gemini::GeminiBackend;

/// Per-operation call counters recorded by [`MockBackend`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockCalls {
    /// Number of `upload_file` calls.
    pub upload_file: usize,
    /// Number of `get_file` calls.
    pub get_file: usize,
    /// Number of `create_cache` calls.
    pub create_cache: usize,
    /// Number of `generate` calls.
    pub generate: usize,
}

impl MockCalls {
    /// Total number of remote calls of any kind.
    pub fn total(&self) -> usize {
        self.upload_file + self.get_file + self.create_cache + self.generate
    }
}

#[derive(Debug)]
struct MockFile {
    remote: RemoteFile,
    polls_left: u32,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u64,
    files: HashMap<String, MockFile>,
    uploads: Vec<FileUpload>,
    cache_requests: Vec<CreateCacheRequest>,
    generate_requests: Vec<GenerateRequest>,
    calls: MockCalls,
}

/// A recording, in-memory implementation of `GenerativeBackend`.
///
/// Every request is kept so tests can assert on exactly what would have been
/// sent over the wire. Behaviour is tuned with the `with_*` builders.
#[derive(Debug)]
pub struct MockBackend {
    state: Mutex<MockState>,
    processing_polls: u32,
    final_state: FileState,
    upload_error: Option<BackendError>,
    cache_error: Option<BackendError>,
    answer: Option<Option<String>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Creates a mock whose uploads are `ACTIVE` immediately.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            processing_polls: 0,
            final_state: FileState::Active,
            upload_error: None,
            cache_error: None,
            answer: None,
        }
    }

    /// Uploaded files report `PROCESSING` for `polls` status checks before
    /// reaching their final state. `u32::MAX` never finishes.
    #[must_use]
    pub fn with_processing_polls(mut self, polls: u32) -> Self {
        self.processing_polls = polls;
        self
    }

    /// State files settle in once processing is over.
    #[must_use]
    pub fn with_final_state(mut self, state: FileState) -> Self {
        self.final_state = state;
        self
    }

    /// Every upload fails with `error`.
    #[must_use]
    pub fn with_upload_error(mut self, error: BackendError) -> Self {
        self.upload_error = Some(error);
        self
    }

    /// Every cache creation fails with `error`.
    #[must_use]
    pub fn with_cache_error(mut self, error: BackendError) -> Self {
        self.cache_error = Some(error);
        self
    }

    /// Fixed answer text; `None` simulates a response without text.
    #[must_use]
    pub fn with_answer(mut self, answer: Option<String>) -> Self {
        self.answer = Some(answer);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the call counters.
    pub fn calls(&self) -> MockCalls {
        self.lock().calls
    }

    /// Every upload received, in order.
    pub fn uploads(&self) -> Vec<FileUpload> {
        self.lock().uploads.clone()
    }

    /// Every cache-creation request received, in order.
    pub fn cache_requests(&self) -> Vec<CreateCacheRequest> {
        self.lock().cache_requests.clone()
    }

    /// Every generation request received, in order.
    pub fn generate_requests(&self) -> Vec<GenerateRequest> {
        self.lock().generate_requests.clone()
    }
}

#[async_trait]
impl GenerativeBackend for MockBackend {
    async fn upload_file(&self, upload: FileUpload) -> Result<RemoteFile, BackendError> {
        let mut state = self.lock();
        state.calls.upload_file += 1;
        if let Some(error) = &self.upload_error {
            return Err(error.clone());
        }

        state.next_id += 1;
        let name = format!("files/mock-{}", state.next_id);
        let remote = RemoteFile {
            uri: format!("https://mock.glosa.local/v1beta/{name}"),
            name: name.clone(),
            mime_type: upload.mime_type.clone(),
            state: if self.processing_polls == 0 { self.final_state } else { FileState::Processing },
            display_name: upload.display_name.clone(),
        };
        debug!(file_name = %name, state = ?remote.state, "MockBackend accepted upload");

        state.uploads.push(upload);
        state
            .files
            .insert(name, MockFile { remote: remote.clone(), polls_left: self.processing_polls });
        Ok(remote)
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile, BackendError> {
        let mut state = self.lock();
        state.calls.get_file += 1;
        let final_state = self.final_state;
        let file = state
            .files
            .get_mut(name)
            .ok_or_else(|| BackendError::NotFound(format!("Unknown file: {name}")))?;

        if file.polls_left > 0 {
            if file.polls_left != u32::MAX {
                file.polls_left -= 1;
            }
            file.remote.state = FileState::Processing;
        } else {
            file.remote.state = final_state;
        }
        Ok(file.remote.clone())
    }

    async fn create_cache(
        &self,
        request: CreateCacheRequest,
    ) -> Result<CachedContent, BackendError> {
        let mut state = self.lock();
        state.calls.create_cache += 1;
        if let Some(error) = &self.cache_error {
            return Err(error.clone());
        }

        state.next_id += 1;
        let cached = CachedContent {
            name: format!("cachedContents/mock-{}", state.next_id),
            model: normalize_model_id(&request.model),
            display_name: request.display_name.clone(),
            expire_time: None,
            total_token_count: Some(0),
        };
        state.cache_requests.push(request);
        Ok(cached)
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, BackendError> {
        let mut state = self.lock();
        state.calls.generate += 1;

        let text = match &self.answer {
            Some(fixed) => fixed.clone(),
            None => {
                let last_text = request
                    .contents
                    .iter()
                    .flat_map(|content| content.parts.iter())
                    .filter_map(|part| part.as_text())
                    .next_back()
                    .unwrap_or_default();
                Some(format!("Mock answer for: {}", last_text.trim()))
            }
        };
        let model_version = Some(normalize_model_id(&request.model));
        state.generate_requests.push(request);

        Ok(GenerateResponse { text, model_version, usage: Some(TokenUsage::default()) })
    }

    fn provider(&self) -> &str {
        "mock"
    }
}
