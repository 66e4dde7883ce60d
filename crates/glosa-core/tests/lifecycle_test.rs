//! End-to-end cache lifecycle against the recording mock backend.

use std::path::Path;
use std::sync::Arc;

use glosa_abstraction::Part;
use glosa_core::{
    ActiveDocument, Config, DirectoryScan, Glosa, GlosaError, JsonFileRegistry, QueryRequest,
    SourceFile,
};
use glosa_models::MockBackend;
use tempfile::TempDir;

fn config_in(dir: &Path) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = dir.join("data");
    config.ingest.poll_interval_ms = 1;
    config.ingest.max_attempts = 5;
    config
}

fn glosa_with(dir: &Path, backend: Arc<MockBackend>) -> Glosa {
    let config = config_in(dir);
    let registry = Arc::new(JsonFileRegistry::new(config.storage.registry_path()));
    Glosa::new(config, backend, registry)
}

fn is_answer_file_name(name: &str) -> bool {
    name.strip_prefix("answer-")
        .and_then(|rest| rest.strip_suffix(".md"))
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

#[tokio::test]
async fn test_two_pdfs_to_answer_file() {
    let dir = TempDir::new().unwrap();
    let sources = dir.path().join("sources");
    std::fs::create_dir_all(&sources).unwrap();
    std::fs::write(sources.join("tariffs.pdf"), b"%PDF-1.4 tariffs").unwrap();
    std::fs::write(sources.join("rules.pdf"), b"%PDF-1.4 rules").unwrap();
    let invoice = dir.path().join("invoice.pdf");
    std::fs::write(&invoice, b"%PDF-1.4 invoice").unwrap();

    let backend = Arc::new(MockBackend::new().with_processing_polls(2));
    let glosa = glosa_with(dir.path(), backend.clone());

    let spec = glosa.cache_spec(None, Some("gemini-2.5-flash".to_string()), Some(3600), None);
    let record = glosa
        .setup()
        .from_directory(&sources, &DirectoryScan::recursive(), &spec)
        .await
        .unwrap();

    let records = glosa.registry().list().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0], record);
    assert!(!record.cache_handle.is_empty());
    assert_eq!(record.model, "models/gemini-2.5-flash");
    assert_eq!(record.ttl_seconds, 3600);

    let answer = glosa
        .router()
        .answer(QueryRequest::new("What is the total?").with_document(ActiveDocument::local(&invoice)))
        .await
        .unwrap();
    assert!(answer.contains("What is the total?"));

    let answers: Vec<String> = std::fs::read_dir(glosa.config().storage.answer_path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(answers.len(), 1);
    assert!(is_answer_file_name(&answers[0]), "unexpected answer file {}", answers[0]);
}

#[tokio::test]
async fn test_live_turn_never_carries_cached_parts() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("reference.pdf");
    let active = dir.path().join("active.pdf");
    std::fs::write(&source, b"reference").unwrap();
    std::fs::write(&active, b"active").unwrap();

    let backend = Arc::new(MockBackend::new());
    let glosa = glosa_with(dir.path(), backend.clone());
    glosa
        .setup()
        .from_files(&[SourceFile::from(source)], &glosa.cache_spec(None, None, None, None))
        .await
        .unwrap();

    glosa
        .router()
        .answer(QueryRequest::new("Check weights").with_document(ActiveDocument::local(&active)))
        .await
        .unwrap();

    let cached_uris: Vec<String> = backend.cache_requests()[0].contents[0]
        .parts
        .iter()
        .filter_map(Part::file_uri)
        .map(ToString::to_string)
        .collect();
    let live = &backend.generate_requests()[0];
    assert_eq!(live.contents.len(), 1);
    let live_uris: Vec<&str> = live.contents[0].parts.iter().filter_map(Part::file_uri).collect();

    assert_eq!(live_uris.len(), 1);
    assert!(!cached_uris.iter().any(|uri| uri == live_uris[0]));
    assert!(live.contents[0].parts.last().unwrap().as_text().unwrap().contains("EXCLUSIVELY"));
}

#[tokio::test]
async fn test_clear_makes_no_backend_call() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("a.txt");
    std::fs::write(&source, b"text").unwrap();

    let backend = Arc::new(MockBackend::new());
    let glosa = glosa_with(dir.path(), backend.clone());
    glosa
        .setup()
        .from_files(&[SourceFile::from(source)], &glosa.cache_spec(None, None, None, None))
        .await
        .unwrap();
    let calls_before = backend.calls();

    glosa.registry().clear().await.unwrap();

    assert_eq!(backend.calls(), calls_before);
    assert!(glosa.registry().list().await.unwrap().is_empty());
    let err = glosa.router().answer(QueryRequest::new("anything")).await.unwrap_err();
    assert!(matches!(err, GlosaError::NoCacheConfigured));
}

#[tokio::test]
async fn test_stuck_processing_times_out_without_cache() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("slow.pdf");
    std::fs::write(&source, b"slow").unwrap();

    let backend = Arc::new(MockBackend::new().with_processing_polls(u32::MAX));
    let glosa = glosa_with(dir.path(), backend.clone());

    let err = glosa
        .setup()
        .from_files(&[SourceFile::from(source)], &glosa.cache_spec(None, None, None, None))
        .await
        .unwrap_err();

    assert!(matches!(err, GlosaError::Timeout { attempts: 5, .. }));
    assert_eq!(backend.calls().create_cache, 0);
    assert!(glosa.registry().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_registry_survives_restart() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("a.md");
    std::fs::write(&source, b"# notes").unwrap();

    let first = glosa_with(dir.path(), Arc::new(MockBackend::new()));
    let record = first
        .setup()
        .from_files(&[SourceFile::from(source)], &first.cache_spec(None, None, None, None))
        .await
        .unwrap();

    let second = glosa_with(dir.path(), Arc::new(MockBackend::new()));
    assert_eq!(second.registry().resolve(None).await.unwrap(), record);
}
