//! Prompt text shared by cache setup and the query router.

/// Display name used when a cache is created without one.
pub const DEFAULT_CACHE_DISPLAY_NAME: &str = "Context_Cache";

/// System instruction stored with caches that are created without one.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "\
You are a document analysis assistant. Cached documents hold reference material: \
business rules, output formats and background knowledge.

SOURCE ISOLATION
There is a strict distinction between the CACHED CONTEXT (reference material) and \
the ACTIVE DOCUMENT (the file attached to the current question).
1. When asked to extract data, validate amounts or list items, use ONLY the active document.
2. Never fill missing values with data from the cached context unless the user \
explicitly asks to cross-check with earlier information.
3. If the active document lacks a value, answer \"Not found in the current document\".

Use the cached context only to recall preferred output formats, validate learned \
business rules and compare documents when a comparison is requested. When reporting \
a mismatch between documents, label it DISCREPANCY and quote both values.

Answer technically and concisely.";

/// Wraps `question` in the isolation instruction sent alongside active documents.
pub fn isolation_prompt(question: &str) -> String {
    format!(
        "Analyze EXCLUSIVELY the attached document(s). Ignore invoices, records or \
         documents held in the cached context.\n\nYour specific task is: {}",
        question.trim()
    )
}
