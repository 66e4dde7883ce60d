//! Markdown archive of generated answers.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

use crate::error::Result;

/// Writes answers as `answer-<millis>.md` files into one directory.
#[derive(Debug, Clone)]
pub struct AnswerArchive {
    dir: PathBuf,
}

impl AnswerArchive {
    /// Archive rooted at `dir` (created on first write).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory answers are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persists `text` and returns the path written.
    ///
    /// Literal `\n`, `\"` and `\t` sequences are turned back into the
    /// characters they stand for. If a file for the current millisecond
    /// already exists the stamp is bumped until a free name is found.
    pub async fn write(&self, text: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let markdown = unescape(text);

        let mut stamp = Utc::now().timestamp_millis();
        loop {
            let path = self.dir.join(format!("answer-{stamp}.md"));
            match tokio::fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => {
                    drop(file);
                    tokio::fs::write(&path, markdown.as_bytes()).await?;
                    debug!(path = %path.display(), "Answer archived");
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => stamp += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn unescape(text: &str) -> String {
    text.replace("\\n", "\n").replace("\\\"", "\"").replace("\\t", "\t")
}
