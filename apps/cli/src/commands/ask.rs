//! Ask command implementation.

use std::path::PathBuf;

use glosa_core::{ActiveDocument, Config, Glosa, QueryRequest};

/// Arguments of `glosa ask`.
#[derive(Debug)]
pub struct AskArgs {
    pub question: String,
    pub cache: Option<String>,
    pub model: Option<String>,
    pub files: Vec<PathBuf>,
    pub urls: Vec<String>,
    pub context: Option<String>,
}

/// Execute the ask command and print the answer.
pub async fn execute(config: Config, args: AskArgs) -> anyhow::Result<()> {
    if args.question.trim().is_empty() {
        anyhow::bail!("question is required");
    }
    for path in &args.files {
        if !path.is_file() {
            anyhow::bail!("File not found: {}", path.display());
        }
    }

    let mut request = QueryRequest::new(args.question);
    if let Some(cache) = args.cache {
        request = request.with_cache(cache);
    }
    if let Some(model) = args.model {
        request = request.with_model(model);
    }
    if let Some(context) = args.context {
        request = request.with_context(context);
    }
    for path in args.files {
        request = request.with_document(ActiveDocument::local(path));
    }
    for url in args.urls {
        request = request.with_document(ActiveDocument::remote(url));
    }

    let glosa = Glosa::from_config(config)?;
    let answer = glosa.router().answer(request).await?;
    println!("{}", answer);

    Ok(())
}
