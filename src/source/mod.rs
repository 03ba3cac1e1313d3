//! Source documents ingested during graph construction.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use scraper::{Html, Node};
use url::Url;

use crate::error::{KgserveError, Result};

/// Sources fetched concurrently while loading a batch
const LOAD_CONCURRENCY: usize = 4;

/// Reference to an external document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Url(Url),
}

impl Source {
    /// Wrap a URL string as a source
    pub fn url(raw: &str) -> Result<Self> {
        Url::parse(raw.trim())
            .map(Source::Url)
            .map_err(|e| KgserveError::Source(format!("invalid URL {:?}: {}", raw, e)))
    }

    pub fn location(&self) -> &str {
        match self {
            Source::Url(url) => url.as_str(),
        }
    }
}

/// Loaded text of a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub source: String,
    pub content: String,
}

/// Turns sources into documents
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self, source: &Source) -> Result<Document>;
}

/// Load every source, preserving input order. The first failure aborts the batch.
pub async fn load_documents(loader: &dyn DocumentLoader, sources: &[Source]) -> Result<Vec<Document>> {
    // Futures are built up front so no borrowing closure is held across the await
    let loads: Vec<_> = sources.iter().map(|source| loader.load(source)).collect();
    stream::iter(loads).buffered(LOAD_CONCURRENCY).try_collect().await
}

/// Fetches sources over HTTP(S)
pub struct HttpLoader {
    client: Client,
    max_chars: usize,
}

impl HttpLoader {
    pub fn new(max_chars: usize) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("kgserve/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, max_chars })
    }
}

#[async_trait]
impl DocumentLoader for HttpLoader {
    async fn load(&self, source: &Source) -> Result<Document> {
        let Source::Url(url) = source;
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(KgserveError::Source(format!("GET {} returned {}", url, status)));
        }

        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase().contains("html"))
            .unwrap_or(false);
        let body = response.text().await?;

        let text = if is_html { html_to_text(&body) } else { body };
        let content = truncate_chars(text.trim(), self.max_chars);
        log::debug!("Loaded {} ({} chars)", url, content.chars().count());

        Ok(Document {
            source: url.to_string(),
            content,
        })
    }
}

/// Visible text of an HTML document, one text run per line.
pub fn html_to_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut out = String::new();

    for node in doc.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name()))
            .map(|name| matches!(name, "script" | "style" | "noscript" | "template"))
            .unwrap_or(false);
        if hidden {
            continue;
        }
        let s = text.trim();
        if s.is_empty() {
            continue;
        }
        out.push_str(s);
        out.push('\n');
    }
    out
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
