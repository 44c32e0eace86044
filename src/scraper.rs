//! Web scraping module for chapter extraction.
//!
//! Uses reqwest for fetching and scraper for HTML parsing. Every fetch writes
//! a text copy and an HTML snapshot under the raw directory.

use crate::config::Config;
use crate::version::Chapter;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// User-Agent string identifying this scraper
const USER_AGENT: &str = concat!("redraft/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("failed to fetch URL: {0}")]
    FetchError(#[from] reqwest::Error),
    #[error("no element matching {0} on page")]
    MissingContent(String),
    #[error("invalid selector: {0}")]
    InvalidSelector(String),
    #[error("failed to write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Renders a page and extracts its chapter
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Chapter, ScraperError>;
}

/// Fetches pages over HTTP and pulls text out of one content region
pub struct HttpFetcher {
    content_selector: String,
    raw_dir: PathBuf,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(content_selector: impl Into<String>, raw_dir: impl Into<PathBuf>) -> Self {
        Self {
            content_selector: content_selector.into(),
            raw_dir: raw_dir.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: Duration::from_secs(config.fetch.timeout_secs),
            ..Self::new(config.fetch.content_selector.clone(), config.raw_dir())
        }
    }

    /// Create a configured HTTP client for scraping
    fn create_client(&self) -> Result<Client, reqwest::Error> {
        Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout)
            .build()
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Chapter, ScraperError> {
        let parsed = url::Url::parse(url).map_err(|source| ScraperError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        tracing::info!(%parsed, "fetching chapter");

        // The client lives only for this fetch
        let html = {
            let client = self.create_client()?;
            let response = client.get(parsed.clone()).send().await?.error_for_status()?;
            response.text().await?
        };

        let extracted = extract_chapter(&html, &self.content_selector)?;
        let title = slugify(extracted.title.as_deref().unwrap_or("untitled"));
        let snapshot_path = write_artifacts(&self.raw_dir, &title, &extracted.text, &html)?;

        tracing::info!(%title, chars = extracted.text.len(), snapshot = %snapshot_path.display(), "chapter fetched");

        Ok(Chapter {
            url: url.to_string(),
            title,
            text: extracted.text,
            snapshot_path,
        })
    }
}

/// Title and text pulled out of a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub title: Option<String>,
    pub text: String,
}

/// Extract the title and the text of the content region from raw HTML
pub fn extract_chapter(html: &str, content_selector: &str) -> Result<Extracted, ScraperError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(content_selector)
        .map_err(|e| ScraperError::InvalidSelector(format!("{content_selector}: {e}")))?;

    let region = document
        .select(&selector)
        .next()
        .ok_or_else(|| ScraperError::MissingContent(content_selector.to_string()))?;

    let text = inner_text(region);
    if text.trim().is_empty() {
        return Err(ScraperError::MissingContent(content_selector.to_string()));
    }

    Ok(Extracted {
        title: extract_title(&document),
        text,
    })
}

/// Extract the page title from <title> or <h1>
fn extract_title(document: &Html) -> Option<String> {
    ["title", "h1"].iter().find_map(|tag| {
        let selector = Selector::parse(tag).ok()?;
        let element = document.select(&selector).next()?;
        let title: String = element.text().collect();
        let title = title.trim();
        (!title.is_empty()).then(|| title.to_string())
    })
}

/// Visible text of an element, one line per block, skipping scripts and styles
fn inner_text(element: ElementRef<'_>) -> String {
    const BLOCKS: &[&str] = &[
        "p", "div", "li", "br", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "dd", "dt", "blockquote",
    ];
    let mut out = String::new();
    collect_text(element, BLOCKS, &mut out);

    out.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(element: ElementRef<'_>, blocks: &[&str], out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(el) = ElementRef::wrap(child) {
            let name = el.value().name();
            if matches!(name, "script" | "style" | "noscript") {
                continue;
            }
            let block = blocks.contains(&name);
            if block {
                out.push('\n');
            }
            collect_text(el, blocks, out);
            if block {
                out.push('\n');
            }
        }
    }
}

/// Filesystem-safe slug: whitespace and path separators become underscores
pub fn slugify(title: &str) -> String {
    title
        .trim()
        .chars()
        .map(|c| {
            if c.is_whitespace() || c == '/' || c == '\\' {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Write `<slug>.txt` and `<slug>.html`, returning the snapshot path
fn write_artifacts(dir: &Path, slug: &str, text: &str, html: &str) -> Result<PathBuf, ScraperError> {
    let write = |path: PathBuf, contents: &str| {
        std::fs::write(&path, contents)
            .map(|_| path.clone())
            .map_err(|source| ScraperError::WriteError { path, source })
    };

    std::fs::create_dir_all(dir).map_err(|source| ScraperError::WriteError {
        path: dir.to_path_buf(),
        source,
    })?;
    write(dir.join(format!("{slug}.txt")), text)?;
    write(dir.join(format!("{slug}.html")), html)
}
