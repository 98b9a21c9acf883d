//! Content fetching through a headless browser.
//!
//! Pages are rendered by a Chromium binary run as a child process: `--dump-dom`
//! for the rendered HTML that gets hashed, `--print-to-pdf` for the stored copy.
//! Readable text for summarization is pulled out of the DOM with scraper.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

use crate::config::FetcherConfig;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("failed to launch browser '{browser}': {source}")]
    Launch {
        browser: String,
        source: std::io::Error,
    },
    #[error("navigation to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },
    #[error("browser exited with {status} for {url}: {stderr}")]
    Browser {
        url: String,
        status: String,
        stderr: String,
    },
    #[error("no content found at {0}")]
    NoContent(String),
    #[error("no PDF written for {0}")]
    NoPdf(String),
}

/// Rendered content of a page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The original URL
    pub url: String,
    /// Hex SHA-256 of `html`
    pub content_hash: String,
    /// Rendered DOM
    pub html: String,
    pub title: Option<String>,
    /// Main text content
    pub text: String,
}

impl FetchedPage {
    /// Build a page from rendered HTML, hashing it and extracting text
    pub fn from_html(url: &str, html: String) -> Self {
        let document = Html::parse_document(&html);
        let title = extract_title(&document);
        let text = extract_text(&document);
        Self {
            url: url.to_string(),
            content_hash: hash_content(html.as_bytes()),
            html,
            title,
            text,
        }
    }

    /// Text handed to the summarizer; the raw DOM when no readable text was found
    pub fn summary_text(&self) -> &str {
        if self.text.trim().is_empty() {
            &self.html
        } else {
            &self.text
        }
    }
}

/// Hex-encoded SHA-256 digest
pub fn hash_content(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Source of page content and rendered PDFs
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch rendered content and its digest
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;

    /// Render the page to a PDF at `dest`, overwriting it
    async fn render_pdf(&self, url: &str, dest: &Path) -> Result<(), FetchError>;
}

/// Fetcher backed by a headless Chromium executable
#[derive(Debug, Clone)]
pub struct BrowserFetcher {
    browser: String,
    user_agent: String,
    timeout: Duration,
}

impl BrowserFetcher {
    pub fn new(config: &FetcherConfig) -> Self {
        Self {
            browser: config.browser.clone(),
            user_agent: config.user_agent.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.browser);
        cmd.arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--hide-scrollbars")
            .arg(format!("--user-agent={}", self.user_agent))
            .arg(format!("--timeout={}", self.timeout.as_millis()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Run the browser with `url` as the final argument and collect stdout
    async fn run(&self, mut cmd: Command, url: &str) -> Result<Vec<u8>, FetchError> {
        cmd.arg(url);
        let child = cmd.spawn().map_err(|source| FetchError::Launch {
            browser: self.browser.clone(),
            source,
        })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|source| FetchError::Launch {
                browser: self.browser.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(FetchError::Browser {
                url: url.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl Fetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let mut cmd = self.command();
        cmd.arg("--dump-dom");
        let stdout = self.run(cmd, url).await?;

        let html = String::from_utf8_lossy(&stdout).into_owned();
        if html.trim().is_empty() {
            return Err(FetchError::NoContent(url.to_string()));
        }
        tracing::debug!(url, bytes = html.len(), "Fetched rendered page");
        Ok(FetchedPage::from_html(url, html))
    }

    async fn render_pdf(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        let mut cmd = self.command();
        cmd.arg("--no-pdf-header-footer")
            .arg(format!("--print-to-pdf={}", dest.display()));
        self.run(cmd, url).await?;

        // Chromium can exit cleanly without producing output
        match tokio::fs::metadata(dest).await {
            Ok(meta) if meta.len() > 0 => {
                tracing::debug!(url, path = %dest.display(), bytes = meta.len(), "Rendered PDF");
                Ok(())
            }
            _ => Err(FetchError::NoPdf(url.to_string())),
        }
    }
}

/// Staging path used while a PDF is being rendered
pub fn staging_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// Extract the page title from <title> or <h1>
fn extract_title(document: &Html) -> Option<String> {
    for tag in ["title", "h1"] {
        let Ok(selector) = Selector::parse(tag) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let title: String = element.text().collect();
            if !title.trim().is_empty() {
                return Some(title.trim().to_string());
            }
        }
    }
    None
}

const CONTENT_ROOTS: [&str; 5] = ["article", "main", "[role='main']", ".content", "#content"];
const TEXT_BLOCKS: &str = "p, h1, h2, h3, h4, h5, h6, li";
const MIN_BLOCK_CHARS: usize = 20;

/// Readable text of the first non-empty content root, else of the whole page
fn extract_text(document: &Html) -> String {
    let Ok(blocks) = Selector::parse(TEXT_BLOCKS) else {
        return String::new();
    };

    CONTENT_ROOTS
        .iter()
        .filter_map(|root| Selector::parse(root).ok())
        .filter_map(|root| document.select(&root).next())
        .map(|root| join_blocks(root.select(&blocks)))
        .find(|text| !text.is_empty())
        .unwrap_or_else(|| join_blocks(document.select(&blocks)))
}

/// One paragraph per text block, whitespace collapsed; short blocks are dropped
fn join_blocks<'a>(blocks: impl Iterator<Item = ElementRef<'a>>) -> String {
    blocks
        .map(|block| {
            block
                .text()
                .flat_map(str::split_whitespace)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|text| text.len() > MIN_BLOCK_CHARS)
        .collect::<Vec<_>>()
        .join("\n\n")
}
