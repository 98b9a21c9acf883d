//! Shared test doubles: a scripted fetcher, a counting summarizer, and a
//! persistence backend that counts saves.

#![allow(dead_code)]

use async_trait::async_trait;
use docqa::agent::{AgentError, Summarizer, SummaryInput};
use docqa::fetcher::{FetchError, FetchedPage, Fetcher};
use docqa::storage::{DocumentStore, Documents, JsonFile, Persistence, StorageError};
use docqa::{Metadata, SyncEngine};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Serves HTML from an in-memory map; unknown URLs fail to fetch.
#[derive(Default)]
pub struct FakeFetcher {
    pages: Mutex<HashMap<String, String>>,
    failing_renders: Mutex<HashSet<String>>,
    pub fetches: AtomicUsize,
    pub renders: AtomicUsize,
}

impl FakeFetcher {
    pub fn set_page(&self, url: &str, html: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), html.to_string());
    }

    pub fn fail_render(&self, url: &str) {
        self.failing_renders.lock().unwrap().insert(url.to_string());
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let html = self
            .pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NoContent(url.to_string()))?;
        Ok(FetchedPage::from_html(url, html))
    }

    async fn render_pdf(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        if self.failing_renders.lock().unwrap().contains(url) {
            return Err(FetchError::Browser {
                url: url.to_string(),
                status: "exit status: 1".to_string(),
                stderr: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            });
        }
        let html = self.pages.lock().unwrap().get(url).cloned().unwrap_or_default();
        std::fs::write(dest, format!("%PDF-1.4\n{}", html)).unwrap();
        Ok(())
    }
}

/// Counts calls; summaries are numbered so consecutive ones differ.
#[derive(Default)]
pub struct FakeSummarizer {
    pub summaries: AtomicUsize,
    pub metadata_calls: AtomicUsize,
    pub fail: AtomicBool,
    completion: Mutex<String>,
    pub last_prompt: Mutex<Option<String>>,
}

impl FakeSummarizer {
    pub fn summaries(&self) -> usize {
        self.summaries.load(Ordering::SeqCst)
    }

    pub fn set_completion(&self, raw: &str) {
        *self.completion.lock().unwrap() = raw.to_string();
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), AgentError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AgentError::RequestFailed("quota exceeded".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn summarize(&self, input: SummaryInput<'_>) -> Result<String, AgentError> {
        self.check()?;
        let n = self.summaries.fetch_add(1, Ordering::SeqCst) + 1;
        let len = match input {
            SummaryInput::Text(text) => text.len(),
            SummaryInput::File(path) => std::fs::metadata(path).map(|m| m.len()).unwrap_or(0) as usize,
        };
        Ok(format!("summary #{} of {} bytes", n, len))
    }

    async fn extract_metadata(&self, _input: SummaryInput<'_>) -> Result<Metadata, AgentError> {
        self.check()?;
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Metadata {
            title: Some("Ethereum Scaling Strategies".to_string()),
            date: Some("2023-10-15".to_string()),
            authors: Some(vec!["Vitalik Buterin".to_string()]),
            short_description: Some("Scaling overview".to_string()),
            tags: Some(vec!["rollups".to_string(), "sharding".to_string()]),
        })
    }

    async fn complete(&self, prompt: &str) -> Result<String, AgentError> {
        self.check()?;
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        Ok(self.completion.lock().unwrap().clone())
    }
}

/// JSON file backend that counts saves and can be told to fail them
pub struct CountingFile {
    inner: JsonFile,
    pub saves: Arc<AtomicUsize>,
    pub fail: Arc<AtomicBool>,
}

impl Persistence for CountingFile {
    fn load(&self) -> Result<Documents, StorageError> {
        self.inner.load()
    }

    fn save(&self, documents: &Documents) -> Result<(), StorageError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("disk full")));
        }
        self.inner.save(documents)
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub fetcher: Arc<FakeFetcher>,
    pub summarizer: Arc<FakeSummarizer>,
    pub saves: Arc<AtomicUsize>,
    pub failing_saves: Arc<AtomicBool>,
    pub engine: Arc<SyncEngine>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let saves = Arc::new(AtomicUsize::new(0));
        let failing_saves = Arc::new(AtomicBool::new(false));
        let store = DocumentStore::open(CountingFile {
            inner: JsonFile::new(dir.path().join("documents.json")),
            saves: saves.clone(),
            fail: failing_saves.clone(),
        })
        .expect("Failed to open store");

        let fetcher = Arc::new(FakeFetcher::default());
        let summarizer = Arc::new(FakeSummarizer::default());
        let engine = Arc::new(SyncEngine::new(
            Arc::new(store),
            fetcher.clone(),
            summarizer.clone(),
            dir.path().to_path_buf(),
        ));

        Self {
            dir,
            fetcher,
            summarizer,
            saves,
            failing_saves,
            engine,
        }
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn set_failing_saves(&self, fail: bool) {
        self.failing_saves.store(fail, Ordering::SeqCst);
    }

    pub fn documents_file(&self) -> PathBuf {
        self.dir.path().join("documents.json")
    }

    /// Names of the PDF files (finished or staged) in the storage directory
    pub fn pdf_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.contains(".pdf"))
            .collect();
        names.sort();
        names
    }
}

pub fn page(body: &str) -> String {
    format!(
        "<html><head><title>Test page</title></head><body><article><p>{}</p></article></body></html>",
        body
    )
}
