//! Document synchronization.
//!
//! [`SyncEngine::sync`] reconciles one URL against its stored document:
//!
//! | stored? | same hash? | result |
//! |---|---|---|
//! | no | - | render, summarize, insert, persist: `added` |
//! | yes | yes | nothing at all: `unchanged` |
//! | yes | no | re-render, re-summarize, update in place, persist: `updated` |
//!
//! The summarizer runs exactly once per `added`/`updated` and never for
//! `unchanged`. Any failure aborts before the store is touched.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::agent::{AgentError, Summarizer, SummaryInput};
use crate::fetcher::{hash_content, staging_path, FetchError, Fetcher};
use crate::storage::{pdf_file_name, ContentUpdate, Document, DocumentStore, StorageError};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Error computing content hash: {0}")]
    Fetch(#[source] FetchError),
    #[error("Error converting URL to PDF: {0}")]
    Render(#[source] FetchError),
    #[error("summarization failed: {0}")]
    Summarize(#[from] AgentError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("PDF file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("document not found: {0}")]
    NotFound(String),
}

/// Outcome label of a sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Added,
    Unchanged,
    Updated,
    Error,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SyncStatus::Added => "added",
            SyncStatus::Unchanged => "unchanged",
            SyncStatus::Updated => "updated",
            SyncStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// A successful sync and the document it left in the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub status: SyncStatus,
    pub document: Document,
}

/// Flattened `(status, id or error detail)` result, for reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub url: String,
    pub status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SyncReport {
    pub fn new(url: &str, result: &Result<SyncOutcome, SyncError>) -> Self {
        match result {
            Ok(outcome) => Self {
                url: url.to_string(),
                status: outcome.status,
                id: Some(outcome.document.id.clone()),
                detail: None,
            },
            Err(e) => Self {
                url: url.to_string(),
                status: SyncStatus::Error,
                id: None,
                detail: Some(e.to_string()),
            },
        }
    }
}

/// Drives fetcher, summarizer and store for document changes.
pub struct SyncEngine {
    store: Arc<DocumentStore>,
    fetcher: Arc<dyn Fetcher>,
    summarizer: Arc<dyn Summarizer>,
    pdf_dir: PathBuf,
}

impl SyncEngine {
    pub fn new(
        store: Arc<DocumentStore>,
        fetcher: Arc<dyn Fetcher>,
        summarizer: Arc<dyn Summarizer>,
        pdf_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            fetcher,
            summarizer,
            pdf_dir: pdf_dir.into(),
        }
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    pub fn summarizer(&self) -> &Arc<dyn Summarizer> {
        &self.summarizer
    }

    pub fn pdf_dir(&self) -> &Path {
        &self.pdf_dir
    }

    /// Absolute path of a document's PDF
    pub fn pdf_path(&self, doc: &Document) -> PathBuf {
        self.pdf_dir.join(&doc.pdf_file)
    }

    /// Add, update or leave alone the document for `url`.
    pub async fn sync(&self, url: &str) -> Result<SyncOutcome, SyncError> {
        let mut guard = self.store.lock().await;
        let existing = guard.documents().find_by_url(url).cloned();

        let page = self.fetcher.fetch(url).await.map_err(SyncError::Fetch)?;

        match existing {
            Some(doc) if doc.content_hash == page.content_hash => {
                tracing::debug!(url, id = %doc.id, "Content unchanged");
                Ok(SyncOutcome {
                    status: SyncStatus::Unchanged,
                    document: doc,
                })
            }
            Some(doc) => {
                let dest = self.pdf_path(&doc);
                let staging = staging_path(&dest);
                let description = self
                    .render_and_summarize(url, &staging, page.summary_text())
                    .await?;

                let update = ContentUpdate {
                    content_hash: page.content_hash.clone(),
                    description,
                };
                let updated = guard
                    .transact(|docs| docs.update(&doc.id, update).map(Document::clone))
                    .await;
                let document = match updated {
                    Ok(document) => document,
                    Err(e) => {
                        remove_pdf(&staging).await;
                        return Err(e.into());
                    }
                };
                tokio::fs::rename(&staging, &dest).await?;

                tracing::info!(url, id = %document.id, "Document updated");
                Ok(SyncOutcome {
                    status: SyncStatus::Updated,
                    document,
                })
            }
            None => {
                let id = Uuid::new_v4().to_string();
                let dest = self.pdf_dir.join(pdf_file_name(&id));
                let staging = staging_path(&dest);
                let description = self
                    .render_and_summarize(url, &staging, page.summary_text())
                    .await?;
                tokio::fs::rename(&staging, &dest).await?;

                let mut document =
                    Document::new(id, url.to_string(), page.content_hash.clone(), description);
                document.title = page.title.clone();

                let inserted = document.clone();
                if let Err(e) = guard.transact(|docs| docs.insert(inserted)).await {
                    remove_pdf(&dest).await;
                    return Err(e.into());
                }

                tracing::info!(url, id = %document.id, "Document added");
                Ok(SyncOutcome {
                    status: SyncStatus::Added,
                    document,
                })
            }
        }
    }

    /// Render into `staging` and summarize; the caller moves the PDF into place.
    ///
    /// On failure the staging file is removed.
    async fn render_and_summarize(
        &self,
        url: &str,
        staging: &Path,
        text: &str,
    ) -> Result<String, SyncError> {
        tokio::fs::create_dir_all(&self.pdf_dir).await?;

        if let Err(e) = self.fetcher.render_pdf(url, staging).await {
            tracing::warn!(url, error = %e, "PDF rendering failed");
            remove_pdf(staging).await;
            return Err(SyncError::Render(e));
        }

        let description = match self.summarizer.summarize(SummaryInput::Text(text)).await {
            Ok(description) => description,
            Err(e) => {
                tracing::warn!(url, error = %e, "Summarization failed");
                remove_pdf(staging).await;
                return Err(e.into());
            }
        };

        Ok(description)
    }

    /// Store an uploaded PDF with summary and metadata generated immediately.
    pub async fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<Document, SyncError> {
        let mut guard = self.store.lock().await;

        let id = Uuid::new_v4().to_string();
        let mut document = Document::new(
            id.clone(),
            format!("upload://{}/{}", id, file_name),
            hash_content(bytes),
            String::new(),
        );
        let dest = self.pdf_path(&document);

        tokio::fs::create_dir_all(&self.pdf_dir).await?;
        tokio::fs::write(&dest, bytes).await?;

        let described = async {
            let input = SummaryInput::File(&dest);
            let description = self.summarizer.summarize(input).await?;
            let metadata = self.summarizer.extract_metadata(input).await?;
            Ok::<_, AgentError>((description, metadata))
        }
        .await;

        let (description, metadata) = match described {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(file_name, error = %e, "Upload summarization failed");
                remove_pdf(&dest).await;
                return Err(e.into());
            }
        };

        document.description = description;
        document.title = metadata.title.clone().or_else(|| Some(file_name.to_string()));
        document.date = metadata.date.clone();
        document.authors = metadata.authors();
        document.tags = metadata.tags();

        let inserted = document.clone();
        if let Err(e) = guard.transact(|docs| docs.insert(inserted)).await {
            remove_pdf(&dest).await;
            return Err(e.into());
        }

        tracing::info!(id = %document.id, file_name, "Document uploaded");
        Ok(document)
    }

    /// Delete a document and its PDF
    pub async fn delete(&self, id: &str) -> Result<Document, SyncError> {
        let mut guard = self.store.lock().await;
        let removed = guard
            .transact(|docs| {
                docs.delete(id)
                    .ok_or_else(|| StorageError::NotFound(id.to_string()))
            })
            .await;

        let document = match removed {
            Ok(document) => document,
            Err(StorageError::NotFound(id)) => return Err(SyncError::NotFound(id)),
            Err(e) => return Err(e.into()),
        };

        remove_pdf(&self.pdf_path(&document)).await;
        tracing::info!(id = %document.id, url = %document.url, "Document deleted");
        Ok(document)
    }
}

async fn remove_pdf(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Could not remove PDF"),
    }
}
