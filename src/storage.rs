//! JSON-file storage for document records.
//!
//! The whole store is one JSON object keyed by document id. It is loaded once at
//! startup and rewritten in full after every mutation through a [`Persistence`]
//! backend. All mutations go through [`StoreGuard::transact`], which persists a
//! modified copy before committing it, so a failed write leaves memory and disk
//! unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("store file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("a document for {0} already exists")]
    DuplicateUrl(String),
    #[error("document id {0} is already in use")]
    DuplicateId(String),
}

/// A stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// Source identity; unique among stored documents
    pub url: String,
    /// PDF file name, relative to the storage directory
    pub pdf_file: String,
    /// Hex digest of the content `description` was generated from
    pub content_hash: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Create a new document for a source
    pub fn new(id: String, url: String, content_hash: String, description: String) -> Self {
        Self {
            pdf_file: pdf_file_name(&id),
            id,
            url,
            content_hash,
            description,
            title: None,
            date: None,
            authors: Vec::new(),
            tags: Vec::new(),
            created_at: Some(Utc::now()),
            updated_at: None,
        }
    }
}

/// PDF file name for a document id
pub fn pdf_file_name(id: &str) -> String {
    format!("{}.pdf", id)
}

/// Replacement content for an existing document
#[derive(Debug, Clone)]
pub struct ContentUpdate {
    pub content_hash: String,
    pub description: String,
}

/// In-memory document map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Documents {
    by_id: BTreeMap<String, Document>,
}

impl Documents {
    pub fn from_map(by_id: BTreeMap<String, Document>) -> Self {
        Self { by_id }
    }

    pub fn as_map(&self) -> &BTreeMap<String, Document> {
        &self.by_id
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.by_id.get(id)
    }

    /// All documents in id order
    pub fn list(&self) -> Vec<Document> {
        self.by_id.values().cloned().collect()
    }

    /// Linear scan for the first document with this URL
    pub fn find_by_url(&self, url: &str) -> Option<&Document> {
        self.by_id.values().find(|doc| doc.url == url)
    }

    /// Insert a new document, rejecting a reused id or an already stored URL
    pub fn insert(&mut self, doc: Document) -> Result<(), StorageError> {
        if self.by_id.contains_key(&doc.id) {
            return Err(StorageError::DuplicateId(doc.id));
        }
        if self.find_by_url(&doc.url).is_some() {
            return Err(StorageError::DuplicateUrl(doc.url));
        }
        self.by_id.insert(doc.id.clone(), doc);
        Ok(())
    }

    /// Replace hash and description together
    pub fn update(&mut self, id: &str, update: ContentUpdate) -> Result<&Document, StorageError> {
        let doc = self
            .by_id
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        doc.content_hash = update.content_hash;
        doc.description = update.description;
        doc.updated_at = Some(Utc::now());
        Ok(doc)
    }

    /// Remove a document; the caller owns deleting its PDF
    pub fn delete(&mut self, id: &str) -> Option<Document> {
        self.by_id.remove(id)
    }
}

/// Where the document map lives between process runs
pub trait Persistence: Send + Sync {
    /// Called from a blocking thread while the store lock is held
    fn load(&self) -> Result<Documents, StorageError>;
    fn save(&self, documents: &Documents) -> Result<(), StorageError>;
}

/// Store persisted as a single pretty-printed JSON file
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Persistence for JsonFile {
    /// An absent file is an empty store
    fn load(&self) -> Result<Documents, StorageError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Documents::from_map(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Documents::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, documents: &Documents) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(documents.as_map())?;

        // Write to a sibling temp file, then rename over the store
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &bytes)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// Owned document store with a single-writer lock.
pub struct DocumentStore {
    documents: Mutex<Documents>,
    backend: Arc<dyn Persistence>,
}

impl DocumentStore {
    /// Load the store from its backend
    pub fn open(backend: impl Persistence + 'static) -> Result<Self, StorageError> {
        let documents = backend.load()?;
        tracing::info!(documents = documents.len(), "Document store loaded");
        Ok(Self {
            documents: Mutex::new(documents),
            backend: Arc::new(backend),
        })
    }

    /// Open the JSON store at `path`
    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        Self::open(JsonFile::new(path))
    }

    /// Take the store lock for a read-modify-write-persist sequence
    pub async fn lock(&self) -> StoreGuard<'_> {
        StoreGuard {
            documents: self.documents.lock().await,
            backend: Arc::clone(&self.backend),
        }
    }

    pub async fn list(&self) -> Vec<Document> {
        self.documents.lock().await.list()
    }

    pub async fn get(&self, id: &str) -> Option<Document> {
        self.documents.lock().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.documents.lock().await.len()
    }
}

/// Exclusive access to the documents while held
pub struct StoreGuard<'a> {
    documents: MutexGuard<'a, Documents>,
    backend: Arc<dyn Persistence>,
}

impl StoreGuard<'_> {
    pub fn documents(&self) -> &Documents {
        &self.documents
    }

    /// Apply `change` to a copy, persist the copy, then commit it.
    ///
    /// Persists exactly once on success; on any error nothing is committed.
    pub async fn transact<T>(
        &mut self,
        change: impl FnOnce(&mut Documents) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut next = self.documents.clone();
        let value = change(&mut next)?;

        let backend = Arc::clone(&self.backend);
        let next = tokio::task::spawn_blocking(move || backend.save(&next).map(|()| next))
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(e)))??;
        *self.documents = next;
        Ok(value)
    }
}
