//! # docqa
//!
//! Document ingestion and Q&A service.
//!
//! ## Features
//!
//! - **Change detection**: pages are re-summarized only when their content hash changes
//! - **JSON storage**: one document file, rewritten under a single-writer lock
//! - **Provider registry**: summarizers selected by config (`dummy`, `gemini`)
//! - **LLM ranking and chat**: rank stored documents against a query, ask questions about a PDF

pub mod agent;
pub mod api;
pub mod chat;
pub mod config;
pub mod decode;
pub mod fetcher;
pub mod mapping;
pub mod metadata;
pub mod ranking;
pub mod storage;
pub mod sync;

pub use agent::{build_summarizer, Summarizer, SummaryInput};
pub use config::Config;
pub use fetcher::{BrowserFetcher, Fetcher};
pub use metadata::Metadata;
pub use storage::{Document, DocumentStore};
pub use sync::{SyncEngine, SyncOutcome, SyncStatus};
