//! Add / unchanged / updated behavior of the sync engine and its failure policy.

mod common;

use common::{page, Harness};
use docqa::storage::{DocumentStore, JsonFile, Persistence};
use docqa::sync::SyncError;
use docqa::SyncStatus;

const URL: &str = "https://a.example";

#[tokio::test]
async fn unseen_url_is_added_once() {
    let h = Harness::new();
    h.fetcher.set_page(URL, &page("Initial release of the widget toolkit."));

    let outcome = h.engine.sync(URL).await.unwrap();

    assert_eq!(outcome.status, SyncStatus::Added);
    assert_eq!(outcome.document.url, URL);
    assert_eq!(outcome.document.pdf_file, format!("{}.pdf", outcome.document.id));
    assert_eq!(outcome.document.title.as_deref(), Some("Test page"));
    assert_eq!(h.engine.store().len().await, 1);
    assert_eq!(h.summarizer.summaries(), 1);
    assert_eq!(h.saves(), 1);
    assert_eq!(h.pdf_files(), vec![outcome.document.pdf_file.clone()]);
}

#[tokio::test]
async fn unchanged_content_makes_no_calls() {
    let h = Harness::new();
    h.fetcher.set_page(URL, &page("Initial release of the widget toolkit."));
    let added = h.engine.sync(URL).await.unwrap();

    let again = h.engine.sync(URL).await.unwrap();

    assert_eq!(again.status, SyncStatus::Unchanged);
    assert_eq!(again.document, added.document);
    assert_eq!(h.summarizer.summaries(), 1);
    assert_eq!(h.fetcher.renders(), 1);
    assert_eq!(h.saves(), 1);
    assert_eq!(h.engine.store().len().await, 1);
}

#[tokio::test]
async fn changed_content_updates_in_place() {
    let h = Harness::new();
    h.fetcher.set_page(URL, &page("Initial release of the widget toolkit."));
    let added = h.engine.sync(URL).await.unwrap();
    let pdf_path = h.engine.pdf_path(&added.document);
    let first_pdf = std::fs::read(&pdf_path).unwrap();

    h.fetcher.set_page(URL, &page("Version two of the widget toolkit adds themes."));
    let updated = h.engine.sync(URL).await.unwrap();

    assert_eq!(updated.status, SyncStatus::Updated);
    assert_eq!(updated.document.id, added.document.id);
    assert_eq!(updated.document.pdf_file, added.document.pdf_file);
    assert_ne!(updated.document.content_hash, added.document.content_hash);
    assert_ne!(updated.document.description, added.document.description);
    assert!(updated.document.updated_at.is_some());
    assert_eq!(h.summarizer.summaries(), 2);
    assert_eq!(h.saves(), 2);
    assert_eq!(h.engine.store().len().await, 1);
    assert_ne!(std::fs::read(&pdf_path).unwrap(), first_pdf);
    assert_eq!(h.pdf_files(), vec![added.document.pdf_file.clone()]);
}

#[tokio::test]
async fn add_unchanged_update_scenario() {
    let h = Harness::new();
    assert_eq!(h.engine.store().len().await, 0);

    h.fetcher.set_page(URL, &page("Quarterly report for the first quarter."));
    let first = h.engine.sync(URL).await.unwrap();
    assert_eq!(first.status, SyncStatus::Added);
    assert_eq!(h.engine.store().len().await, 1);
    assert_eq!(h.pdf_files().len(), 1);

    let second = h.engine.sync(URL).await.unwrap();
    assert_eq!(second.status, SyncStatus::Unchanged);
    assert_eq!(h.engine.store().len().await, 1);
    assert_eq!(h.summarizer.summaries(), 1);

    h.fetcher.set_page(URL, &page("Quarterly report for the second quarter."));
    let third = h.engine.sync(URL).await.unwrap();
    assert_eq!(third.status, SyncStatus::Updated);
    assert_eq!(third.document.id, first.document.id);
    assert_ne!(third.document.content_hash, first.document.content_hash);
    assert_ne!(third.document.description, first.document.description);
}

#[tokio::test]
async fn distinct_urls_get_distinct_records() {
    let h = Harness::new();
    h.fetcher.set_page(URL, &page("First site with enough text to keep."));
    h.fetcher.set_page("https://b.example", &page("Second site with enough text to keep."));

    let a = h.engine.sync(URL).await.unwrap();
    let b = h.engine.sync("https://b.example").await.unwrap();

    assert_ne!(a.document.id, b.document.id);
    assert_eq!(h.engine.store().len().await, 2);
    assert_eq!(h.pdf_files().len(), 2);
}

#[tokio::test]
async fn render_failure_commits_nothing() {
    let h = Harness::new();
    h.fetcher.set_page(URL, &page("A page whose PDF cannot be printed."));
    h.fetcher.fail_render(URL);

    let err = h.engine.sync(URL).await.unwrap_err();

    assert!(matches!(err, SyncError::Render(_)));
    assert!(err.to_string().starts_with("Error converting URL to PDF"));
    assert_eq!(h.engine.store().len().await, 0);
    assert_eq!(h.summarizer.summaries(), 0);
    assert_eq!(h.saves(), 0);
    assert!(h.pdf_files().is_empty());
    assert!(!h.documents_file().exists());
}

#[tokio::test]
async fn render_failure_on_update_keeps_previous_state() {
    let h = Harness::new();
    h.fetcher.set_page(URL, &page("Original content of the page."));
    let added = h.engine.sync(URL).await.unwrap();
    let pdf_path = h.engine.pdf_path(&added.document);
    let original_pdf = std::fs::read(&pdf_path).unwrap();

    h.fetcher.set_page(URL, &page("Changed content of the page."));
    h.fetcher.fail_render(URL);
    assert!(matches!(h.engine.sync(URL).await, Err(SyncError::Render(_))));

    let stored = h.engine.store().get(&added.document.id).await.unwrap();
    assert_eq!(stored, added.document);
    assert_eq!(std::fs::read(&pdf_path).unwrap(), original_pdf);
    assert_eq!(h.saves(), 1);
    assert_eq!(h.pdf_files(), vec![added.document.pdf_file.clone()]);
}

#[tokio::test]
async fn failed_persist_on_add_leaves_no_pdf() {
    let h = Harness::new();
    h.fetcher.set_page(URL, &page("Content that never reaches the disk."));
    h.set_failing_saves(true);

    assert!(matches!(h.engine.sync(URL).await, Err(SyncError::Storage(_))));

    assert_eq!(h.engine.store().len().await, 0);
    assert!(h.pdf_files().is_empty());
}

#[tokio::test]
async fn failed_persist_on_update_keeps_previous_pdf() {
    let h = Harness::new();
    h.fetcher.set_page(URL, &page("Original content of the page."));
    let added = h.engine.sync(URL).await.unwrap();
    let pdf_path = h.engine.pdf_path(&added.document);
    let original_pdf = std::fs::read(&pdf_path).unwrap();

    h.fetcher.set_page(URL, &page("Changed content of the page."));
    h.set_failing_saves(true);
    assert!(matches!(h.engine.sync(URL).await, Err(SyncError::Storage(_))));

    let stored = h.engine.store().get(&added.document.id).await.unwrap();
    assert_eq!(stored, added.document);
    assert_eq!(std::fs::read(&pdf_path).unwrap(), original_pdf);
    assert_eq!(h.pdf_files(), vec![added.document.pdf_file.clone()]);

    h.set_failing_saves(false);
    let retried = h.engine.sync(URL).await.unwrap();
    assert_eq!(retried.status, SyncStatus::Updated);
    assert_ne!(std::fs::read(&pdf_path).unwrap(), original_pdf);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_syncs_of_one_url_are_serialized() {
    let h = Harness::new();
    h.fetcher.set_page(URL, &page("Two clients submit this page at once."));

    let first = tokio::spawn({
        let engine = h.engine.clone();
        async move { engine.sync(URL).await }
    });
    let second = tokio::spawn({
        let engine = h.engine.clone();
        async move { engine.sync(URL).await }
    });
    let a = first.await.unwrap().unwrap();
    let b = second.await.unwrap().unwrap();

    let mut statuses = vec![a.status.to_string(), b.status.to_string()];
    statuses.sort();
    assert_eq!(statuses, vec!["added", "unchanged"]);
    assert_eq!(a.document.id, b.document.id);
    assert_eq!(h.engine.store().len().await, 1);
    assert_eq!(h.summarizer.summaries(), 1);
    assert_eq!(h.saves(), 1);
}

#[tokio::test]
async fn summarizer_failure_aborts_sync() {
    let h = Harness::new();
    h.fetcher.set_page(URL, &page("Content the model refuses to read."));
    h.summarizer.set_failing(true);

    let err = h.engine.sync(URL).await.unwrap_err();

    assert!(matches!(err, SyncError::Summarize(_)));
    assert_eq!(h.engine.store().len().await, 0);
    assert_eq!(h.saves(), 0);
    assert!(h.pdf_files().is_empty(), "staged PDF must be removed");
}

#[tokio::test]
async fn fetch_failure_is_reported() {
    let h = Harness::new();

    let err = h.engine.sync("https://unreachable.example").await.unwrap_err();

    assert!(matches!(err, SyncError::Fetch(_)));
    assert_eq!(h.fetcher.renders(), 0);
    assert_eq!(h.engine.store().len().await, 0);
}

#[tokio::test]
async fn delete_removes_record_and_pdf() {
    let h = Harness::new();
    h.fetcher.set_page(URL, &page("A page that will be deleted soon."));
    let added = h.engine.sync(URL).await.unwrap();
    let pdf_path = h.engine.pdf_path(&added.document);
    assert!(pdf_path.exists());

    let removed = h.engine.delete(&added.document.id).await.unwrap();

    assert_eq!(removed.id, added.document.id);
    assert!(!pdf_path.exists());
    assert!(h.engine.store().list().await.is_empty());
    assert_eq!(h.saves(), 2);
    assert!(matches!(
        h.engine.delete(&added.document.id).await,
        Err(SyncError::NotFound(_))
    ));
}

#[tokio::test]
async fn deleted_url_can_be_added_again() {
    let h = Harness::new();
    h.fetcher.set_page(URL, &page("A page that comes back after deletion."));
    let first = h.engine.sync(URL).await.unwrap();
    h.engine.delete(&first.document.id).await.unwrap();

    let second = h.engine.sync(URL).await.unwrap();

    assert_eq!(second.status, SyncStatus::Added);
    assert_ne!(second.document.id, first.document.id);
}

#[tokio::test]
async fn upload_generates_summary_and_metadata() {
    let h = Harness::new();

    let doc = h
        .engine
        .upload("scaling.pdf", b"%PDF-1.4 uploaded bytes")
        .await
        .unwrap();

    assert!(doc.url.starts_with(&format!("upload://{}/", doc.id)));
    assert_eq!(doc.title.as_deref(), Some("Ethereum Scaling Strategies"));
    assert_eq!(doc.date.as_deref(), Some("2023-10-15"));
    assert_eq!(doc.authors, vec!["Vitalik Buterin"]);
    assert_eq!(doc.tags, vec!["rollups", "sharding"]);
    assert!(doc.description.starts_with("summary #1"));
    assert_eq!(h.summarizer.summaries(), 1);
    assert_eq!(h.saves(), 1);
    assert_eq!(
        std::fs::read(h.engine.pdf_path(&doc)).unwrap(),
        b"%PDF-1.4 uploaded bytes"
    );
}

#[tokio::test]
async fn failed_upload_leaves_no_file() {
    let h = Harness::new();
    h.summarizer.set_failing(true);

    assert!(h.engine.upload("broken.pdf", b"%PDF-1.4").await.is_err());
    assert!(h.pdf_files().is_empty());
    assert_eq!(h.engine.store().len().await, 0);
}

#[tokio::test]
async fn persisted_store_reloads_and_resaves_identically() {
    let h = Harness::new();
    h.fetcher.set_page(URL, &page("Persisted content number one."));
    h.fetcher.set_page("https://b.example", &page("Persisted content number two."));
    h.engine.sync(URL).await.unwrap();
    h.engine.sync("https://b.example").await.unwrap();
    h.engine.upload("notes.pdf", b"%PDF-1.4 notes").await.unwrap();

    let before: serde_json::Value =
        serde_json::from_slice(&std::fs::read(h.documents_file()).unwrap()).unwrap();

    let file = JsonFile::new(h.documents_file());
    let loaded = file.load().unwrap();
    file.save(&loaded).unwrap();

    let after: serde_json::Value =
        serde_json::from_slice(&std::fs::read(h.documents_file()).unwrap()).unwrap();
    assert_eq!(before, after);

    let reopened = DocumentStore::open_file(h.documents_file()).unwrap();
    assert_eq!(reopened.list().await, h.engine.store().list().await);
}
