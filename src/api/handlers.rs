//! HTTP request handlers and shared application state.

use axum::extract::{Multipart, Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::errors::ApiError;
use crate::chat;
use crate::config::{AuthConfig, MappingConfig};
use crate::mapping::{MapError, SourceMapper};
use crate::ranking::{self, RankedDocument};
use crate::storage::Document;
use crate::sync::{SyncEngine, SyncOutcome};

/// Shared application state passed to every handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SyncEngine>,
    pub auth: AuthConfig,
    pub mapping: MappingConfig,
    /// Document answered against when a chat request names none
    pub chat_document: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDocument {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct RankRequest {
    pub query: String,
}

/// Answered against the configured chat document only
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub page: Option<u32>,
}

fn validate_url(raw: &str) -> Result<(), ApiError> {
    let parsed =
        url::Url::parse(raw).map_err(|e| ApiError::BadRequest(format!("invalid URL: {}", e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ApiError::BadRequest(format!(
            "URL scheme must be http or https, got '{}'",
            other
        ))),
    }
}

async fn document_or_404(state: &AppState, id: &str) -> Result<Document, ApiError> {
    state
        .engine
        .store()
        .get(id)
        .await
        .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))
}

async fn pdf_response(state: &AppState, doc: &Document) -> Result<impl IntoResponse, ApiError> {
    let path = state.engine.pdf_path(doc);
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        tracing::warn!(id = %doc.id, path = %path.display(), error = %e, "PDF missing");
        ApiError::NotFound("PDF not found".to_string())
    })?;
    Ok(([(CONTENT_TYPE, "application/pdf")], bytes))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let documents = state.engine.store().len().await;
    Json(json!({ "status": "ok", "documents": documents }))
}

/// `GET /documents`
pub async fn list_documents(State(state): State<AppState>) -> Json<Vec<Document>> {
    Json(state.engine.store().list().await)
}

/// `POST /documents`: add or update the document for a URL
pub async fn create_document(
    State(state): State<AppState>,
    Json(body): Json<CreateDocument>,
) -> Result<Json<SyncOutcome>, ApiError> {
    validate_url(&body.url)?;
    let outcome = state.engine.sync(&body.url).await.inspect_err(|e| {
        tracing::error!(url = %body.url, error = %e, "Sync failed");
    })?;
    Ok(Json(outcome))
}

/// `DELETE /documents/:id`
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.engine.delete(&id).await?;
    Ok(Json(json!({ "detail": "Document deleted successfully" })))
}

/// `POST /documents/upload`: multipart field `file` holding a PDF
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Document>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload.pdf").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        if !bytes.starts_with(b"%PDF") {
            return Err(ApiError::BadRequest("uploaded file is not a PDF".to_string()));
        }

        let document = state.engine.upload(&file_name, &bytes).await?;
        return Ok(Json(document));
    }
    Err(ApiError::BadRequest("missing multipart field 'file'".to_string()))
}

/// `GET /documents/:id/pdf`
pub async fn document_pdf(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let doc = document_or_404(&state, &id).await?;
    pdf_response(&state, &doc).await
}

/// `POST /rank`
pub async fn rank_documents(
    State(state): State<AppState>,
    Json(body): Json<RankRequest>,
) -> Result<Json<Vec<RankedDocument>>, ApiError> {
    let documents = state.engine.store().list().await;
    let ranked = ranking::rank(&body.query, &documents, state.engine.summarizer().as_ref()).await?;
    Ok(Json(ranked))
}

/// `POST /map-sources`
pub async fn map_sources(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, Value>>, ApiError> {
    if state.mapping.sources.is_empty() {
        return Err(MapError::NoSources.into());
    }
    let mapper = SourceMapper::from_config(&state.mapping)?;
    let maps = mapper
        .map_sources(&state.mapping.sources, state.engine.pdf_dir())
        .await?;
    Ok(Json(maps))
}

/// `POST /chat`: failures are reported in the answer text, like the chat panel expects
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let Some(id) = state.chat_document.clone() else {
        return Json(ChatResponse {
            response: "Error reading PDF: no document selected".to_string(),
            page: None,
        });
    };
    let Some(doc) = state.engine.store().get(&id).await else {
        return Json(ChatResponse {
            response: format!("Error reading PDF: unknown document {}", id),
            page: None,
        });
    };

    let path = state.engine.pdf_path(&doc);
    match chat::ask(state.engine.summarizer().as_ref(), &path, &body.message).await {
        Ok(answer) => Json(ChatResponse {
            response: answer.display(),
            page: answer.page,
        }),
        Err(e) => {
            tracing::warn!(id = %doc.id, error = %e, raw = e.raw_response(), "Chat failed");
            Json(ChatResponse {
                response: format!("Error calling the LLM or parsing its response: {}", e),
                page: None,
            })
        }
    }
}

/// `GET /pdf`: the PDF shown next to the chat
pub async fn chat_pdf(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let id = state
        .chat_document
        .clone()
        .ok_or_else(|| ApiError::NotFound("no chat document configured".to_string()))?;
    let doc = document_or_404(&state, &id).await?;
    pdf_response(&state, &doc).await
}
