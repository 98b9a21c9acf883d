//! Query ranking delegated to the LLM.
//!
//! The whole document set goes into the prompt and the model picks and scores the
//! best matches. Scores are taken as returned; only JSON well-formedness is checked.

use serde::{Deserialize, Serialize};

use crate::agent::{AgentError, Summarizer};
use crate::decode::decode_json;
use crate::storage::Document;

/// Maximum number of ranked entries returned
pub const MAX_RESULTS: usize = 5;

/// One ranked document as returned by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedDocument {
    pub id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub pdf_file: String,
    #[serde(default)]
    pub content_hash: String,
    #[serde(default)]
    pub description: String,
    /// Nominally in [0, 1]
    pub relevance: f64,
}

/// Document fields shown to the model
#[derive(Serialize)]
struct Candidate<'a> {
    id: &'a str,
    url: &'a str,
    pdf_file: &'a str,
    content_hash: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "no_tags")]
    tags: &'a [String],
}

fn no_tags(tags: &&[String]) -> bool {
    tags.is_empty()
}

fn build_prompt(query: &str, documents: &[Document]) -> Result<String, AgentError> {
    let candidates: Vec<Candidate<'_>> = documents
        .iter()
        .map(|doc| Candidate {
            id: &doc.id,
            url: &doc.url,
            pdf_file: &doc.pdf_file,
            content_hash: &doc.content_hash,
            description: &doc.description,
            title: doc.title.as_deref(),
            tags: &doc.tags,
        })
        .collect();
    let documents_json = serde_json::to_string_pretty(&candidates)
        .map_err(|e| AgentError::Input(e.to_string()))?;

    Ok(format!(
        r#"You are given a corpus of document metadata in JSON format:
{documents_json}

And a user query:
"{query}"

Using the above information, select and rank the top {MAX_RESULTS} documents that best match the query.
Return the result as a JSON array of objects, where each object follows this schema:
{{
  "id": string,
  "url": string,
  "pdf_file": string,
  "content_hash": string,
  "description": string,
  "relevance": number between 0 and 1
}}

Ensure that the output is valid JSON."#
    ))
}

/// Rank `documents` against `query`, best first, at most [`MAX_RESULTS`] entries.
pub async fn rank(
    query: &str,
    documents: &[Document],
    llm: &dyn Summarizer,
) -> Result<Vec<RankedDocument>, AgentError> {
    let prompt = build_prompt(query, documents)?;
    let raw = llm.complete(&prompt).await?;

    let mut ranked: Vec<RankedDocument> = decode_json(&raw).inspect_err(|e| {
        tracing::warn!(query, error = %e, "Ranking response was not valid JSON");
    })?;
    ranked.truncate(MAX_RESULTS);

    tracing::info!(query, candidates = documents.len(), results = ranked.len(), "Ranked documents");
    Ok(ranked)
}
