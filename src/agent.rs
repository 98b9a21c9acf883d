//! LLM agent module for summarization and metadata extraction.
//!
//! Providers form a closed set selected by `agent.provider` in the config. Each one
//! implements [`Summarizer`]; the rest of the crate only sees `Arc<dyn Summarizer>`.
//! The Gemini provider uses rstructor for the model call.

pub use crate::metadata::Metadata;

use crate::config::{Config, ConfigError};
use crate::decode::decode_json;
use async_trait::async_trait;
use rstructor::{GeminiClient, GeminiModel, LLMClient};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM request failed: {0}")]
    RequestFailed(String),
    #[error("failed to parse response: {message}")]
    Parse { message: String, raw: String },
    #[error("failed to read input: {0}")]
    Input(String),
    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),
}

impl AgentError {
    /// The offending model output, for parse failures
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            AgentError::Parse { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

const METADATA_PROMPT: &str = r#"Task: Extract structured metadata from the following document. Return the metadata in a valid JSON format.

Analyze the document and extract the following fields:
    title - The document's title, if available.
    date - The date the document was created or published. If not explicitly mentioned, infer the most likely date from the content.
    authors - The names of the authors, creators, or organizations responsible for the document.
    short_description - A concise summary (2-3 sentences) describing the main purpose or key insights of the document.
    tags - A list of relevant topics, themes, or keywords extracted from the document. Use concise, meaningful words.

You MUST respond with valid JSON matching this exact schema:
{
  "title": "string or null",
  "date": "string or null",
  "authors": ["array of strings"],
  "short_description": "string or null",
  "tags": ["array of strings"]
}

Do not include any markdown formatting, code blocks, or explanations. Only output the raw JSON object."#;

/// What a summarizer works on: fetched page text, or a document on disk.
#[derive(Debug, Clone, Copy)]
pub enum SummaryInput<'a> {
    Text(&'a str),
    File(&'a Path),
}

impl SummaryInput<'_> {
    /// Resolve the input to text, extracting it from the PDF for files
    pub async fn read_text(&self) -> Result<String, AgentError> {
        match self {
            SummaryInput::Text(text) => Ok(text.to_string()),
            SummaryInput::File(path) => extract_pdf_text(path).await,
        }
    }
}

/// Extract the text layer of a PDF on a blocking thread.
pub async fn extract_pdf_text(path: &Path) -> Result<String, AgentError> {
    let path = path.to_path_buf();
    let display = path.display().to_string();
    tokio::task::spawn_blocking(move || pdf_extract::extract_text(&path))
        .await
        .map_err(|e| AgentError::Input(e.to_string()))?
        .map_err(|e| AgentError::Input(format!("{}: {}", display, e)))
}

/// The LLM-backed capability the rest of the crate depends on.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Provider name, for logs
    fn name(&self) -> &'static str;

    /// Natural-language description of the input
    async fn summarize(&self, input: SummaryInput<'_>) -> Result<String, AgentError>;

    /// Structured title/date/authors/tags; a non-JSON answer is an error
    async fn extract_metadata(&self, input: SummaryInput<'_>) -> Result<Metadata, AgentError>;

    /// Send a raw prompt and return the model's text
    async fn complete(&self, prompt: &str) -> Result<String, AgentError>;
}

/// The fixed set of providers known to this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Dummy,
    Gemini,
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dummy" => Ok(Provider::Dummy),
            "gemini" | "google" => Ok(Provider::Gemini),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

/// Build the summarizer named by `agent.provider`
pub fn build_summarizer(config: &Config) -> Result<Arc<dyn Summarizer>, ConfigError> {
    let provider: Provider = config.agent.provider.parse()?;
    let summarizer: Arc<dyn Summarizer> = match provider {
        Provider::Dummy => Arc::new(DummySummarizer),
        Provider::Gemini => Arc::new(GeminiSummarizer::new(config)?),
    };
    tracing::info!(provider = summarizer.name(), "LLM provider ready");
    Ok(summarizer)
}

/// Offline provider that describes documents by size. Cannot answer free-form prompts.
#[derive(Debug, Default, Clone, Copy)]
pub struct DummySummarizer;

#[async_trait]
impl Summarizer for DummySummarizer {
    fn name(&self) -> &'static str {
        "dummy"
    }

    async fn summarize(&self, input: SummaryInput<'_>) -> Result<String, AgentError> {
        let size = match input {
            SummaryInput::Text(text) => text.len() as u64,
            SummaryInput::File(path) => tokio::fs::metadata(path)
                .await
                .map_err(|e| AgentError::Input(format!("{}: {}", path.display(), e)))?
                .len(),
        };
        Ok(format!("Dummy summary: The document is {} bytes in size.", size))
    }

    async fn extract_metadata(&self, input: SummaryInput<'_>) -> Result<Metadata, AgentError> {
        let title = match input {
            SummaryInput::File(path) => path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned()),
            SummaryInput::Text(_) => None,
        };
        Ok(Metadata {
            title,
            short_description: Some(self.summarize(input).await?),
            ..Metadata::default()
        })
    }

    async fn complete(&self, _prompt: &str) -> Result<String, AgentError> {
        Err(AgentError::RequestFailed(
            "the dummy provider has no language model; configure agent.provider = \"gemini\""
                .to_string(),
        ))
    }
}

/// Google Gemini provider
pub struct GeminiSummarizer {
    api_key: String,
    model: String,
    persona: String,
    prompt: String,
}

impl GeminiSummarizer {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: config.api_key()?.to_string(),
            model: config.agent.model.clone(),
            persona: config.agent.persona.clone(),
            prompt: config.agent.prompt.clone(),
        })
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn summarize(&self, input: SummaryInput<'_>) -> Result<String, AgentError> {
        let text = input.read_text().await?;
        let prompt = format!("{}\n\n{}\n\n---\n\n{}", self.persona, self.prompt, text);
        let summary = self.complete(&prompt).await?;
        Ok(summary.trim().to_string())
    }

    async fn extract_metadata(&self, input: SummaryInput<'_>) -> Result<Metadata, AgentError> {
        let text = input.read_text().await?;
        let prompt = format!("{}\n\n{}\n\n---\n\n{}", self.persona, METADATA_PROMPT, text);
        let raw = self.complete(&prompt).await?;
        decode_json(&raw)
    }

    async fn complete(&self, prompt: &str) -> Result<String, AgentError> {
        let client = GeminiClient::new(&self.api_key)
            .map_err(|e| AgentError::RequestFailed(e.to_string()))?
            .model(parse_gemini_model(&self.model));

        let result = client
            .generate_with_metadata(prompt)
            .await
            .map_err(|e| AgentError::RequestFailed(e.to_string()))?;

        tracing::debug!(model = %self.model, chars = result.text.len(), "Gemini response received");
        Ok(result.text)
    }
}

/// Parse a model string into a GeminiModel
fn parse_gemini_model(model: &str) -> GeminiModel {
    match model {
        "gemini-2.0-flash" => GeminiModel::Gemini20Flash,
        "gemini-2.5-flash" => GeminiModel::Gemini25Flash,
        "gemini-2.5-pro" => GeminiModel::Gemini25Pro,
        _ => GeminiModel::Gemini20Flash, // Default
    }
}
