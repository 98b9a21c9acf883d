//! Question answering against one stored PDF.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::agent::{extract_pdf_text, AgentError, Summarizer};
use crate::decode::decode_json;

/// The model's answer and the page it points at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub response: String,
    /// 1 when the answer is not specific to any page
    #[serde(default)]
    pub page: Option<u32>,
}

impl ChatAnswer {
    /// Human-readable form shown in the chat panel
    pub fn display(&self) -> String {
        match self.page {
            Some(page) => format!("Answer: {} (Page {})", self.response, page),
            None => format!("Answer: {}", self.response),
        }
    }
}

fn build_prompt(question: &str, document_text: &str) -> String {
    format!(
        r#"{question}

Based on the content of the provided document, please provide a detailed answer to the query.
Return the answer in JSON format following the schema below EXACTLY:

{{
  "response": "<Your answer as text>",
  "page": <Relevant page number as an integer. If the answer is not specific to any page, return 1>
}}

Ensure that your output is valid JSON and nothing else.

---

{document_text}"#
    )
}

/// Answer `question` from the PDF at `pdf_path`
pub async fn ask(
    llm: &dyn Summarizer,
    pdf_path: &Path,
    question: &str,
) -> Result<ChatAnswer, AgentError> {
    let text = extract_pdf_text(pdf_path).await?;
    let raw = llm.complete(&build_prompt(question, &text)).await?;
    tracing::debug!(chars = raw.len(), "Chat response received");
    decode_json(&raw)
}
