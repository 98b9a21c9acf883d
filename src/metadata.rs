//! Metadata struct - the structured output of document metadata extraction.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Structured metadata extracted from a document by the LLM.
///
/// Every field may be missing or `null` on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Metadata {
    /// The document's title
    #[serde(default)]
    pub title: Option<String>,
    /// Creation or publication date, as written by the model
    #[serde(default)]
    pub date: Option<String>,
    /// Authors, creators or responsible organizations
    #[serde(default)]
    pub authors: Option<Vec<String>>,
    /// Two or three sentence summary of the document
    #[serde(default)]
    pub short_description: Option<String>,
    /// Topics and keywords
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl Metadata {
    pub fn authors(&self) -> Vec<String> {
        self.authors.clone().unwrap_or_default()
    }

    pub fn tags(&self) -> Vec<String> {
        self.tags.clone().unwrap_or_default()
    }

    /// Check if the model returned anything usable
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.date.is_none()
            && self.short_description.is_none()
            && self.authors.as_ref().map_or(true, Vec::is_empty)
            && self.tags.as_ref().map_or(true, Vec::is_empty)
    }
}
