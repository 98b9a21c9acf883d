//! Decoding of structured LLM output.
//!
//! Models often wrap JSON in a fenced code block. The decoder removes at most one
//! opening and one closing fence line, then hands the rest to serde. Anything that
//! fails to decode becomes [`AgentError::Parse`] with the raw response attached.

use crate::agent::AgentError;
use serde::de::DeserializeOwned;

const FENCE: &str = "```";

/// Strip one leading and one trailing fenced-code delimiter line, if present.
pub fn strip_code_fence(raw: &str) -> &str {
    let mut text = raw.trim();

    if text.starts_with(FENCE) {
        // The opening fence line may carry a language tag, e.g. ```json
        text = match text.find('\n') {
            Some(idx) => &text[idx + 1..],
            None => "",
        };

        let trimmed_end = text.trim_end();
        if let Some(idx) = trimmed_end.rfind('\n') {
            if trimmed_end[idx + 1..].trim().starts_with(FENCE) {
                text = &trimmed_end[..idx];
            }
        } else if trimmed_end.trim().starts_with(FENCE) {
            text = "";
        }
    }

    text.trim()
}

/// Decode an LLM response into `T` after fence stripping.
pub fn decode_json<T: DeserializeOwned>(raw: &str) -> Result<T, AgentError> {
    let cleaned = strip_code_fence(raw);
    serde_json::from_str(cleaned).map_err(|e| AgentError::Parse {
        message: e.to_string(),
        raw: raw.to_string(),
    })
}
