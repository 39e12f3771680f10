//! Response parsing: raw model text → [`ExtractionResult`].
//!
//! Models rarely answer with bare JSON. They wrap it in prose ("Here is the
//! data: …") or in ```` ```json ```` fences. The parser therefore does not
//! ask for a clean document; it takes everything from the first `{` to the
//! last `}` and hands that to `serde_json`.
//!
//! The scan is greedy and does not balance braces. Two separate objects in
//! one answer (`{"a": 1} and {"b": 2}`) are captured together with the prose
//! between them and fail to parse. Nested objects and braces inside string
//! values are fine.

use crate::error::RfpError;
use crate::output::ExtractionResult;
use crate::pipeline::llm::ModelResponse;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static JSON_OBJECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Find the JSON object candidate in `text`.
///
/// Returns the span from the first `{` to the last `}` after it. If a `{`
/// exists but nothing closes it (a truncated answer), the tail from that
/// `{` is returned so the caller reports it as malformed rather than
/// missing. `None` means the text contains no `{` at all.
pub fn locate_json(text: &str) -> Option<&str> {
    if let Some(m) = JSON_OBJECT_RE.find(text) {
        return Some(m.as_str());
    }
    text.find('{').map(|start| &text[start..])
}

/// Parse a model answer into an [`ExtractionResult`].
///
/// Keys and values are passed through exactly as the model produced them.
/// Parsing the same response twice gives equal results.
pub fn parse_response(response: &ModelResponse) -> Result<ExtractionResult, RfpError> {
    parse_text(response.content())
}

/// [`parse_response`] on a bare string.
pub fn parse_text(raw: &str) -> Result<ExtractionResult, RfpError> {
    let text = raw.trim();
    let candidate = locate_json(text).ok_or(RfpError::NoJsonFound)?;
    let fields: Map<String, Value> =
        serde_json::from_str(candidate).map_err(|source| RfpError::MalformedJson { source })?;
    Ok(ExtractionResult::from_map(fields))
}
