//! Turning free-form model output into validated tag objects.
//!
//! Models wrap their JSON in all sorts of packaging: reasoning blocks,
//! markdown fences, a sentence of preamble. Extraction peels those layers
//! off, then hands the object to the schema validators in `huetag-core`.

use std::sync::LazyLock;

use huetag_core::{RefinedTags, TagParseError, TagResponse};
use regex::Regex;
use serde_json::Value;

static REASONING_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(think|thinking|reasoning)>.*?</(think|thinking|reasoning)>")
        .expect("static regex")
});

/// Remove `<think>`, `<thinking>` and `<reasoning>` blocks. An unclosed
/// opening tag drops everything after it up to the first `{`.
#[must_use]
pub fn strip_reasoning(text: &str) -> String {
    let stripped = REASONING_BLOCK.replace_all(text, "");
    let lower = stripped.to_ascii_lowercase();
    for tag in ["<think>", "<thinking>", "<reasoning>"] {
        if let Some(start) = lower.find(tag) {
            let rest = &stripped[start..];
            return match rest.find('{') {
                Some(brace) => format!("{}{}", &stripped[..start], &rest[brace..]),
                None => stripped[..start].to_string(),
            };
        }
    }
    stripped.into_owned()
}

/// Remove a surrounding markdown code fence (```` ``` ```` or ```` ```json ````).
#[must_use]
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Locate and parse the outermost JSON object in `text`.
///
/// # Errors
///
/// Returns [`TagParseError::NoJsonObject`] if there is no `{ ... }` span and
/// [`TagParseError::InvalidJson`] if the span does not parse.
pub fn extract_json_object(text: &str) -> Result<Value, TagParseError> {
    let cleaned = strip_reasoning(text);
    let body = strip_code_fences(&cleaned);
    let start = body.find('{').ok_or(TagParseError::NoJsonObject)?;
    let end = body.rfind('}').ok_or(TagParseError::NoJsonObject)?;
    if end < start {
        return Err(TagParseError::NoJsonObject);
    }
    serde_json::from_str(&body[start..=end]).map_err(TagParseError::InvalidJson)
}

/// Parse classification-provider output into a [`TagResponse`].
///
/// # Errors
///
/// Returns a [`TagParseError`] if no valid object can be extracted or it
/// fails schema validation.
pub fn parse_tag_output(text: &str) -> Result<TagResponse, TagParseError> {
    TagResponse::from_value(extract_json_object(text)?)
}

/// Parse refinement-model output into [`RefinedTags`].
///
/// # Errors
///
/// Returns a [`TagParseError`] if no valid object can be extracted or it
/// fails schema validation.
pub fn parse_refined_output(text: &str) -> Result<RefinedTags, TagParseError> {
    RefinedTags::from_value(extract_json_object(text)?)
}
