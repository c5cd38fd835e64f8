//! Tag schema shared by classification providers and the refinement model.
//!
//! Both shapes carry four single-valued categorical fields and five
//! descriptive tag arrays. [`RefinedTags`] adds a short free-text blob used
//! as embedding input.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Inclusive word-count bounds for [`RefinedTags::embed_text`].
pub const EMBED_TEXT_MIN_WORDS: usize = 30;
pub const EMBED_TEXT_MAX_WORDS: usize = 50;

#[derive(Debug, Error)]
pub enum TagParseError {
    #[error("no JSON object found in model output")]
    NoJsonObject,

    #[error("model output is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("model output does not match the tag schema: {0}")]
    Schema(#[source] serde_json::Error),

    #[error("embed_text must be {EMBED_TEXT_MIN_WORDS}-{EMBED_TEXT_MAX_WORDS} words, got {0}")]
    EmbedTextLength(usize),
}

macro_rules! categorical {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

categorical!(Temperature { Warm => "warm", Cool => "cool", Neutral => "neutral" });
categorical!(Contrast { High => "high", Medium => "medium", Low => "low" });
categorical!(Brightness { Light => "light", Medium => "medium", Dark => "dark" });
categorical!(Saturation { Vibrant => "vibrant", Moderate => "moderate", Muted => "muted" });

/// Raw tags returned by one classification provider for one palette.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagResponse {
    pub temperature: Temperature,
    pub contrast: Contrast,
    pub brightness: Brightness,
    pub saturation: Saturation,
    pub mood: Vec<String>,
    pub style: Vec<String>,
    /// `colors` is the field name used by the first schema version; rows
    /// stored under it still deserialize here.
    #[serde(alias = "colors")]
    pub dominant_colors: Vec<String>,
    pub seasonal: Vec<String>,
    pub associations: Vec<String>,
}

impl TagResponse {
    /// Validate a JSON value against the provider tag schema.
    ///
    /// All string values are lowercased and trimmed first, so `"Warm"` is
    /// accepted as `warm`. Empty tag strings are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`TagParseError::Schema`] if a field is missing, has the
    /// wrong type, or an enumerated field holds an unknown value.
    pub fn from_value(mut value: Value) -> Result<Self, TagParseError> {
        // `dominant_colors` wins when both spellings are present.
        if let Value::Object(map) = &mut value {
            if map.contains_key("dominant_colors") {
                map.remove("colors");
            }
        }
        let mut tags: Self = from_normalized(value)?;
        for list in [
            &mut tags.mood,
            &mut tags.style,
            &mut tags.dominant_colors,
            &mut tags.seasonal,
            &mut tags.associations,
        ] {
            tidy(list);
        }
        Ok(tags)
    }
}

/// Curated tag set produced by the refinement model from a consensus summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinedTags {
    pub temperature: Temperature,
    pub contrast: Contrast,
    pub brightness: Brightness,
    pub saturation: Saturation,
    pub mood: Vec<String>,
    pub style: Vec<String>,
    pub dominant_colors: Vec<String>,
    pub seasonal: Vec<String>,
    pub associations: Vec<String>,
    /// Prose summary, 30-50 words, fed to the embedding model.
    pub embed_text: String,
}

impl RefinedTags {
    /// Validate a JSON value against the curated schema.
    ///
    /// # Errors
    ///
    /// Returns [`TagParseError::Schema`] on shape mismatch and
    /// [`TagParseError::EmbedTextLength`] when `embed_text` falls outside
    /// 30-50 words.
    pub fn from_value(value: Value) -> Result<Self, TagParseError> {
        let mut tags: Self = from_normalized(value)?;
        for list in [
            &mut tags.mood,
            &mut tags.style,
            &mut tags.dominant_colors,
            &mut tags.seasonal,
            &mut tags.associations,
        ] {
            tidy(list);
        }
        tags.embed_text = tags.embed_text.trim().to_string();
        let words = tags.embed_text.split_whitespace().count();
        if !(EMBED_TEXT_MIN_WORDS..=EMBED_TEXT_MAX_WORDS).contains(&words) {
            return Err(TagParseError::EmbedTextLength(words));
        }
        Ok(tags)
    }
}

fn from_normalized<T: DeserializeOwned>(mut value: Value) -> Result<T, TagParseError> {
    lowercase_strings(&mut value);
    serde_json::from_value(value).map_err(TagParseError::Schema)
}

/// Lowercase every string in the tree except the free-text `embed_text`.
fn lowercase_strings(value: &mut Value) {
    match value {
        Value::String(s) => *s = s.trim().to_lowercase(),
        Value::Array(items) => items.iter_mut().for_each(lowercase_strings),
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if key != "embed_text" {
                    lowercase_strings(child);
                }
            }
        }
        _ => {}
    }
}

fn tidy(list: &mut Vec<String>) {
    list.retain(|tag| !tag.is_empty());
}
