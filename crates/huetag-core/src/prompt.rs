//! Instruction texts and their content-hash versions.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Instruction text sent to every classification provider.
///
/// Any edit here changes [`PromptVersion::tagging`] and starts a fresh run.
pub const TAGGING_INSTRUCTIONS: &str = "\
You are a color palette classifier. You will receive a description of a color gradient \
palette as a list of color stops in HEX, RGB, HSL and LCH notation.

Respond with a single JSON object and nothing else, using exactly these fields:
- \"temperature\": one of \"warm\", \"cool\", \"neutral\"
- \"contrast\": one of \"high\", \"medium\", \"low\"
- \"brightness\": one of \"light\", \"medium\", \"dark\"
- \"saturation\": one of \"vibrant\", \"moderate\", \"muted\"
- \"mood\": array of 3-5 lowercase mood words
- \"style\": array of 2-4 lowercase design styles
- \"dominant_colors\": array of 2-4 lowercase common color names
- \"seasonal\": array of 0-2 lowercase seasons or holidays
- \"associations\": array of 3-6 lowercase objects, places or themes

Use lowercase for every value. Do not add commentary or markdown.";

/// Instruction text sent to the refinement model together with the
/// consensus frequency tables.
pub const REFINEMENT_INSTRUCTIONS: &str = "\
You curate tags for a color gradient palette. Several independent classifiers have tagged \
the palette; you receive the palette colors and how often each value was proposed, written \
as `value: count/total`.

Choose the single best value for temperature, contrast, brightness and saturation. For mood, \
style, dominant_colors, seasonal and associations keep the tags with real agreement, merge \
synonyms, drop outliers, and add a missing tag only when the colors clearly support it.

Respond with a single JSON object and nothing else, with fields \"temperature\", \
\"contrast\", \"brightness\", \"saturation\", \"mood\", \"style\", \"dominant_colors\", \
\"seasonal\", \"associations\" (same allowed values as the classifiers, lowercase) and \
\"embed_text\": a 30-50 word natural-language description of the palette suitable for \
semantic search.";

/// Content hash identifying one revision of an instruction text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptVersion(String);

impl PromptVersion {
    const HEX_LEN: usize = 12;

    /// Hash `text` into a version identifier (first 12 hex chars of SHA-256).
    #[must_use]
    pub fn of(text: &str) -> Self {
        let digest = Sha256::digest(text.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        Self(hex[..Self::HEX_LEN].to_string())
    }

    /// Version of the active tagging instructions.
    #[must_use]
    pub fn tagging() -> Self {
        Self::of(TAGGING_INSTRUCTIONS)
    }

    /// Version of the active refinement instructions.
    #[must_use]
    pub fn refinement() -> Self {
        Self::of(REFINEMENT_INSTRUCTIONS)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PromptVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_stable_and_short() {
        let a = PromptVersion::of("classify this");
        let b = PromptVersion::of("classify this");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 12);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn any_edit_changes_version() {
        assert_ne!(
            PromptVersion::of("classify this"),
            PromptVersion::of("classify this.")
        );
        assert_ne!(PromptVersion::tagging(), PromptVersion::refinement());
    }
}
