//! Frequency aggregation over provider tag results.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use huetag_core::TagResponse;
use huetag_db::TagResultRow;
use serde::{Deserialize, Serialize};

/// Number of entries per field kept in the audit copy stored with a refinement.
pub const AUDIT_TOP_N: usize = 10;

pub type Counts = BTreeMap<String, u32>;

/// Value counts per field across every valid provider response for one seed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSummary {
    pub total_valid_responses: u32,
    pub temperature: Counts,
    pub contrast: Counts,
    pub brightness: Counts,
    pub saturation: Counts,
    pub mood: Counts,
    pub style: Counts,
    pub dominant_colors: Counts,
    pub seasonal: Counts,
    pub associations: Counts,
}

impl TagSummary {
    #[must_use]
    pub fn from_responses<'a, I>(responses: I) -> Self
    where
        I: IntoIterator<Item = &'a TagResponse>,
    {
        let mut summary = Self::default();
        for response in responses {
            summary.add(response);
        }
        summary
    }

    fn add(&mut self, tags: &TagResponse) {
        self.total_valid_responses += 1;
        bump(&mut self.temperature, tags.temperature.as_str());
        bump(&mut self.contrast, tags.contrast.as_str());
        bump(&mut self.brightness, tags.brightness.as_str());
        bump(&mut self.saturation, tags.saturation.as_str());
        for (counts, values) in [
            (&mut self.mood, &tags.mood),
            (&mut self.style, &tags.style),
            (&mut self.dominant_colors, &tags.dominant_colors),
            (&mut self.seasonal, &tags.seasonal),
            (&mut self.associations, &tags.associations),
        ] {
            for value in values {
                bump(counts, value);
            }
        }
    }

    fn fields(&self) -> [(&'static str, &Counts); 9] {
        [
            ("temperature", &self.temperature),
            ("contrast", &self.contrast),
            ("brightness", &self.brightness),
            ("saturation", &self.saturation),
            ("mood", &self.mood),
            ("style", &self.style),
            ("dominant_colors", &self.dominant_colors),
            ("seasonal", &self.seasonal),
            ("associations", &self.associations),
        ]
    }

    fn fields_mut(&mut self) -> [&mut Counts; 9] {
        [
            &mut self.temperature,
            &mut self.contrast,
            &mut self.brightness,
            &mut self.saturation,
            &mut self.mood,
            &mut self.style,
            &mut self.dominant_colors,
            &mut self.seasonal,
            &mut self.associations,
        ]
    }

    /// Copy keeping only the `limit` most frequent entries of each field.
    #[must_use]
    pub fn trimmed(&self, limit: usize) -> Self {
        let mut copy = self.clone();
        for counts in copy.fields_mut() {
            let keep: Counts = ranked(counts)
                .into_iter()
                .take(limit)
                .map(|(value, count)| (value.to_owned(), count))
                .collect();
            *counts = keep;
        }
        copy
    }

    /// Frequency tables as `value: count/total` lines, one block per field,
    /// most frequent first.
    #[must_use]
    pub fn to_prompt_text(&self) -> String {
        let total = self.total_valid_responses;
        let mut out = String::new();
        for (name, counts) in self.fields() {
            let _ = writeln!(out, "{name}:");
            if counts.is_empty() {
                let _ = writeln!(out, "  (none)");
            }
            for (value, count) in ranked(counts) {
                let _ = writeln!(out, "  {value}: {count}/{total}");
            }
        }
        out
    }
}

fn bump(counts: &mut Counts, value: &str) {
    *counts.entry(value.to_owned()).or_insert(0) += 1;
}

/// Entries ordered by descending count, ties broken alphabetically.
fn ranked(counts: &Counts) -> Vec<(&str, u32)> {
    let mut entries: Vec<(&str, u32)> = counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    entries
}

/// Summarize stored rows. Error rows never count, and neither do payloads
/// that no longer match the schema.
#[must_use]
pub fn aggregate(rows: &[TagResultRow]) -> TagSummary {
    let responses: Vec<TagResponse> = rows
        .iter()
        .filter_map(|row| {
            let tags = row.tags.clone()?;
            match TagResponse::from_value(tags) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    tracing::warn!(
                        seed = %row.seed,
                        provider = %row.provider,
                        id = row.id,
                        error = %e,
                        "stored tags do not match schema; excluded from consensus"
                    );
                    None
                }
            }
        })
        .collect();
    TagSummary::from_responses(&responses)
}

/// Full refinement prompt: palette description followed by the consensus tables.
#[must_use]
pub fn refinement_prompt(description: &str, summary: &TagSummary) -> String {
    format!(
        "Palette:\n{description}\n\nProvider consensus ({} valid responses):\n{}",
        summary.total_valid_responses,
        summary.to_prompt_text()
    )
}
