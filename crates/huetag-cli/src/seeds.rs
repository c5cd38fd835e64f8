//! Seed registry commands.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;

/// Sub-commands available under `seeds`.
#[derive(Debug, Subcommand)]
pub enum SeedsCommands {
    /// Import newline-separated seeds from a file (existing seeds are ignored)
    Import {
        /// File with one seed per line; blank lines and `#` comments are skipped
        path: PathBuf,
    },
}

/// Extract seeds from file contents, preserving first-seen order.
pub(crate) fn parse_seed_lines(contents: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| seen.insert(*line))
        .map(ToOwned::to_owned)
        .collect()
}

/// # Errors
///
/// Returns an error if the file cannot be read or the insert fails.
pub(crate) async fn run_seeds_import(pool: &sqlx::PgPool, path: &Path) -> anyhow::Result<()> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read seed file {}", path.display()))?;
    let seeds = parse_seed_lines(&contents);

    if seeds.is_empty() {
        println!("no seeds found in {}", path.display());
        return Ok(());
    }

    let inserted = huetag_db::insert_seeds(pool, &seeds).await?;
    tracing::info!(path = %path.display(), read = seeds.len(), inserted, "seed import finished");
    println!(
        "imported {inserted} new seeds ({} already known)",
        (seeds.len() as u64).saturating_sub(inserted)
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_blanks_comments_and_duplicates() {
        let seeds = parse_seed_lines("abc\n\n  def  \n# note\nabc\nghi\n");
        assert_eq!(seeds, vec!["abc", "def", "ghi"]);
    }
}
