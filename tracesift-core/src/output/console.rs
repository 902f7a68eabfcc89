use super::{OutputGenerator, TriageReport};
use crate::filter::FilteredLines;
use anyhow::Result;
use std::fmt::Write;

/// Number of filtered lines shown by [`render_filter_preview`].
pub const PREVIEW_LINES: usize = 200;

const EMPTY: &str = "(empty)";

pub struct ConsoleOutput;

impl OutputGenerator for ConsoleOutput {
    fn generate(&self, report: &TriageReport) -> Result<String> {
        let mut out = String::new();
        let stats = &report.stats;

        writeln!(out, "Input stats")?;
        writeln!(out, "- Total lines: {}", stats.total_lines)?;
        writeln!(
            out,
            "- Target services: {}",
            display_targets(&report.metadata.target_services)
        )?;
        writeln!(out, "- Direct matches (hits): {}", stats.hits)?;
        write!(out, "- Filtered lines (with context): {}", stats.filtered_lines)?;
        if stats.truncated {
            write!(out, " (capped from {})", stats.kept_before_truncation)?;
        }
        writeln!(out)?;
        writeln!(out, "- Chunks analyzed: {}", report.chunk_count)?;

        writeln!(out, "\n== Final report ==\n")?;
        writeln!(out, "{}", or_empty(&report.analysis.final_report))?;

        writeln!(out, "\n== Chunk analyses ==")?;
        for (i, result) in report.analysis.chunk_results.iter().enumerate() {
            writeln!(out, "\n--- Chunk {} ---\n{}", i + 1, or_empty(result))?;
        }
        Ok(out)
    }
}

fn or_empty(text: &str) -> &str {
    if text.trim().is_empty() {
        EMPTY
    } else {
        text
    }
}

pub fn display_targets<S: AsRef<str>>(target_services: &[S]) -> String {
    if target_services.is_empty() {
        "(none)".to_string()
    } else {
        target_services
            .iter()
            .map(|s| s.as_ref())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Stats plus the first [`PREVIEW_LINES`] filtered lines, for a dry run.
pub fn render_filter_preview<S: AsRef<str>>(target_services: &[S], filtered: &FilteredLines) -> String {
    let stats = &filtered.stats;
    let preview = filtered
        .lines
        .iter()
        .take(PREVIEW_LINES)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Input stats\n- Total lines: {}\n- Target services: {}\n\nFiltered stats\n- Direct matches (hits): {}\n- Filtered lines (with context): {}\n\nFiltered preview\n{}\n",
        stats.total_lines,
        display_targets(target_services),
        stats.hits,
        stats.filtered_lines,
        if preview.is_empty() { "(no matching lines found)" } else { preview.as_str() }
    )
}
