pub mod console;
pub mod json;
pub mod markdown;

use crate::analyzer::IncidentAnalysis;
use crate::filter::FilterStats;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use console::ConsoleOutput;
use json::JsonOutput;
use markdown::MarkdownOutput;

/// Default file name for the composite markdown document.
pub const DEFAULT_REPORT_FILE: &str = "journalctl_trace_report.md";

/// Everything one successful triage run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageReport {
    pub metadata: ReportMetadata,
    pub stats: FilterStats,
    pub chunk_count: usize,
    pub analysis: IncidentAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub timestamp: String,
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub input_source: String,
    pub target_services: Vec<String>,
}

impl ReportMetadata {
    pub fn now(
        provider: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        input_source: impl Into<String>,
        target_services: Vec<String>,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            provider: provider.into(),
            model: model.into(),
            temperature,
            input_source: input_source.into(),
            target_services,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Console,
    Json,
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "console" | "text" => Ok(OutputFormat::Console),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(anyhow::anyhow!("Invalid output format: {}", s)),
        }
    }
}

pub trait OutputGenerator {
    fn generate(&self, report: &TriageReport) -> Result<String>;
}

pub fn generate_report(report: &TriageReport, format: OutputFormat) -> Result<String> {
    debug!("Rendering report as {:?}", format);
    match format {
        OutputFormat::Console => ConsoleOutput.generate(report),
        OutputFormat::Json => JsonOutput.generate(report),
        OutputFormat::Markdown => MarkdownOutput.generate(report),
    }
}

pub fn save_report(content: &str, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output_path, content)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;
    info!("Report written to {}", output_path.display());
    Ok(())
}

/// Writes each chunk analysis to `chunk-001.md`, `chunk-002.md`, ... in `dir`.
pub fn write_chunk_reports<S: AsRef<str>>(dir: &Path, chunk_results: &[S]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create chunk directory {}", dir.display()))?;
    let mut written = Vec::with_capacity(chunk_results.len());
    for (i, result) in chunk_results.iter().enumerate() {
        let path = dir.join(format!("chunk-{:03}.md", i + 1));
        std::fs::write(&path, result.as_ref())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }
    info!("Wrote {} chunk analyses to {}", written.len(), dir.display());
    Ok(written)
}

#[cfg(test)]
pub(crate) fn sample_report() -> TriageReport {
    TriageReport {
        metadata: ReportMetadata {
            timestamp: "2026-01-01T00:00:00+00:00".to_string(),
            provider: "openai".to_string(),
            model: "gpt-5.2".to_string(),
            temperature: 0.3,
            input_source: "journal.log".to_string(),
            target_services: vec!["freeswitch".to_string(), "tai6-manager".to_string()],
        },
        stats: FilterStats {
            total_lines: 120,
            hits: 4,
            kept_before_truncation: 30,
            filtered_lines: 30,
            truncated: false,
        },
        chunk_count: 2,
        analysis: IncidentAnalysis {
            chunk_results: vec!["first chunk".to_string(), String::new()],
            final_report: "Gateway went stale.".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("console".parse::<OutputFormat>().unwrap(), OutputFormat::Console);
        assert!("html".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_write_chunk_reports_numbering() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("chunks");
        let paths = write_chunk_reports(&target, &["one", "two"]).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("chunk-001.md"));
        assert_eq!(std::fs::read_to_string(&paths[1]).unwrap(), "two");
    }

    #[test]
    fn test_save_report_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join(DEFAULT_REPORT_FILE);
        save_report("# hi", &path).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# hi");
    }
}
