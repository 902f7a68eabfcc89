use super::{OutputGenerator, TriageReport};
use anyhow::Result;

pub struct MarkdownOutput;

impl OutputGenerator for MarkdownOutput {
    fn generate(&self, report: &TriageReport) -> Result<String> {
        Ok(composite_document(
            &report.metadata.target_services,
            &report.analysis.final_report,
        ))
    }
}

/// Downloadable document: title, target service list, rule, final report.
pub fn composite_document<S: AsRef<str>>(target_services: &[S], final_report: &str) -> String {
    let services: Vec<&str> = target_services.iter().map(|s| s.as_ref()).collect();
    format!(
        "# Journalctl Trace Analysis\n\n## Target services\n- {}\n\n---\n\n{}",
        services.join("\n- "),
        final_report
    )
}
