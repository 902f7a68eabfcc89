use super::{OutputGenerator, TriageReport};
use anyhow::Result;

pub struct JsonOutput;

impl OutputGenerator for JsonOutput {
    fn generate(&self, report: &TriageReport) -> Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }
}
