// TraceSift Library - targeted journal triage
//
// Narrows a large log export to the lines around a set of target services,
// splits the result into chunks and runs a two-pass analysis over them.

use tracing::{info, warn};

pub mod ai_provider;
pub mod analyzer;
pub mod chunker;
pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod input;
pub mod matcher;
pub mod output;
pub mod prompts;

pub use ai_provider::{api_key_env_var, create_provider, AIError, AIProvider, ProviderOptions};
pub use analyzer::{
    AnalysisConfig, AnalysisProgress, AnalysisStage, Analyzer, IncidentAnalysis, ProgressCallback,
};
pub use chunker::chunk_text_by_chars;
pub use config::{parse_target_services, Config, TriageConfig, TriageConfigBuilder};
pub use error::TriageError;
pub use filter::{filter_lines_with_context, FilterStats, FilteredLines, TruncationPolicy};
pub use input::{execute_and_capture, read_log_file, read_stdin, split_lines, LogInput};
pub use output::{
    generate_report, save_report, write_chunk_reports, OutputFormat, ReportMetadata, TriageReport,
};
pub use prompts::{PromptError, PromptTemplate};

/// Filtered lines and the chunks cut from them, before any service call.
#[derive(Debug, Clone)]
pub struct PreparedInput {
    pub filtered: FilteredLines,
    pub chunks: Vec<String>,
}

/// Result of a triage run that did not fail.
#[derive(Debug, Clone)]
pub enum TriageOutcome {
    /// No line matched a target service; nothing was sent for analysis.
    NoRelevantLines(FilterStats),
    Report(TriageReport),
}

/// Filter, chunk and analyze one log export with a fixed configuration.
pub struct TraceSift {
    config: TriageConfig,
}

impl TraceSift {
    pub fn new(config: TriageConfig) -> Result<Self, TriageError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    pub fn filter(&self, input: &LogInput) -> FilteredLines {
        let lines = input.lines();
        filter_lines_with_context(
            &lines,
            self.config.target_services(),
            self.config.context_lines(),
            self.config.max_filtered_lines(),
            self.config.truncation(),
        )
    }

    pub fn prepare(&self, input: &LogInput) -> PreparedInput {
        let filtered = self.filter(input);
        let chunks = chunk_text_by_chars(&filtered.text(), self.config.chunk_size());
        info!(
            "Prepared {} chunk(s) of up to {} characters",
            chunks.len(),
            self.config.chunk_size()
        );
        PreparedInput { filtered, chunks }
    }

    /// Analyzer wired with this run's parallelism.
    pub fn analyzer(&self, provider: Box<dyn AIProvider>) -> Analyzer {
        Analyzer::new(provider).with_config(AnalysisConfig {
            max_parallel_chunks: self.config.max_parallel_chunks(),
        })
    }

    /// Runs the full pipeline. An empty filter result short-circuits before
    /// any chunking or service call.
    pub async fn analyze(
        &self,
        input: &LogInput,
        analyzer: &Analyzer,
    ) -> Result<TriageOutcome, TriageError> {
        let prepared = self.prepare(input);
        if prepared.chunks.is_empty() {
            warn!(
                "No relevant lines found for target services: {}",
                self.config.target_services_display()
            );
            return Ok(TriageOutcome::NoRelevantLines(prepared.filtered.stats));
        }

        let analysis = analyzer
            .run(
                &prepared.chunks,
                self.config.target_services(),
                self.config.analysis_template(),
                self.config.synthesis_template(),
            )
            .await?;

        Ok(TriageOutcome::Report(TriageReport {
            metadata: ReportMetadata::now(
                analyzer.provider_name(),
                self.config.model(),
                self.config.temperature(),
                input.source.clone(),
                self.config.target_services().to_vec(),
            ),
            stats: prepared.filtered.stats,
            chunk_count: prepared.chunks.len(),
            analysis,
        }))
    }
}
