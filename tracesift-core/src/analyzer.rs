use crate::ai_provider::{AIError, AIProvider};
use crate::error::TriageError;
use crate::prompts::{join_chunk_analyses, PromptTemplate};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Maximum number of chunk analyses in flight at once (1 = sequential)
    pub max_parallel_chunks: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_parallel_chunks: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisStage {
    /// Pass 1: one analysis per chunk
    ChunkAnalysis,
    /// Pass 2: one synthesis over all chunk analyses
    Synthesis,
    Complete,
}

/// Progress of a run, counted in service calls: one per chunk plus the
/// synthesis call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisProgress {
    pub stage: AnalysisStage,
    pub completed: usize,
    pub total: usize,
    pub phase: String,
}

impl AnalysisProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

pub type ProgressCallback = Box<dyn Fn(AnalysisProgress) + Send + Sync>;

/// Per-chunk analyses plus the synthesized report built from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentAnalysis {
    pub chunk_results: Vec<String>,
    pub final_report: String,
}

enum ChunkFailure {
    Cancelled,
    Service(AIError),
}

/// Two-pass orchestrator: analyze every chunk, then synthesize one report.
pub struct Analyzer {
    provider: Box<dyn AIProvider>,
    config: AnalysisConfig,
    progress_callback: Option<ProgressCallback>,
    cancellation: CancellationToken,
}

impl Analyzer {
    pub fn new(provider: Box<dyn AIProvider>) -> Self {
        Self {
            provider,
            config: AnalysisConfig::default(),
            progress_callback: None,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.get_provider_name()
    }

    fn report(&self, stage: AnalysisStage, completed: usize, total: usize, phase: String) {
        if let Some(ref callback) = self.progress_callback {
            callback(AnalysisProgress {
                stage,
                completed,
                total,
                phase,
            });
        }
    }

    /// Runs both passes over `chunks`.
    ///
    /// Chunk results keep chunk order even when several calls run at once.
    /// A failed chunk call stops the run; the error carries the results that
    /// completed before it. With no chunks the synthesis call still runs over
    /// an empty analyses section.
    pub async fn run<S: AsRef<str>>(
        &self,
        chunks: &[String],
        target_services: &[S],
        analysis_template: &PromptTemplate,
        synthesis_template: &PromptTemplate,
    ) -> Result<IncidentAnalysis, TriageError> {
        let total_chunks = chunks.len();
        let total_steps = total_chunks + 1;
        info!(
            "Starting two-pass analysis of {} chunk(s), up to {} in parallel",
            total_chunks,
            self.config.max_parallel_chunks.max(1)
        );

        let chunk_results = self
            .analyze_chunks(chunks, target_services, analysis_template, total_steps)
            .await?;

        if self.cancellation.is_cancelled() {
            warn!("Cancelled before synthesis");
            return Err(TriageError::Cancelled {
                completed: chunk_results,
            });
        }

        self.report(
            AnalysisStage::Synthesis,
            total_chunks,
            total_steps,
            "Pass 2/2: synthesizing final report".to_string(),
        );

        let joined = join_chunk_analyses(&chunk_results);
        let prompt = synthesis_template.render(target_services, &joined);
        debug!("Synthesis prompt is {} characters", prompt.chars().count());

        let started = Instant::now();
        let final_report = match self.provider.complete(&prompt).await {
            Ok(text) => text.trim().to_string(),
            Err(source) => {
                warn!("Synthesis call failed: {}", source);
                return Err(TriageError::Synthesis {
                    source,
                    chunk_results,
                });
            }
        };
        info!("Synthesis completed in {:.1?}", started.elapsed());

        self.report(
            AnalysisStage::Complete,
            total_steps,
            total_steps,
            "Done".to_string(),
        );

        Ok(IncidentAnalysis {
            chunk_results,
            final_report,
        })
    }

    async fn analyze_chunks<S: AsRef<str>>(
        &self,
        chunks: &[String],
        target_services: &[S],
        template: &PromptTemplate,
        total_steps: usize,
    ) -> Result<Vec<String>, TriageError> {
        let total = chunks.len();
        let provider = &self.provider;
        let cancellation = &self.cancellation;
        let mut results: Vec<String> = Vec::with_capacity(total);

        if total > 0 {
            self.report(
                AnalysisStage::ChunkAnalysis,
                0,
                total_steps,
                format!("Pass 1/2: analyzing chunk 1/{}", total),
            );
        }

        let calls = stream::iter(chunks.iter().enumerate().map(|(index, chunk)| {
            let prompt = template.render(target_services, chunk);
            async move {
                if cancellation.is_cancelled() {
                    return Err(ChunkFailure::Cancelled);
                }
                debug!(
                    "Analyzing chunk {}/{} ({} prompt characters)",
                    index + 1,
                    total,
                    prompt.chars().count()
                );
                let started = Instant::now();
                let outcome = provider.complete(&prompt).await;
                debug!("Chunk {}/{} returned after {:.1?}", index + 1, total, started.elapsed());
                outcome.map_err(ChunkFailure::Service)
            }
        }))
        .buffered(self.config.max_parallel_chunks.max(1));
        futures::pin_mut!(calls);

        while let Some(outcome) = calls.next().await {
            let chunk = results.len() + 1;
            match outcome {
                Ok(text) => results.push(text.trim().to_string()),
                Err(ChunkFailure::Cancelled) => {
                    warn!("Cancelled after {} of {} chunk(s)", results.len(), total);
                    return Err(TriageError::Cancelled { completed: results });
                }
                Err(ChunkFailure::Service(source)) => {
                    warn!("Chunk {}/{} failed: {}", chunk, total, source);
                    return Err(TriageError::ChunkAnalysis {
                        chunk,
                        total,
                        source,
                        completed: results,
                    });
                }
            }

            info!("Processed chunk {} of {}", chunk, total);
            if chunk < total {
                self.report(
                    AnalysisStage::ChunkAnalysis,
                    chunk,
                    total_steps,
                    format!("Pass 1/2: analyzing chunk {}/{}", chunk + 1, total),
                );
                if self.cancellation.is_cancelled() {
                    warn!("Cancelled after {} of {} chunk(s)", results.len(), total);
                    return Err(TriageError::Cancelled { completed: results });
                }
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_provider::MockAIProvider;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Answers each prompt with a label derived from it, recording every call.
    struct EchoProvider {
        prompts: Arc<Mutex<Vec<String>>>,
        fail_on: Option<String>,
        delay_for: fn(&str) -> u64,
    }

    impl EchoProvider {
        fn new(prompts: Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                prompts,
                fail_on: None,
                delay_for: |_| 0,
            }
        }
    }

    #[async_trait]
    impl AIProvider for EchoProvider {
        async fn complete(&self, prompt: &str) -> Result<String, AIError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let delay = (self.delay_for)(prompt);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            if let Some(ref marker) = self.fail_on {
                if prompt.contains(marker.as_str()) {
                    return Err(AIError::InvalidResponse("boom".to_string()));
                }
            }
            if prompt.starts_with("SYN") {
                return Ok("  final report  ".to_string());
            }
            let body = prompt.rsplit('|').next().unwrap_or_default();
            Ok(format!("  analysis of {}\n", body))
        }

        fn get_provider_name(&self) -> &'static str {
            "echo"
        }
    }

    fn templates() -> (PromptTemplate, PromptTemplate) {
        (
            PromptTemplate::analysis("ANA {target_services}|{log_text}").unwrap(),
            PromptTemplate::synthesis("SYN {target_services}\n{chunk_analyses}").unwrap(),
        )
    }

    fn chunks(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_synthesis_prompt_labels_chunks_in_order() {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let analyzer = Analyzer::new(Box::new(EchoProvider::new(prompts.clone())));
        let (analysis, synthesis) = templates();

        let result = analyzer
            .run(&chunks(&["X", "Y", "Z"]), &["svc"], &analysis, &synthesis)
            .await
            .unwrap();

        assert_eq!(
            result.chunk_results,
            vec!["analysis of X", "analysis of Y", "analysis of Z"]
        );
        assert_eq!(result.final_report, "final report");

        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 4);
        assert_eq!(prompts[0], "ANA [\"svc\"]|X");
        let synth = &prompts[3];
        let first = synth.find("Chunk 1 analysis:\nanalysis of X").unwrap();
        let second = synth.find("Chunk 2 analysis:\nanalysis of Y").unwrap();
        let third = synth.find("Chunk 3 analysis:\nanalysis of Z").unwrap();
        assert!(first < second && second < third);
        assert!(synth.contains("analysis of X\n\n---\n\nChunk 2"));
    }

    #[tokio::test]
    async fn test_parallel_results_keep_chunk_order() {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let mut provider = EchoProvider::new(prompts.clone());
        // Earlier chunks finish last.
        provider.delay_for = |prompt| {
            if prompt.ends_with("|a") {
                60
            } else if prompt.ends_with("|b") {
                30
            } else {
                0
            }
        };
        let analyzer = Analyzer::new(Box::new(provider))
            .with_config(AnalysisConfig { max_parallel_chunks: 3 });
        let (analysis, synthesis) = templates();

        let result = analyzer
            .run(&chunks(&["a", "b", "c", "d"]), &["svc"], &analysis, &synthesis)
            .await
            .unwrap();

        assert_eq!(
            result.chunk_results,
            vec!["analysis of a", "analysis of b", "analysis of c", "analysis of d"]
        );
    }

    #[tokio::test]
    async fn test_chunk_failure_reports_chunk_and_partial_results() {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let mut provider = EchoProvider::new(prompts.clone());
        provider.fail_on = Some("|second".to_string());
        let analyzer = Analyzer::new(Box::new(provider));
        let (analysis, synthesis) = templates();

        let err = analyzer
            .run(&chunks(&["first", "second", "third"]), &["svc"], &analysis, &synthesis)
            .await
            .unwrap_err();

        match err {
            TriageError::ChunkAnalysis {
                chunk,
                total,
                completed,
                ..
            } => {
                assert_eq!(chunk, 2);
                assert_eq!(total, 3);
                assert_eq!(completed, vec!["analysis of first"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        // Sequential run stops at the failing chunk; no synthesis call.
        assert_eq!(prompts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_synthesis_failure_keeps_all_chunk_results() {
        let mut mock = MockAIProvider::new();
        let mut calls = 0;
        mock.expect_complete().times(3).returning(move |_| {
            calls += 1;
            if calls < 3 {
                Ok(format!("chunk result {}", calls))
            } else {
                Err(AIError::RateLimited)
            }
        });
        let analyzer = Analyzer::new(Box::new(mock));
        let (analysis, synthesis) = templates();

        let err = analyzer
            .run(&chunks(&["one", "two"]), &["svc"], &analysis, &synthesis)
            .await
            .unwrap_err();

        assert!(matches!(err, TriageError::Synthesis { source: AIError::RateLimited, .. }));
        assert_eq!(err.partial_results(), &["chunk result 1", "chunk result 2"]);
    }

    #[tokio::test]
    async fn test_empty_chunks_still_synthesize() {
        let mut mock = MockAIProvider::new();
        mock.expect_complete()
            .times(1)
            .withf(|prompt: &str| prompt.starts_with("SYN [\"svc\"]\n") && prompt.ends_with('\n'))
            .returning(|_| Ok("degenerate".to_string()));
        let analyzer = Analyzer::new(Box::new(mock));
        let (analysis, synthesis) = templates();

        let result = analyzer.run(&[], &["svc"], &analysis, &synthesis).await.unwrap();
        assert!(result.chunk_results.is_empty());
        assert_eq!(result.final_report, "degenerate");
    }

    #[tokio::test]
    async fn test_cancellation_between_chunks() {
        let token = CancellationToken::new();
        let mut mock = MockAIProvider::new();
        let cancel = token.clone();
        mock.expect_complete().times(1).returning(move |_| {
            cancel.cancel();
            Ok("only one".to_string())
        });
        let analyzer = Analyzer::new(Box::new(mock)).with_cancellation(token);
        let (analysis, synthesis) = templates();

        let err = analyzer
            .run(&chunks(&["a", "b", "c"]), &["svc"], &analysis, &synthesis)
            .await
            .unwrap_err();

        match err {
            TriageError::Cancelled { completed } => assert_eq!(completed, vec!["only one"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_progress_counts_every_call() {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let analyzer = Analyzer::new(Box::new(EchoProvider::new(prompts)))
            .with_progress(Box::new(move |p| sink.lock().unwrap().push(p)));
        let (analysis, synthesis) = templates();

        analyzer
            .run(&chunks(&["a", "b"]), &["svc"], &analysis, &synthesis)
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        let steps: Vec<(AnalysisStage, usize, usize)> =
            seen.iter().map(|p| (p.stage, p.completed, p.total)).collect();
        assert_eq!(
            steps,
            vec![
                (AnalysisStage::ChunkAnalysis, 0, 3),
                (AnalysisStage::ChunkAnalysis, 1, 3),
                (AnalysisStage::Synthesis, 2, 3),
                (AnalysisStage::Complete, 3, 3),
            ]
        );
        assert_eq!(seen[1].phase, "Pass 1/2: analyzing chunk 2/2");
        assert_eq!(seen.last().unwrap().fraction(), 1.0);
    }
}
