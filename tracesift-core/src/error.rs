use crate::ai_provider::AIError;
use crate::prompts::PromptError;
use thiserror::Error;

/// Failure of a triage run.
///
/// Service failures are reported per pass so the operator can tell which
/// stage broke; every variant raised after PASS1 started carries the chunk
/// analyses that were already completed, in chunk order.
#[derive(Error, Debug)]
pub enum TriageError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Prompt template error: {0}")]
    Prompt(#[from] PromptError),

    #[error("Pass 1 failed on chunk {chunk} of {total}: {source}")]
    ChunkAnalysis {
        /// 1-based chunk number
        chunk: usize,
        total: usize,
        #[source]
        source: AIError,
        completed: Vec<String>,
    },

    #[error("Pass 2 (synthesis) failed: {source}")]
    Synthesis {
        #[source]
        source: AIError,
        chunk_results: Vec<String>,
    },

    #[error("Analysis cancelled after {} completed chunk(s)", completed.len())]
    Cancelled { completed: Vec<String> },
}

impl TriageError {
    pub fn configuration(message: impl Into<String>) -> Self {
        TriageError::Configuration(message.into())
    }

    /// Chunk analyses that finished before the run stopped.
    pub fn partial_results(&self) -> &[String] {
        match self {
            TriageError::ChunkAnalysis { completed, .. } => completed,
            TriageError::Synthesis { chunk_results, .. } => chunk_results,
            TriageError::Cancelled { completed } => completed,
            TriageError::Configuration(_) | TriageError::Prompt(_) => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_failure_message_names_pass_and_chunk() {
        let err = TriageError::ChunkAnalysis {
            chunk: 2,
            total: 5,
            source: AIError::RateLimited,
            completed: vec!["first".to_string()],
        };
        assert_eq!(err.to_string(), "Pass 1 failed on chunk 2 of 5: Rate limited");
        assert_eq!(err.partial_results(), &["first".to_string()]);
    }

    #[test]
    fn test_synthesis_failure_keeps_chunk_results() {
        let err = TriageError::Synthesis {
            source: AIError::AuthenticationError,
            chunk_results: vec!["a".to_string(), "b".to_string()],
        };
        assert!(err.to_string().starts_with("Pass 2 (synthesis) failed"));
        assert_eq!(err.partial_results().len(), 2);
    }

    #[test]
    fn test_configuration_has_no_partial_results() {
        let err = TriageError::configuration("no target services");
        assert!(err.partial_results().is_empty());
        assert_eq!(err.to_string(), "Configuration error: no target services");
    }
}
