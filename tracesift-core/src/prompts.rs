//! Prompt templates for the per-chunk analysis and the synthesis pass.
//!
//! Templates use named placeholders in braces (`{target_services}`,
//! `{log_text}`, `{chunk_analyses}`); literal braces are written `{{` and
//! `}}`. Templates are parsed once and rendering is a pure function of the
//! template, the target service list and the payload text.

use thiserror::Error;

pub const TARGET_SERVICES_PLACEHOLDER: &str = "target_services";
pub const LOG_TEXT_PLACEHOLDER: &str = "log_text";
pub const CHUNK_ANALYSES_PLACEHOLDER: &str = "chunk_analyses";

/// Separator placed between labelled chunk analyses in the synthesis prompt.
pub const CHUNK_SEPARATOR: &str = "\n\n---\n\n";

pub const DEFAULT_ANALYSIS_TEMPLATE: &str = r#"You are a senior software engineer and incident analyst with strong expertise in
telecom systems, VoIP, FreeSWITCH, SIP signaling, and distributed service orchestration.

I will provide you with runtime traces and logs.

Your task is to analyze the traces **only with respect to the following target services**:

TARGET_SERVICES = {target_services}

For each service listed in TARGET_SERVICES, perform the following steps:

1. **Extract Relevant Events**
   - Identify all log entries, warnings, errors, and state transitions that are
     directly or indirectly related to the service.
   - Ignore unrelated services unless they directly affect one of the target services.

2. **Reconstruct the Event Timeline**
   - Rebuild a chronological sequence of events for each service.
   - Clearly indicate:
     - Triggering events
     - Requests, responses, retries, rescans, or restarts
     - Configuration reloads or network-related changes

3. **Analyze Service Interactions**
   - Describe how the target services interact with each other and with external
     components (e.g. SIP gateways, network interfaces, DHCP, edge devices).
   - Highlight any dependency failures or race conditions.

4. **Identify Anomalies and Failure Signals**
   - Point out symptoms such as:
     - “Invalid Gateway”
     - Registration failures
     - Timeouts or stale configuration
   - Explain why these symptoms appear based on the trace evidence.

5. **Root Cause Hypothesis**
   - Provide one or more plausible root causes, clearly labeled as hypotheses.
   - Base your reasoning strictly on observable trace data.

6. **Recovery and Mitigation Evidence**
   - Identify any recovery actions present in the traces
     (e.g. profile rescan, configuration reload, retry loops).
   - Assess whether they are sufficient or incomplete.

7. **Final Summary (Jira-Ready)**
   - Produce a concise technical summary suitable for a Jira ticket, including:
     - Impacted services
     - What happened
     - Why it happened
     - What worked
     - What did not work

Formatting requirements:
- Use clear section headers.
- Be precise and technical.
- Do not speculate beyond trace evidence.
- Prefer deterministic language over generic explanations.

LOG CHUNK:
```text
{log_text}
```"#;

pub const DEFAULT_SYNTHESIS_TEMPLATE: &str = r#"You are consolidating multiple chunk-level analyses of the same incident.
Combine them into ONE coherent incident report.

Requirements:
- Merge duplicated information.
- Resolve ordering into a single timeline per service when possible.
- Keep evidence-based statements.
- Clearly label hypotheses.
- Produce a Jira-ready final summary.

TARGET_SERVICES = {target_services}

CHUNK ANALYSES:
{chunk_analyses}
"#;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    #[error("unknown placeholder {{{name}}} in {kind} template")]
    UnknownPlaceholder { name: String, kind: TemplateKind },
    #[error("{kind} template must contain {{{name}}}")]
    MissingPlaceholder { name: &'static str, kind: TemplateKind },
    #[error("unbalanced brace at character {position} in {kind} template (write {{{{ or }}}} for a literal brace)")]
    UnbalancedBrace { position: usize, kind: TemplateKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Analysis,
    Synthesis,
}

impl TemplateKind {
    fn payload_placeholder(self) -> &'static str {
        match self {
            TemplateKind::Analysis => LOG_TEXT_PLACEHOLDER,
            TemplateKind::Synthesis => CHUNK_ANALYSES_PLACEHOLDER,
        }
    }
}

impl std::fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateKind::Analysis => write!(f, "analysis"),
            TemplateKind::Synthesis => write!(f, "synthesis"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    TargetServices,
    Payload,
}

/// A parsed, validated prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    kind: TemplateKind,
    source: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    pub fn analysis(source: impl Into<String>) -> Result<Self, PromptError> {
        Self::parse(TemplateKind::Analysis, source.into())
    }

    pub fn synthesis(source: impl Into<String>) -> Result<Self, PromptError> {
        Self::parse(TemplateKind::Synthesis, source.into())
    }

    pub fn default_analysis() -> Self {
        Self::analysis(DEFAULT_ANALYSIS_TEMPLATE).expect("built-in analysis template is valid")
    }

    pub fn default_synthesis() -> Self {
        Self::synthesis(DEFAULT_SYNTHESIS_TEMPLATE).expect("built-in synthesis template is valid")
    }

    pub fn kind(&self) -> TemplateKind {
        self.kind
    }

    fn parse(kind: TemplateKind, source: String) -> Result<Self, PromptError> {
        let payload = kind.payload_placeholder();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut has_payload = false;
        let mut chars = source.chars().enumerate().peekable();

        while let Some((position, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, n) in chars.by_ref() {
                        if n == '}' {
                            closed = true;
                            break;
                        }
                        name.push(n);
                    }
                    if !closed || !is_identifier(&name) {
                        return Err(PromptError::UnbalancedBrace { position, kind });
                    }
                    let segment = if name == TARGET_SERVICES_PLACEHOLDER {
                        Segment::TargetServices
                    } else if name == payload {
                        has_payload = true;
                        Segment::Payload
                    } else {
                        return Err(PromptError::UnknownPlaceholder { name, kind });
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(segment);
                }
                '}' => return Err(PromptError::UnbalancedBrace { position, kind }),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        if !has_payload {
            return Err(PromptError::MissingPlaceholder { name: payload, kind });
        }

        Ok(Self { kind, source, segments })
    }

    /// Fills the template. Inserted text is never re-scanned for placeholders.
    pub fn render<S: AsRef<str>>(&self, target_services: &[S], payload: &str) -> String {
        let targets = format_target_services(target_services);
        let mut out = String::with_capacity(self.source.len() + payload.len() + targets.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::TargetServices => out.push_str(&targets),
                Segment::Payload => out.push_str(payload),
            }
        }
        out
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Renders the target list in operator order, e.g. `["freeswitch","sip"]`.
pub fn format_target_services<S: AsRef<str>>(target_services: &[S]) -> String {
    let names: Vec<&str> = target_services.iter().map(|s| s.as_ref()).collect();
    serde_json::to_string(&names).unwrap_or_else(|_| format!("{:?}", names))
}

/// Labels each analysis with its 1-based chunk number, in order.
pub fn join_chunk_analyses<S: AsRef<str>>(analyses: &[S]) -> String {
    analyses
        .iter()
        .enumerate()
        .map(|(i, analysis)| format!("Chunk {} analysis:\n{}", i + 1, analysis.as_ref()))
        .collect::<Vec<_>>()
        .join(CHUNK_SEPARATOR)
}
