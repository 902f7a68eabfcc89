use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracesift_core::ai_provider::SUPPORTED_PROVIDERS;
use tracesift_core::output::DEFAULT_REPORT_FILE;
use tracesift_core::{OutputFormat, TruncationPolicy};

#[derive(Parser, Debug)]
#[command(
    name = "tracesift",
    about = "Narrow a journalctl export to target services and get an LLM incident report",
    version,
    author = "TraceSift Team"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file to use instead of .tracesift.toml / ~/.config/tracesift/config.toml
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Filter, chunk and analyze a log export (two passes)
    Analyze(AnalyzeArgs),

    /// Show filter stats and a preview of the retained lines without calling any service
    Filter(FilterArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct InputArgs {
    /// Log file to read (defaults to stdin)
    #[arg(short, long, value_name = "PATH", conflicts_with = "exec")]
    pub file: Option<PathBuf>,

    /// Command whose output is analyzed, e.g. "journalctl -u freeswitch --since today"
    #[arg(short, long, value_name = "COMMAND")]
    pub exec: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Comma-separated target services, e.g. "freeswitch, tai6-manager"
    #[arg(short, long, value_name = "LIST")]
    pub services: String,

    /// Lines of context kept before and after each match
    #[arg(short, long)]
    pub context: Option<usize>,

    /// Maximum number of filtered lines passed on
    #[arg(long, value_name = "N")]
    pub max_lines: Option<usize>,

    /// Which lines survive when the cap is hit: head, tail or sampled
    #[arg(long, value_name = "POLICY", value_parser = parse_truncation)]
    pub truncate: Option<TruncationPolicy>,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Characters per chunk (0 sends everything in one chunk)
    #[arg(long, value_name = "CHARS")]
    pub chunk_size: Option<usize>,

    /// AI provider: openai, openrouter or claude (alias anthropic)
    #[arg(short, long, value_parser = parse_provider)]
    pub provider: Option<String>,

    /// Model identifier passed to the provider
    #[arg(short, long)]
    pub model: Option<String>,

    /// Sampling temperature between 0 and 1
    #[arg(short, long, value_parser = parse_temperature)]
    pub temperature: Option<f32>,

    /// API key (overrides the <PROVIDER>_API_KEY variable and the config file)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Replace the per-chunk prompt; must contain {log_text}
    #[arg(long, value_name = "PATH")]
    pub prompt_file: Option<PathBuf>,

    /// Replace the synthesis prompt; must contain {chunk_analyses}
    #[arg(long, value_name = "PATH")]
    pub synthesis_file: Option<PathBuf>,

    /// Report format on stdout: console, json or markdown
    #[arg(long, default_value = "console", value_parser = parse_format)]
    pub format: OutputFormat,

    /// Write the markdown report to a file
    #[arg(short, long, value_name = "PATH", num_args = 0..=1, default_missing_value = DEFAULT_REPORT_FILE)]
    pub out: Option<PathBuf>,

    /// Write each chunk analysis to chunk-NNN.md in this directory
    #[arg(long, value_name = "DIR")]
    pub chunks_dir: Option<PathBuf>,

    /// Chunk analyses in flight at once
    #[arg(long, value_name = "N")]
    pub parallel: Option<usize>,
}

fn parse_truncation(s: &str) -> Result<TruncationPolicy, String> {
    s.parse::<TruncationPolicy>().map_err(|e| e.to_string())
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    s.parse::<OutputFormat>().map_err(|e| e.to_string())
}

fn parse_provider(s: &str) -> Result<String, String> {
    let name = s.trim().to_lowercase();
    if name == "anthropic" || SUPPORTED_PROVIDERS.contains(&name.as_str()) {
        Ok(name)
    } else {
        Err(format!(
            "unknown provider '{}', expected one of: {}",
            s,
            SUPPORTED_PROVIDERS.join(", ")
        ))
    }
}

fn parse_temperature(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("temperature must be between 0 and 1, got {}", value))
    }
}
