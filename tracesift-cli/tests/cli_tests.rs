// CLI tests: argument parsing, config layering and offline command runs

use clap::Parser;
use std::io::Write;
use tracesift_cli::{build_analyze_config, build_filter_config, run, Cli, Commands, InterruptState};
use tracesift_core::{Config, OutputFormat, TruncationPolicy};

fn analyze_args(argv: &[&str]) -> tracesift_cli::AnalyzeArgs {
    match Cli::try_parse_from(argv).unwrap().command {
        Commands::Analyze(args) => args,
        other => panic!("expected analyze, got {:?}", other),
    }
}

fn empty_config_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[defaults]").unwrap();
    file
}

#[test]
fn test_parse_analyze_flags() {
    let args = analyze_args(&[
        "tracesift",
        "analyze",
        "-f",
        "journal.log",
        "-s",
        "freeswitch, tai6-manager",
        "--context",
        "10",
        "--truncate",
        "tail",
        "--chunk-size",
        "500",
        "--temperature",
        "0.7",
        "--format",
        "json",
        "--parallel",
        "3",
    ]);
    assert_eq!(args.filter.input.file.as_deref(), Some(std::path::Path::new("journal.log")));
    assert_eq!(args.filter.services, "freeswitch, tai6-manager");
    assert_eq!(args.filter.context, Some(10));
    assert_eq!(args.filter.truncate, Some(TruncationPolicy::Tail));
    assert_eq!(args.chunk_size, Some(500));
    assert_eq!(args.temperature, Some(0.7));
    assert_eq!(args.format, OutputFormat::Json);
    assert_eq!(args.parallel, Some(3));
    assert!(args.out.is_none());
}

#[test]
fn test_out_flag_without_value_uses_default_name() {
    let args = analyze_args(&["tracesift", "analyze", "-s", "svc", "--out"]);
    assert_eq!(
        args.out.as_deref(),
        Some(std::path::Path::new("journalctl_trace_report.md"))
    );
}

#[test]
fn test_services_are_required() {
    assert!(Cli::try_parse_from(["tracesift", "analyze", "-f", "x.log"]).is_err());
    assert!(Cli::try_parse_from(["tracesift", "filter"]).is_err());
}

#[test]
fn test_invalid_values_rejected_at_parse_time() {
    assert!(Cli::try_parse_from(["tracesift", "analyze", "-s", "a", "--temperature", "1.5"]).is_err());
    assert!(Cli::try_parse_from(["tracesift", "analyze", "-s", "a", "--truncate", "middle"]).is_err());
    assert!(Cli::try_parse_from(["tracesift", "analyze", "-s", "a", "--format", "html"]).is_err());
    assert!(Cli::try_parse_from(["tracesift", "filter", "-s", "a", "-f", "x", "-e", "journalctl"]).is_err());
    assert!(Cli::try_parse_from(["tracesift", "analyze", "-s", "a", "--provider", "gemini"]).is_err());
}

#[test]
fn test_provider_names_are_normalized() {
    let args = analyze_args(&["tracesift", "analyze", "-s", "a", "--provider", "Anthropic"]);
    assert_eq!(args.provider.as_deref(), Some("anthropic"));
    let args = analyze_args(&["tracesift", "analyze", "-s", "a", "-p", "openrouter"]);
    assert_eq!(args.provider.as_deref(), Some("openrouter"));
}

#[test]
fn test_flags_override_file_config() {
    let mut file_config = Config::builtin();
    file_config.defaults.context = Some(3);
    file_config.defaults.chunk_size = Some(100);

    let args = analyze_args(&["tracesift", "analyze", "-s", " a,,b ", "--chunk-size", "50"]);
    let config = build_analyze_config(&args, &file_config).unwrap();
    assert_eq!(config.target_services(), &["a".to_string(), "b".to_string()]);
    assert_eq!(config.context_lines(), 3);
    assert_eq!(config.chunk_size(), 50);
    assert_eq!(config.provider(), "openai");
    assert_eq!(config.model(), "gpt-5.2");
}

#[test]
fn test_blank_service_list_is_a_configuration_error() {
    let cli = Cli::try_parse_from(["tracesift", "filter", "-s", " , "]).unwrap();
    let Commands::Filter(args) = cli.command else {
        panic!("expected filter");
    };
    let err = build_filter_config(&args, &Config::builtin()).unwrap_err();
    assert!(err.to_string().contains("target service"));
}

#[test]
fn test_prompt_file_must_contain_log_text() {
    let mut prompt = tempfile::NamedTempFile::new().unwrap();
    write!(prompt, "Analyze {{target_services}} only").unwrap();
    let path = prompt.path().to_str().unwrap().to_string();

    let args = analyze_args(&["tracesift", "analyze", "-s", "svc", "--prompt-file", &path]);
    let err = build_analyze_config(&args, &Config::builtin()).unwrap_err();
    assert!(format!("{:#}", err).contains("{log_text}"));
}

#[tokio::test]
async fn test_filter_command_runs_offline() {
    let mut log = tempfile::NamedTempFile::new().unwrap();
    writeln!(log, "a\nSVC1 start\nb\nc\nSVC1 stop\nd").unwrap();
    let config = empty_config_file();

    let cli = Cli::try_parse_from([
        "tracesift",
        "filter",
        "--config",
        config.path().to_str().unwrap(),
        "-f",
        log.path().to_str().unwrap(),
        "-s",
        "svc1",
        "-c",
        "0",
    ])
    .unwrap();
    run(cli, InterruptState::new()).await.unwrap();
}

#[tokio::test]
async fn test_analyze_without_relevant_lines_makes_no_calls() {
    let mut log = tempfile::NamedTempFile::new().unwrap();
    writeln!(log, "nothing to see\nhere").unwrap();
    let config = empty_config_file();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("report.md");

    let cli = Cli::try_parse_from([
        "tracesift",
        "analyze",
        "--config",
        config.path().to_str().unwrap(),
        "-f",
        log.path().to_str().unwrap(),
        "-s",
        "freeswitch",
        "--api-key",
        "test-key",
        "--out",
        out.to_str().unwrap(),
    ])
    .unwrap();
    run(cli, InterruptState::new()).await.unwrap();
    assert!(!out.exists());
}

#[tokio::test]
async fn test_missing_config_file_is_an_error() {
    let cli = Cli::try_parse_from([
        "tracesift",
        "filter",
        "--config",
        "/definitely/missing/tracesift.toml",
        "-s",
        "svc",
    ])
    .unwrap();
    assert!(run(cli, InterruptState::new()).await.is_err());
}
