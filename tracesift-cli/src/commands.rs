use crate::cli::{AnalyzeArgs, Cli, Commands, FilterArgs, InputArgs};
use crate::interrupt::InterruptState;
use anyhow::{Context, Result};
use std::path::Path;
use tracesift_core::output::console::render_filter_preview;
use tracesift_core::output::markdown::composite_document;
use tracesift_core::{
    api_key_env_var, create_provider, execute_and_capture, generate_report, parse_target_services,
    read_log_file, read_stdin, save_report, write_chunk_reports, AnalysisProgress, AnalysisStage, Config,
    LogInput, PromptTemplate, TraceSift, TriageConfig, TriageConfigBuilder, TriageError,
    TriageOutcome,
};
use tracing::{debug, info, warn};

pub async fn run(cli: Cli, interrupt: InterruptState) -> Result<()> {
    let file_config = load_file_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Filter(args) => run_filter(&args, &file_config).await,
        Commands::Analyze(args) => run_analyze(&args, &file_config, interrupt).await,
    }
}

fn load_file_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
}

async fn load_input(args: &InputArgs) -> Result<LogInput> {
    if let Some(ref command) = args.exec {
        execute_and_capture(command).await
    } else if let Some(ref file) = args.file {
        read_log_file(&file.to_string_lossy()).await
    } else {
        read_stdin().await
    }
}

fn filter_builder(args: &FilterArgs, file_config: &Config) -> TriageConfigBuilder {
    let mut builder = TriageConfig::builder(parse_target_services(&args.services))
        .file_defaults(&file_config.defaults);
    if let Some(context) = args.context {
        builder = builder.context_lines(context);
    }
    if let Some(max) = args.max_lines {
        builder = builder.max_filtered_lines(max);
    }
    if let Some(policy) = args.truncate {
        builder = builder.truncation(policy);
    }
    builder
}

/// Flags over config file over built-in defaults.
pub fn build_filter_config(args: &FilterArgs, file_config: &Config) -> Result<TriageConfig> {
    Ok(filter_builder(args, file_config).build()?)
}

pub fn build_analyze_config(args: &AnalyzeArgs, file_config: &Config) -> Result<TriageConfig> {
    let mut builder = filter_builder(&args.filter, file_config);
    let provider = args
        .provider
        .clone()
        .unwrap_or_else(|| file_config.get_default_provider());
    builder = builder
        .provider(provider.clone())
        .provider_options(file_config.provider_options(
            &provider,
            args.model.as_deref(),
            args.temperature,
        ));
    if let Some(size) = args.chunk_size {
        builder = builder.chunk_size(size);
    }
    if let Some(n) = args.parallel {
        builder = builder.max_parallel_chunks(n);
    }
    if let Some(ref path) = args.prompt_file {
        builder = builder.analysis_template(PromptTemplate::analysis(read_template(path)?)?);
    }
    if let Some(ref path) = args.synthesis_file {
        builder = builder.synthesis_template(PromptTemplate::synthesis(read_template(path)?)?);
    }
    Ok(builder.build()?)
}

fn read_template(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read prompt template {}", path.display()))
}

async fn run_filter(args: &FilterArgs, file_config: &Config) -> Result<()> {
    let config = build_filter_config(args, file_config)?;
    let sift = TraceSift::new(config)?;
    let input = load_input(&args.input).await?;
    let filtered = sift.filter(&input);
    print!(
        "{}",
        render_filter_preview(sift.config().target_services(), &filtered)
    );
    if filtered.stats.truncated {
        eprintln!(
            "Note: {} retained lines were capped to {} ({} truncation)",
            filtered.stats.kept_before_truncation,
            filtered.stats.filtered_lines,
            sift.config().truncation()
        );
    }
    Ok(())
}

async fn run_analyze(
    args: &AnalyzeArgs,
    file_config: &Config,
    interrupt: InterruptState,
) -> Result<()> {
    let config = build_analyze_config(args, file_config)?;
    let provider_name = config.provider().to_string();

    let api_key = file_config
        .get_api_key(&provider_name, args.api_key.as_deref())
        .ok_or_else(|| {
            TriageError::configuration(format!(
                "No API key found for {}. Set {} or pass --api-key",
                provider_name,
                api_key_env_var(&provider_name)
            ))
        })?;

    let provider = create_provider(&provider_name, &api_key, config.provider_options().clone())
        .with_context(|| format!("Failed to create provider {}", provider_name))?;

    let sift = TraceSift::new(config)?;
    let input = load_input(&args.filter.input).await?;
    info!(
        "Input: {} lines, target services: {}",
        input.lines().len(),
        sift.config().target_services_display()
    );

    let on_progress = interrupt.clone();
    let analyzer = sift
        .analyzer(provider)
        .with_cancellation(interrupt.token())
        .with_progress(Box::new(move |progress| {
            on_progress.set_chunk_pass(progress.stage == AnalysisStage::ChunkAnalysis);
            print_progress(progress);
        }));

    let outcome = sift.analyze(&input, &analyzer).await;
    interrupt.set_chunk_pass(false);
    match outcome {
        Ok(TriageOutcome::NoRelevantLines(stats)) => {
            eprintln!(
                "No relevant lines were found for the selected target services ({} lines scanned).",
                stats.total_lines
            );
            Ok(())
        }
        Ok(TriageOutcome::Report(report)) => {
            if let Some(ref dir) = args.chunks_dir {
                write_chunk_reports(dir, &report.analysis.chunk_results)?;
            }
            if let Some(ref out) = args.out {
                let document = composite_document(
                    &report.metadata.target_services,
                    &report.analysis.final_report,
                );
                save_report(&document, out)?;
                eprintln!("Report saved to {}", out.display());
            }
            println!("{}", generate_report(&report, args.format)?);
            Ok(())
        }
        Err(e) => {
            keep_partial_results(&e, args.chunks_dir.as_deref());
            Err(e.into())
        }
    }
}

fn print_progress(progress: AnalysisProgress) {
    debug!("Progress {:?}", progress);
    eprintln!(
        "[{:>3.0}%] {}",
        progress.fraction() * 100.0,
        progress.phase
    );
}

/// Completed chunk analyses survive a failed or cancelled run.
fn keep_partial_results(error: &TriageError, chunks_dir: Option<&Path>) {
    let partial = error.partial_results();
    if partial.is_empty() {
        return;
    }
    match chunks_dir {
        Some(dir) => match write_chunk_reports(dir, partial) {
            Ok(paths) => eprintln!(
                "Saved {} completed chunk analyses to {}",
                paths.len(),
                dir.display()
            ),
            Err(write_err) => warn!("Could not save partial results: {:#}", write_err),
        },
        None => {
            eprintln!("Completed chunk analyses before the failure:");
            for (i, result) in partial.iter().enumerate() {
                eprintln!("\n--- Chunk {} ---\n{}", i + 1, result);
            }
        }
    }
}
