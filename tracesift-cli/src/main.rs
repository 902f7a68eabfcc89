// TraceSift CLI - targeted journal triage from the command line

use anyhow::Result;
use clap::Parser;
use tracesift_cli::{run, Cli, InterruptAction, InterruptState, INTERRUPTED_EXIT_CODE};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "tracesift={level},tracesift_cli={level},tracesift_core={level}"
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let interrupt = InterruptState::new();
    let handler = interrupt.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            match handler.on_interrupt() {
                InterruptAction::FinishInFlight => warn!(
                    "Interrupt received, stopping after the chunk calls in flight (Ctrl-C again to abort)"
                ),
                InterruptAction::Exit => {
                    eprintln!("\n✗ Interrupted");
                    std::process::exit(INTERRUPTED_EXIT_CODE);
                }
            }
        }
    });

    info!("TraceSift {}", env!("CARGO_PKG_VERSION"));
    if let Err(e) = run(cli, interrupt).await {
        error!("{:#}", e);
        eprintln!("\n✗ {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
