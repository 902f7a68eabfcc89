// TraceSift CLI - argument parsing and command dispatch for the `tracesift` binary

pub mod cli;
pub mod commands;
pub mod interrupt;

pub use cli::{AnalyzeArgs, Cli, Commands, FilterArgs, InputArgs};
pub use commands::{build_analyze_config, build_filter_config, run};
pub use interrupt::{InterruptAction, InterruptState, INTERRUPTED_EXIT_CODE};
