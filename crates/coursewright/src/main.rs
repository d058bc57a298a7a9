//! Coursewright CLI binary.
//!
//! This binary provides command-line access to Coursewright's functionality:
//! - Generate a course into an LMS, resuming interrupted runs
//! - List, inspect and clear saved checkpoints

use clap::Parser;
use coursewright::{
    CoursewrightConfig, CoursewrightResult, ObservabilityConfig, init_observability,
};
use std::process::ExitCode;

mod cli;

#[tokio::main]
async fn main() -> CoursewrightResult<ExitCode> {
    use cli::{Cli, Commands, handle_checkpoint_command, run_generate};

    // Load .env before anything reads the environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    init_observability(
        ObservabilityConfig::default()
            .with_log_level(log_level)
            .with_json_logs(cli.json_logs),
    )?;

    let config = match &cli.config {
        Some(path) => CoursewrightConfig::from_file(path)?,
        None => CoursewrightConfig::load()?,
    };

    match cli.command {
        Commands::Generate(args) => run_generate(&config, args).await,
        Commands::Checkpoint(command) => handle_checkpoint_command(&config, command).await,
    }
}
