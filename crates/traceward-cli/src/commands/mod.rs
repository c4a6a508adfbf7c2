//! CLI command definitions and dispatch.

pub mod normalize;
pub mod replay;

use clap::{Parser, Subcommand};

/// traceward — per-container runtime-behavior recorder.
#[derive(Parser, Debug)]
#[command(name = "twd", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay recorded raw events through the tracer and event sink.
    Replay(replay::ReplayArgs),
    /// Normalize raw event files and print the canonical events.
    Normalize(normalize::NormalizeArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Replay(args) => replay::execute(args).await,
        Command::Normalize(args) => normalize::execute(&args),
    }
}
