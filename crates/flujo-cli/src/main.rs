//! Flujo CLI - patch runner and clock driver for the Flujo engine.

mod commands;
mod patch;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "flujo")]
#[command(author, version, about = "Flujo dataflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a patch file against a timer-driven executor
    Run(commands::run::RunArgs),

    /// Validate a patch file without running it
    Check(commands::check::CheckArgs),

    /// List scheduling policies and their trade-offs
    Policies,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Check(args) => commands::check::run(args),
        Commands::Policies => commands::policies::run(),
    }
}
