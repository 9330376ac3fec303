//! Depthflow CLI - run, inspect, and validate tracking graphs.

mod acquisition;
mod commands;
mod scene;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "depthflow")]
#[command(author, version, about = "Depthflow tracking graph CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a graph file against a synthetic scene
    Run(commands::run::RunArgs),

    /// List available node types and their slots
    Nodes(commands::nodes::NodesArgs),

    /// Validate graph files
    Validate(commands::validate::ValidateArgs),

    /// Print or write an example graph file
    Example(commands::example::ExampleArgs),
}

fn main() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Nodes(args) => commands::nodes::run(args),
        Commands::Validate(args) => commands::validate::run(args),
        Commands::Example(args) => commands::example::run(args),
    }
}
