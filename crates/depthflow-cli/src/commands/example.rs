//! Example graph command.

use clap::Args;
use depthflow_config::{EXAMPLE_GRAPH, example_graph};
use std::path::PathBuf;

#[derive(Args)]
pub struct ExampleArgs {
    /// Write to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub fn run(args: ExampleArgs) -> anyhow::Result<()> {
    match args.output {
        Some(path) => {
            example_graph()?.save(&path)?;
            println!("Wrote example graph to {}", path.display());
        }
        None => print!("{EXAMPLE_GRAPH}"),
    }
    Ok(())
}
