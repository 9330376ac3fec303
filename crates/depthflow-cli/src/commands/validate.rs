//! Graph file validation command.

use clap::Args;
use depthflow_config::{ConfigError, GraphFile, NodeRegistry};
use std::path::PathBuf;

#[derive(Args)]
pub struct ValidateArgs {
    /// Graph files (TOML)
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

pub fn run(args: ValidateArgs) -> anyhow::Result<()> {
    let registry = NodeRegistry::new();
    let mut failed = 0;

    for path in &args.files {
        let result = GraphFile::load(path).and_then(|file| file.validate(&registry).map(|()| file));
        match result {
            Ok(file) => println!(
                "ok    {} ({} nodes, {} connections)",
                path.display(),
                file.nodes.len(),
                file.connections.len()
            ),
            Err(ConfigError::Validation(err)) => {
                failed += 1;
                println!("FAIL  {}", path.display());
                for problem in err.errors() {
                    println!("      {problem}");
                }
            }
            Err(err) => {
                failed += 1;
                println!("FAIL  {}: {err}", path.display());
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} graph files invalid", failed, args.files.len());
    }
    Ok(())
}
