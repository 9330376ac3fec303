//! Node type listing command.

use clap::Args;
use depthflow_graph::NodeGraph;
use depthflow_nodes::{Feeds, NodeParams, NodeRegistry};

#[derive(Args)]
pub struct NodesArgs {
    /// Show details for a specific node type
    #[arg(value_name = "TYPE")]
    node_type: Option<String>,
}

pub fn run(args: NodesArgs) -> anyhow::Result<()> {
    let registry = NodeRegistry::new();

    let Some(id) = &args.node_type else {
        println!("Available Node Types");
        println!("====================");
        println!();
        for desc in registry.all_nodes() {
            println!("  {:16}  {:8}  {}", desc.id, desc.node_type.to_string(), desc.description);
        }
        println!();
        println!("Use 'depthflow nodes <TYPE>' for slot details.");
        return Ok(());
    };

    let desc = registry
        .get(id)
        .ok_or_else(|| anyhow::anyhow!("Unknown node type: {}", id))?;

    // Slots are declared by the node itself; build one with default parameters.
    let node = registry.create(desc.id, desc.id, &NodeParams::new(), &mut Feeds::new())?;
    let mut graph = NodeGraph::new();
    let node_id = graph.add_node(desc.id, node)?;

    println!("{} ({})", desc.name, desc.id);
    println!("{}", "=".repeat(desc.name.len() + desc.id.len() + 3));
    println!();
    println!("{}", desc.description);
    println!();
    println!("Category: {}", desc.node_type);
    println!();
    println!("Inputs:");
    for spec in graph.input_specs(node_id) {
        println!("  {:12}  {}", spec.name, spec.slot_type);
    }
    println!("Outputs:");
    for spec in graph.output_specs(node_id) {
        println!("  {:12}  {}", spec.name, spec.slot_type);
    }
    Ok(())
}
