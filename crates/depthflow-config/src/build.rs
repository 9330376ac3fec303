//! Turning a graph file into a runnable graph.

use depthflow_graph::{NodeGraph, SchedulerConfig};
use depthflow_nodes::{Feeds, NodeRegistry};

use crate::error::ConfigError;
use crate::graph_file::GraphFile;
use crate::validation::{ValidationError, assemble};

/// A graph built from a file, with the handles of its nodes.
pub struct LoadedGraph {
    /// The assembled graph, not yet running.
    pub graph: NodeGraph,
    /// Source feeds and control handles, keyed by node name.
    pub feeds: Feeds,
    /// Scheduler settings from the file.
    pub scheduler: SchedulerConfig,
}

impl GraphFile {
    /// Validates this file against `registry`.
    pub fn validate(&self, registry: &NodeRegistry) -> Result<(), ConfigError> {
        crate::validation::validate_graph(self, registry)?;
        Ok(())
    }

    /// Builds the graph. Fails with every validation problem if any is found.
    pub fn build(&self, registry: &NodeRegistry) -> Result<LoadedGraph, ConfigError> {
        let assembly = assemble(self, registry);
        if let Some(err) = ValidationError::from_list(assembly.errors) {
            return Err(err.into());
        }
        tracing::info!(
            graph = %self.name,
            nodes = assembly.graph.node_count(),
            connections = assembly.graph.connection_count(),
            "graph built"
        );
        Ok(LoadedGraph {
            graph: assembly.graph,
            feeds: assembly.feeds,
            scheduler: self.scheduler_config(),
        })
    }
}
