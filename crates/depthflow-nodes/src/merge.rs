//! Cross-stream merge node.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use depthflow_graph::{
    GraphError, InputSlot, NodeError, NodeProcessor, NodeSettings, NodeType, OutputSlot, ProcessContext,
    SlotLayout, SlotType,
};
use depthflow_tracking::{Cluster, ClusterMerger, MergerConfig};

use crate::params::Live;

/// Default number of `In N` inputs.
pub const DEFAULT_INPUTS: usize = 4;

/// Live configuration and reset trigger of a [`MergeClustersNode`].
#[derive(Debug, Clone)]
pub struct MergerHandle {
    config: Live<MergerConfig>,
    clear: Arc<AtomicBool>,
}

impl MergerHandle {
    /// Current configuration.
    pub fn config(&self) -> MergerConfig {
        *self.config.get()
    }

    /// Replaces the configuration; applied on the next tick.
    pub fn set_config(&self, config: MergerConfig) {
        self.config.set(config);
    }

    /// Drops every merged cluster on the next tick.
    pub fn request_clear(&self) {
        self.clear.store(true, Ordering::Release);
    }
}

/// Fuses the tracked clusters of several streams into merged identities.
///
/// Input `In k` is stream `k - 1`. The node waits for every connected
/// upstream that runs this tick, so frames arriving together merge together.
/// A stream without new data contributes nothing; its merged sources stay
/// until they leave or expire.
pub struct MergeClustersNode {
    merger: ClusterMerger,
    handle: MergerHandle,
    inputs: Vec<InputSlot>,
    input_count: usize,
    out: OutputSlot,
}

impl MergeClustersNode {
    /// Type id in the registry.
    pub const TYPE: &'static str = "merge_clusters";

    /// Creates a node with `input_count` inputs (at least one).
    pub fn new(config: MergerConfig, input_count: usize) -> Self {
        Self {
            merger: ClusterMerger::new(),
            handle: MergerHandle {
                config: Live::new(config),
                clear: Arc::new(AtomicBool::new(false)),
            },
            inputs: Vec::new(),
            input_count: input_count.max(1),
            out: OutputSlot::default(),
        }
    }

    /// Control handle sharing this node's configuration.
    pub fn handle(&self) -> MergerHandle {
        self.handle.clone()
    }
}

impl NodeProcessor for MergeClustersNode {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn node_type(&self) -> NodeType {
        NodeType::Filter
    }

    fn default_settings(&self) -> NodeSettings {
        NodeSettings {
            wait_for_all_inputs: true,
            ..NodeSettings::default()
        }
    }

    fn build_slots(&mut self, slots: &mut SlotLayout) -> Result<(), GraphError> {
        self.inputs.clear();
        for i in 1..=self.input_count {
            self.inputs.push(slots.input(format!("In {i}"), SlotType::Clusters)?);
        }
        self.out = slots.output("Out", SlotType::Clusters)?;
        if let Some(&first) = self.inputs.first() {
            slots.passthrough(first, self.out)?;
        }
        Ok(())
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        if self.handle.clear.swap(false, Ordering::AcqRel) {
            tracing::debug!(node = ctx.node_name(), "merger cleared");
            self.merger.clear();
        }

        let config = self.handle.config.get();
        let streams: Vec<&[Cluster]> = self
            .inputs
            .iter()
            .map(|&slot| ctx.clusters(slot).map_or(&[][..], |c| &c[..]))
            .collect();
        let merged = self.merger.merge(&streams, &config, ctx.now());
        ctx.send_clusters(self.out, merged)
    }
}
