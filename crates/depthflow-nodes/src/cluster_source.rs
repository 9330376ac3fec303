//! Source node emitting detections produced off-graph.

use depthflow_graph::{
    GraphError, LatestReceiver, NodeError, NodeProcessor, NodeType, OutputSlot, Payload, ProcessContext,
    SlotLayout, SlotType,
};
use depthflow_tracking::Cluster;
use serde::{Deserialize, Serialize};

/// Parameters shared by the source nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Send only when a new frame arrived. When off, a tick without new data
    /// re-sends the last frame so downstream state machines keep running.
    pub only_new_frames: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self { only_new_frames: true }
    }
}

/// Emits the newest detection list received from an acquisition thread.
pub struct ClusterSourceNode {
    rx: LatestReceiver<Vec<Cluster>>,
    config: SourceConfig,
    last: Option<Payload>,
    out: OutputSlot,
}

impl ClusterSourceNode {
    /// Type id in the registry.
    pub const TYPE: &'static str = "cluster_source";

    /// Creates a source reading from `rx`.
    pub fn new(rx: LatestReceiver<Vec<Cluster>>, config: SourceConfig) -> Self {
        Self {
            rx,
            config,
            last: None,
            out: OutputSlot::default(),
        }
    }
}

impl NodeProcessor for ClusterSourceNode {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn node_type(&self) -> NodeType {
        NodeType::Source
    }

    fn build_slots(&mut self, slots: &mut SlotLayout) -> Result<(), GraphError> {
        self.out = slots.output("Clusters", SlotType::Clusters)?;
        Ok(())
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        match self.rx.take() {
            Some(clusters) => {
                let payload = Payload::clusters(clusters);
                if !self.config.only_new_frames {
                    self.last = Some(payload.clone());
                }
                ctx.send(self.out, payload)
            }
            None => match &self.last {
                Some(payload) => ctx.send(self.out, payload.clone()),
                None => Ok(()),
            },
        }
    }
}
