//! Velocity extrapolation node.

use depthflow_graph::{
    GraphError, InputSlot, NodeError, NodeProcessor, NodeType, OutputSlot, ProcessContext, SlotLayout, SlotType,
};
use depthflow_tracking::Cluster;
use serde::{Deserialize, Serialize};

use crate::params::{DeltaClock, Live};

/// Parameters of a [`PredictionNode`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Extrapolation coefficient, 0 to 5.
    pub strength: f32,
    /// Speed (m/s) above which clusters are extrapolated, 0 to 2.
    pub velocity_threshold: f32,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            strength: 1.0,
            velocity_threshold: 1.0,
        }
    }
}

/// Moves each fast cluster's centroid ahead along its velocity.
pub fn predict(clusters: &mut [Cluster], config: &PredictionConfig, dt: f32) {
    for c in clusters {
        let speed = c.velocity.length();
        if speed > config.velocity_threshold {
            c.centroid += c.velocity.normalized() * ((speed - 1.0) * dt * config.strength);
        }
    }
}

/// Applies [`predict`] to a copy of its input.
pub struct PredictionNode {
    config: Live<PredictionConfig>,
    clock: DeltaClock,
    input: InputSlot,
    out: OutputSlot,
}

impl PredictionNode {
    /// Type id in the registry.
    pub const TYPE: &'static str = "prediction";

    /// Creates a node with `config`.
    pub fn new(config: PredictionConfig) -> Self {
        Self {
            config: Live::new(config),
            clock: DeltaClock::default(),
            input: InputSlot::default(),
            out: OutputSlot::default(),
        }
    }

    /// Live configuration handle.
    pub fn config(&self) -> Live<PredictionConfig> {
        self.config.clone()
    }
}

impl NodeProcessor for PredictionNode {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn node_type(&self) -> NodeType {
        NodeType::Filter
    }

    fn build_slots(&mut self, slots: &mut SlotLayout) -> Result<(), GraphError> {
        self.input = slots.input("In", SlotType::Clusters)?;
        self.out = slots.output("Out", SlotType::Clusters)?;
        slots.passthrough(self.input, self.out)
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        let dt = self.clock.tick(ctx.now());
        let mut clusters = ctx.clusters(self.input).map(|c| c.to_vec()).unwrap_or_default();
        predict(&mut clusters, &self.config.get(), dt);
        ctx.send_clusters(self.out, clusters)
    }
}
