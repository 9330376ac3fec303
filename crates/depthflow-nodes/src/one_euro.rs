//! Per-identity smoothing node.

use depthflow_graph::{
    GraphError, InputSlot, NodeError, NodeProcessor, NodeType, OutputSlot, ProcessContext, SlotLayout, SlotType,
};
use depthflow_tracking::{FilterBank, FilterParams};
use serde::{Deserialize, Serialize};

use crate::params::{DeltaClock, Live};

/// Parameters of a [`OneEuroNode`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OneEuroConfig {
    /// Cutoff (Hz) when the signal is static.
    pub min_cutoff: f32,
    /// Cutoff increase per unit of filtered speed.
    pub beta: f32,
    /// Cutoff (Hz) of the derivative stage.
    pub derivative_cutoff: f32,
    /// Smooth the centroid.
    pub centroid: bool,
    /// Smooth the bounding box.
    pub bounds: bool,
}

impl OneEuroConfig {
    /// Filter coefficients.
    pub fn filter_params(&self) -> FilterParams {
        FilterParams {
            min_cutoff: self.min_cutoff,
            beta: self.beta,
            derivative_cutoff: self.derivative_cutoff,
        }
    }
}

impl Default for OneEuroConfig {
    fn default() -> Self {
        let filter = FilterParams::default();
        Self {
            min_cutoff: filter.min_cutoff,
            beta: filter.beta,
            derivative_cutoff: filter.derivative_cutoff,
            centroid: true,
            bounds: true,
        }
    }
}

/// Smooths centroid and/or bounds of every cluster by identity.
///
/// Filter state is dropped for identities absent from a tick's input.
pub struct OneEuroNode {
    bank: FilterBank,
    config: Live<OneEuroConfig>,
    clock: DeltaClock,
    input: InputSlot,
    out: OutputSlot,
}

impl OneEuroNode {
    /// Type id in the registry.
    pub const TYPE: &'static str = "one_euro";

    /// Creates a node with `config`.
    pub fn new(config: OneEuroConfig) -> Self {
        Self {
            bank: FilterBank::new(config.filter_params()),
            config: Live::new(config),
            clock: DeltaClock::default(),
            input: InputSlot::default(),
            out: OutputSlot::default(),
        }
    }

    /// Live configuration handle.
    pub fn config(&self) -> Live<OneEuroConfig> {
        self.config.clone()
    }

    /// Identities with filter state.
    pub fn filtered_count(&self) -> usize {
        self.bank.len()
    }
}

impl NodeProcessor for OneEuroNode {
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
        let config = self.config.get();
        let dt = self.clock.tick(ctx.now());
        let mut clusters = ctx.clusters(self.input).map(|c| c.to_vec()).unwrap_or_default();

        self.bank.set_params(config.filter_params());
        self.bank.apply(&mut clusters, dt, config.centroid, config.bounds);
        ctx.send_clusters(self.out, clusters)
    }
}
