//! Tracking node: assigns stable identities to detections.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use depthflow_graph::{
    GraphError, InputSlot, NodeError, NodeProcessor, NodeType, OutputSlot, ProcessContext, SlotLayout, SlotType,
};
use depthflow_tracking::{Tracker, TrackerConfig};

use crate::params::Live;

/// Live configuration and clear trigger of a [`TrackerNode`].
#[derive(Debug, Clone)]
pub struct TrackerHandle {
    config: Live<TrackerConfig>,
    clear: Arc<AtomicBool>,
}

impl TrackerHandle {
    /// Current configuration.
    pub fn config(&self) -> TrackerConfig {
        *self.config.get()
    }

    /// Replaces the configuration; applied on the next tick.
    pub fn set_config(&self, config: TrackerConfig) {
        self.config.set(config);
    }

    /// Forgets every tracked cluster on the next tick. Identities keep increasing.
    pub fn request_clear(&self) {
        self.clear.store(true, Ordering::Release);
    }
}

/// Wraps a [`Tracker`]. Disabled, it forwards `In` to `Out` untouched.
pub struct TrackerNode {
    tracker: Tracker,
    handle: TrackerHandle,
    input: InputSlot,
    out: OutputSlot,
}

impl TrackerNode {
    /// Type id in the registry.
    pub const TYPE: &'static str = "tracker";

    /// Creates a node with `config`.
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            tracker: Tracker::new(),
            handle: TrackerHandle {
                config: Live::new(config),
                clear: Arc::new(AtomicBool::new(false)),
            },
            input: InputSlot::default(),
            out: OutputSlot::default(),
        }
    }

    /// Control handle sharing this node's configuration.
    pub fn handle(&self) -> TrackerHandle {
        self.handle.clone()
    }
}

impl NodeProcessor for TrackerNode {
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
        if self.handle.clear.swap(false, Ordering::AcqRel) {
            tracing::debug!(node = ctx.node_name(), "tracker cleared");
            self.tracker.clear();
        }

        let config = self.handle.config.get();
        // Detections are shared with other consumers; track a copy.
        let detected = ctx.clusters(self.input).map(|c| c.to_vec()).unwrap_or_default();
        let tracked = self.tracker.track(detected, &config, ctx.now()).to_vec();
        ctx.send_clusters(self.out, tracked)
    }
}
