//! Node handles, flags, statistics, and the processor interface.
//!
//! A node is a [`NodeProcessor`] plus the graph's bookkeeping for it: slot
//! buffers, scheduling flags, an initialization state, and timing statistics.
//! Processors never see the graph; they read buffered inputs and emit outputs
//! through a [`ProcessContext`] for the duration of one call.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use depthflow_tracking::{Cluster, PointCloud};
use serde::{Deserialize, Serialize};

use crate::connection::ConnectionId;
use crate::error::{GraphError, NodeError};
use crate::payload::{Image, Payload};
use crate::slot::{InputSlot, OutputSlot, SlotLayout, SlotSpec};

/// Unique identifier for a node in the graph.
///
/// Node IDs are assigned sequentially and never reused within a graph instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Category of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Produces data each tick; processed unconditionally at the start of a tick.
    Source,
    /// Transforms its inputs.
    Filter,
    /// Consumes data at the end of the graph.
    Output,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeType::Source => "source",
            NodeType::Filter => "filter",
            NodeType::Output => "output",
        })
    }
}

/// Scheduling flags of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSettings {
    /// Disabled nodes only forward their passthrough pairs.
    pub enabled: bool,
    /// Process at most once per tick.
    pub process_only_once: bool,
    /// Wait until every connected upstream node has processed this tick.
    /// A node that received data is still released once the tick settles,
    /// even if some upstream never ran.
    pub wait_for_all_inputs: bool,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            process_only_once: true,
            wait_for_all_inputs: false,
        }
    }
}

/// Processing-time statistics of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeStats {
    /// Duration of the most recent `process` call.
    pub last: Duration,
    /// Sum over all calls.
    pub accumulated: Duration,
    /// Number of calls.
    pub count: u64,
}

impl NodeStats {
    pub(crate) fn record(&mut self, elapsed: Duration) {
        self.last = elapsed;
        self.accumulated += elapsed;
        self.count += 1;
    }

    /// Mean duration per call.
    pub fn mean(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            let nanos = self.accumulated.as_nanos() / u128::from(self.count);
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        }
    }
}

/// Behavior of a node kind.
///
/// The graph calls the hooks from the scheduler thread only, one node at a
/// time, under the graph lock.
pub trait NodeProcessor: Send {
    /// Stable identifier of the node kind (e.g. `"tracker"`).
    fn type_name(&self) -> &'static str;

    /// Category of the node.
    fn node_type(&self) -> NodeType;

    /// Declares the node's slots. Called once when the node is added.
    fn build_slots(&mut self, slots: &mut SlotLayout) -> Result<(), GraphError>;

    /// Prepares external resources. Called before the first `process` and
    /// retried (at most once per second) until it succeeds.
    fn initialize(&mut self) -> Result<(), NodeError> {
        Ok(())
    }

    /// Runs the node's transformation for this tick.
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError>;

    /// Runs instead of `process` while the node is disabled.
    fn process_passthrough(&mut self, ctx: &mut ProcessContext<'_>) {
        ctx.forward_passthrough();
    }

    /// Should the node be processed unconditionally at the start of every tick?
    fn is_starting_node(&self) -> bool {
        self.node_type() == NodeType::Source
    }

    /// Scheduling flags the node starts with.
    fn default_settings(&self) -> NodeSettings {
        NodeSettings::default()
    }
}

/// Per-input state held by the graph.
#[derive(Debug, Clone)]
pub(crate) struct InputState {
    pub spec: SlotSpec,
    pub buffer: Option<Payload>,
    pub incoming: Vec<ConnectionId>,
}

/// Per-output state held by the graph.
#[derive(Debug, Clone)]
pub(crate) struct OutputState {
    pub spec: SlotSpec,
    pub outgoing: Vec<ConnectionId>,
}

/// Graph bookkeeping for one node.
pub(crate) struct NodeEntry {
    pub name: String,
    pub processor: Box<dyn NodeProcessor>,
    pub inputs: Vec<InputState>,
    pub outputs: Vec<OutputState>,
    pub passthrough: Vec<(InputSlot, OutputSlot)>,
    pub settings: NodeSettings,
    pub initialized: bool,
    pub last_init_attempt: Option<f64>,
    pub has_processed: bool,
    pub stats: NodeStats,
}

impl NodeEntry {
    pub fn new(name: String, processor: Box<dyn NodeProcessor>, layout: SlotLayout) -> Self {
        let settings = processor.default_settings();
        Self {
            name,
            processor,
            inputs: layout
                .inputs
                .into_iter()
                .map(|spec| InputState {
                    spec,
                    buffer: None,
                    incoming: Vec::new(),
                })
                .collect(),
            outputs: layout
                .outputs
                .into_iter()
                .map(|spec| OutputState {
                    spec,
                    outgoing: Vec::new(),
                })
                .collect(),
            passthrough: layout.passthrough,
            settings,
            initialized: false,
            last_init_attempt: None,
            has_processed: false,
            stats: NodeStats::default(),
        }
    }

    pub fn reset_tick(&mut self) {
        self.has_processed = false;
        for input in &mut self.inputs {
            input.buffer = None;
        }
    }

    pub fn find_input(&self, name: &str) -> Option<InputSlot> {
        self.inputs.iter().position(|s| s.spec.name == name).map(InputSlot)
    }

    pub fn find_output(&self, name: &str) -> Option<OutputSlot> {
        self.outputs.iter().position(|s| s.spec.name == name).map(OutputSlot)
    }
}

/// A node's view of the graph for one `process` call.
///
/// Reads come from the node's input buffers; sends are collected and
/// delivered by the graph after the call returns successfully.
pub struct ProcessContext<'a> {
    pub(crate) name: &'a str,
    pub(crate) inputs: &'a [InputState],
    pub(crate) outputs: &'a [OutputState],
    pub(crate) passthrough: &'a [(InputSlot, OutputSlot)],
    pub(crate) outbox: &'a mut Vec<(OutputSlot, Payload)>,
    pub(crate) now: f64,
    pub(crate) frame: u64,
}

impl ProcessContext<'_> {
    /// Name of the node being processed.
    pub fn node_name(&self) -> &str {
        self.name
    }

    /// Tick time in seconds since the graph was created.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Tick counter, starting at 1.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Number of declared inputs.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Payload received on `slot` this tick.
    pub fn input(&self, slot: InputSlot) -> Option<&Payload> {
        self.inputs.get(slot.0)?.buffer.as_ref()
    }

    /// Returns true if at least one connection ends at `slot`.
    pub fn is_connected(&self, slot: InputSlot) -> bool {
        self.inputs.get(slot.0).is_some_and(|s| !s.incoming.is_empty())
    }

    /// Cluster list received on `slot` this tick.
    pub fn clusters(&self, slot: InputSlot) -> Option<&Arc<[Cluster]>> {
        self.input(slot)?.as_clusters()
    }

    /// Point cloud received on `slot` this tick.
    pub fn cloud(&self, slot: InputSlot) -> Option<&Arc<PointCloud>> {
        self.input(slot)?.as_cloud()
    }

    /// Image received on `slot` this tick.
    pub fn image(&self, slot: InputSlot) -> Option<&Arc<Image>> {
        self.input(slot)?.as_image()
    }

    /// Queues `payload` for every enabled connection leaving `slot`.
    pub fn send(&mut self, slot: OutputSlot, payload: Payload) -> Result<(), NodeError> {
        let Some(output) = self.outputs.get(slot.0) else {
            return Err(NodeError::new(format!("output slot {} out of range", slot.0)));
        };
        let got = payload.slot_type();
        if got != output.spec.slot_type {
            return Err(NodeError::wrong_payload(&output.spec.name, output.spec.slot_type, got));
        }
        self.outbox.push((slot, payload));
        Ok(())
    }

    /// Sends a cluster list on `slot`.
    pub fn send_clusters(&mut self, slot: OutputSlot, clusters: Vec<Cluster>) -> Result<(), NodeError> {
        self.send(slot, Payload::clusters(clusters))
    }

    /// Forwards every passthrough input that received a payload to its paired output.
    pub fn forward_passthrough(&mut self) {
        for &(input, output) in self.passthrough {
            if let Some(payload) = self.inputs.get(input.0).and_then(|s| s.buffer.clone()) {
                self.outbox.push((output, payload));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::SlotType;

    #[test]
    fn default_settings() {
        let s = NodeSettings::default();
        assert!(s.enabled);
        assert!(s.process_only_once);
        assert!(!s.wait_for_all_inputs);
    }

    #[test]
    fn stats_accumulate() {
        let mut stats = NodeStats::default();
        assert_eq!(stats.mean(), Duration::ZERO);
        stats.record(Duration::from_millis(2));
        stats.record(Duration::from_millis(4));
        assert_eq!(stats.last, Duration::from_millis(4));
        assert_eq!(stats.accumulated, Duration::from_millis(6));
        assert_eq!(stats.mean(), Duration::from_millis(3));
    }

    #[test]
    fn mean_survives_counts_beyond_u32() {
        let stats = NodeStats {
            last: Duration::from_micros(1),
            accumulated: Duration::from_micros(1 << 32),
            count: 1 << 32,
        };
        assert_eq!(stats.mean(), Duration::from_micros(1));
    }

    fn context_parts() -> (Vec<InputState>, Vec<OutputState>) {
        let spec = |name: &str| SlotSpec {
            name: name.into(),
            slot_type: SlotType::Clusters,
            process_on_receive: true,
        };
        let inputs = vec![InputState {
            spec: spec("In"),
            buffer: Some(Payload::clusters(Vec::new())),
            incoming: Vec::new(),
        }];
        let outputs = vec![OutputState {
            spec: spec("Out"),
            outgoing: Vec::new(),
        }];
        (inputs, outputs)
    }

    #[test]
    fn send_checks_payload_type() {
        let (inputs, outputs) = context_parts();
        let mut outbox = Vec::new();
        let mut ctx = ProcessContext {
            name: "n",
            inputs: &inputs,
            outputs: &outputs,
            passthrough: &[],
            outbox: &mut outbox,
            now: 0.0,
            frame: 1,
        };
        assert!(ctx.send(OutputSlot(0), Payload::Vector(depthflow_tracking::Vec3::ZERO)).is_err());
        assert!(ctx.send(OutputSlot(1), Payload::clusters(Vec::new())).is_err());
        ctx.send(OutputSlot(0), Payload::clusters(Vec::new())).unwrap();
        assert_eq!(outbox.len(), 1);
    }

    #[test]
    fn passthrough_forwards_buffered_inputs() {
        let (inputs, outputs) = context_parts();
        let mut outbox = Vec::new();
        let pairs = [(InputSlot(0), OutputSlot(0))];
        let mut ctx = ProcessContext {
            name: "n",
            inputs: &inputs,
            outputs: &outputs,
            passthrough: &pairs,
            outbox: &mut outbox,
            now: 0.0,
            frame: 1,
        };
        assert!(!ctx.is_connected(InputSlot(0)));
        assert!(ctx.clusters(InputSlot(0)).is_some());
        ctx.forward_passthrough();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].0, OutputSlot(0));
    }
}
