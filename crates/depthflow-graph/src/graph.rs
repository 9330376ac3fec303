//! Node arena, connections, and per-tick execution.
//!
//! [`NodeGraph`] owns every node and connection. Nodes live in an arena of
//! `Option` slots addressed by [`NodeId`]; connections store slot handles and
//! are resolved at delivery time, so removing a node can never leave a
//! dangling reference.
//!
//! # Tick
//!
//! [`NodeGraph::tick_at`] runs one frame:
//!
//! 1. **Reset**: clear every node's input buffers and has-processed flag.
//! 2. **Seed**: process every starting node, in insertion order.
//! 3. **Propagate**: each delivery may enqueue the receiving node. The
//!    worklist is drained in snapshots until empty; duplicate entries are
//!    suppressed and a node leaves the worklist when it is processed.
//! 4. **Release**: a wait-for-all-inputs node that received data but was
//!    never enqueued (some upstream did not run) is processed once the
//!    worklist drains, and propagation resumes from it.
//!
//! A receiving node is enqueued only if the slot is process-on-receive, the
//! node has not used its single pass (when process-only-once is set), and,
//! when wait-for-all-inputs is set, every connected upstream node has already
//! processed this tick.
//!
//! Connections that would close a cycle are rejected, so propagation always
//! terminates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::connection::{Connection, ConnectionId};
use crate::error::GraphError;
use crate::node::{NodeEntry, NodeId, NodeProcessor, NodeSettings, NodeStats, NodeType, ProcessContext};
use crate::payload::{Payload, SlotType};
use crate::slot::{InputRef, InputSlot, OutputRef, OutputSlot, SlotDirection, SlotLayout, SlotSpec};

/// Minimum delay (s) between two initialization attempts of a node.
pub const INIT_RETRY_INTERVAL: f64 = 1.0;

/// Outcome of one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Tick counter, starting at 1.
    pub frame: u64,
    /// Nodes processed, in processing order.
    pub order: Vec<NodeId>,
    /// Number of nodes whose `process` returned an error.
    pub failures: usize,
    /// The tick stopped early because the running flag was cleared.
    pub cancelled: bool,
}

impl TickReport {
    /// Number of `process` / passthrough calls.
    pub fn nodes_processed(&self) -> usize {
        self.order.len()
    }
}

/// Typed dataflow graph.
pub struct NodeGraph {
    nodes: Vec<Option<NodeEntry>>,
    connections: Vec<Option<Connection>>,
    next_node_slot: u32,
    next_connection_slot: u32,
    frame: u64,
    epoch: Instant,
    outbox: Vec<(OutputSlot, Payload)>,
}

impl Default for NodeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeGraph {
    /// Creates an empty graph. Its clock starts now.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            connections: Vec::new(),
            next_node_slot: 0,
            next_connection_slot: 0,
            frame: 0,
            epoch: Instant::now(),
            outbox: Vec::new(),
        }
    }

    // --- Node mutations ---

    /// Adds a node. The processor declares its slots here.
    ///
    /// Returns an error if the name is taken or the slot layout is invalid.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        mut processor: Box<dyn NodeProcessor>,
    ) -> Result<NodeId, GraphError> {
        let name = name.into();
        if self.node_id(&name).is_some() {
            return Err(GraphError::DuplicateNode(name));
        }
        let mut layout = SlotLayout::new();
        processor.build_slots(&mut layout)?;

        let id = NodeId(self.next_node_slot);
        self.next_node_slot += 1;
        tracing::debug!(node = %name, %id, kind = processor.type_name(), "graph_add");

        let idx = id.0 as usize;
        if idx >= self.nodes.len() {
            self.nodes.resize_with(idx + 1, || None);
        }
        self.nodes[idx] = Some(NodeEntry::new(name, processor, layout));
        Ok(id)
    }

    /// Removes a node and every connection touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        let node = self.entry(id)?;
        let connection_ids: Vec<ConnectionId> = node
            .inputs
            .iter()
            .flat_map(|s| s.incoming.iter())
            .chain(node.outputs.iter().flat_map(|s| s.outgoing.iter()))
            .copied()
            .collect();

        for connection in connection_ids {
            self.disconnect_internal(connection);
        }

        if let Some(entry) = self.nodes[id.0 as usize].take() {
            tracing::debug!(node = %entry.name, %id, "graph_remove");
        }
        Ok(())
    }

    /// Adds a slot to an existing node.
    ///
    /// Inputs added this way schedule the node on receive.
    pub fn add_slot(
        &mut self,
        id: NodeId,
        direction: SlotDirection,
        name: impl Into<String>,
        slot_type: SlotType,
    ) -> Result<usize, GraphError> {
        let name = name.into();
        let node = self.entry_mut(id)?;
        let exists = match direction {
            SlotDirection::Input => node.find_input(&name).is_some(),
            SlotDirection::Output => node.find_output(&name).is_some(),
        };
        if exists {
            return Err(GraphError::DuplicateSlot {
                slot: name,
                direction,
            });
        }
        let spec = SlotSpec {
            name,
            slot_type,
            process_on_receive: direction == SlotDirection::Input,
        };
        Ok(match direction {
            SlotDirection::Input => {
                node.inputs.push(crate::node::InputState {
                    spec,
                    buffer: None,
                    incoming: Vec::new(),
                });
                node.inputs.len() - 1
            }
            SlotDirection::Output => {
                node.outputs.push(crate::node::OutputState {
                    spec,
                    outgoing: Vec::new(),
                });
                node.outputs.len() - 1
            }
        })
    }

    /// Enables or disables a node. Disabled nodes only forward passthrough pairs.
    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) -> Result<(), GraphError> {
        self.entry_mut(id)?.settings.enabled = enabled;
        Ok(())
    }

    /// Mutable access to a node's scheduling flags.
    pub fn settings_mut(&mut self, id: NodeId) -> Result<&mut NodeSettings, GraphError> {
        Ok(&mut self.entry_mut(id)?.settings)
    }

    // --- Connections ---

    /// Connects an output slot to an input slot.
    ///
    /// Connecting an already connected pair returns the existing connection.
    /// Returns an error if either slot is unknown, the types differ, or the
    /// connection would close a cycle.
    pub fn connect(&mut self, from: OutputRef, to: InputRef) -> Result<ConnectionId, GraphError> {
        let from_type = self.output_spec(from)?.slot_type;
        let to_type = self.input_spec(to)?.slot_type;

        if let Some(existing) = self.find_connection(from, to) {
            return Ok(existing);
        }
        if from_type != to_type {
            return Err(GraphError::TypeMismatch {
                from: from_type,
                to: to_type,
            });
        }
        // A cycle exists if `to` can already reach `from`.
        if from.node == to.node || self.can_reach(to.node, from.node) {
            return Err(GraphError::CycleDetected {
                from: self.entry(from.node)?.name.clone(),
                to: self.entry(to.node)?.name.clone(),
            });
        }

        let id = ConnectionId(self.next_connection_slot);
        self.next_connection_slot += 1;
        let idx = id.0 as usize;
        if idx >= self.connections.len() {
            self.connections.resize_with(idx + 1, || None);
        }
        self.connections[idx] = Some(Connection {
            id,
            from,
            to,
            slot_type: from_type,
            enabled: true,
        });

        self.entry_mut(from.node)?.outputs[from.slot.0].outgoing.push(id);
        self.entry_mut(to.node)?.inputs[to.slot.0].incoming.push(id);

        tracing::debug!(
            "graph_connect: {}.{} → {}.{}",
            self.entry(from.node)?.name,
            self.output_spec(from)?.name,
            self.entry(to.node)?.name,
            self.input_spec(to)?.name
        );
        Ok(id)
    }

    /// Connects two slots addressed by node and slot name.
    pub fn connect_by_name(
        &mut self,
        from_node: &str,
        from_slot: &str,
        to_node: &str,
        to_slot: &str,
    ) -> Result<ConnectionId, GraphError> {
        let from = self.output_by_name(from_node, from_slot)?;
        let to = self.input_by_name(to_node, to_slot)?;
        self.connect(from, to)
    }

    /// Removes a connection.
    pub fn disconnect(&mut self, id: ConnectionId) -> Result<(), GraphError> {
        self.connection(id).ok_or(GraphError::ConnectionNotFound(id))?;
        self.disconnect_internal(id);
        tracing::debug!("graph_disconnect: connection {id}");
        Ok(())
    }

    /// Enables or disables a connection without removing it.
    pub fn set_connection_enabled(&mut self, id: ConnectionId, enabled: bool) -> Result<(), GraphError> {
        let connection = self
            .connections
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(GraphError::ConnectionNotFound(id))?;
        connection.enabled = enabled;
        Ok(())
    }

    /// Looks up a connection.
    pub fn connection(&self, id: ConnectionId) -> Option<Connection> {
        self.connections.get(id.0 as usize).copied().flatten()
    }

    /// Every live connection, in creation order.
    pub fn connections(&self) -> impl Iterator<Item = Connection> + '_ {
        self.connections.iter().flatten().copied()
    }

    /// Finds the connection between two slots, if one exists.
    pub fn find_connection(&self, from: OutputRef, to: InputRef) -> Option<ConnectionId> {
        let node = self.entry(from.node).ok()?;
        node.outputs.get(from.slot.0)?.outgoing.iter().copied().find(|&c| {
            self.connection(c).is_some_and(|c| c.to == to)
        })
    }

    // --- Lookup ---

    /// Finds a node by name.
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .find(|(_, n)| n.as_ref().is_some_and(|n| n.name == name))
            .map(|(i, _)| NodeId(i as u32))
    }

    /// Every live node, in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_some())
            .map(|(i, _)| NodeId(i as u32))
    }

    /// Name of a node.
    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        self.entry(id).ok().map(|n| n.name.as_str())
    }

    /// Kind identifier of a node's processor.
    pub fn node_kind(&self, id: NodeId) -> Option<&'static str> {
        self.entry(id).ok().map(|n| n.processor.type_name())
    }

    /// Category of a node.
    pub fn node_type(&self, id: NodeId) -> Option<NodeType> {
        self.entry(id).ok().map(|n| n.processor.node_type())
    }

    /// Scheduling flags of a node.
    pub fn settings(&self, id: NodeId) -> Option<NodeSettings> {
        self.entry(id).ok().map(|n| n.settings)
    }

    /// Timing statistics of a node.
    pub fn stats(&self, id: NodeId) -> Option<NodeStats> {
        self.entry(id).ok().map(|n| n.stats)
    }

    /// Returns true if the node has processed during the current tick.
    pub fn has_processed(&self, id: NodeId) -> bool {
        self.entry(id).is_ok_and(|n| n.has_processed)
    }

    /// Resolves an input slot by name.
    pub fn input(&self, node: NodeId, slot: &str) -> Result<InputRef, GraphError> {
        let entry = self.entry(node)?;
        let slot_idx = entry.find_input(slot).ok_or_else(|| GraphError::SlotNotFound {
            node: entry.name.clone(),
            slot: slot.into(),
            direction: SlotDirection::Input,
        })?;
        Ok(InputRef { node, slot: slot_idx })
    }

    /// Resolves an output slot by name.
    pub fn output(&self, node: NodeId, slot: &str) -> Result<OutputRef, GraphError> {
        let entry = self.entry(node)?;
        let slot_idx = entry.find_output(slot).ok_or_else(|| GraphError::SlotNotFound {
            node: entry.name.clone(),
            slot: slot.into(),
            direction: SlotDirection::Output,
        })?;
        Ok(OutputRef { node, slot: slot_idx })
    }

    /// Declared inputs of a node.
    pub fn input_specs(&self, id: NodeId) -> Vec<SlotSpec> {
        self.entry(id)
            .map(|n| n.inputs.iter().map(|s| s.spec.clone()).collect())
            .unwrap_or_default()
    }

    /// Declared outputs of a node.
    pub fn output_specs(&self, id: NodeId) -> Vec<SlotSpec> {
        self.entry(id)
            .map(|n| n.outputs.iter().map(|s| s.spec.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.iter().flatten().count()
    }

    /// Ticks run so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Seconds since the graph was created.
    pub fn elapsed(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    // --- Execution ---

    /// Runs one tick at the graph's own clock.
    pub fn tick(&mut self) -> TickReport {
        let now = self.elapsed();
        self.tick_at(now, None)
    }

    /// Runs one tick at time `now` (seconds).
    ///
    /// When `running` is given, the tick stops between worklist snapshots
    /// once the flag is cleared; the node in flight always completes.
    pub fn tick_at(&mut self, now: f64, running: Option<&AtomicBool>) -> TickReport {
        let keep_going = || running.is_none_or(|r| r.load(Ordering::Acquire));

        self.frame += 1;
        let mut report = TickReport {
            frame: self.frame,
            ..TickReport::default()
        };

        // 1. Reset.
        for node in self.nodes.iter_mut().flatten() {
            node.reset_tick();
        }

        // 2. Seed.
        let mut worklist: Vec<NodeId> = Vec::new();
        let starts: Vec<NodeId> = self
            .node_ids()
            .filter(|&id| self.entry(id).is_ok_and(|n| n.processor.is_starting_node()))
            .collect();
        for id in starts {
            if !keep_going() {
                report.cancelled = true;
                return report;
            }
            self.process_node(id, now, &mut worklist, &mut report);
        }

        let mut released: Vec<NodeId> = Vec::new();
        loop {
            // 3. Propagate.
            while !worklist.is_empty() {
                if !keep_going() {
                    report.cancelled = true;
                    return report;
                }
                let snapshot = worklist.clone();
                for id in snapshot {
                    if worklist.contains(&id) {
                        self.process_node(id, now, &mut worklist, &mut report);
                    }
                }
            }

            // 4. Release waiting nodes whose remaining upstreams did not run.
            worklist = self.stalled_waiters(&released);
            if worklist.is_empty() {
                break;
            }
            released.extend_from_slice(&worklist);
        }

        report
    }

    /// Nodes waiting for all inputs that received data this tick but were
    /// never enqueued because some upstream did not run. Only waiters with no
    /// other stalled waiter upstream are returned. Nodes in `released` were
    /// already released this tick and are skipped.
    fn stalled_waiters(&self, released: &[NodeId]) -> Vec<NodeId> {
        let stalled: Vec<NodeId> = self
            .node_ids()
            .filter(|id| !released.contains(id))
            .filter(|&id| {
                self.entry(id).is_ok_and(|n| {
                    n.settings.wait_for_all_inputs
                        && !n.has_processed
                        && n.inputs.iter().any(|s| s.spec.process_on_receive && s.buffer.is_some())
                })
            })
            .collect();
        stalled
            .iter()
            .copied()
            .filter(|&id| !stalled.iter().any(|&other| other != id && self.can_reach(other, id)))
            .collect()
    }

    fn process_node(&mut self, id: NodeId, now: f64, worklist: &mut Vec<NodeId>, report: &mut TickReport) {
        worklist.retain(|&q| q != id);
        let frame = self.frame;
        let mut outbox = std::mem::take(&mut self.outbox);
        outbox.clear();

        let Some(Some(node)) = self.nodes.get_mut(id.0 as usize) else {
            self.outbox = outbox;
            return;
        };

        if node.settings.enabled && !node.initialized {
            if node
                .last_init_attempt
                .is_some_and(|t| now - t < INIT_RETRY_INTERVAL)
            {
                self.outbox = outbox;
                return;
            }
            node.last_init_attempt = Some(now);
            match node.processor.initialize() {
                Ok(()) => {
                    node.initialized = true;
                    tracing::debug!(node = %node.name, "node initialized");
                }
                Err(err) => {
                    tracing::warn!(node = %node.name, error = %err, "initialization failed, will retry");
                    self.outbox = outbox;
                    return;
                }
            }
        }

        let NodeEntry {
            name,
            processor,
            inputs,
            outputs,
            passthrough,
            settings,
            has_processed,
            stats,
            ..
        } = node;

        let mut ctx = ProcessContext {
            name: name.as_str(),
            inputs: inputs.as_slice(),
            outputs: outputs.as_slice(),
            passthrough: passthrough.as_slice(),
            outbox: &mut outbox,
            now,
            frame,
        };

        let started = Instant::now();
        let result = if settings.enabled {
            processor.process(&mut ctx)
        } else {
            processor.process_passthrough(&mut ctx);
            Ok(())
        };
        stats.record(started.elapsed());
        *has_processed = true;
        report.order.push(id);

        if let Err(err) = result {
            tracing::error!(node = %name, error = %err, "node processing failed");
            report.failures += 1;
            outbox.clear();
        }

        // Resolve fan-out before delivering: delivery needs the arena mutably.
        let mut deliveries = Vec::new();
        for (slot, payload) in outbox.drain(..) {
            for &cid in &outputs[slot.0].outgoing {
                deliveries.push((cid, payload.clone()));
            }
        }
        self.outbox = outbox;

        for (cid, payload) in deliveries {
            if let Some(connection) = self.connection(cid)
                && connection.enabled
            {
                self.deliver(connection.to, payload, worklist);
            }
        }
    }

    fn deliver(&mut self, to: InputRef, payload: Payload, worklist: &mut Vec<NodeId>) {
        // The destination may have been removed since the connection was resolved.
        let Some(Some(node)) = self.nodes.get_mut(to.node.0 as usize) else {
            return;
        };
        let Some(input) = node.inputs.get_mut(to.slot.0) else {
            return;
        };
        input.buffer = Some(payload);

        if !input.spec.process_on_receive {
            return;
        }
        if node.has_processed && node.settings.process_only_once {
            return;
        }
        let wait_for_all = node.settings.wait_for_all_inputs;
        if wait_for_all && !self.all_upstream_processed(to.node) {
            return;
        }
        if !worklist.contains(&to.node) {
            worklist.push(to.node);
        }
    }

    /// Returns true if every node feeding `id` over an enabled connection has processed.
    fn all_upstream_processed(&self, id: NodeId) -> bool {
        let Ok(node) = self.entry(id) else {
            return false;
        };
        node.inputs
            .iter()
            .flat_map(|s| s.incoming.iter())
            .filter_map(|&c| self.connection(c))
            .filter(|c| c.enabled)
            .all(|c| self.has_processed(c.from.node))
    }

    // --- Internal helpers ---

    fn entry(&self, id: NodeId) -> Result<&NodeEntry, GraphError> {
        self.nodes
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(GraphError::NodeNotFound(id))
    }

    fn entry_mut(&mut self, id: NodeId) -> Result<&mut NodeEntry, GraphError> {
        self.nodes
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(GraphError::NodeNotFound(id))
    }

    fn input_spec(&self, r: InputRef) -> Result<&SlotSpec, GraphError> {
        let node = self.entry(r.node)?;
        node.inputs
            .get(r.slot.0)
            .map(|s| &s.spec)
            .ok_or_else(|| GraphError::SlotNotFound {
                node: node.name.clone(),
                slot: format!("#{}", r.slot.0),
                direction: SlotDirection::Input,
            })
    }

    fn output_spec(&self, r: OutputRef) -> Result<&SlotSpec, GraphError> {
        let node = self.entry(r.node)?;
        node.outputs
            .get(r.slot.0)
            .map(|s| &s.spec)
            .ok_or_else(|| GraphError::SlotNotFound {
                node: node.name.clone(),
                slot: format!("#{}", r.slot.0),
                direction: SlotDirection::Output,
            })
    }

    fn input_by_name(&self, node: &str, slot: &str) -> Result<InputRef, GraphError> {
        let id = self.named(node, slot, SlotDirection::Input)?;
        self.input(id, slot)
    }

    fn output_by_name(&self, node: &str, slot: &str) -> Result<OutputRef, GraphError> {
        let id = self.named(node, slot, SlotDirection::Output)?;
        self.output(id, slot)
    }

    fn named(&self, node: &str, slot: &str, direction: SlotDirection) -> Result<NodeId, GraphError> {
        self.node_id(node).ok_or_else(|| GraphError::SlotNotFound {
            node: node.into(),
            slot: slot.into(),
            direction,
        })
    }

    /// DFS reachability check: can `from` reach `to` via existing connections?
    fn can_reach(&self, from: NodeId, to: NodeId) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![from];

        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            let idx = current.0 as usize;
            if idx >= visited.len() || visited[idx] {
                continue;
            }
            visited[idx] = true;

            if let Some(Some(node)) = self.nodes.get(idx) {
                for cid in node.outputs.iter().flat_map(|s| s.outgoing.iter()) {
                    if let Some(connection) = self.connection(*cid) {
                        stack.push(connection.to.node);
                    }
                }
            }
        }
        false
    }

    /// Removes a connection without error checking (caller must verify existence).
    fn disconnect_internal(&mut self, id: ConnectionId) {
        let idx = id.0 as usize;
        if let Some(connection) = self.connections.get_mut(idx).and_then(Option::take) {
            if let Some(Some(node)) = self.nodes.get_mut(connection.from.node.0 as usize)
                && let Some(slot) = node.outputs.get_mut(connection.from.slot.0)
            {
                slot.outgoing.retain(|c| *c != id);
            }
            if let Some(Some(node)) = self.nodes.get_mut(connection.to.node.0 as usize)
                && let Some(slot) = node.inputs.get_mut(connection.to.slot.0)
            {
                slot.incoming.retain(|c| *c != id);
            }
        }
    }
}

// Slot handles are only meaningful for the node that declared them.
impl InputSlot {
    /// Addresses this slot on `node`.
    pub fn on(self, node: NodeId) -> InputRef {
        InputRef { node, slot: self }
    }
}

impl OutputSlot {
    /// Addresses this slot on `node`.
    pub fn on(self, node: NodeId) -> OutputRef {
        OutputRef { node, slot: self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NodeError;
    use parking_lot::Mutex;
    use std::sync::Arc;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Test processor: logs its name when processed and forwards or emits
    /// an empty cluster list.
    struct Probe {
        kind: NodeType,
        log: Log,
        label: &'static str,
        inputs: usize,
        fail: bool,
        silent: bool,
        input: Vec<InputSlot>,
        output: OutputSlot,
    }

    impl Probe {
        fn new(kind: NodeType, label: &'static str, log: &Log) -> Box<Self> {
            Box::new(Self {
                kind,
                log: Arc::clone(log),
                label,
                inputs: 1,
                fail: false,
                silent: false,
                input: Vec::new(),
                output: OutputSlot::default(),
            })
        }
    }

    impl NodeProcessor for Probe {
        fn type_name(&self) -> &'static str {
            "probe"
        }

        fn node_type(&self) -> NodeType {
            self.kind
        }

        fn build_slots(&mut self, slots: &mut SlotLayout) -> Result<(), GraphError> {
            if self.kind != NodeType::Source {
                for i in 0..self.inputs {
                    self.input.push(slots.input(format!("In {}", i + 1), SlotType::Clusters)?);
                }
            }
            self.output = slots.output("Out", SlotType::Clusters)?;
            if let Some(&first) = self.input.first() {
                slots.passthrough(first, self.output)?;
            }
            Ok(())
        }

        fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
            self.log.lock().push(self.label.to_string());
            if self.fail {
                ctx.send_clusters(self.output, Vec::new())?;
                return Err(NodeError::new("boom"));
            }
            if self.silent {
                return Ok(());
            }
            ctx.send_clusters(self.output, Vec::new())
        }

        fn process_passthrough(&mut self, ctx: &mut ProcessContext<'_>) {
            self.log.lock().push(format!("{}:pass", self.label));
            ctx.forward_passthrough();
        }
    }

    fn chain(log: &Log) -> (NodeGraph, [NodeId; 3]) {
        let mut g = NodeGraph::new();
        let a = g.add_node("a", Probe::new(NodeType::Source, "a", log)).unwrap();
        let b = g.add_node("b", Probe::new(NodeType::Filter, "b", log)).unwrap();
        let c = g.add_node("c", Probe::new(NodeType::Output, "c", log)).unwrap();
        g.connect_by_name("a", "Out", "b", "In 1").unwrap();
        g.connect_by_name("b", "Out", "c", "In 1").unwrap();
        (g, [a, b, c])
    }

    fn taken(log: &Log) -> Vec<String> {
        std::mem::take(&mut *log.lock())
    }

    #[test]
    fn chain_runs_in_order_once_each() {
        let log = Log::default();
        let (mut g, [a, b, c]) = chain(&log);

        let report = g.tick_at(0.0, None);
        assert_eq!(report.order, vec![a, b, c]);
        assert_eq!(taken(&log), ["a", "b", "c"]);

        let report = g.tick_at(0.033, None);
        assert_eq!(report.frame, 2);
        assert_eq!(report.nodes_processed(), 3);
    }

    #[test]
    fn connect_twice_is_idempotent() {
        let log = Log::default();
        let (mut g, _) = chain(&log);
        let first = g.connections().next().unwrap().id;
        let again = g.connect_by_name("a", "Out", "b", "In 1").unwrap();
        assert_eq!(first, again);
        assert_eq!(g.connection_count(), 2);
    }

    #[test]
    fn connect_rejects_type_mismatch_and_cycles() {
        let log = Log::default();
        let (mut g, [a, _, c]) = chain(&log);

        let cloud = g.add_slot(c, SlotDirection::Output, "Cloud", SlotType::PointCloud).unwrap();
        assert_eq!(cloud, 1);
        let d = g.add_node("d", Probe::new(NodeType::Filter, "d", &log)).unwrap();
        assert!(matches!(
            g.connect_by_name("c", "Cloud", "d", "In 1"),
            Err(GraphError::TypeMismatch { .. })
        ));

        let err = g.connect_by_name("c", "Out", "b", "In 1");
        assert!(matches!(err, Err(GraphError::CycleDetected { .. })));
        let from = g.output(a, "Out").unwrap();
        let to = g.input(d, "In 1").unwrap();
        assert!(g.connect(from, to).is_ok());
    }

    #[test]
    fn unknown_slot_is_an_error() {
        let log = Log::default();
        let (mut g, _) = chain(&log);
        assert!(matches!(
            g.connect_by_name("a", "Nope", "b", "In 1"),
            Err(GraphError::SlotNotFound { .. })
        ));
        assert!(matches!(
            g.connect_by_name("ghost", "Out", "b", "In 1"),
            Err(GraphError::SlotNotFound { .. })
        ));
    }

    #[test]
    fn duplicate_node_name_is_rejected() {
        let log = Log::default();
        let (mut g, _) = chain(&log);
        let err = g.add_node("a", Probe::new(NodeType::Source, "a2", &log)).unwrap_err();
        assert_eq!(err, GraphError::DuplicateNode("a".into()));
    }

    #[test]
    fn remove_node_tears_down_connections() {
        let log = Log::default();
        let (mut g, [a, b, c]) = chain(&log);
        g.remove_node(b).unwrap();
        assert_eq!(g.connection_count(), 0);
        assert_eq!(g.node_count(), 2);
        assert!(g.remove_node(b).is_err());

        let report = g.tick_at(0.0, None);
        assert_eq!(report.order, vec![a]);
        assert!(!g.has_processed(c));
    }

    #[test]
    fn disabled_connection_delivers_nothing() {
        let log = Log::default();
        let (mut g, [a, b, _]) = chain(&log);
        let first = g.find_connection(g.output(a, "Out").unwrap(), g.input(b, "In 1").unwrap()).unwrap();
        g.set_connection_enabled(first, false).unwrap();

        let report = g.tick_at(0.0, None);
        assert_eq!(report.order, vec![a]);
        assert_eq!(g.connection_count(), 2);
    }

    #[test]
    fn disabled_node_forwards_passthrough() {
        let log = Log::default();
        let (mut g, [a, b, c]) = chain(&log);
        g.set_enabled(b, false).unwrap();

        let report = g.tick_at(0.0, None);
        assert_eq!(report.order, vec![a, b, c]);
        assert_eq!(taken(&log), ["a", "b:pass", "c"]);
    }

    #[test]
    fn failing_node_produces_no_output() {
        let log = Log::default();
        let mut g = NodeGraph::new();
        g.add_node("a", Probe::new(NodeType::Source, "a", &log)).unwrap();
        let mut bad = Probe::new(NodeType::Filter, "b", &log);
        bad.fail = true;
        g.add_node("b", bad).unwrap();
        g.add_node("c", Probe::new(NodeType::Output, "c", &log)).unwrap();
        g.connect_by_name("a", "Out", "b", "In 1").unwrap();
        g.connect_by_name("b", "Out", "c", "In 1").unwrap();

        let report = g.tick_at(0.0, None);
        assert_eq!(report.failures, 1);
        assert_eq!(taken(&log), ["a", "b"]);

        // The next tick runs normally up to the failing node again.
        let report = g.tick_at(0.033, None);
        assert_eq!(report.failures, 1);
        assert_eq!(report.nodes_processed(), 2);
    }

    struct Flaky {
        attempts: Arc<Mutex<u32>>,
        succeed_after: u32,
        output: OutputSlot,
    }

    impl NodeProcessor for Flaky {
        fn type_name(&self) -> &'static str {
            "flaky"
        }

        fn node_type(&self) -> NodeType {
            NodeType::Source
        }

        fn build_slots(&mut self, slots: &mut SlotLayout) -> Result<(), GraphError> {
            self.output = slots.output("Out", SlotType::Clusters)?;
            Ok(())
        }

        fn initialize(&mut self) -> Result<(), NodeError> {
            let mut attempts = self.attempts.lock();
            *attempts += 1;
            if *attempts > self.succeed_after {
                Ok(())
            } else {
                Err(NodeError::new("device not ready"))
            }
        }

        fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
            ctx.send_clusters(self.output, Vec::new())
        }
    }

    #[test]
    fn initialization_is_retried_at_most_once_per_second() {
        let attempts = Arc::new(Mutex::new(0));
        let mut g = NodeGraph::new();
        let id = g
            .add_node(
                "cam",
                Box::new(Flaky {
                    attempts: Arc::clone(&attempts),
                    succeed_after: 1,
                    output: OutputSlot::default(),
                }),
            )
            .unwrap();

        assert!(g.tick_at(0.0, None).order.is_empty());
        assert!(g.tick_at(0.5, None).order.is_empty());
        assert_eq!(*attempts.lock(), 1);

        assert_eq!(g.tick_at(1.0, None).order, vec![id]);
        assert_eq!(*attempts.lock(), 2);
        assert_eq!(g.tick_at(1.1, None).order, vec![id]);
        assert_eq!(*attempts.lock(), 2);
    }

    #[test]
    fn wait_for_all_inputs_defers_until_every_upstream_ran() {
        let log = Log::default();
        let mut g = NodeGraph::new();
        g.add_node("direct", Probe::new(NodeType::Source, "direct", &log)).unwrap();
        g.add_node("src", Probe::new(NodeType::Source, "src", &log)).unwrap();
        g.add_node("f", Probe::new(NodeType::Filter, "f", &log)).unwrap();
        let mut merge = Probe::new(NodeType::Filter, "m", &log);
        merge.inputs = 2;
        let m = g.add_node("m", merge).unwrap();
        g.connect_by_name("src", "Out", "f", "In 1").unwrap();
        g.connect_by_name("f", "Out", "m", "In 1").unwrap();
        g.connect_by_name("direct", "Out", "m", "In 2").unwrap();

        // m runs as soon as `direct` delivers, before f; f's late delivery is dropped.
        g.tick_at(0.0, None);
        assert_eq!(taken(&log), ["direct", "src", "m", "f"]);
        assert_eq!(g.stats(m).unwrap().count, 1);

        g.settings_mut(m).unwrap().process_only_once = false;
        g.tick_at(0.1, None);
        assert_eq!(taken(&log), ["direct", "src", "m", "f", "m"]);

        g.settings_mut(m).unwrap().wait_for_all_inputs = true;
        g.tick_at(0.2, None);
        assert_eq!(taken(&log), ["direct", "src", "f", "m"]);
    }

    #[test]
    fn waiting_node_runs_when_an_upstream_stays_idle() {
        let log = Log::default();
        let mut g = NodeGraph::new();
        g.add_node("cam_a", Probe::new(NodeType::Source, "cam_a", &log)).unwrap();
        let mut idle = Probe::new(NodeType::Source, "cam_b", &log);
        idle.silent = true;
        g.add_node("cam_b", idle).unwrap();
        g.add_node("fa", Probe::new(NodeType::Filter, "fa", &log)).unwrap();
        let fb = g.add_node("fb", Probe::new(NodeType::Filter, "fb", &log)).unwrap();
        let mut merge = Probe::new(NodeType::Filter, "m", &log);
        merge.inputs = 2;
        let m = g.add_node("m", merge).unwrap();
        g.add_node("out", Probe::new(NodeType::Output, "out", &log)).unwrap();
        g.connect_by_name("cam_a", "Out", "fa", "In 1").unwrap();
        g.connect_by_name("cam_b", "Out", "fb", "In 1").unwrap();
        g.connect_by_name("fa", "Out", "m", "In 1").unwrap();
        g.connect_by_name("fb", "Out", "m", "In 2").unwrap();
        g.connect_by_name("m", "Out", "out", "In 1").unwrap();
        g.settings_mut(m).unwrap().wait_for_all_inputs = true;

        g.tick_at(0.0, None);
        assert_eq!(taken(&log), ["cam_a", "cam_b", "fa", "m", "out"]);
        assert!(!g.has_processed(fb));
        assert_eq!(g.stats(m).unwrap().count, 1);
    }

    #[test]
    fn idle_tick_does_not_release_waiting_node() {
        let log = Log::default();
        let mut g = NodeGraph::new();
        let mut idle = Probe::new(NodeType::Source, "cam", &log);
        idle.silent = true;
        g.add_node("cam", idle).unwrap();
        let m = g.add_node("m", Probe::new(NodeType::Filter, "m", &log)).unwrap();
        g.connect_by_name("cam", "Out", "m", "In 1").unwrap();
        g.settings_mut(m).unwrap().wait_for_all_inputs = true;

        g.tick_at(0.0, None);
        assert_eq!(taken(&log), ["cam"]);
    }

    #[test]
    fn cleared_running_flag_cancels_propagation() {
        let log = Log::default();
        let (mut g, [a, _, _]) = chain(&log);
        let running = AtomicBool::new(false);
        let report = g.tick_at(0.0, Some(&running));
        assert!(report.cancelled);
        assert!(report.order.is_empty());

        running.store(true, Ordering::Release);
        let report = g.tick_at(0.1, Some(&running));
        assert!(!report.cancelled);
        assert_eq!(report.order[0], a);
    }

    #[test]
    fn inputs_are_reset_each_tick() {
        let log = Log::default();
        let (mut g, [_, b, _]) = chain(&log);
        g.tick_at(0.0, None);
        assert!(g.has_processed(b));
        // Only the source re-runs once its outgoing connection is gone.
        let conn = g.connections().next().unwrap().id;
        g.disconnect(conn).unwrap();
        g.tick_at(0.1, None);
        assert!(!g.has_processed(b));
        assert!(g.disconnect(conn).is_err());
    }
}
