//! Depthflow Graph - typed dataflow graph and scheduler
//!
//! Nodes exchange sensor data (point clouds, cluster lists, images) through
//! named, typed slots. A single scheduler thread ticks the graph at a target
//! rate; every node runs at most once per tick, after its upstream.
//!
//! # Building Blocks
//!
//! - [`NodeProcessor`] - Behavior of a node kind: slots, initialization, processing
//! - [`NodeGraph`] - Node arena, connections, and the per-tick propagation
//! - [`Payload`] / [`SlotType`] - Data carried between slots
//! - [`Scheduler`] - Background thread with rate control and [`TickStats`]
//! - [`Session`] - Owner of the currently running graph
//! - [`latest()`] - Single-slot channel from an acquisition thread to a source node
//!
//! # Example
//!
//! ```rust
//! use depthflow_graph::{
//!     GraphError, NodeError, NodeGraph, NodeProcessor, NodeType, OutputSlot,
//!     ProcessContext, SlotLayout, SlotType,
//! };
//!
//! struct Empty(OutputSlot);
//!
//! impl NodeProcessor for Empty {
//!     fn type_name(&self) -> &'static str { "empty" }
//!     fn node_type(&self) -> NodeType { NodeType::Source }
//!     fn build_slots(&mut self, slots: &mut SlotLayout) -> Result<(), GraphError> {
//!         self.0 = slots.output("Clusters", SlotType::Clusters)?;
//!         Ok(())
//!     }
//!     fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
//!         ctx.send_clusters(self.0, Vec::new())
//!     }
//! }
//!
//! let mut graph = NodeGraph::new();
//! let id = graph.add_node("source", Box::new(Empty(OutputSlot::default())))?;
//! assert_eq!(graph.tick().order, vec![id]);
//! # Ok::<(), GraphError>(())
//! ```

pub mod connection;
pub mod error;
pub mod graph;
pub mod latest;
pub mod node;
pub mod payload;
pub mod scheduler;
pub mod session;
pub mod slot;

pub use connection::{Connection, ConnectionId};
pub use error::{GraphError, NodeError, SchedulerError};
pub use graph::{INIT_RETRY_INTERVAL, NodeGraph, TickReport};
pub use latest::{LatestReceiver, LatestSender, latest};
pub use node::{NodeId, NodeProcessor, NodeSettings, NodeStats, NodeType, ProcessContext};
pub use payload::{Image, Payload, SlotType, Transform};
pub use scheduler::{
    MIN_FPS, Scheduler, SchedulerConfig, SharedGraph, TargetFps, TickStats, frame_budget, idle_time,
};
pub use session::Session;
pub use slot::{InputRef, InputSlot, OutputRef, OutputSlot, SlotDirection, SlotLayout, SlotSpec};
