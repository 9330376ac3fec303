//! Error types for graph mutation, node processing, and the scheduler.

use std::time::Duration;

use thiserror::Error;

use crate::connection::ConnectionId;
use crate::node::NodeId;
use crate::payload::SlotType;
use crate::slot::SlotDirection;

/// Structural errors returned by the graph mutation API.
///
/// These indicate programming errors in the code assembling a graph; the
/// graph is left unchanged when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The node handle does not refer to a live node.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    /// The connection handle does not refer to a live connection.
    #[error("connection {0} not found")]
    ConnectionNotFound(ConnectionId),

    /// No slot with this name and direction exists on the node.
    #[error("{direction} slot '{slot}' not found on node '{node}'")]
    SlotNotFound {
        /// Node name.
        node: String,
        /// Requested slot name.
        slot: String,
        /// Requested direction.
        direction: SlotDirection,
    },

    /// A slot with this name and direction already exists on the node.
    #[error("duplicate {direction} slot '{slot}'")]
    DuplicateSlot {
        /// Slot name.
        slot: String,
        /// Slot direction.
        direction: SlotDirection,
    },

    /// Another node already uses this name.
    #[error("duplicate node name '{0}'")]
    DuplicateNode(String),

    /// The two endpoints carry different payload types.
    #[error("type mismatch: cannot connect {from} output to {to} input")]
    TypeMismatch {
        /// Output slot type.
        from: SlotType,
        /// Input slot type.
        to: SlotType,
    },

    /// The connection would close a cycle.
    #[error("connecting '{from}' to '{to}' would create a cycle")]
    CycleDetected {
        /// Upstream node name.
        from: String,
        /// Downstream node name.
        to: String,
    },
}

/// Failure reported by a node's `initialize` or `process` hook.
///
/// The scheduler logs it with the node's name and skips the node for the
/// rest of the tick; it is never fatal to the graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct NodeError {
    message: String,
}

impl NodeError {
    /// Creates an error with a human-readable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Payload sent on an output slot of another type.
    pub fn wrong_payload(slot: &str, expected: SlotType, got: SlotType) -> Self {
        Self::new(format!("slot '{slot}' carries {expected}, got {got}"))
    }

    /// The message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors from starting or stopping the scheduler thread.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The OS refused to create the thread.
    #[error("failed to spawn scheduler thread")]
    Spawn(#[source] std::io::Error),

    /// The thread did not finish its current tick within the join timeout.
    #[error("scheduler thread did not stop within {0:?}")]
    JoinTimeout(Duration),

    /// The thread panicked.
    #[error("scheduler thread panicked")]
    Panicked,
}
