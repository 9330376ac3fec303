//! Graph file validation.
//!
//! Validation assembles the graph without running it, collecting every
//! problem instead of stopping at the first. Nodes are created through the
//! registry, so parameter tables are checked by the node types themselves.

use std::collections::BTreeSet;

use depthflow_graph::{GraphError, MIN_FPS, NodeGraph};
use depthflow_nodes::{Feeds, NodeRegistry};
use thiserror::Error;

use crate::graph_file::{GraphFile, SlotRef};

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Target tick rate is not a positive number.
    #[error("target_fps {0} must be at least {min}", min = MIN_FPS)]
    InvalidTargetFps(f32),

    /// A node has an empty name.
    #[error("node #{0} has an empty name")]
    EmptyName(usize),

    /// Two nodes share a name.
    #[error("duplicate node name '{0}'")]
    DuplicateNode(String),

    /// Unknown node type.
    #[error("unknown node type '{node_type}' for node '{node}'")]
    UnknownNodeType {
        /// Node name.
        node: String,
        /// Requested type id.
        node_type: String,
    },

    /// The node type rejected its parameters.
    #[error("invalid parameters for node '{node}': {reason}")]
    InvalidParams {
        /// Node name.
        node: String,
        /// Description of the problem.
        reason: String,
    },

    /// An endpoint is not of the form `node.Slot`.
    #[error("malformed slot reference '{0}', expected 'node.Slot'")]
    MalformedSlotRef(String),

    /// An endpoint names a node that does not exist.
    #[error("connection endpoint '{reference}' names unknown node '{node}'")]
    UnknownNode {
        /// The full endpoint.
        reference: String,
        /// The node part.
        node: String,
    },

    /// The graph rejected a connection.
    #[error("connection {from} -> {to}: {source}")]
    Connection {
        /// Output endpoint.
        from: String,
        /// Input endpoint.
        to: String,
        /// Underlying graph error.
        #[source]
        source: GraphError,
    },

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// Folds a list of problems: `None` when empty, the error itself when single.
    pub fn from_list(mut errors: Vec<ValidationError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(errors)),
        }
    }

    /// Individual problems.
    pub fn errors(&self) -> Vec<&ValidationError> {
        match self {
            Self::Multiple(all) => all.iter().collect(),
            single => vec![single],
        }
    }
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// A graph assembled from a file, with every problem found along the way.
pub(crate) struct Assembly {
    pub(crate) graph: NodeGraph,
    pub(crate) feeds: Feeds,
    pub(crate) errors: Vec<ValidationError>,
}

/// Creates nodes, applies their settings, and makes the connections of `file`.
///
/// Nodes or connections that fail are left out and reported; the rest is
/// assembled regardless.
pub(crate) fn assemble(file: &GraphFile, registry: &NodeRegistry) -> Assembly {
    let mut graph = NodeGraph::new();
    let mut feeds = Feeds::new();
    let mut errors = Vec::new();

    if !file.target_fps.is_finite() || file.target_fps < MIN_FPS {
        errors.push(ValidationError::InvalidTargetFps(file.target_fps));
    }

    let mut names = BTreeSet::new();
    for (index, node) in file.nodes.iter().enumerate() {
        if node.name.is_empty() {
            errors.push(ValidationError::EmptyName(index));
            continue;
        }
        if !names.insert(node.name.as_str()) {
            errors.push(ValidationError::DuplicateNode(node.name.clone()));
            continue;
        }
        if registry.get(&node.node_type).is_none() {
            errors.push(ValidationError::UnknownNodeType {
                node: node.name.clone(),
                node_type: node.node_type.clone(),
            });
            continue;
        }

        let processor = match registry.create(&node.node_type, &node.name, &node.params, &mut feeds) {
            Ok(p) => p,
            Err(e) => {
                errors.push(ValidationError::InvalidParams {
                    node: node.name.clone(),
                    reason: error_chain(&e),
                });
                continue;
            }
        };
        let id = match graph.add_node(node.name.as_str(), processor) {
            Ok(id) => id,
            Err(e) => {
                errors.push(ValidationError::InvalidParams {
                    node: node.name.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        if let Ok(settings) = graph.settings_mut(id) {
            settings.enabled = node.enabled;
            if let Some(wait) = node.wait_for_all_inputs {
                settings.wait_for_all_inputs = wait;
            }
            if let Some(once) = node.process_only_once {
                settings.process_only_once = once;
            }
        }
    }

    for conn in &file.connections {
        let Some(from) = endpoint(&conn.from, &names, &mut errors) else {
            continue;
        };
        let Some(to) = endpoint(&conn.to, &names, &mut errors) else {
            continue;
        };
        // Endpoints on nodes that failed to build were reported already.
        if graph.node_id(from.node).is_none() || graph.node_id(to.node).is_none() {
            continue;
        }
        match graph.connect_by_name(from.node, from.slot, to.node, to.slot) {
            Ok(id) => {
                if !conn.enabled {
                    let _ = graph.set_connection_enabled(id, false);
                }
            }
            Err(source) => errors.push(ValidationError::Connection {
                from: conn.from.clone(),
                to: conn.to.clone(),
                source,
            }),
        }
    }

    Assembly { graph, feeds, errors }
}

fn endpoint<'a>(
    reference: &'a str,
    names: &BTreeSet<&str>,
    errors: &mut Vec<ValidationError>,
) -> Option<SlotRef<'a>> {
    let Some(slot_ref) = SlotRef::parse(reference) else {
        errors.push(ValidationError::MalformedSlotRef(reference.to_string()));
        return None;
    };
    if !names.contains(slot_ref.node) {
        errors.push(ValidationError::UnknownNode {
            reference: reference.to_string(),
            node: slot_ref.node.to_string(),
        });
        return None;
    }
    Some(slot_ref)
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

/// Validates `file` against the node types in `registry`.
pub fn validate_graph(file: &GraphFile, registry: &NodeRegistry) -> ValidationResult<()> {
    match ValidationError::from_list(assemble(file, registry).errors) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
