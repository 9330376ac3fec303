//! Errors from creating nodes out of the catalogue.

use thiserror::Error;

/// Failure to build a node from a type id and parameters.
#[derive(Debug, Error)]
pub enum NodeBuildError {
    /// No node type with this id is registered.
    #[error("unknown node type '{0}'")]
    UnknownType(String),

    /// The parameter table does not fit the node type.
    #[error("invalid parameters for node type '{node_type}'")]
    InvalidParams {
        /// Node type id.
        node_type: String,
        /// Underlying deserialization error.
        #[source]
        source: toml::de::Error,
    },

    /// A parameter parsed but its value is out of range.
    #[error("invalid parameter '{param}' for node type '{node_type}': {reason}")]
    OutOfRange {
        /// Node type id.
        node_type: String,
        /// Parameter name.
        param: String,
        /// What is wrong with it.
        reason: String,
    },
}
