//! Graph files for depthflow.
//!
//! A graph file lists nodes by registry type with their parameter tables and
//! the connections between their slots. This crate loads and saves those
//! files, validates them against a [`NodeRegistry`], and builds a
//! [`NodeGraph`](depthflow_graph::NodeGraph) ready to hand to a scheduler.
//!
//! # Example
//!
//! ```rust
//! use depthflow_config::{GraphFile, NodeConfig, NodeRegistry};
//!
//! let file = GraphFile::new("single sensor")
//!     .with_node(NodeConfig::new("cam", "cluster_source"))
//!     .with_node(NodeConfig::new("track", "tracker").with_param("search_distance", 0.15))
//!     .with_connection("cam.Clusters", "track.In");
//!
//! let registry = NodeRegistry::new();
//! file.validate(&registry).unwrap();
//!
//! let loaded = file.build(&registry).unwrap();
//! assert!(loaded.feeds.cluster_feed("cam").is_some());
//! ```

mod build;
mod error;
mod graph_file;

/// Bundled example graph.
pub mod example;

/// Graph file validation.
pub mod validation;

pub use build::LoadedGraph;
pub use error::ConfigError;
pub use example::{EXAMPLE_GRAPH, example_graph};
pub use graph_file::{ConnectionConfig, GraphFile, NodeConfig, SlotRef};
pub use validation::{ValidationError, ValidationResult, validate_graph};

/// Re-export commonly used types from depthflow-nodes
pub use depthflow_nodes::{Feeds, NodeDescriptor, NodeParams, NodeRegistry};
