//! Node catalogue for depthflow graphs.
//!
//! Each node type wraps one tracking stage behind the
//! [`NodeProcessor`](depthflow_graph::NodeProcessor) interface. The
//! [`NodeRegistry`] creates nodes by type id from a parameter table, which is
//! how graph files are turned into running graphs.
//!
//! # Node types
//!
//! | id | category | slots |
//! |----|----------|-------|
//! | `cluster_source` | source | `Clusters` out |
//! | `cloud_source` | source | `Cloud`, `Image` out |
//! | `tracker` | filter | `In` → `Out` |
//! | `one_euro` | filter | `In` → `Out` |
//! | `prediction` | filter | `In` → `Out` |
//! | `merge_clusters` | filter | `In 1`..`In N` → `Out` |
//! | `recorder` | filter | `In` → `Out` |
//! | `json_output` | output | `In` |
//!
//! # Feeds and controls
//!
//! Creating a node may register handles in a [`Feeds`] set: source nodes
//! leave the sending half of their latest-value channel, and nodes with live
//! configuration or triggers leave a [`NodeControl`]. Both are keyed by the
//! node's name.
//!
//! ```rust
//! use depthflow_graph::NodeGraph;
//! use depthflow_nodes::{Feeds, NodeParams, NodeRegistry};
//! use depthflow_tracking::{Cluster, Vec3};
//!
//! let registry = NodeRegistry::new();
//! let mut feeds = Feeds::new();
//! let mut graph = NodeGraph::new();
//!
//! let source = registry.create("cluster_source", "cam", &NodeParams::new(), &mut feeds).unwrap();
//! let tracker = registry.create("tracker", "track", &NodeParams::new(), &mut feeds).unwrap();
//! graph.add_node("cam", source).unwrap();
//! graph.add_node("track", tracker).unwrap();
//! graph.connect_by_name("cam", "Clusters", "track", "In").unwrap();
//!
//! feeds.cluster_feed("cam").unwrap().send(vec![Cluster::at(Vec3::ZERO)]);
//! let report = graph.tick_at(0.0, None);
//! assert_eq!(report.nodes_processed(), 2);
//! ```

pub mod cloud_source;
pub mod cluster_source;
pub mod error;
pub mod feeds;
pub mod json_output;
pub mod merge;
pub mod one_euro;
pub mod params;
pub mod prediction;
pub mod recorder;
pub mod registry;
pub mod tracker;

pub use cloud_source::{CloudSourceNode, SensorFrame};
pub use cluster_source::{ClusterSourceNode, SourceConfig};
pub use error::NodeBuildError;
pub use feeds::{Feeds, NodeControl};
pub use json_output::{ClusterRecord, FrameRecord, JsonOutputConfig, JsonOutputNode};
pub use merge::{DEFAULT_INPUTS, MergeClustersNode, MergerHandle};
pub use one_euro::{OneEuroConfig, OneEuroNode};
pub use params::{Live, NodeParams, parse_params};
pub use prediction::{PredictionConfig, PredictionNode, predict};
pub use recorder::{RecordState, RecorderConfig, RecorderHandle, RecorderNode};
pub use registry::{MAX_MERGE_INPUTS, NodeDescriptor, NodeRegistry};
pub use tracker::{TrackerHandle, TrackerNode};
