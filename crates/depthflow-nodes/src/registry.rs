//! Catalogue of node types and their factories.

use depthflow_graph::{NodeProcessor, NodeType, latest};
use depthflow_tracking::{MergerConfig, TrackerConfig};
use serde::Deserialize;

use crate::cloud_source::CloudSourceNode;
use crate::cluster_source::{ClusterSourceNode, SourceConfig};
use crate::error::NodeBuildError;
use crate::feeds::{Feeds, NodeControl};
use crate::json_output::{JsonOutputConfig, JsonOutputNode};
use crate::merge::{DEFAULT_INPUTS, MergeClustersNode};
use crate::one_euro::{OneEuroConfig, OneEuroNode};
use crate::params::{NodeParams, parse_params};
use crate::prediction::{PredictionConfig, PredictionNode};
use crate::recorder::{RecorderConfig, RecorderNode};
use crate::tracker::TrackerNode;

/// Most inputs a `merge_clusters` node may declare.
pub const MAX_MERGE_INPUTS: usize = 16;

/// Describes a node type in the registry.
#[derive(Debug, Clone)]
pub struct NodeDescriptor {
    /// Unique identifier (lowercase, no spaces), used as `type` in graph files.
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Brief description.
    pub description: &'static str,
    /// Category.
    pub node_type: NodeType,
}

/// Builds a node named `name` from its parameters, registering handles in `feeds`.
type NodeFactory = fn(&str, &NodeParams, &mut Feeds) -> Result<Box<dyn NodeProcessor>, NodeBuildError>;

struct RegistryEntry {
    descriptor: NodeDescriptor,
    factory: NodeFactory,
}

/// Registry of all available node types.
pub struct NodeRegistry {
    entries: Vec<RegistryEntry>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRegistry {
    /// Create a registry with all built-in node types.
    pub fn new() -> Self {
        let mut registry = Self {
            entries: Vec::with_capacity(8),
        };
        registry.register_builtin_nodes();
        registry
    }

    fn register_builtin_nodes(&mut self) {
        // Sources
        self.register(
            NodeDescriptor {
                id: ClusterSourceNode::TYPE,
                name: "Cluster Source",
                description: "Detections handed over by an acquisition thread",
                node_type: NodeType::Source,
            },
            |name, params, feeds| {
                let config: SourceConfig = parse_params(ClusterSourceNode::TYPE, params)?;
                let (tx, rx) = latest();
                feeds.insert_cluster_feed(name, tx);
                Ok(Box::new(ClusterSourceNode::new(rx, config)))
            },
        );

        self.register(
            NodeDescriptor {
                id: CloudSourceNode::TYPE,
                name: "Cloud Source",
                description: "Point cloud and image frames from a depth sensor",
                node_type: NodeType::Source,
            },
            |name, params, feeds| {
                let config: SourceConfig = parse_params(CloudSourceNode::TYPE, params)?;
                let (tx, rx) = latest();
                feeds.insert_frame_feed(name, tx);
                Ok(Box::new(CloudSourceNode::new(rx, config)))
            },
        );

        // Filters
        self.register(
            NodeDescriptor {
                id: TrackerNode::TYPE,
                name: "Tracker",
                description: "Stable identities by optimal assignment, with ghosting",
                node_type: NodeType::Filter,
            },
            |name, params, feeds| {
                let config: TrackerConfig = parse_params(TrackerNode::TYPE, params)?;
                let node = TrackerNode::new(config);
                feeds.insert_control(name, NodeControl::Tracker(node.handle()));
                Ok(Box::new(node))
            },
        );

        self.register(
            NodeDescriptor {
                id: OneEuroNode::TYPE,
                name: "One Euro Filter",
                description: "Per-identity adaptive smoothing of centroid and bounds",
                node_type: NodeType::Filter,
            },
            |name, params, feeds| {
                let config: OneEuroConfig = parse_params(OneEuroNode::TYPE, params)?;
                let node = OneEuroNode::new(config);
                feeds.insert_control(name, NodeControl::OneEuro(node.config()));
                Ok(Box::new(node))
            },
        );

        self.register(
            NodeDescriptor {
                id: PredictionNode::TYPE,
                name: "Prediction",
                description: "Extrapolates fast clusters along their velocity",
                node_type: NodeType::Filter,
            },
            |name, params, feeds| {
                let config: PredictionConfig = parse_params(PredictionNode::TYPE, params)?;
                if !(0.0..=5.0).contains(&config.strength) {
                    return Err(out_of_range(PredictionNode::TYPE, "strength", "expected 0 to 5"));
                }
                if !(0.0..=2.0).contains(&config.velocity_threshold) {
                    return Err(out_of_range(
                        PredictionNode::TYPE,
                        "velocity_threshold",
                        "expected 0 to 2",
                    ));
                }
                let node = PredictionNode::new(config);
                feeds.insert_control(name, NodeControl::Prediction(node.config()));
                Ok(Box::new(node))
            },
        );

        self.register(
            NodeDescriptor {
                id: MergeClustersNode::TYPE,
                name: "Merge Clusters",
                description: "Fuses coincident clusters of several tracked streams",
                node_type: NodeType::Filter,
            },
            |name, params, feeds| {
                #[derive(Deserialize)]
                #[serde(default)]
                struct Inputs {
                    inputs: usize,
                }
                impl Default for Inputs {
                    fn default() -> Self {
                        Self { inputs: DEFAULT_INPUTS }
                    }
                }

                let config: MergerConfig = parse_params(MergeClustersNode::TYPE, params)?;
                let Inputs { inputs } = parse_params(MergeClustersNode::TYPE, params)?;
                if !(1..=MAX_MERGE_INPUTS).contains(&inputs) {
                    return Err(out_of_range(
                        MergeClustersNode::TYPE,
                        "inputs",
                        &format!("expected 1 to {MAX_MERGE_INPUTS}"),
                    ));
                }
                let node = MergeClustersNode::new(config, inputs);
                feeds.insert_control(name, NodeControl::Merger(node.handle()));
                Ok(Box::new(node))
            },
        );

        self.register(
            NodeDescriptor {
                id: RecorderNode::TYPE,
                name: "Recorder",
                description: "Records cluster frames and replays them in a loop",
                node_type: NodeType::Filter,
            },
            |name, params, feeds| {
                let config: RecorderConfig = parse_params(RecorderNode::TYPE, params)?;
                let node = RecorderNode::new(config);
                feeds.insert_control(name, NodeControl::Recorder(node.handle()));
                Ok(Box::new(node))
            },
        );

        // Outputs
        self.register(
            NodeDescriptor {
                id: JsonOutputNode::TYPE,
                name: "JSON Output",
                description: "Writes each cluster list as a JSON line",
                node_type: NodeType::Output,
            },
            |_name, params, _feeds| {
                let config: JsonOutputConfig = parse_params(JsonOutputNode::TYPE, params)?;
                Ok(Box::new(JsonOutputNode::from_config(config)))
            },
        );
    }

    fn register(&mut self, descriptor: NodeDescriptor, factory: NodeFactory) {
        self.entries.push(RegistryEntry {
            descriptor,
            factory,
        });
    }

    /// Returns descriptors for all registered node types.
    pub fn all_nodes(&self) -> Vec<&NodeDescriptor> {
        self.entries.iter().map(|e| &e.descriptor).collect()
    }

    /// Returns descriptors for node types of one category.
    pub fn nodes_of_type(&self, node_type: NodeType) -> Vec<&NodeDescriptor> {
        self.entries
            .iter()
            .filter(|e| e.descriptor.node_type == node_type)
            .map(|e| &e.descriptor)
            .collect()
    }

    /// Get a descriptor by type id.
    pub fn get(&self, id: &str) -> Option<&NodeDescriptor> {
        self.entries
            .iter()
            .find(|e| e.descriptor.id == id)
            .map(|e| &e.descriptor)
    }

    /// Create a node of type `id` named `name`.
    ///
    /// Feed senders and control handles of the new node are stored in `feeds`
    /// under `name`.
    pub fn create(
        &self,
        id: &str,
        name: &str,
        params: &NodeParams,
        feeds: &mut Feeds,
    ) -> Result<Box<dyn NodeProcessor>, NodeBuildError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.descriptor.id == id)
            .ok_or_else(|| NodeBuildError::UnknownType(id.to_string()))?;
        (entry.factory)(name, params, feeds)
    }

    /// Returns the number of registered node types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no node types are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn out_of_range(node_type: &str, param: &str, reason: &str) -> NodeBuildError {
    NodeBuildError::OutOfRange {
        node_type: node_type.to_string(),
        param: param.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depthflow_graph::{NodeGraph, SlotLayout};

    fn params(text: &str) -> NodeParams {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn source_params_are_checked() {
        let registry = NodeRegistry::new();
        let mut feeds = Feeds::new();
        assert!(
            registry
                .create("cluster_source", "cam", &params("only_new_frames = false"), &mut feeds)
                .is_ok()
        );
        assert!(
            registry
                .create("cloud_source", "depth", &params("only_new_frames = 3"), &mut feeds)
                .is_err()
        );
    }

    #[test]
    fn registry_lists_every_builtin() {
        let registry = NodeRegistry::new();
        assert_eq!(registry.len(), 8);
        assert_eq!(registry.nodes_of_type(NodeType::Source).len(), 2);
        assert_eq!(registry.nodes_of_type(NodeType::Filter).len(), 5);
        assert_eq!(registry.nodes_of_type(NodeType::Output).len(), 1);
        assert_eq!(registry.get("tracker").unwrap().name, "Tracker");
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn created_nodes_match_their_descriptor() {
        let registry = NodeRegistry::new();
        let mut feeds = Feeds::new();
        for desc in registry.all_nodes() {
            let node = registry
                .create(desc.id, desc.id, &NodeParams::new(), &mut feeds)
                .unwrap();
            assert_eq!(node.type_name(), desc.id);
            assert_eq!(node.node_type(), desc.node_type);
        }
        assert!(feeds.cluster_feed("cluster_source").is_some());
        assert!(feeds.frame_feed("cloud_source").is_some());
        assert!(feeds.tracker("tracker").is_some());
        assert!(feeds.merger("merge_clusters").is_some());
        assert!(feeds.recorder("recorder").is_some());
    }

    #[test]
    fn unknown_type_is_an_error() {
        let registry = NodeRegistry::new();
        let err = registry
            .create("teleporter", "t", &NodeParams::new(), &mut Feeds::new())
            .err()
            .unwrap();
        assert!(matches!(err, NodeBuildError::UnknownType(id) if id == "teleporter"));
    }

    #[test]
    fn tracker_params_reach_the_handle() {
        let registry = NodeRegistry::new();
        let mut feeds = Feeds::new();
        registry
            .create("tracker", "t", &params("search_distance = 0.2\nenable_ghosting = true"), &mut feeds)
            .unwrap();
        let config = feeds.tracker("t").unwrap().config();
        assert_eq!(config.search_distance, 0.2);
        assert!(config.enable_ghosting);
    }

    #[test]
    fn merge_input_count_is_configurable_and_bounded() {
        let registry = NodeRegistry::new();
        let mut feeds = Feeds::new();
        let mut node = registry
            .create("merge_clusters", "m", &params("inputs = 2\nmerge_distance = 0.4"), &mut feeds)
            .unwrap();
        let mut layout = SlotLayout::new();
        node.build_slots(&mut layout).unwrap();
        assert_eq!(layout.inputs().len(), 2);
        assert_eq!(layout.inputs()[1].name, "In 2");
        assert_eq!(feeds.merger("m").unwrap().config().merge_distance, 0.4);
        assert!(node.default_settings().wait_for_all_inputs);

        let err = registry
            .create("merge_clusters", "m2", &params("inputs = 0"), &mut feeds)
            .err()
            .unwrap();
        assert!(matches!(err, NodeBuildError::OutOfRange { .. }));
    }

    #[test]
    fn prediction_rejects_out_of_range_strength() {
        let registry = NodeRegistry::new();
        let err = registry
            .create("prediction", "p", &params("strength = 9.0"), &mut Feeds::new())
            .err()
            .unwrap();
        assert!(err.to_string().contains("strength"));
    }

    #[test]
    fn default_merge_node_has_four_inputs() {
        let registry = NodeRegistry::new();
        let mut graph = NodeGraph::new();
        let node = registry
            .create("merge_clusters", "m", &NodeParams::new(), &mut Feeds::new())
            .unwrap();
        let id = graph.add_node("m", node).unwrap();
        let names: Vec<String> = graph.input_specs(id).into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["In 1", "In 2", "In 3", "In 4"]);
        assert!(graph.settings(id).unwrap().wait_for_all_inputs);
    }
}
