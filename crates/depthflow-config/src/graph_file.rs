//! Graph file format and operations.

use std::fmt;
use std::path::Path;

use depthflow_graph::SchedulerConfig;
use depthflow_nodes::NodeParams;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_true() -> bool {
    true
}

fn default_target_fps() -> f32 {
    SchedulerConfig::default().target_fps
}

/// A processing graph stored on disk.
///
/// # TOML Format
///
/// ```toml
/// name = "single sensor"
/// target_fps = 30.0
///
/// [[nodes]]
/// name = "cam"
/// type = "cluster_source"
///
/// [[nodes]]
/// name = "track"
/// type = "tracker"
/// [nodes.params]
/// search_distance = 0.15
///
/// [[connections]]
/// from = "cam.Clusters"
/// to = "track.In"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphFile {
    /// Name of the graph.
    #[serde(default)]
    pub name: String,

    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Scheduler tick rate.
    #[serde(default = "default_target_fps")]
    pub target_fps: f32,

    /// Nodes, in creation order.
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,

    /// Connections between node slots.
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
}

impl Default for GraphFile {
    fn default() -> Self {
        Self::new("")
    }
}

impl GraphFile {
    /// Create an empty graph file.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            target_fps: default_target_fps(),
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }

    /// Add a node.
    pub fn with_node(mut self, node: NodeConfig) -> Self {
        self.nodes.push(node);
        self
    }

    /// Connect `from` (`"node.Slot"`) to `to`.
    pub fn with_connection(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.connections.push(ConnectionConfig::new(from, to));
        self
    }

    /// Load a graph file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let file: GraphFile = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), nodes = file.nodes.len(), "graph file loaded");
        Ok(file)
    }

    /// Parse a graph file from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the graph file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the graph file to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Find a node by name.
    pub fn node(&self, name: &str) -> Option<&NodeConfig> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Scheduler settings for this graph.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            target_fps: self.target_fps,
            ..SchedulerConfig::default()
        }
    }
}

/// One node entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique node name.
    pub name: String,

    /// Registry type id.
    #[serde(rename = "type")]
    pub node_type: String,

    /// Disabled nodes only forward their passthrough pairs.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Overrides the node type's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for_all_inputs: Option<bool>,

    /// Overrides the node type's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_only_once: Option<bool>,

    /// Type-specific parameters.
    #[serde(default, skip_serializing_if = "NodeParams::is_empty")]
    pub params: NodeParams,
}

impl NodeConfig {
    /// Create an enabled node with default parameters.
    pub fn new(name: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_type: node_type.into(),
            enabled: true,
            wait_for_all_inputs: None,
            process_only_once: None,
            params: NodeParams::new(),
        }
    }

    /// Set a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Set whether the node starts enabled.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// One connection entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Output endpoint, `"node.Slot"`.
    pub from: String,

    /// Input endpoint, `"node.Slot"`.
    pub to: String,

    /// Disabled connections carry nothing.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ConnectionConfig {
    /// Create an enabled connection.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            enabled: true,
        }
    }
}

/// A parsed `"node.Slot"` endpoint.
///
/// The slot name follows the last dot, so node names may contain dots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRef<'a> {
    /// Node name.
    pub node: &'a str,
    /// Slot name.
    pub slot: &'a str,
}

impl<'a> SlotRef<'a> {
    /// Parses an endpoint. Returns `None` when either part is empty.
    pub fn parse(s: &'a str) -> Option<Self> {
        let (node, slot) = s.rsplit_once('.')?;
        (!node.is_empty() && !slot.is_empty()).then_some(Self { node, slot })
    }
}

impl fmt::Display for SlotRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_ref_parsing() {
        assert_eq!(
            SlotRef::parse("merge.In 2"),
            Some(SlotRef {
                node: "merge",
                slot: "In 2"
            })
        );
        assert_eq!(SlotRef::parse("rig.left.Clusters").unwrap().node, "rig.left");
        assert!(SlotRef::parse("tracker").is_none());
        assert!(SlotRef::parse(".In").is_none());
        assert!(SlotRef::parse("tracker.").is_none());
    }

    #[test]
    fn minimal_file_uses_defaults() {
        let file = GraphFile::from_toml(
            r#"
            [[nodes]]
            name = "cam"
            type = "cluster_source"
            "#,
        )
        .unwrap();
        assert_eq!(file.name, "");
        assert_eq!(file.target_fps, 30.0);
        assert!(file.nodes[0].enabled);
        assert!(file.nodes[0].params.is_empty());
        assert!(file.connections.is_empty());
    }

    #[test]
    fn toml_round_trip_keeps_params_and_flags() {
        let file = GraphFile::new("rig")
            .with_node(NodeConfig::new("cam", "cluster_source"))
            .with_node(
                NodeConfig::new("track", "tracker")
                    .with_param("search_distance", 0.2)
                    .with_param("enable_ghosting", true)
                    .with_enabled(false),
            )
            .with_connection("cam.Clusters", "track.In");

        let text = file.to_toml().unwrap();
        assert!(text.contains("[nodes.params]"), "got:\n{text}");
        let parsed = GraphFile::from_toml(&text).unwrap();
        assert_eq!(parsed, file);
    }

    #[test]
    fn scheduler_config_carries_target_fps() {
        let mut file = GraphFile::new("x");
        file.target_fps = 60.0;
        let config = file.scheduler_config();
        assert_eq!(config.target_fps, 60.0);
        assert_eq!(config.join_timeout_ms, SchedulerConfig::default().join_timeout_ms);
    }
}
