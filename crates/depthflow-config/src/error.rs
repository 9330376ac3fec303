//! Error types for configuration operations.

use std::path::PathBuf;

use depthflow_graph::GraphError;
use depthflow_nodes::NodeBuildError;
use thiserror::Error;

use crate::validation::ValidationError;

/// Errors that can occur while loading, saving, or building graph files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to create directory
    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        /// Path of the directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// The file describes an invalid graph
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A node could not be created
    #[error("node '{node}': {source}")]
    Node {
        /// Node name.
        node: String,
        /// Underlying factory error.
        #[source]
        source: NodeBuildError,
    },

    /// The graph rejected a node or connection
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl ConfigError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a write file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// Create a create directory error.
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::CreateDir {
            path: path.into(),
            source,
        }
    }

    /// Create a node build error.
    pub fn node(node: impl Into<String>, source: NodeBuildError) -> Self {
        ConfigError::Node {
            node: node.into(),
            source,
        }
    }
}
