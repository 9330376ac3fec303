//! Output node writing cluster lists as JSON lines.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use depthflow_graph::{
    GraphError, InputSlot, NodeError, NodeProcessor, NodeType, ProcessContext, SlotLayout, SlotType,
};
use depthflow_tracking::{Cluster, ClusterState, Vec3};
use serde::{Deserialize, Serialize};

/// Parameters of a [`JsonOutputNode`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonOutputConfig {
    /// File to append to. Standard output when absent.
    pub path: Option<PathBuf>,
}

/// Wire form of one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecord {
    /// Identity.
    pub id: u32,
    /// Lifecycle tag.
    pub state: ClusterState,
    /// Centroid (m).
    pub centroid: Vec3,
    /// Velocity (m/s).
    pub velocity: Vec3,
    /// Bounding box minimum corner.
    pub min: Vec3,
    /// Bounding box maximum corner.
    pub max: Vec3,
    /// Seconds since first tracked.
    pub age: f32,
    /// Number of points.
    pub points: usize,
}

impl From<&Cluster> for ClusterRecord {
    fn from(c: &Cluster) -> Self {
        Self {
            id: c.id,
            state: c.state,
            centroid: c.centroid,
            velocity: c.velocity,
            min: c.bounds.min,
            max: c.bounds.max,
            age: c.age,
            points: c.cloud.len(),
        }
    }
}

/// One line of output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Tick counter.
    pub frame: u64,
    /// Tick time (s).
    pub time: f64,
    /// Clusters received this tick.
    pub clusters: Vec<ClusterRecord>,
}

enum Sink {
    Pending(PathBuf),
    Open(Box<dyn Write + Send>),
}

/// Writes every received cluster list as one JSON line.
pub struct JsonOutputNode {
    sink: Sink,
    input: InputSlot,
}

impl JsonOutputNode {
    /// Type id in the registry.
    pub const TYPE: &'static str = "json_output";

    /// Writes to `writer`.
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            sink: Sink::Open(writer),
            input: InputSlot::default(),
        }
    }

    /// Writes to standard output.
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Appends to `path`, opened on initialization.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            sink: Sink::Pending(path.into()),
            input: InputSlot::default(),
        }
    }

    /// Builds the node described by `config`.
    pub fn from_config(config: JsonOutputConfig) -> Self {
        match config.path {
            Some(path) => Self::file(path),
            None => Self::stdout(),
        }
    }
}

impl NodeProcessor for JsonOutputNode {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn node_type(&self) -> NodeType {
        NodeType::Output
    }

    fn build_slots(&mut self, slots: &mut SlotLayout) -> Result<(), GraphError> {
        self.input = slots.input("In", SlotType::Clusters)?;
        Ok(())
    }

    fn initialize(&mut self) -> Result<(), NodeError> {
        if let Sink::Pending(path) = &self.sink {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| NodeError::new(format!("cannot open {}: {e}", path.display())))?;
            self.sink = Sink::Open(Box::new(BufWriter::new(file)));
        }
        Ok(())
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        let Some(clusters) = ctx.clusters(self.input) else {
            return Ok(());
        };
        let Sink::Open(writer) = &mut self.sink else {
            return Err(NodeError::new("output not initialized"));
        };
        let record = FrameRecord {
            frame: ctx.frame(),
            time: ctx.now(),
            clusters: clusters.iter().map(ClusterRecord::from).collect(),
        };
        let write = |w: &mut dyn Write| -> io::Result<()> {
            serde_json::to_writer(&mut *w, &record)?;
            w.write_all(b"\n")?;
            w.flush()
        };
        write(writer.as_mut()).map_err(|e| NodeError::new(format!("write failed: {e}")))
    }
}
