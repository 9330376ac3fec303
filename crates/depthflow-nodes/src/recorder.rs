//! In-memory record and replay of cluster frames.
//!
//! While recording, every received list is stored with its time relative to
//! the start of the recording. While playing, the node starts itself each
//! tick and re-emits the stored frames on their original timing, looping at
//! the end. Idle, it forwards its input.

use std::sync::Arc;

use depthflow_graph::{
    GraphError, InputSlot, NodeError, NodeProcessor, NodeType, OutputSlot, Payload, ProcessContext, SlotLayout,
    SlotType,
};
use depthflow_tracking::Cluster;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Recorder mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    /// Forward input.
    #[default]
    Idle,
    /// Store and forward input.
    Recording,
    /// Replay stored frames; input is ignored.
    Playing,
    /// Emit nothing.
    Paused,
}

/// Parameters of a [`RecorderNode`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Frames kept per recording; later frames are not stored.
    pub max_frames: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self { max_frames: 10_000 }
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: RecordState,
    requested: Option<RecordState>,
    frames: usize,
}

impl Shared {
    fn effective(&self) -> RecordState {
        self.requested.unwrap_or(self.state)
    }
}

/// Remote control of a [`RecorderNode`].
#[derive(Debug, Clone)]
pub struct RecorderHandle {
    shared: Arc<Mutex<Shared>>,
}

impl RecorderHandle {
    /// Switches mode on the next tick. Recording discards the previous take;
    /// playing restarts from the first frame.
    pub fn set_state(&self, state: RecordState) {
        self.shared.lock().requested = Some(state);
    }

    /// Mode as of the next tick.
    pub fn state(&self) -> RecordState {
        self.shared.lock().effective()
    }

    /// Stored frames.
    pub fn frame_count(&self) -> usize {
        self.shared.lock().frames
    }
}

/// Records and replays cluster lists.
pub struct RecorderNode {
    config: RecorderConfig,
    shared: Arc<Mutex<Shared>>,
    frames: Vec<(f64, Arc<[Cluster]>)>,
    started_at: f64,
    cursor: usize,
    input: InputSlot,
    out: OutputSlot,
}

impl RecorderNode {
    /// Type id in the registry.
    pub const TYPE: &'static str = "recorder";

    /// Creates an idle recorder.
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            shared: Arc::default(),
            frames: Vec::new(),
            started_at: 0.0,
            cursor: 0,
            input: InputSlot::default(),
            out: OutputSlot::default(),
        }
    }

    /// Control handle.
    pub fn handle(&self) -> RecorderHandle {
        RecorderHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn apply_request(&mut self, name: &str, now: f64) -> RecordState {
        let mut shared = self.shared.lock();
        let Some(next) = shared.requested.take() else {
            return shared.state;
        };
        if next != shared.state {
            match next {
                RecordState::Recording => {
                    self.frames.clear();
                    self.started_at = now;
                }
                RecordState::Playing => {
                    self.started_at = now;
                    self.cursor = 0;
                }
                RecordState::Idle | RecordState::Paused => {}
            }
            tracing::debug!(node = name, from = ?shared.state, to = ?next, frames = self.frames.len(), "recorder state");
            shared.state = next;
        }
        shared.frames = self.frames.len();
        next
    }

    /// Frame due at `now`, if a new one is due.
    fn next_frame(&mut self, now: f64) -> Option<Arc<[Cluster]>> {
        let last_time = self.frames.last()?.0;
        let mut rel = now - self.started_at;
        if rel > last_time {
            self.started_at = now;
            self.cursor = 0;
            rel = 0.0;
        }
        let start = self.cursor;
        while self.cursor < self.frames.len() && self.frames[self.cursor].0 <= rel {
            self.cursor += 1;
        }
        (self.cursor > start).then(|| Arc::clone(&self.frames[self.cursor - 1].1))
    }
}

impl NodeProcessor for RecorderNode {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn node_type(&self) -> NodeType {
        NodeType::Filter
    }

    fn build_slots(&mut self, slots: &mut SlotLayout) -> Result<(), GraphError> {
        self.input = slots.input("In", SlotType::Clusters)?;
        self.out = slots.output("Out", SlotType::Clusters)?;
        slots.passthrough(self.input, self.out)
    }

    fn is_starting_node(&self) -> bool {
        self.shared.lock().effective() == RecordState::Playing
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        let now = ctx.now();
        let state = self.apply_request(ctx.node_name(), now);
        let received = ctx.clusters(self.input).cloned();

        match state {
            RecordState::Idle => {
                if let Some(clusters) = received {
                    ctx.send(self.out, Payload::Clusters(clusters))?;
                }
            }
            RecordState::Recording => {
                if let Some(clusters) = received {
                    if self.frames.len() < self.config.max_frames {
                        self.frames.push((now - self.started_at, Arc::clone(&clusters)));
                        self.shared.lock().frames = self.frames.len();
                    }
                    ctx.send(self.out, Payload::Clusters(clusters))?;
                }
            }
            RecordState::Playing => {
                if let Some(frame) = self.next_frame(now) {
                    ctx.send(self.out, Payload::Clusters(frame))?;
                }
            }
            RecordState::Paused => {}
        }
        Ok(())
    }
}
