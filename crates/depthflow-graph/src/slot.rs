//! Named, typed node ports.
//!
//! A processor declares its ports once, in
//! [`NodeProcessor::build_slots`](crate::NodeProcessor::build_slots), through a
//! [`SlotLayout`]. The returned [`InputSlot`] / [`OutputSlot`] indices are
//! local to the node and stay valid for its lifetime; the graph addresses a
//! port globally with [`InputRef`] / [`OutputRef`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::node::NodeId;
use crate::payload::SlotType;

/// Whether a slot receives or sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotDirection {
    /// Receives payloads from upstream.
    Input,
    /// Sends payloads downstream.
    Output,
}

impl fmt::Display for SlotDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SlotDirection::Input => "input",
            SlotDirection::Output => "output",
        })
    }
}

/// Index of an input slot within its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InputSlot(pub(crate) usize);

/// Index of an output slot within its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OutputSlot(pub(crate) usize);

impl InputSlot {
    /// Position among the node's inputs.
    pub fn index(self) -> usize {
        self.0
    }
}

impl OutputSlot {
    /// Position among the node's outputs.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Graph-wide address of an input slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputRef {
    /// Owning node.
    pub node: NodeId,
    /// Slot within the node.
    pub slot: InputSlot,
}

/// Graph-wide address of an output slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputRef {
    /// Owning node.
    pub node: NodeId,
    /// Slot within the node.
    pub slot: OutputSlot,
}

/// Declaration of one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSpec {
    /// Name, unique per node and direction.
    pub name: String,
    /// Payload type.
    pub slot_type: SlotType,
    /// Inputs only: schedule the node when a payload arrives.
    pub process_on_receive: bool,
}

/// Slot declarations of one node.
#[derive(Debug, Clone, Default)]
pub struct SlotLayout {
    pub(crate) inputs: Vec<SlotSpec>,
    pub(crate) outputs: Vec<SlotSpec>,
    pub(crate) passthrough: Vec<(InputSlot, OutputSlot)>,
}

impl SlotLayout {
    /// Creates an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an input that schedules the node on receive.
    pub fn input(&mut self, name: impl Into<String>, slot_type: SlotType) -> Result<InputSlot, GraphError> {
        self.add_input(name.into(), slot_type, true)
    }

    /// Declares an input that only buffers; the node is not scheduled by it.
    pub fn passive_input(
        &mut self,
        name: impl Into<String>,
        slot_type: SlotType,
    ) -> Result<InputSlot, GraphError> {
        self.add_input(name.into(), slot_type, false)
    }

    /// Declares an output.
    pub fn output(&mut self, name: impl Into<String>, slot_type: SlotType) -> Result<OutputSlot, GraphError> {
        let name = name.into();
        if self.outputs.iter().any(|s| s.name == name) {
            return Err(GraphError::DuplicateSlot {
                slot: name,
                direction: SlotDirection::Output,
            });
        }
        self.outputs.push(SlotSpec {
            name,
            slot_type,
            process_on_receive: false,
        });
        Ok(OutputSlot(self.outputs.len() - 1))
    }

    /// Pairs an input with an output of the same type for disabled-node forwarding.
    pub fn passthrough(&mut self, input: InputSlot, output: OutputSlot) -> Result<(), GraphError> {
        let from = self.inputs[input.0].slot_type;
        let to = self.outputs[output.0].slot_type;
        if from != to {
            return Err(GraphError::TypeMismatch { from, to });
        }
        self.passthrough.push((input, output));
        Ok(())
    }

    /// Declared inputs, in declaration order.
    pub fn inputs(&self) -> &[SlotSpec] {
        &self.inputs
    }

    /// Declared outputs, in declaration order.
    pub fn outputs(&self) -> &[SlotSpec] {
        &self.outputs
    }

    /// Looks up an input by name.
    pub fn find_input(&self, name: &str) -> Option<InputSlot> {
        self.inputs.iter().position(|s| s.name == name).map(InputSlot)
    }

    /// Looks up an output by name.
    pub fn find_output(&self, name: &str) -> Option<OutputSlot> {
        self.outputs.iter().position(|s| s.name == name).map(OutputSlot)
    }

    fn add_input(&mut self, name: String, slot_type: SlotType, process_on_receive: bool) -> Result<InputSlot, GraphError> {
        if self.inputs.iter().any(|s| s.name == name) {
            return Err(GraphError::DuplicateSlot {
                slot: name,
                direction: SlotDirection::Input,
            });
        }
        self.inputs.push(SlotSpec {
            name,
            slot_type,
            process_on_receive,
        });
        Ok(InputSlot(self.inputs.len() - 1))
    }
}
