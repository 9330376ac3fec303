//! Directed links from an output slot to an input slot.
//!
//! Connections store slot handles, never references: delivery resolves the
//! destination node through the arena and skips it if it has been removed.

use std::fmt;

use crate::payload::SlotType;
use crate::slot::{InputRef, OutputRef};

/// Unique identifier for a connection.
///
/// Assigned sequentially and never reused within a graph instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub(crate) u32);

impl ConnectionId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Read-only view of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    /// Identifier.
    pub id: ConnectionId,
    /// Sending slot.
    pub from: OutputRef,
    /// Receiving slot.
    pub to: InputRef,
    /// Payload type shared by both endpoints.
    pub slot_type: SlotType,
    /// Disabled connections keep their topology but deliver nothing.
    pub enabled: bool,
}
