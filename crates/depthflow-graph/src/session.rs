//! Owner of the currently loaded graph.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::SchedulerError;
use crate::graph::NodeGraph;
use crate::scheduler::{Scheduler, SchedulerConfig, SharedGraph};

/// Holds at most one running graph and its scheduler.
///
/// Loading a graph stops the previous one first, so two schedulers never
/// run side by side.
#[derive(Default)]
pub struct Session {
    config: SchedulerConfig,
    scheduler: Option<Scheduler>,
}

impl Session {
    /// Creates an empty session.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            scheduler: None,
        }
    }

    /// Stops the running graph, if any, and starts `graph`.
    pub fn load(&mut self, graph: NodeGraph) -> Result<SharedGraph, SchedulerError> {
        self.clear()?;
        let shared = Arc::new(Mutex::new(graph));
        let scheduler = Scheduler::start(Arc::clone(&shared), &self.config)?;
        tracing::debug!(nodes = shared.lock().node_count(), "session loaded graph");
        self.scheduler = Some(scheduler);
        Ok(shared)
    }

    /// Stops and drops the running graph.
    pub fn clear(&mut self) -> Result<(), SchedulerError> {
        match self.scheduler.take() {
            Some(mut scheduler) => scheduler.stop(),
            None => Ok(()),
        }
    }

    /// The running graph.
    pub fn graph(&self) -> Option<&SharedGraph> {
        self.scheduler.as_ref().map(Scheduler::graph)
    }

    /// The running scheduler.
    pub fn scheduler(&self) -> Option<&Scheduler> {
        self.scheduler.as_ref()
    }

    /// Returns true while a graph is loaded and ticking.
    pub fn is_running(&self) -> bool {
        self.scheduler.as_ref().is_some_and(Scheduler::is_running)
    }

    /// Scheduler settings used by [`load`](Self::load).
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}
