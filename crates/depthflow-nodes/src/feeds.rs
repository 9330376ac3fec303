//! Handles handed out when nodes are created.
//!
//! Source nodes receive data from acquisition threads through a latest-value
//! channel; the sending half is stored here under the node's name. Nodes with
//! live configuration or triggers store a control handle.

use std::collections::BTreeMap;

use depthflow_graph::LatestSender;
use depthflow_tracking::Cluster;

use crate::cloud_source::SensorFrame;
use crate::merge::MergerHandle;
use crate::one_euro::OneEuroConfig;
use crate::params::Live;
use crate::prediction::PredictionConfig;
use crate::recorder::RecorderHandle;
use crate::tracker::TrackerHandle;

/// Control handle of one node.
#[derive(Debug, Clone)]
pub enum NodeControl {
    /// `tracker` node.
    Tracker(TrackerHandle),
    /// `merge_clusters` node.
    Merger(MergerHandle),
    /// `one_euro` node.
    OneEuro(Live<OneEuroConfig>),
    /// `prediction` node.
    Prediction(Live<PredictionConfig>),
    /// `recorder` node.
    Recorder(RecorderHandle),
}

/// Feed senders and control handles, keyed by node name.
#[derive(Default)]
pub struct Feeds {
    clusters: BTreeMap<String, LatestSender<Vec<Cluster>>>,
    frames: BTreeMap<String, LatestSender<SensorFrame>>,
    controls: BTreeMap<String, NodeControl>,
}

impl Feeds {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_cluster_feed(&mut self, node: &str, tx: LatestSender<Vec<Cluster>>) {
        self.clusters.insert(node.to_string(), tx);
    }

    pub(crate) fn insert_frame_feed(&mut self, node: &str, tx: LatestSender<SensorFrame>) {
        self.frames.insert(node.to_string(), tx);
    }

    pub(crate) fn insert_control(&mut self, node: &str, control: NodeControl) {
        self.controls.insert(node.to_string(), control);
    }

    /// Detection feed of a `cluster_source` node.
    pub fn cluster_feed(&self, node: &str) -> Option<&LatestSender<Vec<Cluster>>> {
        self.clusters.get(node)
    }

    /// Sensor feed of a `cloud_source` node.
    pub fn frame_feed(&self, node: &str) -> Option<&LatestSender<SensorFrame>> {
        self.frames.get(node)
    }

    /// Removes and returns every detection feed, for handing to acquisition threads.
    pub fn take_cluster_feeds(&mut self) -> BTreeMap<String, LatestSender<Vec<Cluster>>> {
        std::mem::take(&mut self.clusters)
    }

    /// Removes and returns every sensor feed.
    pub fn take_frame_feeds(&mut self) -> BTreeMap<String, LatestSender<SensorFrame>> {
        std::mem::take(&mut self.frames)
    }

    /// Names of the nodes with a detection feed.
    pub fn cluster_feed_names(&self) -> impl Iterator<Item = &str> {
        self.clusters.keys().map(String::as_str)
    }

    /// Control handle of a node.
    pub fn control(&self, node: &str) -> Option<&NodeControl> {
        self.controls.get(node)
    }

    /// Control handle of a `tracker` node.
    pub fn tracker(&self, node: &str) -> Option<&TrackerHandle> {
        match self.controls.get(node)? {
            NodeControl::Tracker(handle) => Some(handle),
            _ => None,
        }
    }

    /// Control handle of a `merge_clusters` node.
    pub fn merger(&self, node: &str) -> Option<&MergerHandle> {
        match self.controls.get(node)? {
            NodeControl::Merger(handle) => Some(handle),
            _ => None,
        }
    }

    /// Control handle of a `recorder` node.
    pub fn recorder(&self, node: &str) -> Option<&RecorderHandle> {
        match self.controls.get(node)? {
            NodeControl::Recorder(handle) => Some(handle),
            _ => None,
        }
    }

    /// Forgets every handle registered for `node`.
    pub fn remove(&mut self, node: &str) {
        self.clusters.remove(node);
        self.frames.remove(node);
        self.controls.remove(node);
    }
}
