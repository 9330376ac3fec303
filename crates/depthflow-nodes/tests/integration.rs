//! Registry-built pipelines driven tick by tick.

use std::sync::Arc;

use depthflow_graph::{
    GraphError, InputSlot, NodeError, NodeGraph, NodeProcessor, NodeType, ProcessContext, SlotLayout, SlotType,
};
use depthflow_nodes::{Feeds, FrameRecord, NodeParams, NodeRegistry, RecordState};
use depthflow_tracking::{Cluster, ClusterState, Vec3};
use parking_lot::Mutex;

type Seen = Arc<Mutex<Vec<Vec<Cluster>>>>;

struct Collect {
    seen: Seen,
    input: InputSlot,
}

impl NodeProcessor for Collect {
    fn type_name(&self) -> &'static str {
        "collect"
    }

    fn node_type(&self) -> NodeType {
        NodeType::Output
    }

    fn build_slots(&mut self, slots: &mut SlotLayout) -> Result<(), GraphError> {
        self.input = slots.input("In", SlotType::Clusters)?;
        Ok(())
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        if let Some(clusters) = ctx.clusters(self.input) {
            self.seen.lock().push(clusters.to_vec());
        }
        Ok(())
    }
}

struct Pipeline {
    registry: NodeRegistry,
    graph: NodeGraph,
    feeds: Feeds,
    seen: Seen,
}

impl Pipeline {
    fn new() -> Self {
        Self {
            registry: NodeRegistry::new(),
            graph: NodeGraph::new(),
            feeds: Feeds::new(),
            seen: Seen::default(),
        }
    }

    fn add(&mut self, node_type: &str, name: &str, params: &str) {
        let params: NodeParams = toml::from_str(params).unwrap();
        let node = self
            .registry
            .create(node_type, name, &params, &mut self.feeds)
            .unwrap();
        self.graph.add_node(name, node).unwrap();
    }

    fn collect(&mut self, from: &str, slot: &str) {
        let sink = Collect {
            seen: Arc::clone(&self.seen),
            input: InputSlot::default(),
        };
        self.graph.add_node("collect", Box::new(sink)).unwrap();
        self.graph.connect_by_name(from, slot, "collect", "In").unwrap();
    }

    fn connect(&mut self, from: &str, from_slot: &str, to: &str, to_slot: &str) {
        self.graph.connect_by_name(from, from_slot, to, to_slot).unwrap();
    }

    fn feed(&self, source: &str, xs: &[f32]) {
        let clusters = xs.iter().map(|&x| Cluster::at(Vec3::new(x, 0.0, 0.0))).collect();
        self.feeds.cluster_feed(source).unwrap().send(clusters);
    }

    fn last(&self) -> Vec<Cluster> {
        self.seen.lock().last().cloned().unwrap_or_default()
    }
}

fn two_sensor_merge() -> Pipeline {
    let mut p = Pipeline::new();
    p.add("cluster_source", "cam_a", "");
    p.add("cluster_source", "cam_b", "");
    p.add("tracker", "track_a", "");
    p.add("tracker", "track_b", "");
    p.add("merge_clusters", "merge", "inputs = 2");
    p.connect("cam_a", "Clusters", "track_a", "In");
    p.connect("cam_b", "Clusters", "track_b", "In");
    p.connect("track_a", "Out", "merge", "In 1");
    p.connect("track_b", "Out", "merge", "In 2");
    p.collect("merge", "Out");
    p
}

#[test]
fn two_sensors_see_one_person() {
    let mut p = two_sensor_merge();

    p.feed("cam_a", &[0.0]);
    p.feed("cam_b", &[0.1]);
    let report = p.graph.tick_at(0.0, None);
    assert_eq!(report.failures, 0);
    // The merge node runs once, after both trackers.
    assert_eq!(p.seen.lock().len(), 1);

    let out = p.last();
    let alive: Vec<_> = out.iter().filter(|c| !c.is_leaving()).collect();
    assert_eq!(alive.len(), 1);
    assert!((alive[0].centroid.x - 0.05).abs() < 1e-6);

    p.feed("cam_a", &[0.0]);
    p.feed("cam_b", &[0.1]);
    p.graph.tick_at(0.033, None);
    let out = p.last();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].id, 1);
    assert_eq!(out[0].state, ClusterState::Updated);
}

#[test]
fn merge_keeps_running_when_one_sensor_stalls() {
    let mut p = Pipeline::new();
    p.add("cluster_source", "cam_a", "");
    p.add("cluster_source", "cam_b", "");
    p.add("tracker", "track_a", "");
    p.add("tracker", "track_b", "");
    p.add("merge_clusters", "merge", "inputs = 2\nauto_clear_time = 0.0");
    p.connect("cam_a", "Clusters", "track_a", "In");
    p.connect("cam_b", "Clusters", "track_b", "In");
    p.connect("track_a", "Out", "merge", "In 1");
    p.connect("track_b", "Out", "merge", "In 2");
    p.collect("merge", "Out");

    p.feed("cam_a", &[0.0]);
    p.feed("cam_b", &[0.1]);
    p.graph.tick_at(0.0, None);

    // cam_b delivers nothing from here on; cam_a's person walks away.
    p.feed("cam_a", &[0.0]);
    p.graph.tick_at(0.033, None);
    let alive: Vec<_> = p.last().into_iter().filter(|c| !c.is_leaving()).collect();
    assert_eq!(alive.len(), 1);
    assert!((alive[0].centroid.x - 0.05).abs() < 1e-6);

    for t in [0.066, 0.1] {
        p.feed("cam_a", &[]);
        p.graph.tick_at(t, None);
    }
    assert_eq!(p.seen.lock().len(), 4);

    // The leaving cluster released stream 0; only cam_b's contribution remains.
    let alive: Vec<_> = p.last().into_iter().filter(|c| !c.is_leaving()).collect();
    assert_eq!(alive.len(), 1);
    assert_eq!(alive[0].id, 1);
    assert!((alive[0].centroid.x - 0.1).abs() < 1e-6);
}

#[test]
fn merger_clear_assigns_fresh_identities() {
    let mut p = two_sensor_merge();
    for t in [0.0, 0.033] {
        p.feed("cam_a", &[0.0]);
        p.feed("cam_b", &[0.1]);
        p.graph.tick_at(t, None);
    }
    assert_eq!(p.last()[0].id, 1);

    p.feeds.merger("merge").unwrap().request_clear();
    p.feed("cam_a", &[0.0]);
    p.feed("cam_b", &[0.1]);
    p.graph.tick_at(0.066, None);

    let out = p.last();
    let alive: Vec<_> = out.iter().filter(|c| !c.is_leaving()).collect();
    assert_eq!(alive.len(), 1);
    assert_eq!(alive[0].id, 3);
    assert_eq!(alive[0].state, ClusterState::Entered);
}

#[test]
fn tracker_clear_restarts_without_recycling_ids() {
    let mut p = Pipeline::new();
    p.add("cluster_source", "cam", "");
    p.add("tracker", "track", "");
    p.connect("cam", "Clusters", "track", "In");
    p.collect("track", "Out");

    p.feed("cam", &[0.0]);
    p.graph.tick_at(0.0, None);
    assert_eq!(p.last()[0].id, 1);

    p.feeds.tracker("track").unwrap().request_clear();
    p.feed("cam", &[0.0]);
    p.graph.tick_at(0.033, None);
    let out = p.last();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].id, 2);
    assert_eq!(out[0].state, ClusterState::Entered);
}

#[test]
fn live_tracker_config_applies_next_tick() {
    let mut p = Pipeline::new();
    p.add("cluster_source", "cam", "");
    p.add("tracker", "track", "");
    p.connect("cam", "Clusters", "track", "In");
    p.collect("track", "Out");

    p.feed("cam", &[0.0]);
    p.graph.tick_at(0.0, None);

    // A 0.3 m jump is a new identity at the default radius.
    let handle = p.feeds.tracker("track").unwrap().clone();
    let mut config = handle.config();
    config.search_distance = 0.5;
    handle.set_config(config);

    p.feed("cam", &[0.3]);
    p.graph.tick_at(0.1, None);
    let out = p.last();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].id, 1);
    assert_eq!(out[0].state, ClusterState::Updated);
}

#[test]
fn recorder_replays_without_live_input() {
    let mut p = Pipeline::new();
    p.add("cluster_source", "cam", "");
    p.add("recorder", "rec", "");
    p.connect("cam", "Clusters", "rec", "In");
    p.collect("rec", "Out");

    let recorder = p.feeds.recorder("rec").unwrap().clone();
    recorder.set_state(RecordState::Recording);
    for (t, x) in [(0.0, 0.0), (0.1, 1.0), (0.2, 2.0)] {
        p.feed("cam", &[x]);
        p.graph.tick_at(t, None);
    }
    assert_eq!(recorder.frame_count(), 3);
    // Recording forwards its input.
    assert_eq!(p.seen.lock().len(), 3);
    p.seen.lock().clear();

    recorder.set_state(RecordState::Playing);
    p.graph.tick_at(1.0, None);
    p.graph.tick_at(1.05, None);
    p.graph.tick_at(1.25, None);

    let xs: Vec<f32> = p.seen.lock().iter().map(|f| f[0].centroid.x).collect();
    assert_eq!(xs, [0.0, 2.0]);
    assert_eq!(recorder.state(), RecordState::Playing);

    // Live input is ignored while playing.
    p.feed("cam", &[9.0]);
    p.graph.tick_at(1.26, None);
    assert!(p.seen.lock().iter().all(|f| f[0].centroid.x != 9.0));
}

#[test]
fn paused_recorder_emits_nothing() {
    let mut p = Pipeline::new();
    p.add("cluster_source", "cam", "");
    p.add("recorder", "rec", "");
    p.connect("cam", "Clusters", "rec", "In");
    p.collect("rec", "Out");

    p.feeds.recorder("rec").unwrap().set_state(RecordState::Paused);
    p.feed("cam", &[0.0]);
    p.graph.tick_at(0.0, None);
    assert!(p.seen.lock().is_empty());
}

#[test]
fn one_euro_smooths_a_jump() {
    let mut p = Pipeline::new();
    p.add("cluster_source", "cam", "");
    p.add("tracker", "track", "search_distance = 2.0");
    p.add("one_euro", "smooth", "beta = 0.0");
    p.connect("cam", "Clusters", "track", "In");
    p.connect("track", "Out", "smooth", "In");
    p.collect("smooth", "Out");

    p.feed("cam", &[0.0]);
    p.graph.tick_at(0.0, None);
    p.feed("cam", &[1.0]);
    p.graph.tick_at(0.033, None);

    let out = p.last();
    assert_eq!(out.len(), 1);
    assert!(out[0].centroid.x > 0.0 && out[0].centroid.x < 0.5);
}

#[test]
fn disabled_one_euro_passes_clusters_through() {
    let mut p = Pipeline::new();
    p.add("cluster_source", "cam", "");
    p.add("one_euro", "smooth", "beta = 0.0");
    p.connect("cam", "Clusters", "smooth", "In");
    p.collect("smooth", "Out");
    let id = p.graph.node_id("smooth").unwrap();
    p.graph.set_enabled(id, false).unwrap();

    p.feed("cam", &[0.0]);
    p.graph.tick_at(0.0, None);
    p.feed("cam", &[1.0]);
    p.graph.tick_at(0.033, None);
    assert_eq!(p.last()[0].centroid.x, 1.0);
}

#[test]
fn stalled_source_repeats_its_last_frame_when_asked() {
    let mut p = Pipeline::new();
    p.add("cluster_source", "cam", "only_new_frames = false");
    p.add("cluster_source", "strict", "");
    p.collect("cam", "Clusters");

    p.feed("cam", &[0.0, 1.0]);
    p.feed("strict", &[0.0]);
    for t in [0.0, 0.033, 0.066] {
        p.graph.tick_at(t, None);
    }
    let seen = p.seen.lock();
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|frame| frame.len() == 2));

    let strict = p.graph.node_id("strict").unwrap();
    assert_eq!(p.graph.stats(strict).unwrap().count, 3);
}

#[test]
fn stalled_source_lets_the_tracker_drop_lost_clusters() {
    let mut p = Pipeline::new();
    p.add("cluster_source", "cam", "only_new_frames = false");
    p.add("tracker", "track", "");
    p.connect("cam", "Clusters", "track", "In");
    p.collect("track", "Out");

    p.feed("cam", &[0.0]);
    p.graph.tick_at(0.0, None);
    p.feed("cam", &[]);
    p.graph.tick_at(0.033, None);
    assert_eq!(p.last()[0].state, ClusterState::WillLeave);

    // No new frame: the empty list is repeated and the tracker purges.
    p.graph.tick_at(0.066, None);
    assert!(p.last().is_empty());
}

#[test]
fn prediction_leads_fast_clusters() {
    let mut p = Pipeline::new();
    p.add("cluster_source", "cam", "");
    p.add("tracker", "track", "search_distance = 1.0");
    p.add("prediction", "predict", "strength = 1.0\nvelocity_threshold = 1.0");
    p.connect("cam", "Clusters", "track", "In");
    p.connect("track", "Out", "predict", "In");
    p.collect("predict", "Out");

    p.feed("cam", &[0.0]);
    p.graph.tick_at(0.0, None);
    p.feed("cam", &[0.3]);
    p.graph.tick_at(0.1, None);
    p.feed("cam", &[0.6]);
    p.graph.tick_at(0.2, None);

    // 3 m/s: moved ahead by (3 - 1) * 0.1.
    let out = p.last();
    assert!((out[0].centroid.x - 0.8).abs() < 1e-3, "x = {}", out[0].centroid.x);
}

#[test]
fn json_output_appends_to_its_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clusters.jsonl");

    let mut p = Pipeline::new();
    p.add("cluster_source", "cam", "");
    p.add("tracker", "track", "");
    p.add("json_output", "out", &format!("path = {:?}", path.display().to_string()));
    p.connect("cam", "Clusters", "track", "In");
    p.connect("track", "Out", "out", "In");

    for t in [0.0, 0.033] {
        p.feed("cam", &[0.5]);
        p.graph.tick_at(t, None);
    }
    drop(p);

    let text = std::fs::read_to_string(&path).unwrap();
    let records: Vec<FrameRecord> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].clusters[0].state, ClusterState::Entered);
    assert_eq!(records[1].clusters[0].state, ClusterState::Updated);
    assert_eq!(records[1].clusters[0].id, 1);
}
