//! Run a graph file against the synthetic scene.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Args;
use depthflow_config::{GraphFile, LoadedGraph, NodeRegistry};
use depthflow_graph::{NodeGraph, Session, TickStats};

use crate::acquisition::{Acquisition, SensorFeed};
use crate::scene::BlobScene;

#[derive(Args)]
pub struct RunArgs {
    /// Graph file (TOML)
    graph: PathBuf,

    /// Override the graph's target tick rate
    #[arg(long)]
    fps: Option<f32>,

    /// Synthetic blobs in the scene
    #[arg(long, default_value = "2")]
    blobs: usize,

    /// Frame rate of each synthetic sensor
    #[arg(long, default_value = "30")]
    sensor_fps: f32,

    /// Seed of the synthetic scene
    #[arg(long, default_value = "1")]
    seed: u32,

    /// Stop after this many seconds (runs until Ctrl+C otherwise)
    #[arg(long)]
    duration: Option<f64>,
}

/// Tick statistics aggregated between two log lines.
#[derive(Debug, Default)]
struct StatsWindow {
    ticks: u64,
    frame: u64,
    process: Duration,
    worst: Duration,
    achieved_fps: f32,
    failures: usize,
}

impl StatsWindow {
    fn add(&mut self, stats: &TickStats) {
        self.ticks += 1;
        self.frame = stats.frame;
        self.process += stats.process_time;
        self.worst = self.worst.max(stats.process_time);
        self.achieved_fps += stats.achieved_fps;
        self.failures += stats.failures;
    }

    fn log(&self) {
        if self.ticks == 0 {
            tracing::warn!("no ticks in the last interval");
            return;
        }
        let n = self.ticks as f32;
        tracing::info!(
            frame = self.frame,
            fps = format_args!("{:.1}", self.achieved_fps / n),
            mean_ms = format_args!("{:.3}", self.process.as_secs_f32() * 1000.0 / n),
            worst_ms = format_args!("{:.3}", self.worst.as_secs_f32() * 1000.0),
            failures = self.failures,
            "tick stats"
        );
    }
}

fn sensor_feeds(loaded: &mut LoadedGraph) -> BTreeMap<String, SensorFeed> {
    let mut feeds: BTreeMap<String, SensorFeed> = loaded
        .feeds
        .take_cluster_feeds()
        .into_iter()
        .map(|(name, tx)| (name, SensorFeed::Clusters(tx)))
        .collect();
    feeds.extend(
        loaded
            .feeds
            .take_frame_feeds()
            .into_iter()
            .map(|(name, tx)| (name, SensorFeed::Frames(tx))),
    );
    feeds
}

fn print_node_summary(graph: &NodeGraph) {
    println!();
    println!("  {:16}  {:16}  {:>8}  {:>10}", "Node", "Type", "Ticks", "Mean (us)");
    println!("  {:16}  {:16}  {:>8}  {:>10}", "----", "----", "-----", "---------");
    for id in graph.node_ids() {
        let (Some(name), Some(kind), Some(stats)) = (graph.node_name(id), graph.node_kind(id), graph.stats(id)) else {
            continue;
        };
        println!(
            "  {:16}  {:16}  {:>8}  {:>10.1}",
            name,
            kind,
            stats.count,
            stats.mean().as_secs_f64() * 1e6
        );
    }
}

pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let file = GraphFile::load(&args.graph).with_context(|| format!("loading {}", args.graph.display()))?;
    let registry = NodeRegistry::new();
    let mut loaded = file.build(&registry)?;
    if let Some(fps) = args.fps {
        loaded.scheduler.target_fps = fps;
    }

    let sensors = sensor_feeds(&mut loaded);
    if sensors.is_empty() {
        tracing::warn!("graph has no source nodes to feed");
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let scene = BlobScene::new(args.blobs, args.seed);
    let acquisition = Acquisition::spawn(sensors, &scene, args.sensor_fps, Arc::clone(&running))?;
    tracing::info!(
        graph = %file.name,
        sensors = acquisition.len(),
        blobs = scene.len(),
        target_fps = loaded.scheduler.target_fps,
        "running; press Ctrl+C to stop"
    );

    let LoadedGraph {
        graph, scheduler, ..
    } = loaded;
    let mut session = Session::new(scheduler);
    let shared = session.load(graph)?;

    let started = Instant::now();
    let deadline = args.duration.map(Duration::from_secs_f64);
    let mut window = StatsWindow::default();
    let mut last_log = Instant::now();

    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| started.elapsed() >= d) {
            break;
        }
        let Some(scheduler) = session.scheduler() else {
            break;
        };
        if let Ok(stats) = scheduler.stats().recv_timeout(Duration::from_millis(100)) {
            window.add(&stats);
        }
        if last_log.elapsed() >= Duration::from_secs(1) {
            window.log();
            window = StatsWindow::default();
            last_log = Instant::now();
        }
    }

    running.store(false, Ordering::SeqCst);
    session.clear()?;
    acquisition.stop();

    print_node_summary(&shared.lock());
    println!();
    println!("Done after {:.1}s", started.elapsed().as_secs_f64());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(frame: u64, ms: u64, fps: f32) -> TickStats {
        TickStats {
            frame,
            process_time: Duration::from_millis(ms),
            achieved_fps: fps,
            max_fps: 1000.0 / ms as f32,
            nodes_processed: 3,
            failures: 0,
        }
    }

    #[test]
    fn window_accumulates_ticks() {
        let mut window = StatsWindow::default();
        window.add(&stats(1, 2, 0.0));
        window.add(&stats(2, 4, 30.0));
        assert_eq!(window.ticks, 2);
        assert_eq!(window.frame, 2);
        assert_eq!(window.process, Duration::from_millis(6));
        assert_eq!(window.worst, Duration::from_millis(4));
    }

    #[test]
    fn sensor_feeds_cover_both_source_kinds() {
        let file = GraphFile::new("x")
            .with_node(depthflow_config::NodeConfig::new("a", "cluster_source"))
            .with_node(depthflow_config::NodeConfig::new("b", "cloud_source"));
        let mut loaded = file.build(&NodeRegistry::new()).unwrap();
        let feeds = sensor_feeds(&mut loaded);
        assert!(matches!(feeds.get("a"), Some(SensorFeed::Clusters(_))));
        assert!(matches!(feeds.get("b"), Some(SensorFeed::Frames(_))));
        assert!(loaded.feeds.cluster_feed("a").is_none());
    }
}
