//! Background thread that ticks a graph at a target rate.
//!
//! One [`Scheduler`] owns one thread. Each iteration locks the graph, runs a
//! full tick, publishes [`TickStats`], then sleeps for whatever is left of the
//! frame budget. A heavy tick shrinks the sleep; the loop never runs faster
//! than the target rate but may fall behind it under load.
//!
//! The sleep doubles as the stop wait, so [`Scheduler::stop`] wakes the thread
//! immediately. A tick in flight is never interrupted; the running flag is
//! checked between worklist snapshots and the join is bounded.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;
use crate::graph::NodeGraph;

/// Graph shared between the scheduler thread and its owner.
pub type SharedGraph = Arc<Mutex<NodeGraph>>;

/// Lowest accepted target rate.
pub const MIN_FPS: f32 = 1.0;

const STATS_CAPACITY: usize = 16;

/// Scheduler settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Target tick rate in Hz.
    pub target_fps: f32,
    /// Maximum time [`Scheduler::stop`] waits for the thread.
    pub join_timeout_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            target_fps: 30.0,
            join_timeout_ms: 1000,
        }
    }
}

/// Target rate readable from the scheduler thread without locking.
///
/// Stored as bit-cast `f32`. Values below [`MIN_FPS`] (and non-finite values)
/// are clamped on write.
#[derive(Debug)]
pub struct TargetFps(AtomicU32);

impl TargetFps {
    /// Creates a target rate.
    pub fn new(fps: f32) -> Self {
        Self(AtomicU32::new(clamp_fps(fps).to_bits()))
    }

    /// Sets the target rate.
    #[inline]
    pub fn set(&self, fps: f32) {
        self.0.store(clamp_fps(fps).to_bits(), Ordering::Release);
    }

    /// Current target rate.
    #[inline]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }
}

fn clamp_fps(fps: f32) -> f32 {
    if fps.is_finite() { fps.max(MIN_FPS) } else { MIN_FPS }
}

/// Time allotted to one tick at `fps`.
pub fn frame_budget(fps: f32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(clamp_fps(fps)))
}

/// Sleep after a tick that took `elapsed`: `max(0, budget - elapsed)`.
pub fn idle_time(fps: f32, elapsed: Duration) -> Duration {
    frame_budget(fps).saturating_sub(elapsed)
}

/// Per-tick measurements published by the scheduler thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickStats {
    /// Tick counter of the graph.
    pub frame: u64,
    /// Time spent inside the tick, excluding the idle sleep.
    pub process_time: Duration,
    /// Rate measured from the start of the previous tick (0 on the first tick).
    pub achieved_fps: f32,
    /// Rate the loop could reach if it never slept.
    pub max_fps: f32,
    /// Process or passthrough calls made this tick.
    pub nodes_processed: usize,
    /// Nodes whose processing failed this tick.
    pub failures: usize,
}

struct Worker {
    graph: SharedGraph,
    running: Arc<AtomicBool>,
    fps: Arc<TargetFps>,
    stop_rx: Receiver<()>,
    stats_tx: Sender<TickStats>,
}

impl Worker {
    fn run(self) {
        let mut previous_start: Option<Instant> = None;

        while self.running.load(Ordering::Acquire) {
            let started = Instant::now();
            let report = {
                let mut graph = self.graph.lock();
                let now = graph.elapsed();
                graph.tick_at(now, Some(&self.running))
            };
            let process_time = started.elapsed();

            let achieved_fps = previous_start
                .map(|p| started.duration_since(p).as_secs_f32())
                .filter(|s| *s > 0.0)
                .map_or(0.0, |s| 1.0 / s);
            let max_fps = match process_time.as_secs_f32() {
                s if s > 0.0 => 1.0 / s,
                _ => f32::INFINITY,
            };
            previous_start = Some(started);

            // Dropped when the owner is not draining; stats are best-effort.
            let _ = self.stats_tx.try_send(TickStats {
                frame: report.frame,
                process_time,
                achieved_fps,
                max_fps,
                nodes_processed: report.nodes_processed(),
                failures: report.failures,
            });

            match self.stop_rx.recv_timeout(idle_time(self.fps.get(), process_time)) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }
}

/// Handle to a running scheduler thread. Stops the thread on drop.
pub struct Scheduler {
    graph: SharedGraph,
    running: Arc<AtomicBool>,
    fps: Arc<TargetFps>,
    stop_tx: Option<Sender<()>>,
    done_rx: Receiver<()>,
    stats_rx: Receiver<TickStats>,
    handle: Option<JoinHandle<()>>,
    join_timeout: Duration,
}

impl Scheduler {
    /// Spawns the scheduler thread for `graph`.
    pub fn start(graph: SharedGraph, config: &SchedulerConfig) -> Result<Self, SchedulerError> {
        let running = Arc::new(AtomicBool::new(true));
        let fps = Arc::new(TargetFps::new(config.target_fps));
        let (stop_tx, stop_rx) = bounded(1);
        let (done_tx, done_rx) = bounded(1);
        let (stats_tx, stats_rx) = bounded(STATS_CAPACITY);

        let worker = Worker {
            graph: Arc::clone(&graph),
            running: Arc::clone(&running),
            fps: Arc::clone(&fps),
            stop_rx,
            stats_tx,
        };
        let handle = thread::Builder::new()
            .name("depthflow-scheduler".into())
            .spawn(move || {
                worker.run();
                let _ = done_tx.send(());
            })
            .map_err(SchedulerError::Spawn)?;

        tracing::info!(target_fps = fps.get(), "scheduler started");

        Ok(Self {
            graph,
            running,
            fps,
            stop_tx: Some(stop_tx),
            done_rx,
            stats_rx,
            handle: Some(handle),
            join_timeout: Duration::from_millis(config.join_timeout_ms),
        })
    }

    /// Stops the thread, waiting at most the configured join timeout.
    ///
    /// On timeout the thread is detached; it exits after its current tick.
    /// Calling `stop` on a stopped scheduler is a no-op.
    pub fn stop(&mut self) -> Result<(), SchedulerError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        self.running.store(false, Ordering::Release);
        // Dropping the sender wakes the idle wait.
        self.stop_tx.take();

        match self.done_rx.recv_timeout(self.join_timeout) {
            // Disconnected: the thread unwound without signalling.
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(timeout = ?self.join_timeout, "scheduler thread did not stop in time");
                return Err(SchedulerError::JoinTimeout(self.join_timeout));
            }
        }
        handle.join().map_err(|_| SchedulerError::Panicked)?;
        tracing::info!("scheduler stopped");
        Ok(())
    }

    /// Returns true until [`stop`](Self::stop) is called.
    pub fn is_running(&self) -> bool {
        self.handle.is_some() && self.running.load(Ordering::Acquire)
    }

    /// Changes the target rate; takes effect after the current tick.
    pub fn set_target_fps(&self, fps: f32) {
        self.fps.set(fps);
    }

    /// Current target rate.
    pub fn target_fps(&self) -> f32 {
        self.fps.get()
    }

    /// Receiver of per-tick statistics. Ticks are dropped while it is full.
    pub fn stats(&self) -> &Receiver<TickStats> {
        &self.stats_rx
    }

    /// Drains pending statistics and returns the newest.
    pub fn latest_stats(&self) -> Option<TickStats> {
        self.stats_rx.try_iter().last()
    }

    /// The scheduled graph. Locking it pauses the scheduler between ticks.
    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::warn!(error = %err, "scheduler stop on drop failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GraphError, NodeError};
    use crate::node::{NodeProcessor, NodeType, ProcessContext};
    use crate::slot::SlotLayout;

    struct Sleeper(Duration);

    impl NodeProcessor for Sleeper {
        fn type_name(&self) -> &'static str {
            "sleeper"
        }

        fn node_type(&self) -> NodeType {
            NodeType::Source
        }

        fn build_slots(&mut self, _slots: &mut SlotLayout) -> Result<(), GraphError> {
            Ok(())
        }

        fn process(&mut self, _ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
            thread::sleep(self.0);
            Ok(())
        }
    }

    fn shared(node_time: Duration) -> SharedGraph {
        let mut graph = NodeGraph::new();
        graph.add_node("sleeper", Box::new(Sleeper(node_time))).unwrap();
        Arc::new(Mutex::new(graph))
    }

    #[test]
    fn idle_time_fills_the_budget() {
        assert_eq!(frame_budget(10.0), Duration::from_millis(100));
        assert_eq!(idle_time(10.0, Duration::from_millis(30)), Duration::from_millis(70));
        assert_eq!(idle_time(10.0, Duration::from_millis(150)), Duration::ZERO);
    }

    #[test]
    fn target_fps_is_clamped() {
        let fps = TargetFps::new(0.0);
        assert_eq!(fps.get(), MIN_FPS);
        fps.set(f32::NAN);
        assert_eq!(fps.get(), MIN_FPS);
        fps.set(60.0);
        assert_eq!(fps.get(), 60.0);
        assert_eq!(frame_budget(-5.0), Duration::from_secs(1));
    }

    #[test]
    fn config_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.target_fps, 30.0);
        assert_eq!(config.join_timeout_ms, 1000);
    }

    #[test]
    fn runs_ticks_and_stops() {
        let graph = shared(Duration::ZERO);
        let config = SchedulerConfig {
            target_fps: 200.0,
            ..SchedulerConfig::default()
        };
        let mut scheduler = Scheduler::start(Arc::clone(&graph), &config).unwrap();
        assert!(scheduler.is_running());

        let first = scheduler.stats().recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first.frame, 1);
        assert_eq!(first.nodes_processed, 1);
        assert_eq!(first.achieved_fps, 0.0);

        let second = scheduler.stats().recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(second.achieved_fps > 0.0);
        // Never faster than the target, with slack for timer jitter.
        assert!(second.achieved_fps < 400.0);

        scheduler.stop().unwrap();
        assert!(!scheduler.is_running());
        let frames = graph.lock().frame();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(graph.lock().frame(), frames);

        // Second stop is a no-op.
        scheduler.stop().unwrap();
    }

    /// Mean start-to-start interval over a few ticks at 30 Hz.
    fn mean_interval(node_time: Duration) -> Duration {
        let mut scheduler = Scheduler::start(shared(node_time), &SchedulerConfig::default()).unwrap();
        // The first tick has no predecessor to measure against.
        scheduler.stats().recv_timeout(Duration::from_secs(2)).unwrap();
        let intervals: Vec<f64> = (0..6)
            .map(|_| {
                let stats = scheduler.stats().recv_timeout(Duration::from_secs(2)).unwrap();
                1.0 / f64::from(stats.achieved_fps)
            })
            .collect();
        scheduler.stop().unwrap();
        Duration::from_secs_f64(intervals.iter().sum::<f64>() / intervals.len() as f64)
    }

    #[test]
    fn light_ticks_are_paced_to_the_target_rate() {
        let interval = mean_interval(Duration::from_millis(5));
        assert!(
            interval >= Duration::from_millis(31) && interval < Duration::from_millis(42),
            "interval {interval:?}"
        );
    }

    #[test]
    fn heavy_ticks_run_back_to_back() {
        let interval = mean_interval(Duration::from_millis(50));
        assert!(
            interval >= Duration::from_millis(49) && interval < Duration::from_millis(62),
            "interval {interval:?}"
        );
    }

    #[test]
    fn stop_wakes_a_long_idle_wait() {
        let config = SchedulerConfig {
            target_fps: 1.0,
            join_timeout_ms: 500,
        };
        let mut scheduler = Scheduler::start(shared(Duration::ZERO), &config).unwrap();
        scheduler.stats().recv_timeout(Duration::from_secs(2)).unwrap();

        let started = Instant::now();
        scheduler.stop().unwrap();
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn slow_tick_exceeds_join_timeout() {
        let config = SchedulerConfig {
            target_fps: 30.0,
            join_timeout_ms: 20,
        };
        let mut scheduler = Scheduler::start(shared(Duration::from_millis(300)), &config).unwrap();
        thread::sleep(Duration::from_millis(50));

        let err = scheduler.stop().unwrap_err();
        assert!(matches!(err, SchedulerError::JoinTimeout(_)));
        assert!(!scheduler.is_running());
    }
}
