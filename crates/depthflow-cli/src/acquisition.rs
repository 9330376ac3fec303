//! Acquisition threads feeding source nodes from the synthetic scene.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use depthflow_graph::LatestSender;
use depthflow_nodes::SensorFrame;
use depthflow_tracking::Cluster;

use crate::scene::{BlobScene, Xorshift32};

/// What a sensor hands to its source node.
pub enum SensorFeed {
    /// Detections, for `cluster_source` nodes.
    Clusters(LatestSender<Vec<Cluster>>),
    /// Raw clouds, for `cloud_source` nodes.
    Frames(LatestSender<SensorFrame>),
}

impl SensorFeed {
    fn is_closed(&self) -> bool {
        match self {
            Self::Clusters(tx) => tx.is_closed(),
            Self::Frames(tx) => tx.is_closed(),
        }
    }
}

/// Running acquisition threads, one per sensor.
pub struct Acquisition {
    running: Arc<AtomicBool>,
    handles: Vec<(String, JoinHandle<u64>)>,
}

impl Acquisition {
    /// Spawns one thread per feed, each producing frames at `fps`.
    ///
    /// Threads stop when `running` is cleared or their source node is gone.
    pub fn spawn(
        feeds: BTreeMap<String, SensorFeed>,
        scene: &BlobScene,
        fps: f32,
        running: Arc<AtomicBool>,
    ) -> std::io::Result<Self> {
        let period = Duration::from_secs_f32(1.0 / fps.max(1.0));
        let epoch = Instant::now();
        let mut handles = Vec::with_capacity(feeds.len());

        for (sensor, (name, feed)) in feeds.into_iter().enumerate() {
            let scene = scene.clone();
            let running = Arc::clone(&running);
            let handle = thread::Builder::new()
                .name(format!("acquire-{name}"))
                .spawn(move || {
                    let mut rng = Xorshift32::new(sensor as u32 + 1);
                    let mut frames = 0u64;
                    while running.load(Ordering::Acquire) && !feed.is_closed() {
                        let t = epoch.elapsed().as_secs_f64();
                        match &feed {
                            SensorFeed::Clusters(tx) => tx.send(scene.observe(sensor, t, &mut rng)),
                            SensorFeed::Frames(tx) => tx.send(SensorFrame {
                                cloud: Arc::new(scene.observe_cloud(sensor, t, &mut rng)),
                                image: None,
                            }),
                        }
                        frames += 1;
                        thread::sleep(period);
                    }
                    frames
                })?;
            tracing::debug!(sensor = %name, ?period, "acquisition started");
            handles.push((name, handle));
        }

        Ok(Self { running, handles })
    }

    /// Number of sensor threads.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Stops every thread and waits for it.
    pub fn stop(self) {
        self.running.store(false, Ordering::Release);
        for (name, handle) in self.handles {
            match handle.join() {
                Ok(frames) => tracing::debug!(sensor = %name, frames, "acquisition stopped"),
                Err(_) => tracing::error!(sensor = %name, "acquisition thread panicked"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depthflow_graph::latest;

    #[test]
    fn threads_feed_until_stopped() {
        let (tx, rx) = latest();
        let mut feeds = BTreeMap::new();
        feeds.insert("cam".to_string(), SensorFeed::Clusters(tx));

        let running = Arc::new(AtomicBool::new(true));
        let acquisition = Acquisition::spawn(feeds, &BlobScene::new(2, 1), 200.0, Arc::clone(&running)).unwrap();
        assert_eq!(acquisition.len(), 1);

        let deadline = Instant::now() + Duration::from_secs(2);
        let frame = loop {
            if let Some(frame) = rx.take() {
                break frame;
            }
            assert!(Instant::now() < deadline, "no frame produced");
            thread::sleep(Duration::from_millis(5));
        };
        assert_eq!(frame.len(), 2);

        acquisition.stop();
        assert!(!running.load(Ordering::Acquire));
    }

    #[test]
    fn thread_exits_when_the_source_is_dropped() {
        let (tx, rx) = latest::<SensorFrame>();
        let mut feeds = BTreeMap::new();
        feeds.insert("cloud".to_string(), SensorFeed::Frames(tx));
        drop(rx);

        let running = Arc::new(AtomicBool::new(true));
        let acquisition = Acquisition::spawn(feeds, &BlobScene::new(1, 1), 100.0, Arc::clone(&running)).unwrap();
        // Joins promptly even though `running` is still set.
        let (_, handle) = acquisition.handles.into_iter().next().unwrap();
        assert_eq!(handle.join().unwrap(), 0);
    }
}
