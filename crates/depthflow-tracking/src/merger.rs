//! Cross-stream cluster fusion.
//!
//! A [`ClusterMerger`] consumes N identity-stable cluster streams (typically
//! one [`Tracker`](crate::Tracker) per sensor) and maintains a list of
//! [`MergedCluster`]s, each owning at most one contributing cluster per
//! stream. One call to [`ClusterMerger::merge`] runs one tick:
//!
//! 1. Purge merged clusters tagged `WillLeave` last tick; the rest stop being
//!    `Entered`.
//! 2. Fold every stream in. A cluster whose `(stream, id)` is already owned
//!    updates its contribution, or releases it when the cluster is leaving or
//!    has drifted beyond `detach_distance` from its parent's centroid. A
//!    drifted cluster seeds a new merged cluster; an unowned one does too.
//! 3. Release contributions not refreshed within `auto_clear_time`.
//! 4. Cross-merge: every merged cluster absorbs its nearest partner that
//!    shares no stream and lies within `merge_distance`.
//! 5. Recompute aggregates and emit a copy of every merged cluster.
//!
//! A merged cluster that loses its last contribution (or is absorbed) is
//! emitted once more tagged `WillLeave`, then purged.
//!
//! Merging and detaching use separate thresholds (`merge_distance <
//! detach_distance`), so a composite does not flicker apart when its sources
//! disagree slightly.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::cluster::{Cluster, ClusterState};
use crate::point_cloud::PointCloud;

/// Merger tuning, read fresh on every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MergerConfig {
    /// Centroid distance (m) under which two merged clusters fuse.
    pub merge_distance: f32,
    /// Distance (m) from the merged centroid beyond which a source detaches.
    pub detach_distance: f32,
    /// Only fuse when at least one side entered this tick.
    pub merge_on_enter_only: bool,
    /// Release sources not refreshed for this long (s). Zero disables.
    pub auto_clear_time: f32,
}

impl Default for MergerConfig {
    fn default() -> Self {
        Self {
            merge_distance: 0.3,
            detach_distance: 0.5,
            merge_on_enter_only: false,
            auto_clear_time: 1.0,
        }
    }
}

/// One stream's cluster as owned by a merged cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceContribution {
    /// Latest copy of the contributing cluster.
    pub cluster: Cluster,
    /// Time the contribution was last refreshed (s).
    pub last_update_time: f64,
}

/// Composite cluster fused from up to one cluster per stream.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedCluster {
    cluster: Cluster,
    sources: BTreeMap<usize, SourceContribution>,
}

impl MergedCluster {
    fn new(id: u32, stream: usize, source: &Cluster, now: f64) -> Self {
        let mut cluster = source.clone();
        cluster.id = id;
        cluster.state = ClusterState::Entered;
        cluster.age = 0.0;
        cluster.ghost_age = 0.0;
        cluster.prev_centroid = cluster.centroid;
        cluster.prev_velocity = cluster.velocity;
        cluster.prev_bounds = cluster.bounds;
        cluster.last_update_time = now;
        cluster.last_seen_time = now;

        let mut sources = BTreeMap::new();
        sources.insert(
            stream,
            SourceContribution {
                cluster: source.clone(),
                last_update_time: now,
            },
        );
        Self { cluster, sources }
    }

    /// The aggregate cluster.
    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    /// Merged identity.
    pub fn id(&self) -> u32 {
        self.cluster.id
    }

    /// Contributions keyed by stream index.
    pub fn sources(&self) -> &BTreeMap<usize, SourceContribution> {
        &self.sources
    }

    /// The contribution of `stream`, if any.
    pub fn source(&self, stream: usize) -> Option<&SourceContribution> {
        self.sources.get(&stream)
    }

    /// Returns true if any stream contributes to both clusters.
    pub fn shares_stream_with(&self, other: &MergedCluster) -> bool {
        self.sources.keys().any(|k| other.sources.contains_key(k))
    }

    fn owns(&self, stream: usize, id: u32) -> bool {
        self.sources.get(&stream).is_some_and(|s| s.cluster.id == id)
    }

    fn is_alive(&self) -> bool {
        !self.cluster.is_leaving() && !self.sources.is_empty()
    }

    /// Rebuilds the aggregate from the current contributions.
    fn recompute(&mut self, now: f64) {
        let n = self.sources.len();
        let mut contributions = self.sources.values().map(|s| &s.cluster);
        let Some(first) = contributions.next() else {
            return;
        };

        let mut bounds = first.bounds;
        let mut centroid = first.centroid;
        let mut velocity = first.velocity;
        let mut age = first.age;
        let mut all_ghosts = first.is_ghost();
        for c in contributions {
            bounds = bounds.union(c.bounds);
            centroid += c.centroid;
            velocity += c.velocity;
            age = age.max(c.age);
            all_ghosts &= c.is_ghost();
        }

        self.cluster.cloud = if n == 1 {
            Arc::clone(&first.cloud)
        } else {
            let mut cloud = PointCloud::default();
            for s in self.sources.values() {
                cloud.extend_from(&s.cluster.cloud);
            }
            Arc::new(cloud)
        };
        self.cluster.bounds = bounds;
        self.cluster.centroid = centroid / n as f32;
        self.cluster.velocity = velocity / n as f32;
        self.cluster.age = age;
        self.cluster.last_update_time = now;
        self.cluster.last_seen_time = now;

        if self.cluster.state != ClusterState::Entered {
            self.cluster.state = if all_ghosts {
                ClusterState::Ghost
            } else {
                ClusterState::Updated
            };
        }
    }
}

/// Stateful merger owning the merged-cluster list.
#[derive(Debug, Clone)]
pub struct ClusterMerger {
    merged: Vec<MergedCluster>,
    next_id: u32,
}

impl Default for ClusterMerger {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterMerger {
    /// Creates an empty merger. The first merged identity is 1.
    pub fn new() -> Self {
        Self {
            merged: Vec::new(),
            next_id: 1,
        }
    }

    /// Merged clusters as of the last tick.
    pub fn merged(&self) -> &[MergedCluster] {
        &self.merged
    }

    /// Forgets every merged cluster. Identities are not recycled.
    pub fn clear(&mut self) {
        self.merged.clear();
    }

    /// Runs one merge tick. `streams[k]` is the cluster list of stream `k`.
    ///
    /// Returns a fresh copy of every merged cluster, `WillLeave` included.
    pub fn merge(&mut self, streams: &[&[Cluster]], config: &MergerConfig, now: f64) -> Vec<Cluster> {
        self.begin_tick();

        for (stream, clusters) in streams.iter().enumerate() {
            for c in clusters.iter() {
                self.fold(stream, c, config, now);
            }
        }

        if config.auto_clear_time > 0.0 {
            let limit = f64::from(config.auto_clear_time);
            for m in &mut self.merged {
                m.sources.retain(|_, s| now - s.last_update_time <= limit);
            }
        }

        self.recompute_alive(now);
        self.cross_merge(config);
        self.recompute_alive(now);

        for m in &mut self.merged {
            if m.sources.is_empty() && !m.cluster.is_leaving() {
                m.cluster.state = ClusterState::WillLeave;
                #[cfg(feature = "tracing")]
                tracing::debug!(id = m.cluster.id, "merger: lost last source, leaving");
            }
        }

        self.merged.iter().map(|m| m.cluster.clone()).collect()
    }

    fn begin_tick(&mut self) {
        self.merged.retain(|m| !m.cluster.is_leaving());
        for m in &mut self.merged {
            let c = &mut m.cluster;
            c.prev_centroid = c.centroid;
            c.prev_velocity = c.velocity;
            c.prev_bounds = c.bounds;
            if c.state == ClusterState::Entered {
                c.state = ClusterState::Updated;
            }
        }
    }

    fn fold(&mut self, stream: usize, c: &Cluster, config: &MergerConfig, now: f64) {
        let Some(pos) = self.merged.iter().position(|m| m.owns(stream, c.id)) else {
            if !c.is_leaving() {
                self.spawn(stream, c, now);
            }
            return;
        };

        let parent = &mut self.merged[pos];
        if c.is_leaving() {
            parent.sources.remove(&stream);
            return;
        }

        if c.centroid.distance(parent.cluster.centroid) > config.detach_distance {
            parent.sources.remove(&stream);
            #[cfg(feature = "tracing")]
            tracing::debug!(
                id = parent.cluster.id,
                stream,
                source = c.id,
                "merger: source drifted, detaching"
            );
            self.spawn(stream, c, now);
            return;
        }

        if let Some(source) = parent.sources.get_mut(&stream) {
            source.cluster = c.clone();
            source.last_update_time = now;
        }
    }

    fn spawn(&mut self, stream: usize, c: &Cluster, now: f64) {
        let id = self.next_id;
        self.next_id += 1;
        #[cfg(feature = "tracing")]
        tracing::debug!(id, stream, source = c.id, "merger: new merged cluster");
        self.merged.push(MergedCluster::new(id, stream, c, now));
    }

    fn recompute_alive(&mut self, now: f64) {
        for m in self.merged.iter_mut().filter(|m| m.is_alive()) {
            m.recompute(now);
        }
    }

    fn cross_merge(&mut self, config: &MergerConfig) {
        for i in 0..self.merged.len() {
            if !self.merged[i].is_alive() {
                continue;
            }

            let mut best: Option<(usize, f32)> = None;
            for j in 0..self.merged.len() {
                if i == j {
                    continue;
                }
                let (a, b) = (&self.merged[i], &self.merged[j]);
                if !b.is_alive() || a.shares_stream_with(b) {
                    continue;
                }
                if config.merge_on_enter_only
                    && a.cluster.state != ClusterState::Entered
                    && b.cluster.state != ClusterState::Entered
                {
                    continue;
                }
                let d = a.cluster.centroid.distance(b.cluster.centroid);
                if d < config.merge_distance && best.is_none_or(|(_, bd)| d < bd) {
                    best = Some((j, d));
                }
            }

            if let Some((j, _)) = best {
                let absorbed = core::mem::take(&mut self.merged[j].sources);
                self.merged[j].cluster.state = ClusterState::WillLeave;
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    id = self.merged[i].cluster.id,
                    absorbed = self.merged[j].cluster.id,
                    "merger: cross-merge"
                );
                self.merged[i].sources.extend(absorbed);
            }
        }
    }
}
