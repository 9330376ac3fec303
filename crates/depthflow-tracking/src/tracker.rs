//! Assignment-based multi-object tracker with ghosting.
//!
//! Each call to [`Tracker::track`] runs one tick:
//!
//! 1. Drop clusters tagged `WillLeave` on the previous tick.
//! 2. Build a `tracked × detected` cost matrix of centroid distances. Pairs
//!    beyond the search radius (or the ghost search radius for ghosts) get
//!    [`UNMATCHABLE_COST`].
//! 3. Solve the assignment with the Hungarian algorithm.
//! 4. Revert any pair whose cost is the sentinel to "unassigned".
//! 5. Matched clusters adopt the detection's geometry (`Updated`).
//! 6. Unmatched clusters go through the ghosting state machine.
//! 7. Unconsumed detections become new clusters with fresh identities (`Entered`).
//! 8. The full tracked set is returned, `WillLeave` entries included.
//!
//! Identities increase monotonically and are never reused, even after
//! [`Tracker::clear`].

use alloc::vec::Vec;

use crate::cluster::{Cluster, ClusterState};
use crate::hungarian::{self, CostMatrix};
use crate::temporal_filter::{FilterBank, FilterParams};
use crate::vec3::Vec3;

/// Cost assigned to pairings outside the search radius.
///
/// Larger than any plausible real distance (meters) while leaving ample
/// headroom in `f64` for summing a full matrix of them.
pub const UNMATCHABLE_COST: f64 = 1.0e6;

/// Tracker tuning, read fresh on every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrackerConfig {
    /// Maximum match distance (m) for a live cluster.
    pub search_distance: f32,
    /// Keep unmatched clusters alive as ghosts.
    pub enable_ghosting: bool,
    /// Maximum match distance (m) for a ghost.
    pub ghost_search_distance: f32,
    /// Minimum age (s) before an unmatched cluster may become a ghost.
    pub min_age_for_ghost: f32,
    /// Ghost age (s) after which a ghost leaves.
    pub max_ghost_age: f32,
    /// Optional centroid smoothing applied to matched clusters.
    pub smoothing: Option<FilterParams>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            search_distance: 0.1,
            enable_ghosting: false,
            ghost_search_distance: 0.5,
            min_age_for_ghost: 0.1,
            max_ghost_age: 1.0,
            smoothing: None,
        }
    }
}

/// Stateful tracker owning the tracked set.
#[derive(Debug, Clone)]
pub struct Tracker {
    tracked: Vec<Cluster>,
    next_id: u32,
    filters: FilterBank,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracker {
    /// Creates a tracker with an empty tracked set. The first identity is 1.
    pub fn new() -> Self {
        Self {
            tracked: Vec::new(),
            next_id: 1,
            filters: FilterBank::default(),
        }
    }

    /// The tracked set as of the last tick.
    pub fn tracked(&self) -> &[Cluster] {
        &self.tracked
    }

    /// Identity that will be given to the next new cluster.
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Forgets every tracked cluster. Identities are not recycled.
    pub fn clear(&mut self) {
        self.tracked.clear();
        self.filters.clear();
    }

    /// Runs one tracking tick against this tick's `detected` clusters.
    ///
    /// `now` is the tick time in seconds on the caller's clock.
    pub fn track(&mut self, detected: Vec<Cluster>, config: &TrackerConfig, now: f64) -> &[Cluster] {
        // 1. Purge last tick's leavers.
        let before = self.tracked.len();
        self.tracked.retain(|c| !c.is_leaving());
        #[cfg(feature = "tracing")]
        if self.tracked.len() < before {
            tracing::debug!(
                removed = before - self.tracked.len(),
                remaining = self.tracked.len(),
                "tracker: purged leaving clusters"
            );
        }
        #[cfg(not(feature = "tracing"))]
        let _ = before;

        // 2-4. Optimal assignment with sentinel rejection.
        let (costs, matches) = self.assign(&detected, config);

        // 5-6. Update matched, run the ghosting FSM on the rest.
        let smoothing = config.smoothing;
        if let Some(params) = smoothing {
            self.filters.set_params(params);
        }

        let mut consumed = alloc::vec![false; detected.len()];
        for (i, cluster) in self.tracked.iter_mut().enumerate() {
            match matches[i] {
                Some(j) if costs[(i, j)] < UNMATCHABLE_COST => {
                    let dt = (now - cluster.last_seen_time).max(0.0) as f32;
                    cluster.update_from(&detected[j], now);
                    if smoothing.is_some() {
                        self.filters.apply_one(cluster, dt, true, false);
                    }
                    consumed[j] = true;
                }
                _ => Self::handle_unmatched(cluster, config, now),
            }
        }

        // 7. Adopt unconsumed detections.
        for (j, detection) in detected.into_iter().enumerate() {
            if consumed[j] {
                continue;
            }
            let mut cluster = detection;
            cluster.id = self.next_id;
            self.next_id += 1;
            cluster.state = ClusterState::Entered;
            cluster.age = 0.0;
            cluster.ghost_age = 0.0;
            cluster.velocity = Vec3::ZERO;
            cluster.prev_centroid = cluster.centroid;
            cluster.prev_bounds = cluster.bounds;
            cluster.last_update_time = now;
            cluster.last_seen_time = now;
            #[cfg(feature = "tracing")]
            tracing::debug!(id = cluster.id, "tracker: new cluster");
            if smoothing.is_some() {
                self.filters.apply_one(&mut cluster, 0.0, true, false);
            }
            self.tracked.push(cluster);
        }

        if smoothing.is_some() {
            self.filters
                .retain_ids(self.tracked.iter().filter(|c| !c.is_leaving()).map(|c| c.id));
        } else if !self.filters.is_empty() {
            self.filters.clear();
        }

        // 8.
        &self.tracked
    }

    /// Builds the cost matrix and solves it; returns both so callers can
    /// check the underlying cost of each pair.
    fn assign(&self, detected: &[Cluster], config: &TrackerConfig) -> (CostMatrix, Vec<Option<usize>>) {
        let search = config.search_distance;
        let ghost_search = config.ghost_search_distance;

        let costs = CostMatrix::from_fn(self.tracked.len(), detected.len(), |i, j| {
            let tracked = &self.tracked[i];
            let dist = tracked.centroid.distance(detected[j].centroid);
            let radius = if tracked.is_ghost() { ghost_search } else { search };
            if dist > radius || !dist.is_finite() {
                UNMATCHABLE_COST
            } else {
                f64::from(dist)
            }
        });

        let assignment = hungarian::solve(&costs);
        (costs, assignment.rows)
    }

    fn handle_unmatched(cluster: &mut Cluster, config: &TrackerConfig, now: f64) {
        if !config.enable_ghosting {
            cluster.state = ClusterState::WillLeave;
            #[cfg(feature = "tracing")]
            tracing::debug!(id = cluster.id, "tracker: no match, leaving");
            return;
        }

        cluster.velocity = Vec3::ZERO;

        if !cluster.is_ghost() {
            if cluster.age >= config.min_age_for_ghost {
                cluster.state = ClusterState::Ghost;
                cluster.ghost_age = 0.0;
                cluster.age += (now - cluster.last_update_time).max(0.0) as f32;
                cluster.last_update_time = now;
                #[cfg(feature = "tracing")]
                tracing::debug!(id = cluster.id, "tracker: became ghost");
            } else {
                // Short-lived: most likely detector noise.
                cluster.state = ClusterState::WillLeave;
                #[cfg(feature = "tracing")]
                tracing::debug!(id = cluster.id, age = cluster.age, "tracker: too young to ghost");
            }
            return;
        }

        let elapsed = (now - cluster.last_update_time).max(0.0) as f32;
        cluster.ghost_age += elapsed;
        cluster.age += elapsed;
        cluster.last_update_time = now;
        if cluster.ghost_age > config.max_ghost_age {
            cluster.state = ClusterState::WillLeave;
            #[cfg(feature = "tracing")]
            tracing::debug!(id = cluster.id, ghost_age = cluster.ghost_age, "tracker: ghost expired");
        }
    }
}
