//! Tracked cluster entity and its lifecycle state.
//!
//! A [`Cluster`] starts life as a detection (a labeled point group with a
//! centroid and bounding box, produced by a clustering collaborator). Once a
//! [`Tracker`](crate::Tracker) adopts it, it receives an identity that stays
//! fixed for as long as the cluster is alive:
//!
//! ```text
//! Entered ──update──▶ Updated ──no match──▶ Ghost ──max ghost age──▶ WillLeave
//!    │                   ▲                    │
//!    │                   └──────match─────────┘
//!    └──no match (too young / ghosting off)──────────────────────────▶ WillLeave
//! ```
//!
//! `WillLeave` is terminal: the cluster is emitted once more with that tag and
//! dropped on the following tick.

use alloc::sync::Arc;

use crate::point_cloud::PointCloud;
use crate::vec3::Vec3;

/// Lifecycle tag of a tracked cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ClusterState {
    /// First tick the cluster is tracked.
    #[default]
    Entered,
    /// Matched to a detection this tick.
    Updated,
    /// Retained without a detection to bridge a short detector gap.
    Ghost,
    /// Emitted for the last time; removed on the next tick.
    WillLeave,
}

impl ClusterState {
    /// Short lowercase label, stable for logs and wire formats.
    pub const fn label(self) -> &'static str {
        match self {
            ClusterState::Entered => "entered",
            ClusterState::Updated => "updated",
            ClusterState::Ghost => "ghost",
            ClusterState::WillLeave => "will_leave",
        }
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl BoundingBox {
    /// Creates a box from its corners.
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// A degenerate box at a single point.
    pub const fn point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(self, other: Self) -> Self {
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }

    /// Center of the box.
    pub fn center(self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Edge lengths of the box.
    pub fn size(self) -> Vec3 {
        self.max - self.min
    }
}

/// A tracked point group with stable identity.
///
/// The point payload is shared (`Arc`) so cluster lists can be copied once per
/// tick without duplicating point data.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cluster {
    /// Identity, assigned once by the tracker. Zero for raw detections.
    pub id: u32,
    /// Lifecycle tag.
    pub state: ClusterState,
    /// Contributing points.
    pub cloud: Arc<PointCloud>,
    /// Current centroid.
    pub centroid: Vec3,
    /// Velocity derived from centroid motion (m/s).
    pub velocity: Vec3,
    /// Current extent.
    pub bounds: BoundingBox,
    /// Centroid before the last update.
    pub prev_centroid: Vec3,
    /// Velocity before the last update.
    pub prev_velocity: Vec3,
    /// Extent before the last update.
    pub prev_bounds: BoundingBox,
    /// Seconds since the cluster was first tracked.
    pub age: f32,
    /// Seconds spent in the `Ghost` state.
    pub ghost_age: f32,
    /// Time of the last update (seconds, caller clock). Ghost ticks refresh it.
    pub last_update_time: f64,
    /// Time the cluster was last matched to a detection (seconds).
    #[cfg_attr(feature = "serde", serde(default))]
    pub last_seen_time: f64,
}

impl Cluster {
    /// Creates a detection with an explicit centroid and extent.
    pub fn new(cloud: Arc<PointCloud>, centroid: Vec3, bounds: BoundingBox, now: f64) -> Self {
        Self {
            id: 0,
            state: ClusterState::Entered,
            cloud,
            centroid,
            velocity: Vec3::ZERO,
            bounds,
            prev_centroid: centroid,
            prev_velocity: Vec3::ZERO,
            prev_bounds: bounds,
            age: 0.0,
            ghost_age: 0.0,
            last_update_time: now,
            last_seen_time: now,
        }
    }

    /// Creates a detection whose centroid and extent are computed from `cloud`.
    ///
    /// An empty cloud yields a degenerate cluster at the origin.
    pub fn from_cloud(cloud: PointCloud, now: f64) -> Self {
        let centroid = cloud.centroid().unwrap_or(Vec3::ZERO);
        let bounds = cloud.bounds().unwrap_or(BoundingBox::point(centroid));
        Self::new(Arc::new(cloud), centroid, bounds, now)
    }

    /// Creates a point-sized detection without payload.
    pub fn at(centroid: Vec3) -> Self {
        Self::new(
            Arc::new(PointCloud::default()),
            centroid,
            BoundingBox::point(centroid),
            0.0,
        )
    }

    /// Returns true if the cluster is currently a ghost.
    #[inline]
    pub fn is_ghost(&self) -> bool {
        self.state == ClusterState::Ghost
    }

    /// Returns true if the cluster is emitted for the last time.
    #[inline]
    pub fn is_leaving(&self) -> bool {
        self.state == ClusterState::WillLeave
    }

    /// Adopts the geometry of a matched detection.
    ///
    /// Current centroid/extent shift to `prev_*`, velocity becomes
    /// Δcentroid/Δt since the cluster was last seen (left unchanged when no
    /// time has passed), age accumulates, ghost age resets, and the state
    /// becomes `Updated`.
    pub fn update_from(&mut self, detection: &Cluster, now: f64) {
        let delta = (now - self.last_seen_time) as f32;

        self.cloud = Arc::clone(&detection.cloud);
        self.age += (now - self.last_update_time).max(0.0) as f32;

        self.prev_bounds = self.bounds;
        self.prev_centroid = self.centroid;
        self.prev_velocity = self.velocity;

        self.bounds = detection.bounds;
        self.centroid = detection.centroid;

        if delta > 0.0 {
            self.velocity = (self.centroid - self.prev_centroid) / delta;
        }

        self.ghost_age = 0.0;
        self.last_update_time = now;
        self.last_seen_time = now;
        self.state = ClusterState::Updated;
    }
}
