//! Depthflow Tracking - stable identities for moving blobs in 3-D point streams
//!
//! This crate holds the part of depthflow with real correctness contracts:
//! turning an unordered list of per-frame detections into clusters whose
//! identities survive detector noise and short gaps, and fusing several such
//! streams into composite clusters.
//!
//! # Core Abstractions
//!
//! ## Data
//!
//! - [`Vec3`] - Plain 3-D vector used for centroids, velocities, and extents
//! - [`PointCloud`] - Ordered or unordered point set payload
//! - [`Cluster`] - A tracked entity with identity, lifecycle state, and motion
//! - [`ClusterState`] - `Entered → Updated → (Ghost) → WillLeave`
//!
//! ## Assignment
//!
//! - [`CostMatrix`] / [`hungarian::solve`] - Optimal rectangular assignment
//!
//! ## Tracking
//!
//! - [`Tracker`] - Assignment-based tracker with the ghosting state machine
//! - [`ClusterMerger`] - Merges spatially coincident clusters across streams
//!
//! ## Smoothing
//!
//! - [`OneEuroFilter`] - Adaptive low-pass for a single scalar channel
//! - [`FilterBank`] - Per-identity smoothing state for a cluster list
//!
//! # Time
//!
//! Nothing in this crate reads a clock. Every operation that depends on time
//! takes `now` in seconds (`f64`) from the caller, which keeps the state
//! machines deterministic under test.
//!
//! # Example
//!
//! ```rust
//! use depthflow_tracking::{Cluster, ClusterState, Tracker, TrackerConfig, Vec3};
//!
//! let config = TrackerConfig::default();
//! let mut tracker = Tracker::new();
//!
//! let first = tracker.track(vec![Cluster::at(Vec3::new(0.0, 0.0, 0.0))], &config, 0.0);
//! assert_eq!(first[0].state, ClusterState::Entered);
//! let id = first[0].id;
//!
//! let second = tracker.track(vec![Cluster::at(Vec3::new(0.05, 0.0, 0.0))], &config, 0.033);
//! assert_eq!(second[0].id, id);
//! assert_eq!(second[0].state, ClusterState::Updated);
//! ```
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible with `alloc`. Disable the default `std`
//! feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! depthflow-tracking = { version = "0.1", default-features = false }
//! ```
//!
//! The `serde` feature derives `Serialize`/`Deserialize` for the data and
//! configuration types and implies `std`.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod cluster;
pub mod hungarian;
pub mod merger;
pub mod point_cloud;
pub mod temporal_filter;
pub mod tracker;
pub mod vec3;

pub use cluster::{BoundingBox, Cluster, ClusterState};
pub use hungarian::{Assignment, CostMatrix};
pub use merger::{ClusterMerger, MergedCluster, MergerConfig, SourceContribution};
pub use point_cloud::PointCloud;
pub use temporal_filter::{
    ClusterFilter, FilterBank, FilterParams, LowPass, OneEuroFilter, VectorFilter,
    smoothing_factor,
};
pub use tracker::{Tracker, TrackerConfig, UNMATCHABLE_COST};
pub use vec3::Vec3;
