//! Adaptive low-pass ("one euro") filter for tracked attributes.
//!
//! Each scalar channel runs two one-pole low-pass stages:
//!
//! ```text
//! α(fc, dt)  = 1 / (1 + 1/(2π·fc·dt))
//! dx̂[n]      = lowpass(dx[n], α(d_cutoff, dt))          dx = (x[n] - x[n-1]) / dt
//! fc[n]      = min_cutoff + beta·|dx̂[n]|
//! x̂[n]       = α(fc[n], dt)·x[n] + (1 - α(fc[n], dt))·x̂[n-1]
//! ```
//!
//! A fast-moving signal raises the cutoff (less lag), a nearly static one
//! lowers it (more smoothing). The first sample of a channel passes through
//! unchanged.
//!
//! [`FilterBank`] keeps one [`ClusterFilter`] per cluster identity: created on
//! first observation, discarded as soon as the identity is missing from a
//! processed list.
//!
//! # Reference
//!
//! Casiez, Roussel, Vogel, "1€ Filter: A Simple Speed-based Low-pass Filter
//! for Noisy Input in Interactive Systems", CHI 2012.

use alloc::collections::BTreeMap;

use libm::fabsf;

use crate::cluster::Cluster;
use crate::vec3::Vec3;

/// Smoothing factor of a one-pole low-pass for cutoff `cutoff` Hz and step `dt` s.
///
/// Returns 0.0 (hold) for non-positive `cutoff · dt`.
#[inline]
pub fn smoothing_factor(cutoff: f32, dt: f32) -> f32 {
    let r = core::f32::consts::TAU * cutoff * dt;
    if r > 0.0 { r / (1.0 + r) } else { 0.0 }
}

/// Tunable parameters shared by every channel of a filter.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FilterParams {
    /// Cutoff (Hz) when the signal is static.
    pub min_cutoff: f32,
    /// Cutoff increase per unit of filtered speed.
    pub beta: f32,
    /// Cutoff (Hz) of the derivative stage.
    pub derivative_cutoff: f32,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            min_cutoff: 1.0,
            beta: 10.0,
            derivative_cutoff: 1.0,
        }
    }
}

/// One-pole exponential low-pass with explicit per-call smoothing factor.
#[derive(Debug, Clone, Default)]
pub struct LowPass {
    state: Option<f32>,
}

impl LowPass {
    /// Creates an uninitialized stage.
    pub const fn new() -> Self {
        Self { state: None }
    }

    /// Filters `value` with factor `alpha` (clamped to [0, 1]).
    ///
    /// The first call initializes the stage and returns `value`.
    #[inline]
    pub fn filter(&mut self, value: f32, alpha: f32) -> f32 {
        let out = match self.state {
            Some(prev) => {
                let a = alpha.clamp(0.0, 1.0);
                a * value + (1.0 - a) * prev
            }
            None => value,
        };
        self.state = Some(out);
        out
    }

    /// Last output, if any.
    pub fn last(&self) -> Option<f32> {
        self.state
    }

    /// Forgets the state.
    pub fn reset(&mut self) {
        self.state = None;
    }
}

/// Adaptive filter for a single scalar channel.
#[derive(Debug, Clone, Default)]
pub struct OneEuroFilter {
    params: FilterParams,
    value: LowPass,
    derivative: LowPass,
    last_raw: Option<f32>,
}

impl OneEuroFilter {
    /// Creates a filter with the given parameters.
    pub fn new(params: FilterParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    /// Current parameters.
    pub fn params(&self) -> FilterParams {
        self.params
    }

    /// Replaces the parameters without touching the state.
    pub fn set_params(&mut self, params: FilterParams) {
        self.params = params;
    }

    /// Filters one sample taken `dt` seconds after the previous one.
    pub fn filter(&mut self, value: f32, dt: f32) -> f32 {
        let raw_derivative = match self.last_raw {
            Some(prev) if dt > 0.0 => (value - prev) / dt,
            _ => 0.0,
        };
        self.last_raw = Some(value);

        let d = self.derivative.filter(
            raw_derivative,
            smoothing_factor(self.params.derivative_cutoff, dt),
        );
        let cutoff = self.params.min_cutoff + self.params.beta * fabsf(d);
        self.value.filter(value, smoothing_factor(cutoff, dt))
    }

    /// Forgets the state; the next sample passes through.
    pub fn reset(&mut self) {
        self.value.reset();
        self.derivative.reset();
        self.last_raw = None;
    }
}

/// Three independent [`OneEuroFilter`] channels for a [`Vec3`].
#[derive(Debug, Clone, Default)]
pub struct VectorFilter {
    channels: [OneEuroFilter; 3],
}

impl VectorFilter {
    /// Creates a vector filter.
    pub fn new(params: FilterParams) -> Self {
        Self {
            channels: core::array::from_fn(|_| OneEuroFilter::new(params)),
        }
    }

    /// Filters each component of `v`.
    pub fn filter(&mut self, v: Vec3, dt: f32) -> Vec3 {
        Vec3::new(
            self.channels[0].filter(v.x, dt),
            self.channels[1].filter(v.y, dt),
            self.channels[2].filter(v.z, dt),
        )
    }

    /// Replaces the parameters of every channel.
    pub fn set_params(&mut self, params: FilterParams) {
        for ch in &mut self.channels {
            ch.set_params(params);
        }
    }
}

/// Smoothing state owned by one tracked identity.
#[derive(Debug, Clone, Default)]
pub struct ClusterFilter {
    centroid: VectorFilter,
    bounds_min: VectorFilter,
    bounds_max: VectorFilter,
}

impl ClusterFilter {
    /// Creates the per-identity filter set.
    pub fn new(params: FilterParams) -> Self {
        Self {
            centroid: VectorFilter::new(params),
            bounds_min: VectorFilter::new(params),
            bounds_max: VectorFilter::new(params),
        }
    }

    /// Replaces the parameters of all channels.
    pub fn set_params(&mut self, params: FilterParams) {
        self.centroid.set_params(params);
        self.bounds_min.set_params(params);
        self.bounds_max.set_params(params);
    }

    /// Smooths the selected attributes of `cluster` in place.
    pub fn apply(&mut self, cluster: &mut Cluster, dt: f32, centroid: bool, bounds: bool) {
        if centroid {
            cluster.centroid = self.centroid.filter(cluster.centroid, dt);
        }
        if bounds {
            cluster.bounds.min = self.bounds_min.filter(cluster.bounds.min, dt);
            cluster.bounds.max = self.bounds_max.filter(cluster.bounds.max, dt);
        }
    }
}

/// Per-identity filter states for a stream of cluster lists.
#[derive(Debug, Clone, Default)]
pub struct FilterBank {
    filters: BTreeMap<u32, ClusterFilter>,
    params: FilterParams,
}

impl FilterBank {
    /// Creates an empty bank.
    pub fn new(params: FilterParams) -> Self {
        Self {
            filters: BTreeMap::new(),
            params,
        }
    }

    /// Updates the parameters for existing and future identities.
    pub fn set_params(&mut self, params: FilterParams) {
        if params == self.params {
            return;
        }
        self.params = params;
        for f in self.filters.values_mut() {
            f.set_params(params);
        }
    }

    /// Smooths every cluster in `clusters` and discards state of absent identities.
    pub fn apply(&mut self, clusters: &mut [Cluster], dt: f32, centroid: bool, bounds: bool) {
        for c in clusters.iter_mut() {
            self.apply_one(c, dt, centroid, bounds);
        }
        self.retain_ids(clusters.iter().map(|c| c.id));
    }

    /// Smooths a single cluster, creating its filter state on first sight.
    pub fn apply_one(&mut self, cluster: &mut Cluster, dt: f32, centroid: bool, bounds: bool) {
        let params = self.params;
        self.filters
            .entry(cluster.id)
            .or_insert_with(|| ClusterFilter::new(params))
            .apply(cluster, dt, centroid, bounds);
    }

    /// Keeps only the filters whose identity appears in `ids`.
    pub fn retain_ids(&mut self, ids: impl IntoIterator<Item = u32>) {
        let mut seen = alloc::collections::BTreeSet::new();
        seen.extend(ids);
        self.filters.retain(|id, _| seen.contains(id));
    }

    /// Drops the filter for `id`.
    pub fn remove(&mut self, id: u32) {
        self.filters.remove(&id);
    }

    /// Returns true if `id` has filter state.
    pub fn contains(&self, id: u32) -> bool {
        self.filters.contains_key(&id)
    }

    /// Number of identities with filter state.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns true if no identity has filter state.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Drops all state.
    pub fn clear(&mut self) {
        self.filters.clear();
    }
}
