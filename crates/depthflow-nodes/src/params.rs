//! Node parameters: parsing from tables and live updates.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::de::DeserializeOwned;

use crate::error::NodeBuildError;

/// Parameter table of one node, as written under `[nodes.params]`.
pub type NodeParams = toml::Table;

/// Parses `params` into `T`. Missing keys keep `T`'s defaults.
pub fn parse_params<T: DeserializeOwned>(node_type: &str, params: &NodeParams) -> Result<T, NodeBuildError> {
    toml::Value::Table(params.clone())
        .try_into()
        .map_err(|source| NodeBuildError::InvalidParams {
            node_type: node_type.to_string(),
            source,
        })
}

/// Configuration shared between a node and its controllers.
///
/// The node loads it once per tick; writers swap in a whole new value, so a
/// reader never sees a half-updated configuration.
#[derive(Debug)]
pub struct Live<T>(Arc<ArcSwap<T>>);

impl<T> Live<T> {
    /// Wraps an initial value.
    pub fn new(value: T) -> Self {
        Self(Arc::new(ArcSwap::from_pointee(value)))
    }

    /// Current value.
    pub fn get(&self) -> Arc<T> {
        self.0.load_full()
    }

    /// Replaces the value; the node sees it on its next tick.
    pub fn set(&self, value: T) {
        self.0.store(Arc::new(value));
    }
}

impl<T> Clone for Live<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

/// Seconds since the node last processed, 0 on the first call.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DeltaClock {
    last: Option<f64>,
}

impl DeltaClock {
    pub(crate) fn tick(&mut self, now: f64) -> f32 {
        let dt = self.last.map_or(0.0, |last| (now - last).max(0.0) as f32);
        self.last = Some(now);
        dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depthflow_tracking::TrackerConfig;

    #[test]
    fn partial_tables_keep_defaults() {
        let params: NodeParams = toml::from_str("search_distance = 0.25\nenable_ghosting = true").unwrap();
        let config: TrackerConfig = parse_params("tracker", &params).unwrap();
        assert_eq!(config.search_distance, 0.25);
        assert!(config.enable_ghosting);
        assert_eq!(config.max_ghost_age, TrackerConfig::default().max_ghost_age);
    }

    #[test]
    fn wrong_value_type_is_reported() {
        let params: NodeParams = toml::from_str("search_distance = \"far\"").unwrap();
        let err = parse_params::<TrackerConfig>("tracker", &params).unwrap_err();
        assert!(err.to_string().contains("tracker"));
    }

    #[test]
    fn live_values_are_shared() {
        let live = Live::new(1.0f32);
        let other = live.clone();
        other.set(2.0);
        assert_eq!(*live.get(), 2.0);
    }

    #[test]
    fn delta_clock_starts_at_zero() {
        let mut clock = DeltaClock::default();
        assert_eq!(clock.tick(1.0), 0.0);
        assert!((clock.tick(1.5) - 0.5).abs() < 1e-6);
        assert_eq!(clock.tick(1.2), 0.0);
    }
}
