use std::sync::Arc;

use dashmap::DashMap;

use super::{BreakerConfig, CircuitBreaker};

/// Named circuits, one shared counter state per name.
///
/// Constructed once by the composition root and passed by reference; there is
/// no process-global instance. Circuits are created on first lookup and live
/// as long as the registry.
pub struct CircuitRegistry {
    circuits: DashMap<String, Arc<CircuitBreaker>, ahash::RandomState>,
    config: BreakerConfig,
}

impl CircuitRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            circuits: DashMap::default(),
            config,
        }
    }

    /// Look up a circuit by name, creating it with the registry's config on
    /// first use.
    pub fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        self.circuits
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, self.config.clone())))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.circuits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.circuits.is_empty()
    }
}

impl Default for CircuitRegistry {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
