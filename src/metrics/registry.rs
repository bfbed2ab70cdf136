//! Central metric registry.
//!
//! The registry exclusively owns metric storage. Samplers, the alert
//! engine, and the query views look metrics up by name and hold
//! `Arc<Metric>` handles that stay valid for the registry's lifetime.
//! The name map is guarded by a single RW lock; per-metric mutation is
//! serialised by each metric's own mutex, so updates to different metrics
//! never contend with each other.

use crate::error::RegistryError;
use crate::metrics::metric::{Metric, MetricKind};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Default)]
pub struct MetricRegistry {
    metrics: RwLock<HashMap<String, Arc<Metric>>>,
}

impl MetricRegistry {
    pub fn new() -> MetricRegistry {
        MetricRegistry::default()
    }

    /// Inserts a metric and returns a shared handle to it.
    ///
    /// # Errors
    /// `RegistryError::Duplicate` if a metric with the same name already
    /// exists; names are unique within a registry.
    pub fn register(&self, metric: Metric) -> Result<Arc<Metric>, RegistryError> {
        let mut metrics = self.metrics.write().unwrap();
        if metrics.contains_key(metric.name()) {
            return Err(RegistryError::Duplicate(metric.name().to_string()));
        }

        let handle = Arc::new(metric);
        metrics.insert(handle.name().to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    /// O(1) lookup by name.
    pub fn get(&self, name: &str) -> Option<Arc<Metric>> {
        self.metrics.read().unwrap().get(name).cloned()
    }

    /// Looks a metric up, registering it first if it does not exist yet.
    ///
    /// Used by samplers whose metric set is only known at runtime, such
    /// as the per-core CPU gauges.
    pub fn ensure(&self, name: &str, kind: MetricKind) -> Arc<Metric> {
        if let Some(existing) = self.get(name) {
            return existing;
        }

        let mut metrics = self.metrics.write().unwrap();
        // A racing ensure() may have inserted between the read and the
        // write lock; the first insert wins.
        if let Some(existing) = metrics.get(name) {
            return Arc::clone(existing);
        }

        let metric = match kind {
            MetricKind::Gauge => Metric::gauge(name),
            MetricKind::Counter => Metric::counter(name),
        };
        let handle = Arc::new(metric);
        metrics.insert(name.to_string(), Arc::clone(&handle));
        handle
    }

    /// Snapshot of the currently registered names.
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.metrics.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.metrics.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup() {
        let registry = MetricRegistry::new();
        registry.register(Metric::gauge("cpu.usage")).unwrap();

        let handle = registry.get("cpu.usage").expect("metric registered");
        handle.update(12.5);
        assert_eq!(registry.get("cpu.usage").unwrap().current(), 12.5);
        assert!(registry.get("cpu.missing").is_none());
    }

    #[test]
    fn duplicate_registration_fails() {
        let registry = MetricRegistry::new();
        registry.register(Metric::gauge("memory.used")).unwrap();

        let err = registry.register(Metric::gauge("memory.used")).unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("memory.used".to_string()));
    }

    #[test]
    fn ensure_is_idempotent() {
        let registry = MetricRegistry::new();
        let first = registry.ensure("packets.dropped", MetricKind::Counter);
        first.increment(3.0).unwrap();

        let second = registry.ensure("packets.dropped", MetricKind::Counter);
        assert_eq!(second.current(), 3.0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn list_names_snapshots_sorted() {
        let registry = MetricRegistry::new();
        registry.register(Metric::gauge("b")).unwrap();
        registry.register(Metric::gauge("a")).unwrap();
        assert_eq!(registry.list_names(), vec!["a".to_string(), "b".to_string()]);
    }
}
