//! Named time-series metrics with gauge and counter semantics.
//!
//! Every metric owns its current value, last-update timestamp, and a
//! bounded history of `(time, value)` samples. All mutation is serialised
//! by a per-metric mutex, so readers always observe a consistent
//! `(current, last_updated)` pair and never a torn float.

use crate::error::RegistryError;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::SystemTime;

/// Maximum number of historical samples kept per metric. Oldest entries
/// are evicted first once the bound is reached.
pub const HISTORY_CAPACITY: usize = 1000;

/// What kind of series a metric represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// An instantaneous measurement; any finite value is valid.
    Gauge,
    /// A non-decreasing count under normal updates. An explicit `update`
    /// is still allowed so counters can be rebased.
    Counter,
}

/// Mutable state behind the per-metric lock.
#[derive(Debug)]
struct MetricState {
    current:      f64,
    last_updated: SystemTime,
    /// Time-ordered `(timestamp, value)` samples, oldest first.
    history:      VecDeque<(SystemTime, f64)>,
}

/// A single named metric.
///
/// Registered metrics are shared as `Arc<Metric>`; the registry remains
/// the authoritative owner and samplers or alert conditions hold handles
/// looked up by name.
#[derive(Debug)]
pub struct Metric {
    name:  String,
    kind:  MetricKind,
    state: Mutex<MetricState>,
}

impl Metric {
    pub fn gauge(name: impl Into<String>) -> Metric {
        Metric::new(name, MetricKind::Gauge)
    }

    pub fn counter(name: impl Into<String>) -> Metric {
        Metric::new(name, MetricKind::Counter)
    }

    fn new(name: impl Into<String>, kind: MetricKind) -> Metric {
        Metric {
            name: name.into(),
            kind,
            state: Mutex::new(MetricState {
                current:      0.0,
                last_updated: SystemTime::now(),
                history:      VecDeque::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Sets the current value and appends a history sample.
    pub fn update(&self, value: f64) {
        let mut state = self.state.lock().unwrap();
        let now = SystemTime::now();
        state.current = value;
        state.last_updated = now;
        push_sample(&mut state.history, now, value);
    }

    /// Adds `delta` to the current value and appends a history sample.
    ///
    /// Only valid for counters; gauges get their value replaced through
    /// [`Metric::update`].
    pub fn increment(&self, delta: f64) -> Result<f64, RegistryError> {
        if self.kind != MetricKind::Counter {
            return Err(RegistryError::TypeMismatch(self.name.clone()));
        }

        let mut state = self.state.lock().unwrap();
        let now = SystemTime::now();
        state.current += delta;
        state.last_updated = now;
        let value = state.current;
        push_sample(&mut state.history, now, value);
        Ok(value)
    }

    /// Current value.
    pub fn current(&self) -> f64 {
        self.state.lock().unwrap().current
    }

    /// Current value together with the time it was written.
    pub fn snapshot(&self) -> (f64, SystemTime) {
        let state = self.state.lock().unwrap();
        (state.current, state.last_updated)
    }

    /// Returns the value of the first history entry with a timestamp at or
    /// after `time`. If every entry is older, the newest entry is
    /// returned; an empty history yields `None`.
    pub fn value_at(&self, time: SystemTime) -> Option<f64> {
        let state = self.state.lock().unwrap();

        for (ts, value) in state.history.iter() {
            if *ts >= time {
                return Some(*value);
            }
        }

        state.history.back().map(|(_, value)| *value)
    }

    /// Number of retained history samples.
    pub fn history_len(&self) -> usize {
        self.state.lock().unwrap().history.len()
    }
}

/// Appends a sample and enforces the retention bound, oldest first.
///
/// Two updates landing in the same clock tick both stay in the history;
/// samples are appended in arrival order, which preserves time ordering.
fn push_sample(history: &mut VecDeque<(SystemTime, f64)>, ts: SystemTime, value: f64) {
    history.push_back((ts, value));
    while history.len() > HISTORY_CAPACITY {
        history.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn gauge_update_replaces_value() {
        let gauge = Metric::gauge("test.gauge");
        assert_eq!(gauge.current(), 0.0);

        gauge.update(42.5);
        assert_eq!(gauge.current(), 42.5);

        gauge.update(7.0);
        assert_eq!(gauge.current(), 7.0);
    }

    #[test]
    fn counter_increment_accumulates() {
        let counter = Metric::counter("test.counter");
        counter.update(10.0);
        counter.increment(5.0).unwrap();
        assert_eq!(counter.current(), 15.0);

        counter.increment(1.0).unwrap();
        assert_eq!(counter.current(), 16.0);
    }

    #[test]
    fn increment_on_gauge_is_a_type_mismatch() {
        let gauge = Metric::gauge("test.gauge");
        assert_eq!(
            gauge.increment(1.0),
            Err(RegistryError::TypeMismatch("test.gauge".to_string()))
        );
    }

    #[test]
    fn history_is_bounded() {
        let gauge = Metric::gauge("test.gauge");
        for i in 0..(HISTORY_CAPACITY + 250) {
            gauge.update(i as f64);
        }

        assert_eq!(gauge.history_len(), HISTORY_CAPACITY);
        // The newest entry always matches the latest update.
        assert_eq!(gauge.current(), (HISTORY_CAPACITY + 249) as f64);
        let far_future = SystemTime::now() + Duration::from_secs(3600);
        assert_eq!(gauge.value_at(far_future), Some(gauge.current()));
    }

    #[test]
    fn value_at_returns_first_entry_at_or_after() {
        let gauge = Metric::gauge("test.gauge");
        gauge.update(10.0);
        let mid = SystemTime::now();
        std::thread::sleep(Duration::from_millis(10));
        gauge.update(20.0);

        let past = SystemTime::now() - Duration::from_secs(3600);
        let future = SystemTime::now() + Duration::from_secs(3600);

        // Everything is at or after a timestamp in the distant past.
        assert_eq!(gauge.value_at(past), Some(10.0));
        // Nothing is after a future timestamp, so the newest entry wins.
        assert_eq!(gauge.value_at(future), Some(20.0));
        // A timestamp between the two samples selects the later one.
        assert_eq!(gauge.value_at(mid), Some(20.0));
    }

    #[test]
    fn value_at_on_empty_history_is_none() {
        let gauge = Metric::gauge("test.gauge");
        assert_eq!(gauge.value_at(SystemTime::now()), None);
    }
}
