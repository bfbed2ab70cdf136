//! Alert rules: severities, comparators, and threshold conditions.

use crate::metrics::Metric;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Absolute tolerance used for float equality comparisons.
pub const FLOAT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Numeric form used in persisted alert records.
    pub fn as_i32(&self) -> i32 {
        match self {
            Severity::Info => 0,
            Severity::Warning => 1,
            Severity::Error => 2,
            Severity::Critical => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    GreaterThan,
    LessThan,
    EqualTo,
    NotEqualTo,
    GreaterEqual,
    LessEqual,
}

impl Comparator {
    fn symbol(&self) -> &'static str {
        match self {
            Comparator::GreaterThan => ">",
            Comparator::LessThan => "<",
            Comparator::EqualTo => "==",
            Comparator::NotEqualTo => "!=",
            Comparator::GreaterEqual => ">=",
            Comparator::LessEqual => "<=",
        }
    }

    fn compare(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::GreaterThan => value > threshold,
            Comparator::LessThan => value < threshold,
            Comparator::EqualTo => (value - threshold).abs() < FLOAT_TOLERANCE,
            Comparator::NotEqualTo => (value - threshold).abs() >= FLOAT_TOLERANCE,
            Comparator::GreaterEqual => value >= threshold,
            Comparator::LessEqual => value <= threshold,
        }
    }
}

/// A rule's predicate.
///
/// Conditions hold shared handles to registry-owned metrics; the
/// registry stays authoritative and outlives every rule.
pub enum Condition {
    MetricThreshold {
        metric:     Arc<Metric>,
        comparator: Comparator,
        threshold:  f64,
    },
}

impl Condition {
    pub fn threshold(metric: Arc<Metric>, comparator: Comparator, threshold: f64) -> Condition {
        Condition::MetricThreshold { metric, comparator, threshold }
    }

    pub fn evaluate(&self) -> bool {
        match self {
            Condition::MetricThreshold { metric, comparator, threshold } => {
                comparator.compare(metric.current(), *threshold)
            }
        }
    }

    /// Human-readable form used in log lines and persisted records,
    /// e.g. `cpu.usage > 90`.
    pub fn describe(&self) -> String {
        match self {
            Condition::MetricThreshold { metric, comparator, threshold } => {
                format!("{} {} {}", metric.name(), comparator.symbol(), threshold)
            }
        }
    }
}

/// One named alert rule.
///
/// `last_fired` drives the cooldown: it is armed only when the rule
/// actually fires, so a condition that merely stays true during cooldown
/// neither fires nor extends the suppression window.
pub struct AlertRule {
    pub name:     String,
    pub severity: Severity,
    pub cooldown: Duration,
    condition:    Condition,
    last_fired:   Option<Instant>,
}

impl AlertRule {
    pub fn new(
        name: impl Into<String>,
        condition: Condition,
        severity: Severity,
        cooldown: Duration,
    ) -> AlertRule {
        AlertRule {
            name: name.into(),
            severity,
            cooldown,
            condition,
            last_fired: None,
        }
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn describe(&self) -> String {
        self.condition.describe()
    }

    pub fn last_fired(&self) -> Option<Instant> {
        self.last_fired
    }

    /// Whether the condition holds and the cooldown has elapsed at `now`.
    pub(super) fn due(&self, now: Instant) -> bool {
        if !self.condition.evaluate() {
            return false;
        }

        match self.last_fired {
            Some(fired) => now.saturating_duration_since(fired) >= self.cooldown,
            None => true,
        }
    }

    pub(super) fn mark_fired(&mut self, now: Instant) {
        self.last_fired = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gauge_at(value: f64) -> Arc<Metric> {
        let metric = Arc::new(Metric::gauge("test.gauge"));
        metric.update(value);
        metric
    }

    #[test]
    fn comparators_behave() {
        assert!(Comparator::GreaterThan.compare(95.0, 90.0));
        assert!(!Comparator::GreaterThan.compare(90.0, 90.0));
        assert!(Comparator::GreaterEqual.compare(90.0, 90.0));
        assert!(Comparator::LessThan.compare(1.0, 2.0));
        assert!(Comparator::LessEqual.compare(2.0, 2.0));
    }

    #[test]
    fn float_equality_uses_tolerance() {
        assert!(Comparator::EqualTo.compare(1.0, 1.0 + 1e-9));
        assert!(!Comparator::EqualTo.compare(1.0, 1.0 + 1e-3));
        assert!(Comparator::NotEqualTo.compare(1.0, 1.0 + 1e-3));
        assert!(!Comparator::NotEqualTo.compare(1.0, 1.0 + 1e-9));
    }

    #[test]
    fn condition_reads_the_live_metric_value() {
        let metric = gauge_at(50.0);
        let condition = Condition::threshold(Arc::clone(&metric), Comparator::GreaterThan, 90.0);

        assert!(!condition.evaluate());
        metric.update(95.0);
        assert!(condition.evaluate());
    }

    #[test]
    fn describe_names_the_metric() {
        let condition = Condition::threshold(gauge_at(0.0), Comparator::GreaterThan, 90.0);
        assert_eq!(condition.describe(), "test.gauge > 90");
    }

    #[test]
    fn cooldown_arms_only_on_fire() {
        let metric = gauge_at(95.0);
        let mut rule = AlertRule::new(
            "high",
            Condition::threshold(metric, Comparator::GreaterThan, 90.0),
            Severity::Warning,
            Duration::from_secs(60),
        );

        let t0 = Instant::now();
        assert!(rule.due(t0));
        rule.mark_fired(t0);

        // Still suppressed one second later, due again after the window.
        assert!(!rule.due(t0 + Duration::from_secs(1)));
        assert!(rule.due(t0 + Duration::from_secs(61)));
    }
}
