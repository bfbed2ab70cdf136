//! Threshold alert engine.
//!
//! Rules are evaluated by [`AlertEngine::check_all`], driven either by
//! the ticker thread or directly by tests. A rule fires when its
//! condition holds and its per-rule cooldown has elapsed; every fire
//! invokes the registered callbacks synchronously, in rule-insertion
//! order, under the engine lock. A failing callback is logged and
//! counted without stopping the rest.

pub mod rule;

use crate::error::AlertError;
use crate::logger::{Event, SharedLogger};
use crate::ShutdownFlag;
use rule::{AlertRule, Condition, Severity};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Default minimum interval between two fires of the same rule.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// Callback invoked for every fire. Returning `Err` marks the callback
/// failed for this fire; later callbacks still run.
pub type AlertCallback = Box<dyn Fn(&AlertRule) -> Result<(), String> + Send>;

struct EngineState {
    rules:     Vec<AlertRule>,
    callbacks: Vec<AlertCallback>,
}

pub struct AlertEngine {
    state:             Mutex<EngineState>,
    default_cooldown:  Duration,
    logger:            SharedLogger,
    fires:             AtomicU64,
    callback_failures: AtomicU64,
}

impl AlertEngine {
    pub fn new(logger: SharedLogger) -> AlertEngine {
        AlertEngine::with_cooldown(logger, DEFAULT_COOLDOWN)
    }

    /// Engine whose rules default to the given cooldown, typically the
    /// `alert_cooldown_seconds` config value.
    pub fn with_cooldown(logger: SharedLogger, default_cooldown: Duration) -> AlertEngine {
        AlertEngine {
            state: Mutex::new(EngineState { rules: Vec::new(), callbacks: Vec::new() }),
            default_cooldown,
            logger,
            fires: AtomicU64::new(0),
            callback_failures: AtomicU64::new(0),
        }
    }

    /// Adds a rule with the engine's default cooldown.
    pub fn create(
        &self,
        name: impl Into<String>,
        condition: Condition,
        severity: Severity,
    ) -> Result<(), AlertError> {
        let cooldown = self.default_cooldown;
        self.create_with_cooldown(name, condition, severity, cooldown)
    }

    /// Adds a rule with an explicit cooldown.
    ///
    /// # Errors
    /// `AlertError::DuplicateRule` when a rule with the same name exists.
    pub fn create_with_cooldown(
        &self,
        name: impl Into<String>,
        condition: Condition,
        severity: Severity,
        cooldown: Duration,
    ) -> Result<(), AlertError> {
        let name = name.into();
        let mut state = self.state.lock().unwrap();

        if state.rules.iter().any(|r| r.name == name) {
            return Err(AlertError::DuplicateRule(name));
        }

        state.rules.push(AlertRule::new(name, condition, severity, cooldown));
        Ok(())
    }

    /// Appends a callback; callbacks run in registration order.
    pub fn register_callback(&self, callback: AlertCallback) {
        self.state.lock().unwrap().callbacks.push(callback);
    }

    /// Evaluates every rule against the current wall clock.
    pub fn check_all(&self) {
        self.check_all_at(Instant::now());
    }

    /// Evaluates every rule as of `now`.
    ///
    /// The explicit timestamp keeps cooldown behaviour testable without
    /// sleeping through real windows.
    pub fn check_all_at(&self, now: Instant) {
        let mut state = self.state.lock().unwrap();
        let state = &mut *state;

        for i in 0..state.rules.len() {
            if !state.rules[i].due(now) {
                continue;
            }

            state.rules[i].mark_fired(now);
            self.fires.fetch_add(1, Ordering::Relaxed);

            let fired = &state.rules[i];
            let description = fired.describe();
            self.logger.log(&Event::AlertFired {
                name:        &fired.name,
                severity:    fired.severity.as_str(),
                description: &description,
            });

            for callback in &state.callbacks {
                if let Err(error) = callback(fired) {
                    self.callback_failures.fetch_add(1, Ordering::Relaxed);
                    self.logger.log(&Event::CallbackFailed { rule: &fired.name, error: &error });
                }
            }
        }
    }

    pub fn rule_count(&self) -> usize {
        self.state.lock().unwrap().rules.len()
    }

    /// Total fires across all rules.
    pub fn fires(&self) -> u64 {
        self.fires.load(Ordering::Relaxed)
    }

    pub fn callback_failures(&self) -> u64 {
        self.callback_failures.load(Ordering::Relaxed)
    }
}

/// Spawns the ticker that drives `check_all` every `interval`.
///
/// Sleeps in short slices so the shutdown flag is honoured promptly.
pub fn spawn_alert_ticker(
    engine: Arc<AlertEngine>,
    interval: Duration,
    shutdown: ShutdownFlag,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let slice = Duration::from_millis(100);

        while !shutdown.load(Ordering::Relaxed) {
            engine.check_all();

            let slept_from = Instant::now();
            while !shutdown.load(Ordering::Relaxed) && slept_from.elapsed() < interval {
                thread::sleep(slice);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::{LogLevel, Logger};
    use crate::metrics::Metric;
    use super::rule::Comparator;

    fn quiet_logger() -> SharedLogger {
        Arc::new(Logger::new(false, None, LogLevel::Error).unwrap())
    }

    fn overload_condition(value: f64) -> Condition {
        let metric = Arc::new(Metric::gauge("cpu.usage"));
        metric.update(value);
        Condition::threshold(metric, Comparator::GreaterThan, 90.0)
    }

    #[test]
    fn duplicate_rule_names_are_rejected() {
        let engine = AlertEngine::new(quiet_logger());
        engine
            .create("high-cpu", overload_condition(0.0), Severity::Warning)
            .unwrap();

        let err = engine
            .create("high-cpu", overload_condition(0.0), Severity::Critical)
            .unwrap_err();
        assert_eq!(err, AlertError::DuplicateRule("high-cpu".to_string()));
    }

    #[test]
    fn fire_respects_cooldown_and_refires_after() {
        let engine =
            AlertEngine::with_cooldown(quiet_logger(), Duration::from_secs(60));
        engine
            .create("high-cpu", overload_condition(95.0), Severity::Warning)
            .unwrap();

        let fired = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&fired);
        engine.register_callback(Box::new(move |_| {
            seen.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }));

        // Three checks one second apart fire exactly once.
        let t0 = Instant::now();
        engine.check_all_at(t0);
        engine.check_all_at(t0 + Duration::from_secs(1));
        engine.check_all_at(t0 + Duration::from_secs(2));
        assert_eq!(fired.load(Ordering::Relaxed), 1);

        // A check past the cooldown window fires again.
        engine.check_all_at(t0 + Duration::from_secs(61));
        assert_eq!(fired.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn false_condition_never_fires() {
        let engine = AlertEngine::new(quiet_logger());
        engine
            .create("idle-cpu", overload_condition(10.0), Severity::Info)
            .unwrap();

        engine.check_all_at(Instant::now());
        assert_eq!(engine.fires(), 0);
    }

    #[test]
    fn failing_callback_does_not_stop_later_ones() {
        let engine = AlertEngine::new(quiet_logger());
        engine
            .create("high-cpu", overload_condition(95.0), Severity::Warning)
            .unwrap();

        engine.register_callback(Box::new(|_| Err("sink unavailable".to_string())));

        let reached = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&reached);
        engine.register_callback(Box::new(move |_| {
            seen.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }));

        engine.check_all_at(Instant::now());
        assert_eq!(reached.load(Ordering::Relaxed), 1);
        assert_eq!(engine.callback_failures(), 1);
    }

    #[test]
    fn callbacks_receive_the_rule() {
        let engine = AlertEngine::new(quiet_logger());
        engine
            .create("high-cpu", overload_condition(95.0), Severity::Critical)
            .unwrap();

        let captured = Arc::new(Mutex::new(String::new()));
        let slot = Arc::clone(&captured);
        engine.register_callback(Box::new(move |rule| {
            *slot.lock().unwrap() = format!("{}: {}", rule.name, rule.describe());
            Ok(())
        }));

        engine.check_all_at(Instant::now());
        assert_eq!(&*captured.lock().unwrap(), "high-cpu: cpu.usage > 90");
    }
}
