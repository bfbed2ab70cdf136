//! Collector scheduler.
//!
//! Each [`CollectorTask`] drives one [`Sampler`] on its own worker thread:
//! invoke the sampler, then sleep for the configured interval in 100 ms
//! slices so that `stop()` preempts within a slice. A task is created
//! stopped, started at most once while running, and can be restarted
//! after a `stop()` has joined the worker.

use crate::error::CollectorError;
use crate::metrics::registry::MetricRegistry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Granularity of the interval sleep; bounds shutdown latency.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// A periodic producer of metric samples.
///
/// Samplers are pure producers: they write into the registry through
/// handles looked up by name and never observe other metrics. A sampler
/// is invoked by exactly one worker thread, so `&mut self` state such as
/// a previous counter snapshot needs no further synchronisation.
pub trait Sampler: Send {
    /// Short name used in log events.
    fn name(&self) -> &str;

    /// Registers the metrics this sampler will publish.
    ///
    /// Called once by [`CollectorTask::start`] before the first tick.
    fn register_metrics(&mut self, registry: &MetricRegistry) -> Result<(), CollectorError>;

    /// Takes one sample and publishes it into the registry.
    fn sample(&mut self, registry: &MetricRegistry);
}

/// Owns one sampler and the worker thread that ticks it.
pub struct CollectorTask {
    interval: Duration,
    registry: Arc<MetricRegistry>,
    running:  Arc<AtomicBool>,
    /// Present while stopped; moved into the worker while running and
    /// handed back when the worker is joined.
    sampler:  Option<Box<dyn Sampler>>,
    worker:   Option<thread::JoinHandle<Box<dyn Sampler>>>,
    name:     String,
}

impl CollectorTask {
    /// Creates a stopped task. `interval` must be positive.
    pub fn new(
        interval: Duration,
        sampler: Box<dyn Sampler>,
        registry: Arc<MetricRegistry>,
    ) -> CollectorTask {
        let name = sampler.name().to_string();
        CollectorTask {
            interval,
            registry,
            running: Arc::new(AtomicBool::new(false)),
            sampler: Some(sampler),
            worker: None,
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Registers the sampler's metrics and spawns the worker thread.
    ///
    /// # Errors
    /// `CollectorError::AlreadyRunning` if the worker is live, or a
    /// registry error bubbled up from metric registration.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.is_running() {
            return Err(CollectorError::AlreadyRunning(self.name.clone()));
        }

        let mut sampler = self
            .sampler
            .take()
            .ok_or_else(|| CollectorError::AlreadyRunning(self.name.clone()))?;
        if let Err(e) = sampler.register_metrics(&self.registry) {
            self.sampler = Some(sampler);
            return Err(e);
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let registry = Arc::clone(&self.registry);
        let interval = self.interval;

        self.worker = Some(thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                sampler.sample(&registry);

                // Sleep the interval in short slices so a stop request is
                // honoured within one slice.
                let slept_from = Instant::now();
                while running.load(Ordering::Relaxed) && slept_from.elapsed() < interval {
                    thread::sleep(SLEEP_SLICE);
                }
            }

            // Hand the sampler back so the task can be restarted.
            sampler
        }));

        Ok(())
    }

    /// Requests termination and joins the worker.
    ///
    /// Returns once the worker has exited; no sampler invocation is in
    /// flight afterwards. Stopping a stopped task is a no-op.
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }

        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if let Ok(sampler) = worker.join() {
                self.sampler = Some(sampler);
            }
        }
    }
}

impl Drop for CollectorTask {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    /// Counts invocations; publishes nothing real.
    struct TickSampler {
        ticks: Arc<AtomicU64>,
    }

    impl Sampler for TickSampler {
        fn name(&self) -> &str {
            "tick"
        }

        fn register_metrics(&mut self, _registry: &MetricRegistry) -> Result<(), CollectorError> {
            Ok(())
        }

        fn sample(&mut self, _registry: &MetricRegistry) {
            self.ticks.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn start_runs_sampler_and_stop_joins() {
        let ticks = Arc::new(AtomicU64::new(0));
        let registry = Arc::new(MetricRegistry::new());
        let mut task = CollectorTask::new(
            Duration::from_millis(50),
            Box::new(TickSampler { ticks: Arc::clone(&ticks) }),
            registry,
        );

        assert!(!task.is_running());
        task.start().unwrap();
        assert!(task.is_running());

        thread::sleep(Duration::from_millis(120));
        task.stop();
        assert!(!task.is_running());

        let seen = ticks.load(Ordering::Relaxed);
        assert!(seen >= 2, "expected at least two ticks, saw {}", seen);

        // No further invocations after stop has joined.
        thread::sleep(Duration::from_millis(120));
        assert_eq!(ticks.load(Ordering::Relaxed), seen);
    }

    #[test]
    fn double_start_is_rejected() {
        let registry = Arc::new(MetricRegistry::new());
        let mut task = CollectorTask::new(
            Duration::from_secs(60),
            Box::new(TickSampler { ticks: Arc::new(AtomicU64::new(0)) }),
            registry,
        );

        task.start().unwrap();
        assert!(matches!(task.start(), Err(CollectorError::AlreadyRunning(_))));
        task.stop();
    }

    #[test]
    fn restart_after_stop_is_allowed() {
        let ticks = Arc::new(AtomicU64::new(0));
        let registry = Arc::new(MetricRegistry::new());
        let mut task = CollectorTask::new(
            Duration::from_millis(20),
            Box::new(TickSampler { ticks: Arc::clone(&ticks) }),
            registry,
        );

        task.start().unwrap();
        thread::sleep(Duration::from_millis(50));
        task.stop();
        let after_first = ticks.load(Ordering::Relaxed);

        task.start().unwrap();
        thread::sleep(Duration::from_millis(50));
        task.stop();
        assert!(ticks.load(Ordering::Relaxed) > after_first);
    }
}
