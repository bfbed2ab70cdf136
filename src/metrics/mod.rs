//! Metric registry and collector scheduler.
//!
//! A [`MetricRegistry`](registry::MetricRegistry) owns named time series
//! with gauge and counter semantics and bounded history. Collector tasks
//! tick OS samplers on their own worker threads and publish through the
//! registry; the alert engine and query views read from it.

pub mod collector;
pub mod metric;
pub mod registry;
pub mod samplers;

pub use collector::{CollectorTask, Sampler};
pub use metric::{Metric, MetricKind, HISTORY_CAPACITY};
pub use registry::MetricRegistry;
pub use samplers::{CpuSampler, MemorySampler};
