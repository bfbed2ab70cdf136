//! netsentry: host and network telemetry agent.
//!
//! Four cooperating subsystems make up the telemetry plane: the metric
//! registry with bounded history, the collector scheduler driving OS
//! samplers, the packet ingest path (capture thread, bounded frame ring,
//! flow analyzer with protocol recognition), and the threshold alert
//! engine with per-rule cooldown. The REST query surface, persistent
//! store, and raw capture driver are external collaborators; this crate
//! provides the snapshot views, the write-behind sink seam, and the
//! capture wrapper they plug into.

pub mod alert;
pub mod analyzer;
pub mod api;
pub mod capture;
pub mod cli;
pub mod config;
pub mod error;
pub mod logger;
pub mod metrics;
pub mod pool;
pub mod store;
pub mod testutil;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Shared shutdown flag used to signal graceful termination across all
/// threads. Set by the signal handler; every loop observes it at its
/// next suspension point.
pub type ShutdownFlag = Arc<AtomicBool>;
