//! Error types shared across the telemetry plane.
//!
//! Each subsystem surfaces its own enum rather than a single crate-wide
//! error: capture failures disable capture but leave metrics and alerting
//! running, registry errors are returned to the caller, and decode errors
//! are counted and dropped on the hot path without ever propagating.

use thiserror::Error;

// ── Capture ──────────────────────────────────────────────────────────────────

/// Errors surfaced synchronously from `PacketCapture::start_capture`.
///
/// A failure here disables the capture subsystem for the rest of the run;
/// the collectors and the alert engine keep going.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The capture device exists but the process lacks the privileges to
    /// open it (typically missing CAP_NET_RAW or root).
    #[error("permission denied opening capture device")]
    PermissionDenied,

    /// No interface with the requested name is present on this host.
    #[error("capture interface not found")]
    InterfaceNotFound,

    /// `start_capture` was called while a capture thread is already live.
    #[error("capture is already running")]
    AlreadyRunning,

    /// Any other failure reported by the capture driver.
    #[error("capture system error: {0}")]
    SystemError(String),
}

// ── Frame decoding ───────────────────────────────────────────────────────────

/// Why a raw frame could not be decoded into a `PacketInfo`.
///
/// Callers drop these silently and bump a counter; they are never logged
/// per-frame and never propagated out of the capture loop.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The frame ended before a required header offset.
    #[error("truncated frame")]
    Truncated,

    /// The frame carried something other than IPv4.
    #[error("unsupported network layer")]
    NotIpv4,
}

// ── Metric registry ──────────────────────────────────────────────────────────

/// Errors returned by the metric registry and by metric operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A metric with this name is already registered.
    #[error("metric '{0}' already registered")]
    Duplicate(String),

    /// No metric with this name exists.
    #[error("metric '{0}' not found")]
    NotFound(String),

    /// The operation is not valid for the metric's kind, e.g. calling
    /// `increment` on a gauge.
    #[error("metric '{0}' has the wrong kind for this operation")]
    TypeMismatch(String),
}

// ── Collector lifecycle ──────────────────────────────────────────────────────

/// Errors from starting a collector task.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// `start` was called while the task's worker is still running.
    #[error("collector '{0}' is already running")]
    AlreadyRunning(String),

    /// The sampler failed to register its metrics.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// ── Alert engine ─────────────────────────────────────────────────────────────

/// Errors from alert rule management.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlertError {
    /// A rule with this name already exists.
    #[error("alert rule '{0}' already exists")]
    DuplicateRule(String),
}

// ── Configuration ────────────────────────────────────────────────────────────

/// Errors from loading a configuration file.
///
/// Fatal to the configuration step only: the caller logs the failure and
/// continues on built-in defaults.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ── Write-behind store ───────────────────────────────────────────────────────

/// Failure reported by a write-behind store sink.
///
/// Producers log and count these; nothing on the telemetry plane blocks on
/// or retries a failed store write.
#[derive(Debug, Error)]
#[error("store write failed: {0}")]
pub struct StoreError(pub String);
