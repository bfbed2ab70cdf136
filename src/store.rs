//! Write-behind persistence sink.
//!
//! The telemetry plane hands records to a [`StoreSink`] and moves on;
//! failures are logged and counted by the producer, never retried
//! synchronously, and nothing on the hot path blocks on persistence.
//! [`MemoryStore`] is the in-process implementation; a real database
//! lives behind the same trait.

use crate::error::StoreError;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

// ── Records ──────────────────────────────────────────────────────────────────

/// One metric sample as persisted.
#[derive(Debug, Clone, Serialize)]
pub struct MetricPoint {
    pub name:    String,
    pub value:   f64,
    pub ts_secs: i64,
}

/// One flow's statistics as persisted. Endpoints are the canonical key
/// pair; timestamps are capture-clock microseconds.
#[derive(Debug, Clone, Serialize)]
pub struct FlowRecord {
    pub source_ip:        String,
    pub source_port:      u16,
    pub dest_ip:          String,
    pub dest_port:        u16,
    pub protocol:         u8,
    pub bytes_sent:       u64,
    pub bytes_received:   u64,
    pub packets_sent:     u64,
    pub packets_received: u64,
    pub first_seen:       u64,
    pub last_seen:        u64,
}

/// One alert fire as persisted.
#[derive(Debug, Clone, Serialize)]
pub struct AlertRecord {
    pub name:         String,
    pub description:  String,
    pub severity:     i32,
    pub ts_secs:      i64,
    pub acknowledged: bool,
}

// ── Sink ─────────────────────────────────────────────────────────────────────

/// A consumer of telemetry records.
///
/// Implementations must tolerate concurrent calls; producers submit from
/// worker-pool threads and the main flush loop.
pub trait StoreSink: Send + Sync {
    fn record_metrics(&self, points: &[MetricPoint]) -> Result<(), StoreError>;
    fn record_flow(&self, record: &FlowRecord) -> Result<(), StoreError>;
    fn record_alert(&self, record: &AlertRecord) -> Result<(), StoreError>;
}

// ── In-memory store ──────────────────────────────────────────────────────────

type FlowId = (String, u16, String, u16, u8);

#[derive(Default)]
struct MemoryStoreState {
    metrics: Vec<MetricPoint>,
    /// Upserted by 5-tuple; repeated writes for the same flow replace the
    /// previous record.
    flows:   HashMap<FlowId, FlowRecord>,
    alerts:  Vec<AlertRecord>,
}

/// Keeps everything in process memory. Retention is enforced by the
/// prune operations, driven externally on the cleanup schedule.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryStoreState>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Newest recorded value for a metric, if any.
    pub fn latest_metric(&self, name: &str) -> Option<f64> {
        let state = self.state.lock().unwrap();
        state
            .metrics
            .iter()
            .rev()
            .find(|p| p.name == name)
            .map(|p| p.value)
    }

    pub fn metric_count(&self) -> usize {
        self.state.lock().unwrap().metrics.len()
    }

    pub fn flow_count(&self) -> usize {
        self.state.lock().unwrap().flows.len()
    }

    /// Most recent alerts, newest first.
    pub fn recent_alerts(&self, limit: usize) -> Vec<AlertRecord> {
        let state = self.state.lock().unwrap();
        state.alerts.iter().rev().take(limit).cloned().collect()
    }

    pub fn alert_count(&self) -> usize {
        self.state.lock().unwrap().alerts.len()
    }

    /// Drops metric points older than `ts_secs`.
    pub fn prune_metrics_before(&self, ts_secs: i64) -> usize {
        let mut state = self.state.lock().unwrap();
        let before = state.metrics.len();
        state.metrics.retain(|p| p.ts_secs >= ts_secs);
        before - state.metrics.len()
    }

    /// Drops flow records whose last activity is older than `ts_micros`.
    pub fn prune_flows_before(&self, ts_micros: u64) -> usize {
        let mut state = self.state.lock().unwrap();
        let before = state.flows.len();
        state.flows.retain(|_, r| r.last_seen >= ts_micros);
        before - state.flows.len()
    }

    /// Drops alert records older than `ts_secs`.
    pub fn prune_alerts_before(&self, ts_secs: i64) -> usize {
        let mut state = self.state.lock().unwrap();
        let before = state.alerts.len();
        state.alerts.retain(|a| a.ts_secs >= ts_secs);
        before - state.alerts.len()
    }
}

impl StoreSink for MemoryStore {
    fn record_metrics(&self, points: &[MetricPoint]) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.metrics.extend_from_slice(points);
        Ok(())
    }

    fn record_flow(&self, record: &FlowRecord) -> Result<(), StoreError> {
        let id = (
            record.source_ip.clone(),
            record.source_port,
            record.dest_ip.clone(),
            record.dest_port,
            record.protocol,
        );
        self.state.lock().unwrap().flows.insert(id, record.clone());
        Ok(())
    }

    fn record_alert(&self, record: &AlertRecord) -> Result<(), StoreError> {
        self.state.lock().unwrap().alerts.push(record.clone());
        Ok(())
    }
}
