//! Read-only JSON snapshots for the REST query surface.
//!
//! The HTTP server itself is an external collaborator; these functions
//! produce the response bodies behind its endpoint contracts. Shapes are
//! serde structs so the wire format is pinned by the type definitions
//! rather than hand-assembled strings.

use crate::analyzer::PacketAnalyzer;
use crate::metrics::MetricRegistry;
use serde::Serialize;
use serde_json::{json, Value};
use std::fs;

/// Default result count for the `limit` query parameter.
pub const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Serialize)]
struct MetricEntry {
    name:  String,
    value: f64,
}

#[derive(Debug, Serialize)]
struct ConnectionEntry {
    source:           String,
    destination:      String,
    protocol:         u8,
    bytes_sent:       u64,
    bytes_received:   u64,
    packets_sent:     u64,
    packets_received: u64,
}

#[derive(Debug, Serialize)]
struct HostEntry {
    ip:    String,
    bytes: u64,
}

#[derive(Debug, Serialize)]
struct SystemInfo {
    hostname: String,
    platform: String,
    num_cpus: usize,
    uptime:   u64,
}

/// `GET /api/v1/metrics`
pub fn metrics_snapshot(registry: &MetricRegistry) -> Value {
    let metrics: Vec<MetricEntry> = registry
        .list_names()
        .into_iter()
        .filter_map(|name| {
            registry.get(&name).map(|metric| MetricEntry {
                value: metric.current(),
                name,
            })
        })
        .collect();

    json!({ "metrics": metrics })
}

/// `GET /api/v1/metrics/{name}`; `None` maps to a 404 with
/// [`metric_not_found`] as the body.
pub fn metric_snapshot(registry: &MetricRegistry, name: &str) -> Option<Value> {
    registry.get(name).map(|metric| {
        json!({
            "name": name,
            "value": metric.current(),
        })
    })
}

/// Body for the 404 side of the single-metric endpoint.
pub fn metric_not_found() -> Value {
    json!({ "error": "Metric not found" })
}

/// `GET /api/v1/network/stats`
pub fn network_stats(analyzer: &PacketAnalyzer) -> Value {
    json!({
        "status": "Active",
        "connections": analyzer.connection_count(),
    })
}

/// `GET /api/v1/network/connections?limit=N`
pub fn connections_snapshot(analyzer: &PacketAnalyzer, limit: usize) -> Value {
    let connections: Vec<ConnectionEntry> = analyzer
        .top_connections(limit)
        .into_iter()
        .map(|(key, stats)| ConnectionEntry {
            source:           format!("{}:{}", key.a_ip, key.a_port),
            destination:      format!("{}:{}", key.b_ip, key.b_port),
            protocol:         key.protocol,
            bytes_sent:       stats.bytes_sent,
            bytes_received:   stats.bytes_received,
            packets_sent:     stats.packets_sent,
            packets_received: stats.packets_received,
        })
        .collect();

    json!({ "connections": connections })
}

/// `GET /api/v1/network/hosts?limit=N`
pub fn hosts_snapshot(analyzer: &PacketAnalyzer, limit: usize) -> Value {
    let hosts: Vec<HostEntry> = analyzer
        .top_hosts(limit)
        .into_iter()
        .map(|(ip, bytes)| HostEntry { ip, bytes })
        .collect();

    json!({ "hosts": hosts })
}

/// `GET /api/v1/system/info`
pub fn system_info() -> Value {
    let info = SystemInfo {
        hostname: hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string()),
        platform: std::env::consts::OS.to_string(),
        num_cpus: std::thread::available_parallelism().map(|p| p.get()).unwrap_or(1),
        uptime:   uptime_seconds(),
    };

    serde_json::to_value(info).unwrap_or_default()
}

/// Parses the `limit` query parameter. Absent or unparseable values fall
/// back to the default; an explicit `0` is honoured and yields empty
/// result arrays.
pub fn parse_limit(raw: Option<&str>) -> usize {
    match raw {
        Some(text) => text.parse::<usize>().unwrap_or(DEFAULT_LIMIT),
        None => DEFAULT_LIMIT,
    }
}

/// Whole seconds since boot, from `/proc/uptime`. Zero when unreadable.
fn uptime_seconds() -> u64 {
    fs::read_to_string("/proc/uptime")
        .ok()
        .and_then(|content| {
            content
                .split_whitespace()
                .next()
                .and_then(|first| first.parse::<f64>().ok())
        })
        .map(|secs| secs as u64)
        .unwrap_or(0)
}
