//! Flow table and host traffic index.
//!
//! [`PacketAnalyzer`] consumes decoded packets and maintains two views
//! under one coarse mutex: the canonical-key flow table and the per-IP
//! byte totals. Sharing the lock keeps `reset()` atomic across both and
//! serialises ingests within a flow, so each flow's statistics reflect
//! its packets in arrival order.

pub mod flow;
pub mod protocols;

use crate::analyzer::flow::{FlowKey, FlowStats};
use crate::analyzer::protocols::recognize;
use crate::capture::decoder::PacketInfo;
use crate::store::FlowRecord;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Mutex;

/// Soft bound on tracked flows; the least-recently-seen flow is evicted
/// to make room before an insert once the bound is reached.
pub const DEFAULT_MAX_FLOWS: usize = 100_000;

struct AnalyzerState {
    flows:      HashMap<FlowKey, FlowStats>,
    host_bytes: HashMap<String, u64>,
    /// Running count of flows ever created, for the session summary.
    flows_created: u64,
}

/// The outcome of one ingest: the flow's current persisted shape, plus
/// the record of a flow that was evicted to make room, if any. The
/// caller forwards both to the write-behind sink.
pub struct IngestResult {
    pub flow:    FlowRecord,
    pub evicted: Option<FlowRecord>,
}

pub struct PacketAnalyzer {
    state:     Mutex<AnalyzerState>,
    max_flows: usize,
}

impl PacketAnalyzer {
    pub fn new() -> PacketAnalyzer {
        PacketAnalyzer::with_max_flows(DEFAULT_MAX_FLOWS)
    }

    pub fn with_max_flows(max_flows: usize) -> PacketAnalyzer {
        PacketAnalyzer {
            state: Mutex::new(AnalyzerState {
                flows:         HashMap::new(),
                host_bytes:    HashMap::new(),
                flows_created: 0,
            }),
            max_flows,
        }
    }

    /// Folds one packet into the flow table and host index.
    ///
    /// New flows run the recognizer chain once; existing flows re-run it
    /// only while no protocol has been identified yet.
    pub fn ingest(&self, packet: &PacketInfo) -> IngestResult {
        let mut state = self.state.lock().unwrap();
        let state = &mut *state;
        let key = FlowKey::canonical(packet);

        let mut evicted = None;
        if !state.flows.contains_key(&key) && state.flows.len() >= self.max_flows {
            evicted = evict_lru(&mut state.flows);
        }

        let stats = match state.flows.entry(key.clone()) {
            Entry::Occupied(entry) => {
                let stats = entry.into_mut();
                stats.record(packet);
                stats
            }
            Entry::Vacant(entry) => {
                state.flows_created += 1;
                entry.insert(FlowStats::open(packet))
            }
        };

        if stats.protocol_tag.is_none() {
            if let Some(data) = recognize(packet) {
                stats.set_protocol(data);
            }
        }
        let flow = stats.to_record(&key);

        let wire = u64::from(packet.wire_len);
        *state.host_bytes.entry(packet.source_ip.clone()).or_insert(0) += wire;
        *state.host_bytes.entry(packet.dest_ip.clone()).or_insert(0) += wire;

        IngestResult { flow, evicted }
    }

    /// Snapshot of one flow's statistics.
    pub fn get(&self, key: &FlowKey) -> Option<FlowStats> {
        self.state.lock().unwrap().flows.get(key).cloned()
    }

    /// Number of flows currently tracked.
    pub fn connection_count(&self) -> usize {
        self.state.lock().unwrap().flows.len()
    }

    /// Flows ever created, including since-evicted ones.
    pub fn flows_created(&self) -> u64 {
        self.state.lock().unwrap().flows_created
    }

    /// The `n` flows with the most total traffic, descending.
    ///
    /// Ties break toward the more recently active flow, then by canonical
    /// key order, so the result is stable for equal inputs.
    pub fn top_connections(&self, n: usize) -> Vec<(FlowKey, FlowStats)> {
        let state = self.state.lock().unwrap();

        let mut entries: Vec<(FlowKey, FlowStats)> = state
            .flows
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        entries.sort_by(|(ka, sa), (kb, sb)| {
            sb.total_bytes()
                .cmp(&sa.total_bytes())
                .then(sb.last_seen.cmp(&sa.last_seen))
                .then(ka.cmp(kb))
        });

        entries.truncate(n);
        entries
    }

    /// Per-IP byte totals, both directions counted.
    pub fn host_totals(&self) -> HashMap<String, u64> {
        self.state.lock().unwrap().host_bytes.clone()
    }

    /// The `n` hosts with the most total traffic, descending; ties break
    /// by IP order for stability.
    pub fn top_hosts(&self, n: usize) -> Vec<(String, u64)> {
        let state = self.state.lock().unwrap();

        let mut hosts: Vec<(String, u64)> = state
            .host_bytes
            .iter()
            .map(|(ip, bytes)| (ip.clone(), *bytes))
            .collect();

        hosts.sort_by(|(ip_a, a), (ip_b, b)| b.cmp(a).then(ip_a.cmp(ip_b)));
        hosts.truncate(n);
        hosts
    }

    /// Clears the flow table and the host index in one step.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.flows.clear();
        state.host_bytes.clear();
    }
}

impl Default for PacketAnalyzer {
    fn default() -> Self {
        PacketAnalyzer::new()
    }
}

/// Removes the flow with the oldest `last_seen` and returns its record.
fn evict_lru(flows: &mut HashMap<FlowKey, FlowStats>) -> Option<FlowRecord> {
    let victim = flows
        .iter()
        .min_by(|(ka, sa), (kb, sb)| sa.last_seen.cmp(&sb.last_seen).then(ka.cmp(kb)))
        .map(|(k, _)| k.clone())?;

    let stats = flows.remove(&victim)?;
    Some(stats.to_record(&victim))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::protocols::ProtocolTag;
    use crate::capture::decoder::PROTO_TCP;
    use crate::testutil::packet;

    #[test]
    fn counters_are_conserved_across_directions() {
        let analyzer = PacketAnalyzer::new();
        let a = packet("10.0.0.1", 1000, "10.0.0.2", 80, PROTO_TCP, b"", 1);
        let b = packet("10.0.0.2", 80, "10.0.0.1", 1000, PROTO_TCP, b"", 2);

        analyzer.ingest(&a);
        analyzer.ingest(&a);
        analyzer.ingest(&b);

        let key = FlowKey::canonical(&a);
        let stats = analyzer.get(&key).unwrap();
        assert_eq!(stats.packets_sent + stats.packets_received, 3);
        assert_eq!(
            stats.bytes_sent + stats.bytes_received,
            u64::from(a.wire_len) * 2 + u64::from(b.wire_len)
        );
        assert_eq!(analyzer.connection_count(), 1);
    }

    #[test]
    fn host_totals_count_both_endpoints() {
        let analyzer = PacketAnalyzer::new();
        let pkt = packet("10.0.0.1", 1000, "10.0.0.2", 80, PROTO_TCP, b"x", 1);
        analyzer.ingest(&pkt);

        let totals = analyzer.host_totals();
        assert_eq!(totals["10.0.0.1"], u64::from(pkt.wire_len));
        assert_eq!(totals["10.0.0.2"], u64::from(pkt.wire_len));
    }

    #[test]
    fn recognizer_runs_until_a_tag_sticks() {
        let analyzer = PacketAnalyzer::new();

        // First packet carries nothing recognizable.
        let empty = packet("10.0.0.5", 54321, "93.184.216.34", 80, PROTO_TCP, b"", 1);
        analyzer.ingest(&empty);
        let key = FlowKey::canonical(&empty);
        assert!(analyzer.get(&key).unwrap().protocol_tag.is_none());

        // The request on a later packet gets the flow tagged.
        let request = packet(
            "10.0.0.5", 54321, "93.184.216.34", 80, PROTO_TCP,
            b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n", 2,
        );
        analyzer.ingest(&request);
        assert_eq!(analyzer.get(&key).unwrap().protocol_tag, Some(ProtocolTag::Http));
    }

    #[test]
    fn top_connections_orders_by_total_bytes() {
        let analyzer = PacketAnalyzer::new();

        // Three flows with distinct totals; wire_len is 54 + payload.
        let small = packet("10.0.0.1", 1, "10.0.0.2", 2, PROTO_TCP, &[0u8; 446], 1);
        let mid = packet("10.0.0.3", 3, "10.0.0.4", 4, PROTO_TCP, &[0u8; 946], 2);
        let large = packet("10.0.0.5", 5, "10.0.0.6", 6, PROTO_TCP, &[0u8; 1446], 3);
        analyzer.ingest(&small);
        analyzer.ingest(&mid);
        analyzer.ingest(&large);

        let top = analyzer.top_connections(2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].0, FlowKey::canonical(&large));
        assert_eq!(top[1].0, FlowKey::canonical(&mid));
        assert!(top[0].1.total_bytes() > top[1].1.total_bytes());
    }

    #[test]
    fn top_connection_ties_prefer_recent_activity() {
        let analyzer = PacketAnalyzer::new();
        let older = packet("10.0.0.1", 1, "10.0.0.2", 2, PROTO_TCP, b"", 100);
        let newer = packet("10.0.0.3", 3, "10.0.0.4", 4, PROTO_TCP, b"", 200);
        analyzer.ingest(&older);
        analyzer.ingest(&newer);

        let top = analyzer.top_connections(2);
        assert_eq!(top[0].0, FlowKey::canonical(&newer));
    }

    #[test]
    fn lru_eviction_surfaces_the_victim() {
        let analyzer = PacketAnalyzer::with_max_flows(2);
        let first = packet("10.0.0.1", 1, "10.0.0.2", 2, PROTO_TCP, b"", 100);
        let second = packet("10.0.0.3", 3, "10.0.0.4", 4, PROTO_TCP, b"", 200);
        analyzer.ingest(&first);
        analyzer.ingest(&second);

        // A third flow forces out the least recently seen one.
        let third = packet("10.0.0.5", 5, "10.0.0.6", 6, PROTO_TCP, b"", 300);
        let result = analyzer.ingest(&third);

        let evicted = result.evicted.expect("oldest flow evicted");
        assert_eq!(evicted.source_ip, "10.0.0.1");
        assert_eq!(analyzer.connection_count(), 2);
        assert!(analyzer.get(&FlowKey::canonical(&first)).is_none());
    }

    #[test]
    fn reset_clears_flows_and_hosts_together() {
        let analyzer = PacketAnalyzer::new();
        analyzer.ingest(&packet("10.0.0.1", 1, "10.0.0.2", 2, PROTO_TCP, b"", 1));

        analyzer.reset();
        assert_eq!(analyzer.connection_count(), 0);
        assert!(analyzer.host_totals().is_empty());
    }
}
