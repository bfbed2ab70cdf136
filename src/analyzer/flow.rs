//! Flow identity and per-flow statistics.
//!
//! A flow is a bidirectional conversation identified by a canonical
//! 5-tuple: both directions of the same conversation map to one
//! [`FlowKey`]. Direction attribution lives in [`FlowStats`], which
//! remembers the endpoint that sent the first frame.

use crate::analyzer::protocols::{ProtocolData, ProtocolTag};
use crate::capture::decoder::PacketInfo;
use crate::store::FlowRecord;

/// Canonical 5-tuple flow identifier.
///
/// Endpoints are swapped at construction so that `(a_ip, a_port)` never
/// compares greater than `(b_ip, b_port)`. The comparison is on the
/// dotted-quad strings, matching the ordering used in persisted records.
/// Field order gives the derived `Ord` the canonical key order used for
/// top-N tie-breaking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowKey {
    pub a_ip:     String,
    pub a_port:   u16,
    pub b_ip:     String,
    pub b_port:   u16,
    pub protocol: u8,
}

impl FlowKey {
    /// Builds the canonical key for a packet.
    ///
    /// Endpoints are swapped iff the source pair orders after the
    /// destination pair, so a packet and its directional mirror produce
    /// the same key.
    pub fn canonical(packet: &PacketInfo) -> FlowKey {
        let swap = (packet.source_ip.as_str(), packet.source_port)
            > (packet.dest_ip.as_str(), packet.dest_port);

        if swap {
            FlowKey {
                a_ip:     packet.dest_ip.clone(),
                a_port:   packet.dest_port,
                b_ip:     packet.source_ip.clone(),
                b_port:   packet.source_port,
                protocol: packet.protocol,
            }
        } else {
            FlowKey {
                a_ip:     packet.source_ip.clone(),
                a_port:   packet.source_port,
                b_ip:     packet.dest_ip.clone(),
                b_port:   packet.dest_port,
                protocol: packet.protocol,
            }
        }
    }
}

/// Bidirectional statistics for one flow.
#[derive(Debug, Clone)]
pub struct FlowStats {
    pub packets_sent:     u64,
    pub packets_received: u64,
    pub bytes_sent:       u64,
    pub bytes_received:   u64,
    /// Capture timestamps, microseconds.
    pub first_seen:       u64,
    pub last_seen:        u64,
    /// Endpoint that sent the first observed frame; the "sent" direction.
    pub initiator_ip:     String,
    pub initiator_port:   u16,
    pub protocol_tag:     Option<ProtocolTag>,
    pub protocol_data:    Option<ProtocolData>,
}

impl FlowStats {
    /// Stats for a freshly observed flow; `packet` counts as sent.
    pub fn open(packet: &PacketInfo) -> FlowStats {
        FlowStats {
            packets_sent:     1,
            packets_received: 0,
            bytes_sent:       u64::from(packet.wire_len),
            bytes_received:   0,
            first_seen:       packet.timestamp,
            last_seen:        packet.timestamp,
            initiator_ip:     packet.source_ip.clone(),
            initiator_port:   packet.source_port,
            protocol_tag:     None,
            protocol_data:    None,
        }
    }

    /// Whether `packet` travels in the flow's "sent" direction.
    pub fn is_sent(&self, packet: &PacketInfo) -> bool {
        packet.source_ip == self.initiator_ip && packet.source_port == self.initiator_port
    }

    /// Folds a follow-up packet into the counters.
    pub fn record(&mut self, packet: &PacketInfo) {
        self.last_seen = packet.timestamp;

        if self.is_sent(packet) {
            self.packets_sent += 1;
            self.bytes_sent += u64::from(packet.wire_len);
        } else {
            self.packets_received += 1;
            self.bytes_received += u64::from(packet.wire_len);
        }
    }

    /// Attaches a recognized protocol. Tag and payload are set together
    /// so a flow never carries data without a tag.
    pub fn set_protocol(&mut self, data: ProtocolData) {
        if let Some(tag) = data.tag() {
            self.protocol_tag = Some(tag);
            self.protocol_data = Some(data);
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.bytes_sent + self.bytes_received
    }

    /// The persisted shape of this flow under its canonical key.
    pub fn to_record(&self, key: &FlowKey) -> FlowRecord {
        FlowRecord {
            source_ip:        key.a_ip.clone(),
            source_port:      key.a_port,
            dest_ip:          key.b_ip.clone(),
            dest_port:        key.b_port,
            protocol:         key.protocol,
            bytes_sent:       self.bytes_sent,
            bytes_received:   self.bytes_received,
            packets_sent:     self.packets_sent,
            packets_received: self.packets_received,
            first_seen:       self.first_seen,
            last_seen:        self.last_seen,
        }
    }
}
