//! DNS recognizer.
//!
//! Matches UDP or TCP with either port equal to 53 and extracts the
//! fixed 12-byte header fields. Question and answer bodies are not
//! parsed here.

use super::ProtocolData;
use crate::capture::decoder::{PacketInfo, PROTO_TCP, PROTO_UDP};
use serde::Serialize;

const DNS_PORT: u16 = 53;
const HEADER_LEN: usize = 12;

#[derive(Debug, Clone, Serialize)]
pub struct DnsData {
    pub transaction_id: u16,
    /// QR bit clear means query, set means response.
    pub is_query:       bool,
}

pub(super) fn parse(packet: &PacketInfo) -> Option<ProtocolData> {
    let transport_ok = packet.protocol == PROTO_UDP || packet.protocol == PROTO_TCP;
    let port_ok = packet.source_port == DNS_PORT || packet.dest_port == DNS_PORT;
    if !transport_ok || !port_ok {
        return None;
    }

    // A payload shorter than the fixed header is not recognizable DNS.
    if packet.payload.len() < HEADER_LEN {
        return None;
    }

    let transaction_id = u16::from_be_bytes([packet.payload[0], packet.payload[1]]);
    let flags = u16::from_be_bytes([packet.payload[2], packet.payload[3]]);

    Some(ProtocolData::Dns(DnsData {
        transaction_id,
        is_query: flags & 0x8000 == 0,
    }))
}
