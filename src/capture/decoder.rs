//! Frame decoder: raw link-layer bytes into [`PacketInfo`].
//!
//! Handles Ethernet II, IPv4 with variable IHL, and TCP/UDP port
//! extraction. Anything else is decoded to the extent possible: ports are
//! zero for other transports and non-IPv4 frames are rejected outright.
//! Decode failures are dropped by the caller with a counter increment and
//! never propagate further.

use crate::error::DecodeError;
use etherparse::{InternetSlice, SlicedPacket, TransportSlice};

/// IANA protocol numbers the analyzer cares about.
pub const PROTO_TCP: u8 = 6;
pub const PROTO_UDP: u8 = 17;

/// One decoded frame. Immutable after the decoder produces it.
#[derive(Debug, Clone)]
pub struct PacketInfo {
    /// Capture timestamp, microseconds of wall-clock time.
    pub timestamp:   u64,
    /// Length on the wire, which may exceed the captured length.
    pub wire_len:    u32,
    pub source_ip:   String,
    pub dest_ip:     String,
    /// Zero when the transport has no port concept.
    pub source_port: u16,
    pub dest_port:   u16,
    /// IPv4 protocol number.
    pub protocol:    u8,
    /// Application payload bytes handed to the protocol recognizers.
    pub payload:     Vec<u8>,
}

/// Decodes a captured frame.
///
/// # Arguments
/// * `data`      - Raw frame bytes starting at the Ethernet header.
/// * `wire_len`  - Original length on the wire.
/// * `timestamp` - Capture time in microseconds.
///
/// # Errors
/// `DecodeError::Truncated` when the frame ends before a required header
/// offset, `DecodeError::NotIpv4` for other network layers.
pub fn decode_frame(data: &[u8], wire_len: u32, timestamp: u64) -> Result<PacketInfo, DecodeError> {
    let sliced = SlicedPacket::from_ethernet(data).map_err(|_| DecodeError::Truncated)?;

    let (source_ip, dest_ip, protocol) = match sliced.ip {
        Some(InternetSlice::Ipv4(ref header, _)) => (
            header.source_addr().to_string(),
            header.destination_addr().to_string(),
            header.protocol(),
        ),
        _ => return Err(DecodeError::NotIpv4),
    };

    let (source_port, dest_port) = match sliced.transport {
        Some(TransportSlice::Tcp(ref tcp)) => (tcp.source_port(), tcp.destination_port()),
        Some(TransportSlice::Udp(ref udp)) => (udp.source_port(), udp.destination_port()),
        _ => (0, 0),
    };

    Ok(PacketInfo {
        timestamp,
        wire_len,
        source_ip,
        dest_ip,
        source_port,
        dest_port,
        protocol,
        payload: sliced.payload.to_vec(),
    })
}
