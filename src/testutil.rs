//! Synthetic packet builders shared by unit and integration tests.
//!
//! Frames are well-formed enough for header slicing; checksums are left
//! zero since nothing on the decode path verifies them.

use crate::capture::decoder::{PacketInfo, PROTO_TCP, PROTO_UDP};
use std::net::Ipv4Addr;

fn ipv4_octets(addr: &str) -> [u8; 4] {
    addr.parse::<Ipv4Addr>().expect("valid IPv4 literal").octets()
}

/// Ethernet II + IPv4 + TCP frame around `payload`.
pub fn tcp_frame(src_ip: &str, src_port: u16, dst_ip: &str, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = ethernet_ipv4_header(src_ip, dst_ip, PROTO_TCP, 20 + payload.len());

    // TCP header, 20 bytes, data offset 5, ACK flag set.
    frame.extend_from_slice(&src_port.to_be_bytes());
    frame.extend_from_slice(&dst_port.to_be_bytes());
    frame.extend_from_slice(&[0, 0, 0, 1]); // sequence number
    frame.extend_from_slice(&[0, 0, 0, 0]); // acknowledgment number
    frame.push(0x50); // data offset
    frame.push(0x10); // flags: ACK
    frame.extend_from_slice(&[0x20, 0x00]); // window
    frame.extend_from_slice(&[0, 0]); // checksum
    frame.extend_from_slice(&[0, 0]); // urgent pointer

    frame.extend_from_slice(payload);
    frame
}

/// Ethernet II + IPv4 + UDP frame around `payload`.
pub fn udp_frame(src_ip: &str, src_port: u16, dst_ip: &str, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = ethernet_ipv4_header(src_ip, dst_ip, PROTO_UDP, 8 + payload.len());

    frame.extend_from_slice(&src_port.to_be_bytes());
    frame.extend_from_slice(&dst_port.to_be_bytes());
    frame.extend_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
    frame.extend_from_slice(&[0, 0]); // checksum

    frame.extend_from_slice(payload);
    frame
}

/// Ethernet header plus a 20-byte IPv4 header with the given payload size.
fn ethernet_ipv4_header(src_ip: &str, dst_ip: &str, protocol: u8, l4_len: usize) -> Vec<u8> {
    let mut frame = Vec::with_capacity(14 + 20 + l4_len);

    // Ethernet II: destination MAC, source MAC, ethertype 0x0800.
    frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
    frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x02]);
    frame.extend_from_slice(&[0x08, 0x00]);

    // IPv4, IHL 5, no options.
    let total_len = (20 + l4_len) as u16;
    frame.push(0x45);
    frame.push(0x00);
    frame.extend_from_slice(&total_len.to_be_bytes());
    frame.extend_from_slice(&[0, 0, 0, 0]); // identification + flags/fragment
    frame.push(64); // TTL
    frame.push(protocol);
    frame.extend_from_slice(&[0, 0]); // header checksum
    frame.extend_from_slice(&ipv4_octets(src_ip));
    frame.extend_from_slice(&ipv4_octets(dst_ip));

    frame
}

/// A [`PacketInfo`] built directly, skipping the decoder.
pub fn packet(
    src_ip: &str,
    src_port: u16,
    dst_ip: &str,
    dst_port: u16,
    protocol: u8,
    payload: &[u8],
    timestamp: u64,
) -> PacketInfo {
    PacketInfo {
        timestamp,
        wire_len: (14 + 20 + 20 + payload.len()) as u32,
        source_ip: src_ip.to_string(),
        dest_ip: dst_ip.to_string(),
        source_port: src_port,
        dest_port: dst_port,
        protocol,
        payload: payload.to_vec(),
    }
}

/// A minimal TLS ClientHello record carrying an SNI extension.
///
/// The handshake length fields are filled to match the built record so
/// the extension walk lands on the server name.
pub fn client_hello_with_sni(host: &str) -> Vec<u8> {
    let name = host.as_bytes();

    // SNI extension: list length, name type 0, name length, name.
    let mut sni_ext = Vec::new();
    sni_ext.extend_from_slice(&((name.len() + 3) as u16).to_be_bytes());
    sni_ext.push(0x00);
    sni_ext.extend_from_slice(&(name.len() as u16).to_be_bytes());
    sni_ext.extend_from_slice(name);

    let mut extensions = Vec::new();
    extensions.extend_from_slice(&[0x00, 0x00]); // extension type: server_name
    extensions.extend_from_slice(&(sni_ext.len() as u16).to_be_bytes());
    extensions.extend_from_slice(&sni_ext);

    // ClientHello body: version, random, session id, cipher suites,
    // compression methods, extensions.
    let mut body = Vec::new();
    body.extend_from_slice(&[0x03, 0x03]); // client_version TLS 1.2
    body.extend_from_slice(&[0u8; 32]); // random
    body.push(0); // session_id length
    body.extend_from_slice(&[0x00, 0x02, 0x13, 0x01]); // one cipher suite
    body.extend_from_slice(&[0x01, 0x00]); // one compression method: null
    body.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
    body.extend_from_slice(&extensions);

    // Handshake header: type 1 (ClientHello) + 24-bit length.
    let mut handshake = Vec::new();
    handshake.push(0x01);
    let len = body.len() as u32;
    handshake.extend_from_slice(&len.to_be_bytes()[1..]);
    handshake.extend_from_slice(&body);

    // TLS record header: content type 22, version, length.
    let mut record = Vec::new();
    record.push(22);
    record.extend_from_slice(&[0x03, 0x01]);
    record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
    record.extend_from_slice(&handshake);

    record
}
