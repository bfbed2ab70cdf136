//! TLS recognizer.
//!
//! Matches TCP payloads that look like a TLS record: content type in
//! [20, 23] and a plausible protocol version. Handshake records are
//! inspected one level deeper; for a ClientHello the parser walks the
//! fixed header, session id, cipher suites, and compression methods to
//! reach the extensions, then scans them for the server_name extension
//! and lifts out the first host_name entry.
//!
//! Malformed or truncated records degrade gracefully: the base record
//! fields are still reported, just without an SNI.

use super::ProtocolData;
use crate::capture::decoder::{PacketInfo, PROTO_TCP};
use serde::Serialize;

/// TLS record content types: change_cipher_spec through application_data.
const CONTENT_TYPE_RANGE: std::ops::RangeInclusive<u8> = 20..=23;
const CONTENT_TYPE_HANDSHAKE: u8 = 22;

const HANDSHAKE_CLIENT_HELLO: u8 = 1;
const HANDSHAKE_SERVER_HELLO: u8 = 2;

/// server_name extension type.
const EXT_SERVER_NAME: u16 = 0;

#[derive(Debug, Clone, Serialize)]
pub struct TlsData {
    pub content_type:    u8,
    pub version:         u16,
    pub is_handshake:    bool,
    pub is_client_hello: bool,
    pub is_server_hello: bool,
    pub server_name:     Option<String>,
}

pub(super) fn parse(packet: &PacketInfo) -> Option<ProtocolData> {
    if packet.protocol != PROTO_TCP {
        return None;
    }

    let data = &packet.payload;
    if data.len() < 5 {
        return None;
    }

    let content_type = data[0];
    let version = u16::from_be_bytes([data[1], data[2]]);

    let version_ok = (0x0300..=0x0304).contains(&version) || version == 0x0100;
    if !CONTENT_TYPE_RANGE.contains(&content_type) || !version_ok {
        return None;
    }

    let mut tls = TlsData {
        content_type,
        version,
        is_handshake: content_type == CONTENT_TYPE_HANDSHAKE,
        is_client_hello: false,
        is_server_hello: false,
        server_name: None,
    };

    if tls.is_handshake && data.len() >= 6 {
        let handshake_type = data[5];
        tls.is_client_hello = handshake_type == HANDSHAKE_CLIENT_HELLO;
        tls.is_server_hello = handshake_type == HANDSHAKE_SERVER_HELLO;

        if tls.is_client_hello {
            tls.server_name = client_hello_sni(data);
        }
    }

    Some(ProtocolData::Tls(tls))
}

/// Walks a ClientHello to its extensions and extracts the SNI.
///
/// Offsets: record header (5) + handshake header (4) + client version (2)
/// + random (32) put the session id length at byte 43. Any bound failure
/// along the walk returns `None` and the caller reports the record
/// without a server name.
fn client_hello_sni(data: &[u8]) -> Option<String> {
    let session_id_len = *data.get(43)? as usize;
    let mut offset = 44 + session_id_len;

    let cipher_suites_len = read_u16(data, offset)? as usize;
    offset += 2 + cipher_suites_len;

    let compression_len = *data.get(offset)? as usize;
    offset += 1 + compression_len;

    let extensions_len = read_u16(data, offset)? as usize;
    offset += 2;

    extract_server_name(data, offset, extensions_len)
}

/// Scans the extension list for server_name and returns the first
/// host_name (name type 0) entry.
fn extract_server_name(data: &[u8], offset: usize, length: usize) -> Option<String> {
    let end = offset.checked_add(length)?;
    let mut pos = offset;

    while pos + 4 <= end {
        let ext_type = read_u16(data, pos)?;
        let ext_len = read_u16(data, pos + 2)? as usize;
        pos += 4;

        if ext_type == EXT_SERVER_NAME && pos + ext_len <= end && ext_len > 2 {
            let list_len = read_u16(data, pos)? as usize;
            let mut entry = pos + 2;

            if list_len > 3 && entry + list_len <= end {
                let name_type = *data.get(entry)?;
                let name_len = read_u16(data, entry + 1)? as usize;
                entry += 3;

                if name_type == 0 && entry + name_len <= end {
                    let raw = data.get(entry..entry + name_len)?;
                    return std::str::from_utf8(raw).ok().map(|s| s.to_string());
                }
            }
        }

        pos += ext_len;
    }

    None
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{client_hello_with_sni, packet};

    fn tls(pkt: &PacketInfo) -> Option<TlsData> {
        match parse(pkt) {
            Some(ProtocolData::Tls(data)) => Some(data),
            _ => None,
        }
    }

    #[test]
    fn client_hello_yields_sni() {
        let hello = client_hello_with_sni("api.example.org");
        let pkt = packet("10.0.0.5", 40000, "1.2.3.4", 443, PROTO_TCP, &hello, 1);
        let data = tls(&pkt).expect("handshake recognized");

        assert_eq!(data.content_type, 22);
        assert!(data.is_handshake);
        assert!(data.is_client_hello);
        assert!(!data.is_server_hello);
        assert_eq!(data.server_name.as_deref(), Some("api.example.org"));
    }

    #[test]
    fn server_hello_is_marked() {
        let mut record = vec![22, 0x03, 0x03, 0x00, 0x04];
        record.extend_from_slice(&[0x02, 0x00, 0x00, 0x00]);
        let pkt = packet("1.2.3.4", 443, "10.0.0.5", 40000, PROTO_TCP, &record, 1);
        let data = tls(&pkt).unwrap();

        assert!(data.is_handshake);
        assert!(data.is_server_hello);
        assert!(data.server_name.is_none());
    }

    #[test]
    fn application_data_record_is_recognized() {
        let record = [23, 0x03, 0x03, 0x00, 0x02, 0xde, 0xad];
        let pkt = packet("10.0.0.5", 40000, "1.2.3.4", 443, PROTO_TCP, &record, 1);
        let data = tls(&pkt).unwrap();

        assert_eq!(data.content_type, 23);
        assert!(!data.is_handshake);
    }

    #[test]
    fn truncated_client_hello_keeps_base_fields() {
        let hello = client_hello_with_sni("api.example.org");
        let cut = &hello[..40];
        let pkt = packet("10.0.0.5", 40000, "1.2.3.4", 443, PROTO_TCP, cut, 1);
        let data = tls(&pkt).expect("record header still parses");

        assert!(data.is_client_hello);
        assert!(data.server_name.is_none());
    }

    #[test]
    fn wrong_version_is_not_tls() {
        let record = [22, 0x07, 0x07, 0x00, 0x00];
        let pkt = packet("10.0.0.5", 40000, "1.2.3.4", 443, PROTO_TCP, &record, 1);
        assert!(tls(&pkt).is_none());
    }

    #[test]
    fn udp_is_ignored() {
        let hello = client_hello_with_sni("api.example.org");
        let pkt = packet("10.0.0.5", 40000, "1.2.3.4", 443, 17, &hello, 1);
        assert!(tls(&pkt).is_none());
    }
}
