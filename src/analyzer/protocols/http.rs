//! HTTP recognizer.
//!
//! Matches TCP traffic with a source or destination port in {80, 8080}.
//! The destination port decides the direction: toward a listed port is a
//! request, from one is a response. Only the start line and the header
//! block up to the first blank line are parsed; bodies are ignored.

use super::ProtocolData;
use crate::capture::decoder::{PacketInfo, PROTO_TCP};
use serde::Serialize;
use std::collections::HashMap;

const HTTP_PORTS: [u16; 2] = [80, 8080];

/// Methods accepted in a request start line.
const METHODS: [&str; 9] = [
    "GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH", "CONNECT", "TRACE",
];

/// Smaller payloads cannot hold a meaningful start line.
const MIN_PAYLOAD: usize = 16;

#[derive(Debug, Clone, Serialize)]
pub struct HttpData {
    pub is_request: bool,
    pub method:     String,
    pub uri:        String,
    pub version:    String,
    /// Response status code; zero for requests or unparseable lines.
    pub status:     u16,
    /// Header names keep their original case; leading whitespace is
    /// stripped from values.
    pub headers:    HashMap<String, String>,
}

pub(super) fn parse(packet: &PacketInfo) -> Option<ProtocolData> {
    if packet.protocol != PROTO_TCP || packet.payload.len() < MIN_PAYLOAD {
        return None;
    }

    let data = if HTTP_PORTS.contains(&packet.source_port) {
        parse_response(&packet.payload)?
    } else if HTTP_PORTS.contains(&packet.dest_port) {
        parse_request(&packet.payload)?
    } else {
        return None;
    };

    Some(ProtocolData::Http(data))
}

/// `METHOD SP URI SP VERSION` plus headers.
fn parse_request(payload: &[u8]) -> Option<HttpData> {
    let text = String::from_utf8_lossy(payload);
    let head = header_block(&text);
    let (start_line, rest) = head.split_once("\r\n").unwrap_or((head, ""));

    let mut parts = start_line.splitn(3, ' ');
    let method = parts.next()?;
    let uri = parts.next()?;
    let version = parts.next()?;

    if !METHODS.contains(&method) {
        return None;
    }

    Some(HttpData {
        is_request: true,
        method:     method.to_string(),
        uri:        uri.to_string(),
        version:    version.to_string(),
        status:     0,
        headers:    parse_headers(rest),
    })
}

/// `VERSION SP STATUS SP REASON` plus headers.
fn parse_response(payload: &[u8]) -> Option<HttpData> {
    let text = String::from_utf8_lossy(payload);
    let head = header_block(&text);
    let (status_line, rest) = head.split_once("\r\n").unwrap_or((head, ""));

    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next()?;
    if !version.starts_with("HTTP/") {
        return None;
    }

    let status = parts
        .next()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);

    Some(HttpData {
        is_request: false,
        method:     String::new(),
        uri:        String::new(),
        version:    version.to_string(),
        status,
        headers:    parse_headers(rest),
    })
}

/// Everything before the first blank line, or the whole text if the
/// packet was cut before the header terminator.
fn header_block(text: &str) -> &str {
    match text.find("\r\n\r\n") {
        Some(end) => &text[..end],
        None => text,
    }
}

/// `Name: Value` lines. Names keep their case; values lose leading
/// spaces and tabs. Lines without a colon are skipped.
fn parse_headers(block: &str) -> HashMap<String, String> {
    let mut headers = HashMap::new();

    for line in block.split("\r\n") {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(
                name.to_string(),
                value.trim_start_matches([' ', '\t']).to_string(),
            );
        }
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::super::ProtocolData;
    use super::*;
    use crate::testutil::packet;

    const REQUEST: &[u8] = b"GET /index.html HTTP/1.1\r\nHost: example.com\r\nUser-Agent: curl/8.0\r\n\r\n";

    fn http(pkt: &PacketInfo) -> Option<HttpData> {
        match parse(pkt) {
            Some(ProtocolData::Http(data)) => Some(data),
            _ => None,
        }
    }

    #[test]
    fn request_toward_port_80() {
        let pkt = packet("10.0.0.5", 54321, "93.184.216.34", 80, PROTO_TCP, REQUEST, 1);
        let data = http(&pkt).expect("request recognized");

        assert!(data.is_request);
        assert_eq!(data.method, "GET");
        assert_eq!(data.uri, "/index.html");
        assert_eq!(data.version, "HTTP/1.1");
        assert_eq!(data.headers.get("Host").map(String::as_str), Some("example.com"));
        assert_eq!(data.headers.get("User-Agent").map(String::as_str), Some("curl/8.0"));
    }

    #[test]
    fn response_from_port_8080() {
        let payload = b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n";
        let pkt = packet("10.0.0.9", 8080, "10.0.0.5", 54321, PROTO_TCP, payload, 1);
        let data = http(&pkt).expect("response recognized");

        assert!(!data.is_request);
        assert_eq!(data.status, 404);
        assert_eq!(data.version, "HTTP/1.1");
        assert_eq!(data.headers.get("Content-Length").map(String::as_str), Some("0"));
    }

    #[test]
    fn header_values_lose_leading_whitespace_only() {
        let payload = b"GET / HTTP/1.1\r\nX-Padded: \t  spaced value \r\n\r\n";
        let pkt = packet("10.0.0.5", 54321, "1.2.3.4", 80, PROTO_TCP, payload, 1);
        let data = http(&pkt).unwrap();

        assert_eq!(
            data.headers.get("X-Padded").map(String::as_str),
            Some("spaced value ")
        );
    }

    #[test]
    fn unknown_method_is_not_http() {
        let pkt = packet("10.0.0.5", 54321, "1.2.3.4", 80, PROTO_TCP, b"BREW /pot HTTP/1.1\r\n\r\n", 1);
        assert!(http(&pkt).is_none());
    }

    #[test]
    fn other_ports_are_ignored() {
        let pkt = packet("10.0.0.5", 54321, "1.2.3.4", 8081, PROTO_TCP, REQUEST, 1);
        assert!(http(&pkt).is_none());
    }

    #[test]
    fn udp_is_ignored() {
        let pkt = packet("10.0.0.5", 54321, "1.2.3.4", 80, 17, REQUEST, 1);
        assert!(http(&pkt).is_none());
    }
}
