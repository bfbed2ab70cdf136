//! Application-protocol recognition.
//!
//! Recognizers are stateless, side-effect-free functions from a packet to
//! an optional [`ProtocolData`]. They run as an ordered chain; the first
//! recognizer that returns `Some` wins and later ones are not consulted.

mod dns;
mod http;
mod tls;

pub use dns::DnsData;
pub use http::HttpData;
pub use tls::TlsData;

use crate::capture::decoder::PacketInfo;
use serde::Serialize;

/// Which recognizer claimed a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProtocolTag {
    Http,
    Dns,
    Tls,
}

/// Parsed application-protocol details, tagged by recognizer.
#[derive(Debug, Clone, Serialize)]
pub enum ProtocolData {
    Http(HttpData),
    Dns(DnsData),
    Tls(TlsData),
    Unknown,
}

impl ProtocolData {
    /// The tag matching this payload; `Unknown` carries none.
    pub fn tag(&self) -> Option<ProtocolTag> {
        match self {
            ProtocolData::Http(_) => Some(ProtocolTag::Http),
            ProtocolData::Dns(_) => Some(ProtocolTag::Dns),
            ProtocolData::Tls(_) => Some(ProtocolTag::Tls),
            ProtocolData::Unknown => None,
        }
    }
}

/// The members of the recognizer chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recognizer {
    Http,
    Dns,
    Tls,
}

impl Recognizer {
    /// Attempts to recognize `packet`. Pure: the result depends only on
    /// the packet.
    pub fn parse(&self, packet: &PacketInfo) -> Option<ProtocolData> {
        match self {
            Recognizer::Http => http::parse(packet),
            Recognizer::Dns => dns::parse(packet),
            Recognizer::Tls => tls::parse(packet),
        }
    }
}

/// Stable recognizer order; HTTP is consulted first, then DNS, then TLS.
pub const RECOGNIZER_CHAIN: [Recognizer; 3] =
    [Recognizer::Http, Recognizer::Dns, Recognizer::Tls];

/// Runs the chain over one packet.
pub fn recognize(packet: &PacketInfo) -> Option<ProtocolData> {
    RECOGNIZER_CHAIN.iter().find_map(|r| r.parse(packet))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::decoder::{PROTO_TCP, PROTO_UDP};
    use crate::testutil::{client_hello_with_sni, packet};

    #[test]
    fn chain_order_is_http_dns_tls() {
        assert_eq!(
            RECOGNIZER_CHAIN,
            [Recognizer::Http, Recognizer::Dns, Recognizer::Tls]
        );
    }

    #[test]
    fn recognition_is_deterministic() {
        let pkt = packet(
            "10.0.0.5", 50001, "8.8.8.8", 53, PROTO_UDP,
            &[0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
            1,
        );

        for _ in 0..3 {
            match recognize(&pkt) {
                Some(ProtocolData::Dns(dns)) => assert_eq!(dns.transaction_id, 0x1234),
                other => panic!("expected DNS recognition, got {:?}", other),
            }
        }
    }

    #[test]
    fn unmatched_packet_yields_none() {
        let pkt = packet("10.0.0.1", 40000, "10.0.0.2", 40001, PROTO_TCP, b"opaque", 1);
        assert!(recognize(&pkt).is_none());
    }

    #[test]
    fn tls_claims_handshake_traffic() {
        let hello = client_hello_with_sni("api.example.org");
        let pkt = packet("10.0.0.5", 40000, "1.2.3.4", 443, PROTO_TCP, &hello, 1);

        match recognize(&pkt) {
            Some(ProtocolData::Tls(tls)) => {
                assert_eq!(tls.server_name.as_deref(), Some("api.example.org"))
            }
            other => panic!("expected TLS recognition, got {:?}", other),
        }
    }
}
