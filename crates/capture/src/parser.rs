//! Ethernet/IPv4/TCP/UDP/ICMP summarization for captured frames.

use chrono::Utc;
use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::icmp::{IcmpPacket, IcmpTypes};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::tcp::{TcpFlags, TcpPacket};
use pnet::packet::udp::UdpPacket;
use pnet::packet::Packet;

use crate::model::PacketCaptureRecord;

fn tcp_flag_descriptor(flags: u8) -> String {
    let bits: &[(u8, &str)] = &[
        (TcpFlags::SYN as u8, "SYN"),
        (TcpFlags::ACK as u8, "ACK"),
        (TcpFlags::PSH as u8, "PSH"),
        (TcpFlags::RST as u8, "RST"),
        (TcpFlags::FIN as u8, "FIN"),
        (TcpFlags::URG as u8, "URG"),
        (TcpFlags::ECE as u8, "ECE"),
        (TcpFlags::CWR as u8, "CWR"),
        (TcpFlags::NS as u8, "NS"),
    ];
    bits.iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(",")
}

/// Parses one captured Ethernet frame into a summary record. Returns
/// `None` if the frame isn't even a valid Ethernet header.
pub fn parse_frame(id: u64, raw: &[u8]) -> Option<PacketCaptureRecord> {
    let ethernet = EthernetPacket::new(raw)?;
    let s_mac = Some(ethernet.get_source().to_string());
    let d_mac = Some(ethernet.get_destination().to_string());
    let length = raw.len();

    if ethernet.get_ethertype() != EtherTypes::Ipv4 {
        return Some(PacketCaptureRecord {
            id,
            captured_at_utc: Utc::now(),
            source: None,
            destination: None,
            protocol: Some(format!("{:?}", ethernet.get_ethertype())),
            length,
            s_port: None,
            d_port: None,
            s_mac,
            d_mac,
            info: None,
        });
    }

    let ipv4 = match Ipv4Packet::new(ethernet.payload()) {
        Some(p) => p,
        None => {
            return Some(PacketCaptureRecord {
                id,
                captured_at_utc: Utc::now(),
                source: None,
                destination: None,
                protocol: Some("IPv4".to_string()),
                length,
                s_port: None,
                d_port: None,
                s_mac,
                d_mac,
                info: Some("malformed IPv4 header".to_string()),
            })
        }
    };

    let source = Some(ipv4.get_source().to_string());
    let destination = Some(ipv4.get_destination().to_string());

    let (protocol, s_port, d_port, info) = match ipv4.get_next_level_protocol() {
        IpNextHeaderProtocols::Tcp => match TcpPacket::new(ipv4.payload()) {
            Some(tcp) => (
                Some("TCP".to_string()),
                Some(tcp.get_source()),
                Some(tcp.get_destination()),
                Some(tcp_flag_descriptor(tcp.get_flags())),
            ),
            None => (Some("TCP".to_string()), None, None, Some("malformed TCP segment".to_string())),
        },
        IpNextHeaderProtocols::Udp => match UdpPacket::new(ipv4.payload()) {
            Some(udp) => (
                Some("UDP".to_string()),
                Some(udp.get_source()),
                Some(udp.get_destination()),
                Some(format!("len={}", udp.get_length())),
            ),
            None => (Some("UDP".to_string()), None, None, Some("malformed UDP datagram".to_string())),
        },
        IpNextHeaderProtocols::Icmp => match IcmpPacket::new(ipv4.payload()) {
            Some(icmp) => (Some("ICMP".to_string()), None, None, Some(icmp_descriptor(icmp.get_icmp_type()))),
            None => (Some("ICMP".to_string()), None, None, Some("malformed ICMP packet".to_string())),
        },
        other => (Some(format!("{other:?}")), None, None, None),
    };

    Some(PacketCaptureRecord {
        id,
        captured_at_utc: Utc::now(),
        source,
        destination,
        protocol,
        length,
        s_port,
        d_port,
        s_mac,
        d_mac,
        info,
    })
}

fn icmp_descriptor(icmp_type: pnet::packet::icmp::IcmpType) -> String {
    match icmp_type {
        IcmpTypes::EchoRequest => "echo request".to_string(),
        IcmpTypes::EchoReply => "echo reply".to_string(),
        IcmpTypes::DestinationUnreachable => "destination unreachable".to_string(),
        IcmpTypes::TimeExceeded => "time exceeded".to_string(),
        other => format!("type {}", other.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_flag_descriptor_renders_active_flags_only() {
        let flags = (TcpFlags::SYN | TcpFlags::ACK) as u8;
        assert_eq!(tcp_flag_descriptor(flags), "SYN,ACK");
    }

    #[test]
    fn tcp_flag_descriptor_empty_when_no_flags_set() {
        assert_eq!(tcp_flag_descriptor(0), "");
    }

    #[test]
    fn too_short_buffer_fails_to_parse() {
        assert!(parse_frame(1, &[0u8; 4]).is_none());
    }
}
