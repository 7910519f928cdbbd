//! Shared ICMP echo engine used by both `ping` and `traceroute`.
//!
//! `pnet`'s transport channels are blocking, so each probe runs on a
//! blocking-pool thread via `spawn_blocking` and reports back over a
//! oneshot channel — the async call site never touches a raw socket.

use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{IcmpPacket, IcmpTypes};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::Packet;
use pnet::transport::{icmp_packet_iter, transport_channel, TransportChannelType, TransportSender};
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpOutcome {
    EchoReply { from: Ipv4Addr },
    TtlExpired { from: Ipv4Addr },
    DestinationUnreachable { from: Ipv4Addr },
    TimedOut,
    Error,
}

#[derive(Debug, Clone, Copy)]
pub struct IcmpProbeResult {
    pub outcome: IcmpOutcome,
    pub elapsed: Duration,
}

const ECHO_PAYLOAD: &[u8] = b"manlab-icmp-probe";

/// Sends a single ICMP echo request with the given TTL and blocks (on a
/// blocking-pool thread) until a reply, an ICMP error, or `timeout`.
pub async fn probe(dest: Ipv4Addr, ttl: u8, ident: u16, seq: u16, timeout: Duration) -> IcmpProbeResult {
    tokio::task::spawn_blocking(move || probe_blocking(dest, ttl, ident, seq, timeout))
        .await
        .unwrap_or(IcmpProbeResult { outcome: IcmpOutcome::Error, elapsed: Duration::ZERO })
}

fn probe_blocking(dest: Ipv4Addr, ttl: u8, ident: u16, seq: u16, timeout: Duration) -> IcmpProbeResult {
    let protocol = TransportChannelType::Layer4(pnet::transport::TransportProtocol::Ipv4(
        IpNextHeaderProtocols::Icmp,
    ));
    let (mut tx, mut rx) = match transport_channel(4096, protocol) {
        Ok(pair) => pair,
        Err(_) => return IcmpProbeResult { outcome: IcmpOutcome::Error, elapsed: Duration::ZERO },
    };

    if set_ttl(&mut tx, ttl).is_err() {
        return IcmpProbeResult { outcome: IcmpOutcome::Error, elapsed: Duration::ZERO };
    }

    let mut buf = [0u8; 64];
    let mut packet = match MutableEchoRequestPacket::new(&mut buf) {
        Some(p) => p,
        None => return IcmpProbeResult { outcome: IcmpOutcome::Error, elapsed: Duration::ZERO },
    };
    packet.set_icmp_type(IcmpTypes::EchoRequest);
    packet.set_identifier(ident);
    packet.set_sequence_number(seq);
    packet.set_payload(ECHO_PAYLOAD);
    let checksum = pnet::util::checksum(packet.packet(), 1);
    packet.set_checksum(checksum);

    let start = Instant::now();
    if tx.send_to(packet, IpAddr::V4(dest)).is_err() {
        return IcmpProbeResult { outcome: IcmpOutcome::Error, elapsed: start.elapsed() };
    }

    let mut iter = icmp_packet_iter(&mut rx);
    loop {
        let remaining = timeout.checked_sub(start.elapsed()).unwrap_or(Duration::ZERO);
        if remaining.is_zero() {
            return IcmpProbeResult { outcome: IcmpOutcome::TimedOut, elapsed: start.elapsed() };
        }
        match iter.next_with_timeout(remaining) {
            Ok(Some((packet, addr))) => {
                let from = match addr {
                    IpAddr::V4(v4) => v4,
                    IpAddr::V6(_) => continue,
                };
                match classify(&packet, ident, seq, from) {
                    Some(outcome) => return IcmpProbeResult { outcome, elapsed: start.elapsed() },
                    None => continue,
                }
            }
            Ok(None) => return IcmpProbeResult { outcome: IcmpOutcome::TimedOut, elapsed: start.elapsed() },
            Err(_) => return IcmpProbeResult { outcome: IcmpOutcome::Error, elapsed: start.elapsed() },
        }
    }
}

fn classify(packet: &IcmpPacket, ident: u16, seq: u16, from: Ipv4Addr) -> Option<IcmpOutcome> {
    match packet.get_icmp_type() {
        IcmpTypes::EchoReply => {
            let reply = EchoReplyPacket::new(packet.packet())?;
            if reply.get_identifier() == ident && reply.get_sequence_number() == seq {
                Some(IcmpOutcome::EchoReply { from })
            } else {
                None
            }
        }
        IcmpTypes::TimeExceeded => Some(IcmpOutcome::TtlExpired { from }),
        IcmpTypes::DestinationUnreachable => Some(IcmpOutcome::DestinationUnreachable { from }),
        _ => None,
    }
}

fn set_ttl(tx: &mut TransportSender, ttl: u8) -> std::io::Result<()> {
    tx.set_ttl(ttl)
}
