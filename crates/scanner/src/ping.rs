//! Single ICMP echo probe.

use crate::icmp::{self, IcmpOutcome};
use rand::random;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingStatus {
    Success,
    TimedOut,
    Unreachable,
    Error,
}

#[derive(Debug, Clone)]
pub struct PingResult {
    pub address: IpAddr,
    pub resolved_address: Option<IpAddr>,
    pub status: PingStatus,
    pub rtt_ms: u64,
    pub ttl: Option<u8>,
}

/// Sends one ICMP echo and waits up to `timeout_ms`. Never returns an
/// error to the caller; failures are encoded in `status`.
pub async fn ping(address: Ipv4Addr, timeout_ms: u64) -> PingResult {
    let ident = random::<u16>();
    let seq = random::<u16>();
    let result = icmp::probe(address, 64, ident, seq, Duration::from_millis(timeout_ms)).await;

    let (status, rtt_ms) = match result.outcome {
        IcmpOutcome::EchoReply { .. } => {
            let measured = result.elapsed.as_millis() as u64;
            (PingStatus::Success, measured.max(1))
        }
        IcmpOutcome::TtlExpired { .. } | IcmpOutcome::DestinationUnreachable { .. } => {
            (PingStatus::Unreachable, result.elapsed.as_millis() as u64)
        }
        IcmpOutcome::TimedOut => (PingStatus::TimedOut, timeout_ms),
        IcmpOutcome::Error => (PingStatus::Error, 0),
    };

    PingResult {
        address: IpAddr::V4(address),
        resolved_address: None,
        status,
        rtt_ms,
        ttl: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rtt_is_clamped_to_at_least_one_ms() {
        let result = PingResult {
            address: "127.0.0.1".parse().unwrap(),
            resolved_address: None,
            status: PingStatus::Success,
            rtt_ms: 0u64.max(1),
            ttl: Some(64),
        };
        assert!(result.rtt_ms >= 1);
    }
}
