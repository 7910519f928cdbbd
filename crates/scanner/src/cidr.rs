//! IPv4 CIDR expansion for subnet scans.

use crate::error::ScannerError;
use cidr::Ipv4Cidr;
use std::net::Ipv4Addr;
use std::str::FromStr;

pub const MAX_HOSTS: usize = 65_536;

/// Expands `block` into the list of host addresses to probe.
///
/// For prefixes `>= 24` the network and broadcast addresses are skipped;
/// for shorter prefixes they're included (a /16 network address is a
/// legitimate host-bearing router address in most real deployments).
pub fn expand(block: &str) -> Result<Vec<Ipv4Addr>, ScannerError> {
    let net = Ipv4Cidr::from_str(block).map_err(|_| ScannerError::InvalidCidr(block.to_string()))?;

    let host_count = 1usize << (32 - net.network_length() as u32);
    if host_count > MAX_HOSTS {
        return Err(ScannerError::CidrTooLarge(host_count));
    }

    let skip_edges = net.network_length() >= 24 && host_count > 2;
    let all: Vec<Ipv4Addr> = net.iter().map(|inet| inet.address()).collect();

    if skip_edges {
        Ok(all[1..all.len() - 1].to_vec())
    } else {
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_24_skips_network_and_broadcast() {
        let hosts = expand("192.168.1.0/24").unwrap();
        assert_eq!(hosts.len(), 254);
        assert!(!hosts.contains(&"192.168.1.0".parse().unwrap()));
        assert!(!hosts.contains(&"192.168.1.255".parse().unwrap()));
    }

    #[test]
    fn slash_30_skips_network_and_broadcast() {
        let hosts = expand("10.0.0.0/30").unwrap();
        assert_eq!(hosts.len(), 2);
        assert!(!hosts.contains(&"10.0.0.0".parse().unwrap()));
        assert!(!hosts.contains(&"10.0.0.3".parse().unwrap()));
        assert!(hosts.contains(&"10.0.0.1".parse().unwrap()));
        assert!(hosts.contains(&"10.0.0.2".parse().unwrap()));
    }

    #[test]
    fn rejects_malformed_cidr() {
        assert!(matches!(expand("not-a-cidr"), Err(ScannerError::InvalidCidr(_))));
    }

    #[test]
    fn rejects_blocks_larger_than_slash_16() {
        assert!(matches!(expand("10.0.0.0/15"), Err(ScannerError::CidrTooLarge(_))));
    }

    #[test]
    fn slash_16_is_the_largest_allowed() {
        let hosts = expand("10.0.0.0/16").unwrap();
        assert_eq!(hosts.len(), MAX_HOSTS - 2);
    }
}
