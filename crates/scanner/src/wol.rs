//! Wake-on-LAN magic packet construction and broadcast.

use crate::error::ScannerError;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, SocketAddrV4};

pub const DEFAULT_WOL_PORT: u16 = 9;
pub const DEFAULT_WOL_BROADCAST: &str = "255.255.255.255";

/// Accepts `XX:XX:XX:XX:XX:XX`, `XX-XX-XX-XX-XX-XX`, or `XXXX.XXXX.XXXX`.
fn parse_mac(mac: &str) -> Result<[u8; 6], ScannerError> {
    let hex: String = mac.chars().filter(|c| c.is_ascii_hexdigit()).collect();
    if hex.len() != 12 {
        return Err(ScannerError::InvalidMac(mac.to_string()));
    }
    let mut bytes = [0u8; 6];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|_| ScannerError::InvalidMac(mac.to_string()))?;
    }
    Ok(bytes)
}

fn build_magic_packet(mac: [u8; 6]) -> [u8; 102] {
    let mut packet = [0xFFu8; 102];
    for i in 0..16 {
        packet[6 + i * 6..6 + i * 6 + 6].copy_from_slice(&mac);
    }
    packet
}

pub async fn wake_on_lan(mac: &str, broadcast: &str, port: u16) -> Result<(), ScannerError> {
    let mac_bytes = parse_mac(mac)?;
    let packet = build_magic_packet(mac_bytes);
    let addr: SocketAddrV4 = format!("{broadcast}:{port}")
        .parse()
        .map_err(|_| ScannerError::Socket(format!("invalid broadcast address: {broadcast}")))?;

    tokio::task::spawn_blocking(move || {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| ScannerError::Socket(e.to_string()))?;
        socket.set_broadcast(true).map_err(|e| ScannerError::Socket(e.to_string()))?;
        socket
            .send_to(&packet, &SocketAddr::V4(addr).into())
            .map_err(|e| ScannerError::Socket(e.to_string()))?;
        Ok::<(), ScannerError>(())
    })
    .await
    .map_err(|e| ScannerError::Socket(e.to_string()))??;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_colon_dash_and_dot_forms() {
        let expected = [0xAAu8, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];
        assert_eq!(parse_mac("AA:BB:CC:DD:EE:FF").unwrap(), expected);
        assert_eq!(parse_mac("AA-BB-CC-DD-EE-FF").unwrap(), expected);
        assert_eq!(parse_mac("AABB.CCDD.EEFF").unwrap(), expected);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(parse_mac("AA:BB:CC").is_err());
    }

    #[test]
    fn magic_packet_shape() {
        let packet = build_magic_packet([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        assert_eq!(packet.len(), 102);
        assert_eq!(&packet[0..6], &[0xFF; 6]);
        assert_eq!(&packet[6..12], &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        assert_eq!(&packet[96..102], &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    }
}
