//! SSDP/UPnP discovery: an M-SEARCH broadcast over multicast, collecting
//! and deduplicating responses by USN.

use crate::error::DiscoveryError;
use socket2::{Domain, Protocol, Socket, Type};
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::UdpSocket;

const MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
const MULTICAST_PORT: u16 = 1900;

const M_SEARCH: &str = "M-SEARCH * HTTP/1.1\r\n\
HOST: 239.255.255.250:1900\r\n\
MAN: \"ssdp:discover\"\r\n\
MX: 2\r\n\
ST: ssdp:all\r\n\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpnpDevice {
    pub usn: String,
    pub location: Option<String>,
    pub server: Option<String>,
    pub search_target: Option<String>,
}

fn parse_headers(response: &str) -> HashMap<String, String> {
    response
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_uppercase(), v.trim().to_string()))
        .collect()
}

fn bind_socket() -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)).into())?;
    socket.set_nonblocking(true)?;
    UdpSocket::from_std(socket.into())
}

/// Sends one M-SEARCH and collects replies for `scan_duration`,
/// deduplicating by USN.
pub async fn scan(scan_duration: Duration, mut on_device: impl FnMut(&UpnpDevice)) -> Result<Vec<UpnpDevice>, DiscoveryError> {
    let socket = bind_socket().map_err(|e| DiscoveryError::Ssdp(e.to_string()))?;
    let target = SocketAddr::V4(SocketAddrV4::new(MULTICAST_ADDR, MULTICAST_PORT));
    socket
        .send_to(M_SEARCH.as_bytes(), target)
        .await
        .map_err(|e| DiscoveryError::Ssdp(e.to_string()))?;

    let mut seen = std::collections::HashSet::new();
    let mut devices = Vec::new();
    let mut buf = [0u8; 2048];
    let deadline = tokio::time::Instant::now() + scan_duration;

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        match tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await {
            Ok(Ok((n, _from))) => {
                let text = String::from_utf8_lossy(&buf[..n]);
                let headers = parse_headers(&text);
                let Some(usn) = headers.get("USN").cloned() else { continue };
                if !seen.insert(usn.clone()) {
                    continue;
                }
                let device = UpnpDevice {
                    usn,
                    location: headers.get("LOCATION").cloned(),
                    server: headers.get("SERVER").cloned(),
                    search_target: headers.get("ST").cloned(),
                };
                on_device(&device);
                devices.push(device);
            }
            Ok(Err(_)) | Err(_) => break,
        }
    }

    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ssdp_response_headers() {
        let response = "HTTP/1.1 200 OK\r\nUSN: uuid:abc::upnp:rootdevice\r\nLOCATION: http://192.168.1.1:80/desc.xml\r\nSERVER: Linux/1.0 UPnP/1.0\r\nST: upnp:rootdevice\r\n\r\n";
        let headers = parse_headers(response);
        assert_eq!(headers.get("USN").unwrap(), "uuid:abc::upnp:rootdevice");
        assert_eq!(headers.get("LOCATION").unwrap(), "http://192.168.1.1:80/desc.xml");
    }
}
