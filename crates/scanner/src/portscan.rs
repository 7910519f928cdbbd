//! Bounded-concurrency TCP connect scan.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Semaphore};
use tokio::time;

pub const DEFAULT_PORTS: [u16; 20] = [
    21, 22, 23, 25, 53, 80, 110, 135, 139, 143, 443, 445, 993, 995, 1433, 3306, 3389, 5432, 5900,
    8080,
];

#[derive(Debug, Clone)]
pub struct PortScanResult {
    pub open_ports: Vec<u16>,
    pub ports_scanned: u64,
}

pub async fn scan_ports(address: IpAddr, ports: &[u16], timeout_ms: u64, concurrency: usize) -> PortScanResult {
    let sem = Arc::new(Semaphore::new(concurrency.clamp(1, 200)));
    let open = Arc::new(Mutex::new(Vec::new()));
    let scanned = Arc::new(AtomicU64::new(0));
    let timeout = Duration::from_millis(timeout_ms);
    let mut join_set = tokio::task::JoinSet::new();

    for &port in ports {
        let permit = sem.clone().acquire_owned().await.expect("semaphore never closed");
        let open = open.clone();
        let scanned = scanned.clone();
        join_set.spawn(async move {
            let _permit = permit;
            let addr = SocketAddr::new(address, port);
            if let Ok(Ok(_)) = time::timeout(timeout, TcpStream::connect(addr)).await {
                open.lock().await.push(port);
            }
            scanned.fetch_add(1, Ordering::Relaxed);
        });
    }

    while join_set.join_next().await.is_some() {}

    let mut open_ports = Arc::try_unwrap(open).map(Mutex::into_inner).unwrap_or_default();
    open_ports.sort_unstable();
    open_ports.dedup();

    PortScanResult { open_ports, ports_scanned: scanned.load(Ordering::Relaxed) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closed_local_port_is_reported_non_open() {
        let result = scan_ports("127.0.0.1".parse().unwrap(), &[1], 200, 4).await;
        assert!(result.open_ports.is_empty());
        assert_eq!(result.ports_scanned, 1);
    }

    #[tokio::test]
    async fn open_listener_is_reported_sorted_and_unique() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                if listener.accept().await.is_err() {
                    break;
                }
            }
        });
        let result = scan_ports("127.0.0.1".parse().unwrap(), &[port, port], 500, 4).await;
        assert_eq!(result.open_ports, vec![port]);
    }
}
