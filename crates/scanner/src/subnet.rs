//! CIDR sweep: a ping pool feeds basic hosts out immediately, a smaller
//! enrichment pool re-emits each host once hostname/MAC/vendor resolve.

use crate::cidr;
use crate::error::ScannerError;
use crate::ping::{ping, PingStatus};
use chrono::{DateTime, Utc};
use manlab_adapters::{ArpAdapter, OuiAdapter};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredHost {
    pub ip_address: IpAddr,
    pub roundtrip_ms: u64,
    pub hostname: Option<String>,
    pub mac_address: Option<String>,
    pub vendor: Option<String>,
    pub device_type: Option<String>,
    pub discovered_at: DateTime<Utc>,
}

pub struct SubnetScanOptions {
    pub concurrency: usize,
    pub enrichment_concurrency: usize,
    pub ping_timeout_ms: u64,
}

impl Default for SubnetScanOptions {
    fn default() -> Self {
        Self { concurrency: 64, enrichment_concurrency: 64, ping_timeout_ms: 800 }
    }
}

fn guess_device_type(vendor: Option<&str>) -> Option<String> {
    let vendor = vendor?.to_ascii_lowercase();
    let guess = if vendor.contains("apple") {
        "mobile_or_desktop"
    } else if vendor.contains("raspberry") {
        "single_board_computer"
    } else if vendor.contains("cisco") || vendor.contains("ubiquiti") || vendor.contains("netgear") || vendor.contains("tp-link") {
        "network_equipment"
    } else if vendor.contains("samsung") || vendor.contains("lg electronics") {
        "iot_or_tv"
    } else {
        return None;
    };
    Some(guess.to_string())
}

/// Starts the sweep in the background and returns the receiving half of
/// its output channel. For a given IP the basic event always precedes
/// its enriched event; across IPs there's no ordering guarantee.
/// Dropping the receiver cancels the sweep.
pub fn scan(
    block: &str,
    options: SubnetScanOptions,
    arp: Arc<dyn ArpAdapter>,
    oui: Arc<dyn OuiAdapter>,
) -> Result<mpsc::UnboundedReceiver<DiscoveredHost>, ScannerError> {
    let hosts = cidr::expand(block)?;
    let (tx, rx) = mpsc::unbounded_channel();
    let concurrency = options.concurrency.min(256).max(1);
    let enrichment_concurrency = options.enrichment_concurrency.min(64).max(1);

    tokio::spawn(run_sweep(hosts, options.ping_timeout_ms, concurrency, enrichment_concurrency, arp, oui, tx));
    Ok(rx)
}

async fn run_sweep(
    hosts: Vec<Ipv4Addr>,
    ping_timeout_ms: u64,
    concurrency: usize,
    enrichment_concurrency: usize,
    arp: Arc<dyn ArpAdapter>,
    oui: Arc<dyn OuiAdapter>,
    tx: mpsc::UnboundedSender<DiscoveredHost>,
) {
    let ping_sem = Arc::new(Semaphore::new(concurrency));
    let enrich_sem = Arc::new(Semaphore::new(enrichment_concurrency));
    let mut join_set = tokio::task::JoinSet::new();

    for host in hosts {
        if tx.is_closed() {
            break;
        }
        let ping_sem = ping_sem.clone();
        let enrich_sem = enrich_sem.clone();
        let arp = arp.clone();
        let oui = oui.clone();
        let tx = tx.clone();

        join_set.spawn(async move {
            let _permit = match ping_sem.acquire_owned().await {
                Ok(p) => p,
                Err(_) => return,
            };
            let result = ping(host, ping_timeout_ms).await;
            if result.status != PingStatus::Success {
                return;
            }

            let basic = DiscoveredHost {
                ip_address: IpAddr::V4(host),
                roundtrip_ms: result.rtt_ms,
                hostname: None,
                mac_address: None,
                vendor: None,
                device_type: None,
                discovered_at: Utc::now(),
            };
            if tx.send(basic.clone()).is_err() {
                return;
            }
            drop(_permit);

            let _permit = match enrich_sem.acquire_owned().await {
                Ok(p) => p,
                Err(_) => return,
            };
            if tx.is_closed() {
                return;
            }

            let hostname = tokio::net::lookup_host((host.to_string().as_str(), 0))
                .await
                .ok()
                .and_then(|mut addrs| addrs.next())
                .map(|a| a.ip().to_string())
                .filter(|h| h != &host.to_string());
            let mac = arp.lookup(IpAddr::V4(host)).await.ok().flatten();
            let vendor = match &mac {
                Some(mac) => oui.lookup(mac).await.ok().flatten(),
                None => None,
            };
            let device_type = guess_device_type(vendor.as_deref());

            if hostname.is_none() && mac.is_none() && vendor.is_none() && device_type.is_none() {
                return;
            }

            let enriched = DiscoveredHost { hostname, mac_address: mac, vendor, device_type, ..basic };
            let _ = tx.send(enriched);
        });
    }

    while join_set.join_next().await.is_some() {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_type_guess_from_vendor() {
        assert_eq!(guess_device_type(Some("Raspberry Pi Foundation")), Some("single_board_computer".to_string()));
        assert_eq!(guess_device_type(Some("Unknown Corp")), None);
        assert_eq!(guess_device_type(None), None);
    }
}
