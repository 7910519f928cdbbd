//! Runs mDNS and SSDP discovery concurrently for a fixed window.

use crate::mdns::{self, MdnsDevice};
use crate::ssdp::{self, UpnpDevice};
use std::time::Duration;

pub const DEFAULT_SCAN_DURATION_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct DiscoveryScanResult {
    pub mdns_devices: Vec<MdnsDevice>,
    pub upnp_devices: Vec<UpnpDevice>,
    pub scan_duration_ms: u64,
}

pub enum DiscoveryEvent {
    Mdns(MdnsDevice),
    Upnp(UpnpDevice),
}

/// Runs both listeners for `scan_duration_secs`, invoking `on_event` as
/// each unique device resolves. Errors from one listener don't prevent
/// the other from completing.
pub async fn scan(scan_duration_secs: u64, on_event: impl Fn(DiscoveryEvent) + Send + Sync + 'static) -> DiscoveryScanResult {
    let duration = Duration::from_secs(scan_duration_secs.max(1));
    let start = tokio::time::Instant::now();
    let on_event = std::sync::Arc::new(on_event);

    let mdns_cb = on_event.clone();
    let mdns_task = tokio::spawn(async move {
        mdns::scan(duration, |d| mdns_cb(DiscoveryEvent::Mdns(d.clone()))).await
    });

    let ssdp_cb = on_event.clone();
    let ssdp_task = tokio::spawn(async move {
        ssdp::scan(duration, |d| ssdp_cb(DiscoveryEvent::Upnp(d.clone()))).await
    });

    let mdns_devices = match mdns_task.await {
        Ok(Ok(devices)) => devices,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "mdns scan failed");
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(error = %e, "mdns scan task panicked");
            Vec::new()
        }
    };
    let upnp_devices = match ssdp_task.await {
        Ok(Ok(devices)) => devices,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "ssdp scan failed");
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(error = %e, "ssdp scan task panicked");
            Vec::new()
        }
    };

    DiscoveryScanResult {
        mdns_devices,
        upnp_devices,
        scan_duration_ms: start.elapsed().as_millis() as u64,
    }
}
