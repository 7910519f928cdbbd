//! mDNS service discovery over the catalog of well-known service types.

use crate::catalog;
use crate::error::DiscoveryError;
use mdns_sd::{ServiceDaemon, ServiceEvent};
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct MdnsDevice {
    pub service_type: String,
    pub instance_name: String,
    pub hostname: String,
    pub addresses: Vec<IpAddr>,
    pub port: u16,
    pub txt_records: HashMap<String, String>,
}

/// Browses the full service-type catalog for `scan_duration`, deduping
/// by `(service_type, instance_name)`. `on_device` fires once per newly
/// resolved, not-yet-seen device for streaming consumers.
pub async fn scan(scan_duration: Duration, mut on_device: impl FnMut(&MdnsDevice)) -> Result<Vec<MdnsDevice>, DiscoveryError> {
    let daemon = ServiceDaemon::new().map_err(|e| DiscoveryError::Mdns(e.to_string()))?;
    let mut receivers = Vec::new();
    for service_type in catalog::all_types() {
        match daemon.browse(service_type) {
            Ok(receiver) => receivers.push((service_type, receiver)),
            Err(e) => tracing::warn!(service_type, error = %e, "failed to start mdns browse"),
        }
    }

    let mut seen = std::collections::HashSet::new();
    let mut devices = Vec::new();
    let deadline = tokio::time::Instant::now() + scan_duration;

    'outer: loop {
        if tokio::time::Instant::now() >= deadline {
            break;
        }
        for (service_type, receiver) in &receivers {
            while let Ok(event) = receiver.try_recv() {
                if let ServiceEvent::ServiceResolved(info) = event {
                    let key = (service_type.to_string(), info.get_fullname().to_string());
                    if !seen.insert(key) {
                        continue;
                    }
                    let device = MdnsDevice {
                        service_type: service_type.to_string(),
                        instance_name: info.get_fullname().to_string(),
                        hostname: info.get_hostname().to_string(),
                        addresses: info.get_addresses().iter().cloned().collect(),
                        port: info.get_port(),
                        txt_records: info
                            .get_properties()
                            .iter()
                            .map(|p| (p.key().to_string(), p.val_str().to_string()))
                            .collect(),
                    };
                    on_device(&device);
                    devices.push(device);
                }
            }
        }
        if tokio::time::Instant::now() >= deadline {
            break 'outer;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    for (service_type, _) in &receivers {
        let _ = daemon.stop_browse(service_type);
    }
    let _ = daemon.shutdown();

    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_uses_type_and_instance() {
        let mut seen = std::collections::HashSet::new();
        assert!(seen.insert(("_http._tcp.local.".to_string(), "printer.local.".to_string())));
        assert!(!seen.insert(("_http._tcp.local.".to_string(), "printer.local.".to_string())));
    }
}
