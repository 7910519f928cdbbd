//! Composes a subnet scan and a discovery scan into a node/link graph.
//!
//! Built by value, never by reference: every node owns its data, so the
//! resulting graph can outlive and be cloned independently of the scans
//! that produced it.

use crate::engine::DiscoveryScanResult;
use manlab_scanner::DiscoveredHost;
use std::collections::HashMap;
use std::net::IpAddr;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Subnet { cidr: String },
    Host { ip: IpAddr, discovery_only: bool },
    Service { name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopologyNode {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeLabel {
    Contains,
    Service,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopologyEdge {
    pub from: String,
    pub to: String,
    pub label: EdgeLabel,
}

#[derive(Debug, Clone, Default)]
pub struct TopologySummary {
    pub subnet_count: usize,
    pub host_count: usize,
    pub discovery_only_host_count: usize,
    pub mdns_service_count: usize,
    pub upnp_device_count: usize,
}

#[derive(Debug, Clone)]
pub struct NetworkTopology {
    pub nodes: Vec<TopologyNode>,
    pub edges: Vec<TopologyEdge>,
    pub summary: TopologySummary,
}

fn subnet_of(ip: IpAddr) -> Option<String> {
    match ip {
        IpAddr::V4(v4) => {
            let octets = v4.octets();
            Some(format!("{}.{}.{}.0/24", octets[0], octets[1], octets[2]))
        }
        IpAddr::V6(_) => None,
    }
}

/// Builds the root -> subnet -> host -> service graph. Hosts seen only
/// via discovery (no matching scanned IP) are added as placeholders.
pub fn build(hosts: &[DiscoveredHost], discovery: &DiscoveryScanResult) -> NetworkTopology {
    const ROOT_ID: &str = "root";
    let mut nodes = vec![TopologyNode { id: ROOT_ID.to_string(), label: "Local Network".to_string(), kind: NodeKind::Root }];
    let mut edges = Vec::new();
    let mut subnet_ids: HashMap<String, String> = HashMap::new();
    let mut host_ids: HashMap<IpAddr, String> = HashMap::new();
    let mut discovery_only_count = 0;

    let mut ensure_subnet = |cidr: &str, nodes: &mut Vec<TopologyNode>, edges: &mut Vec<TopologyEdge>, subnet_ids: &mut HashMap<String, String>| -> String {
        if let Some(id) = subnet_ids.get(cidr) {
            return id.clone();
        }
        let id = format!("subnet:{cidr}");
        nodes.push(TopologyNode { id: id.clone(), label: cidr.to_string(), kind: NodeKind::Subnet { cidr: cidr.to_string() } });
        edges.push(TopologyEdge { from: ROOT_ID.to_string(), to: id.clone(), label: EdgeLabel::Contains });
        subnet_ids.insert(cidr.to_string(), id.clone());
        id
    };

    for host in hosts {
        let Some(cidr) = subnet_of(host.ip_address) else { continue };
        let subnet_id = ensure_subnet(&cidr, &mut nodes, &mut edges, &mut subnet_ids);
        let host_id = format!("host:{}", host.ip_address);
        nodes.push(TopologyNode {
            id: host_id.clone(),
            label: host.hostname.clone().unwrap_or_else(|| host.ip_address.to_string()),
            kind: NodeKind::Host { ip: host.ip_address, discovery_only: false },
        });
        edges.push(TopologyEdge { from: subnet_id, to: host_id.clone(), label: EdgeLabel::Contains });
        host_ids.insert(host.ip_address, host_id);
    }

    for device in &discovery.mdns_devices {
        let host_id = device.addresses.first().and_then(|ip| host_ids.get(ip).cloned()).unwrap_or_else(|| {
            let ip = device.addresses.first().copied();
            let id = format!("discovery-host:{}", device.instance_name);
            let (label, kind) = match ip {
                Some(ip) => (ip.to_string(), NodeKind::Host { ip, discovery_only: true }),
                None => (device.hostname.clone(), NodeKind::Host { ip: "0.0.0.0".parse().unwrap(), discovery_only: true }),
            };
            nodes.push(TopologyNode { id: id.clone(), label, kind });
            if let Some(ip) = ip {
                if let Some(cidr) = subnet_of(ip) {
                    let subnet_id = ensure_subnet(&cidr, &mut nodes, &mut edges, &mut subnet_ids);
                    edges.push(TopologyEdge { from: subnet_id, to: id.clone(), label: EdgeLabel::Contains });
                }
            }
            discovery_only_count += 1;
            id
        });

        let service_id = format!("service:{}:{}", host_id, device.instance_name);
        nodes.push(TopologyNode { id: service_id.clone(), label: device.instance_name.clone(), kind: NodeKind::Service { name: device.service_type.clone() } });
        edges.push(TopologyEdge { from: host_id, to: service_id, label: EdgeLabel::Service });
    }

    for device in &discovery.upnp_devices {
        let host_id = format!("discovery-host:upnp:{}", device.usn);
        nodes.push(TopologyNode {
            id: host_id.clone(),
            label: device.server.clone().unwrap_or_else(|| device.usn.clone()),
            kind: NodeKind::Host { ip: "0.0.0.0".parse().unwrap(), discovery_only: true },
        });
        discovery_only_count += 1;
        let service_id = format!("service:{}", device.usn);
        nodes.push(TopologyNode { id: service_id.clone(), label: device.usn.clone(), kind: NodeKind::Service { name: device.search_target.clone().unwrap_or_default() } });
        edges.push(TopologyEdge { from: host_id, to: service_id, label: EdgeLabel::Service });
    }

    let summary = TopologySummary {
        subnet_count: subnet_ids.len(),
        host_count: host_ids.len(),
        discovery_only_host_count: discovery_only_count,
        mdns_service_count: discovery.mdns_devices.len(),
        upnp_device_count: discovery.upnp_devices.len(),
    };

    NetworkTopology { nodes, edges, summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn host(ip: &str) -> DiscoveredHost {
        DiscoveredHost {
            ip_address: ip.parse().unwrap(),
            roundtrip_ms: 1,
            hostname: None,
            mac_address: None,
            vendor: None,
            device_type: None,
            discovered_at: Utc::now(),
        }
    }

    #[test]
    fn scanned_hosts_land_under_their_derived_subnet() {
        let discovery = DiscoveryScanResult { mdns_devices: vec![], upnp_devices: vec![], scan_duration_ms: 0 };
        let topology = build(&[host("192.168.1.5")], &discovery);
        assert_eq!(topology.summary.subnet_count, 1);
        assert_eq!(topology.summary.host_count, 1);
        assert!(topology.nodes.iter().any(|n| n.id == "subnet:192.168.1.0/24"));
    }

    #[test]
    fn subnet_derivation_uses_first_three_octets() {
        assert_eq!(subnet_of("10.1.2.3".parse().unwrap()), Some("10.1.2.0/24".to_string()));
    }
}
