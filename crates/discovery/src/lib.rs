mod catalog;
mod engine;
mod error;
mod mdns;
mod ssdp;
mod topology;

pub use catalog::{all_types as catalog_service_types, COMMON_TYPES, EXTENDED_TYPES};
pub use engine::{scan, DiscoveryEvent, DiscoveryScanResult, DEFAULT_SCAN_DURATION_SECS};
pub use error::DiscoveryError;
pub use mdns::MdnsDevice;
pub use ssdp::UpnpDevice;
pub use topology::{build as build_topology, EdgeLabel, NetworkTopology, NodeKind, TopologyEdge, TopologyNode, TopologySummary};
