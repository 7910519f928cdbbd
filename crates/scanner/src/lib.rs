mod cidr;
mod dns;
mod error;
mod icmp;
mod ping;
mod portscan;
mod publicip;
mod subnet;
mod tls_inspect;
mod traceroute;
mod whois;
mod wol;

pub use crate::cidr::{expand as expand_cidr, MAX_HOSTS};
pub use crate::error::ScannerError;
pub use dns::{check_propagation, lookup as dns_lookup, DnsLookupResult, DnsRecord, PropagationResult};
pub use ping::{ping, PingResult, PingStatus};
pub use portscan::{scan_ports, PortScanResult, DEFAULT_PORTS};
pub use publicip::{get_public_ip, PublicIpReport, PublicIpResult};
pub use subnet::{scan as scan_subnet, DiscoveredHost, SubnetScanOptions};
pub use tls_inspect::{inspect_certificate, CertificateInfo, InspectCertificateResult};
pub use traceroute::{trace_route, HopStatus, TraceHop, TraceRouteOptions, TraceRouteResult};
pub use whois::whois;
pub use wol::{wake_on_lan, DEFAULT_WOL_BROADCAST, DEFAULT_WOL_PORT};
