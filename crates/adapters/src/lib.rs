mod arp;
mod error;
mod geo;
mod oui;
mod wifi;

pub use arp::{ArpAdapter, ArpEntry, NoOpArpAdapter, SystemArpAdapter};
pub use error::AdapterError;
pub use geo::{GeoAdapter, GeoInfo, HttpGeoAdapter, NoOpGeoAdapter};
pub use oui::{EmbeddedOuiAdapter, NoOpOuiAdapter, OuiAdapter};
pub use wifi::{NmcliWifiAdapter, NoOpWifiAdapter, WifiAdapter, WifiAdapterInfo, WifiNetwork};
