use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("mdns error: {0}")]
    Mdns(String),
    #[error("ssdp error: {0}")]
    Ssdp(String),
}
