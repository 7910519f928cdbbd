use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("invalid CIDR block: {0}")]
    InvalidCidr(String),
    #[error("CIDR block too large: {0} hosts exceeds the /16 (65536 host) limit")]
    CidrTooLarge(usize),
    #[error("invalid MAC address: {0}")]
    InvalidMac(String),
    #[error("socket error: {0}")]
    Socket(String),
    #[error("dns resolution failed: {0}")]
    Dns(String),
    #[error("tls handshake failed: {0}")]
    Tls(String),
    #[error("whois lookup failed: {0}")]
    Whois(String),
    #[error("no public IP could be determined for {0}")]
    NoPublicIp(&'static str),
    #[error("operation timed out")]
    Timeout,
}
