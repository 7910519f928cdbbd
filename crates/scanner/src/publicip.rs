//! Public IP discovery by probing a short ordered list of providers.

use crate::error::ScannerError;
use serde::Deserialize;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PublicIpResult<T> {
    pub address: T,
    pub provider: &'static str,
}

#[derive(Debug, Deserialize)]
struct IpField {
    ip: String,
}

enum Format {
    Json,
    PlainText,
}

const V4_PROVIDERS: [(&str, Format); 3] = [
    ("https://api.ipify.org?format=json", Format::Json),
    ("https://ifconfig.co/json", Format::Json),
    ("https://ipinfo.io/json", Format::Json),
];

const V6_PROVIDERS: [(&str, Format); 2] = [
    ("https://api64.ipify.org?format=json", Format::Json),
    ("https://ipv6.icanhazip.com", Format::PlainText),
];

async fn probe<T: std::str::FromStr>(client: &reqwest::Client, providers: &[(&'static str, Format)]) -> Option<PublicIpResult<T>> {
    for (provider, format) in providers {
        let Ok(resp) = client.get(*provider).send().await else { continue };
        let address = match format {
            Format::Json => {
                let Ok(body) = resp.json::<IpField>().await else { continue };
                body.ip.trim().parse::<T>().ok()
            }
            Format::PlainText => {
                let Ok(text) = resp.text().await else { continue };
                text.trim().parse::<T>().ok()
            }
        };
        if let Some(address) = address {
            return Some(PublicIpResult { address, provider });
        }
    }
    None
}

#[derive(Debug, Clone, Default)]
pub struct PublicIpReport {
    pub v4: Option<PublicIpResult<Ipv4Addr>>,
    pub v6: Option<PublicIpResult<Ipv6Addr>>,
}

/// Probes v4 and v6 providers independently; fails only if neither
/// family produced an answer.
pub async fn get_public_ip() -> Result<PublicIpReport, ScannerError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| ScannerError::Socket(e.to_string()))?;

    let v4 = probe(&client, &V4_PROVIDERS).await;
    let v6 = probe(&client, &V6_PROVIDERS).await;

    if v4.is_none() && v6.is_none() {
        return Err(ScannerError::NoPublicIp("both IPv4 and IPv6 providers were unreachable"));
    }

    Ok(PublicIpReport { v4, v6 })
}
