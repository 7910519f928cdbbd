//! IP geolocation, backed by a pluggable HTTP lookup provider.

use crate::error::AdapterError;
use async_trait::async_trait;
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoInfo {
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub asn: Option<String>,
    pub isp: Option<String>,
}

#[async_trait]
pub trait GeoAdapter: Send + Sync {
    async fn lookup(&self, ip: IpAddr) -> Result<Option<GeoInfo>, AdapterError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpGeoAdapter;

#[async_trait]
impl GeoAdapter for NoOpGeoAdapter {
    async fn lookup(&self, _ip: IpAddr) -> Result<Option<GeoInfo>, AdapterError> {
        Ok(None)
    }
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    status: Option<String>,
    country: Option<String>,
    #[serde(rename = "regionName")]
    region_name: Option<String>,
    city: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(rename = "as")]
    asn: Option<String>,
    isp: Option<String>,
}

/// Queries an ip-api.com-shaped JSON geolocation provider over HTTPS.
pub struct HttpGeoAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGeoAdapter {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AdapterError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| AdapterError::Request(e.to_string()))?;
        Ok(Self { client, base_url: base_url.into() })
    }
}

#[async_trait]
impl GeoAdapter for HttpGeoAdapter {
    async fn lookup(&self, ip: IpAddr) -> Result<Option<GeoInfo>, AdapterError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), ip);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AdapterError::Request(e.to_string()))?
            .json::<ProviderResponse>()
            .await
            .map_err(|e| AdapterError::Request(e.to_string()))?;

        if resp.status.as_deref() == Some("fail") {
            return Ok(None);
        }

        Ok(Some(GeoInfo {
            country: resp.country,
            region: resp.region_name,
            city: resp.city,
            latitude: resp.lat,
            longitude: resp.lon,
            asn: resp.asn,
            isp: resp.isp,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_op_adapter_returns_nothing() {
        let adapter = NoOpGeoAdapter;
        assert_eq!(adapter.lookup("8.8.8.8".parse().unwrap()).await.unwrap(), None);
    }
}
