//! M-Lab locate service: finds a nearby ndt7 server and its URLs.

use crate::error::SpeedTestError;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_LOCATE_BASE: &str = "https://locate.measurementlab.net";
pub const CLIENT_NAME: &str = "manlab";
pub const CLIENT_VERSION: &str = "1.0";
pub const CLIENT_LIBRARY_NAME: &str = "manlab-speedtest";
pub const CLIENT_LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone)]
pub struct LocateResult {
    pub download_url: String,
    pub upload_url: String,
    pub service_name: String,
    pub service_type: String,
}

fn append_client_metadata(url: &str) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!(
        "{url}{sep}client_name={CLIENT_NAME}&client_version={CLIENT_VERSION}&client_library_name={CLIENT_LIBRARY_NAME}&client_library_version={CLIENT_LIBRARY_VERSION}"
    )
}

/// Recursively walks a `results[*].urls` JSON object looking for keys
/// whose path contains the given needle (e.g. `/ndt/v7/download`).
fn find_url(urls: &Value, needle: &str) -> Option<String> {
    let map = urls.as_object()?;
    map.iter().find(|(k, _)| k.contains(needle)).and_then(|(_, v)| v.as_str()).map(str::to_string)
}

pub async fn locate(
    locate_base: &str,
    service_name: &str,
    service_type: &str,
) -> Result<LocateResult, SpeedTestError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| SpeedTestError::Locate(e.to_string()))?;

    let url = format!("{}/v2/nearest/{service_name}/{service_type}", locate_base.trim_end_matches('/'));
    let response = client.get(&url).send().await.map_err(|e| SpeedTestError::Locate(e.to_string()))?;

    if response.status() == reqwest::StatusCode::NO_CONTENT {
        return Err(SpeedTestError::NoCapacity);
    }
    if !response.status().is_success() {
        return Err(SpeedTestError::Locate(format!("locate returned {}", response.status())));
    }

    let body: Value = response.json().await.map_err(|e| SpeedTestError::Locate(e.to_string()))?;
    let results = body.get("results").and_then(Value::as_array).ok_or_else(|| SpeedTestError::Locate("missing results array".into()))?;
    let first = results.first().ok_or(SpeedTestError::NoCapacity)?;
    let urls = first.get("urls").ok_or_else(|| SpeedTestError::Locate("missing urls object".into()))?;

    let download_url = find_url(urls, "/ndt/v7/download").ok_or(SpeedTestError::MissingUrl("download"))?;
    let upload_url = find_url(urls, "/ndt/v7/upload").ok_or(SpeedTestError::MissingUrl("upload"))?;

    Ok(LocateResult {
        download_url: append_client_metadata(&download_url),
        upload_url: append_client_metadata(&upload_url),
        service_name: service_name.to_string(),
        service_type: service_type.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finds_download_and_upload_urls_among_siblings() {
        let urls = json!({
            "wss:///ndt/v7/download": "wss://host/ndt/v7/download",
            "wss:///ndt/v7/upload": "wss://host/ndt/v7/upload",
        });
        assert_eq!(find_url(&urls, "/ndt/v7/download").unwrap(), "wss://host/ndt/v7/download");
        assert_eq!(find_url(&urls, "/ndt/v7/upload").unwrap(), "wss://host/ndt/v7/upload");
    }

    #[test]
    fn appends_client_metadata_with_correct_separator() {
        let with_query = append_client_metadata("wss://host/path?a=1");
        assert!(with_query.contains("?a=1&client_name="));
        let without_query = append_client_metadata("wss://host/path");
        assert!(without_query.contains("?client_name="));
    }
}
