//! Wi-Fi adapter enumeration and network scanning via `nmcli`.

use crate::error::AdapterError;
use async_trait::async_trait;
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiAdapterInfo {
    pub name: String,
    pub driver: Option<String>,
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WifiNetwork {
    pub ssid: String,
    pub bssid: Option<String>,
    pub signal_percent: Option<u8>,
    pub channel: Option<u32>,
    pub security: Option<String>,
}

#[async_trait]
pub trait WifiAdapter: Send + Sync {
    async fn list_adapters(&self) -> Result<Vec<WifiAdapterInfo>, AdapterError>;
    async fn scan_networks(&self, adapter: &str) -> Result<Vec<WifiNetwork>, AdapterError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpWifiAdapter;

#[async_trait]
impl WifiAdapter for NoOpWifiAdapter {
    async fn list_adapters(&self) -> Result<Vec<WifiAdapterInfo>, AdapterError> {
        Ok(Vec::new())
    }

    async fn scan_networks(&self, _adapter: &str) -> Result<Vec<WifiNetwork>, AdapterError> {
        Ok(Vec::new())
    }
}

fn parse_device_list(output: &str) -> Vec<WifiAdapterInfo> {
    // `nmcli -t -f DEVICE,TYPE,STATE device status` -> "wlan0:wifi:connected"
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split(':');
            let name = fields.next()?.to_string();
            let kind = fields.next()?;
            if kind != "wifi" {
                return None;
            }
            let state = fields.next().unwrap_or("");
            Some(WifiAdapterInfo { name, driver: None, connected: state == "connected" })
        })
        .collect()
}

fn parse_scan_list(output: &str) -> Vec<WifiNetwork> {
    // `nmcli -t -f SSID,BSSID,SIGNAL,CHAN,SECURITY device wifi list`
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.is_empty() || fields[0].is_empty() {
                return None;
            }
            Some(WifiNetwork {
                ssid: fields[0].to_string(),
                bssid: fields.get(1).filter(|s| !s.is_empty()).map(|s| s.to_string()),
                signal_percent: fields.get(2).and_then(|s| s.parse().ok()),
                channel: fields.get(3).and_then(|s| s.parse().ok()),
                security: fields.get(4).filter(|s| !s.is_empty()).map(|s| s.to_string()),
            })
        })
        .collect()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NmcliWifiAdapter;

#[async_trait]
impl WifiAdapter for NmcliWifiAdapter {
    async fn list_adapters(&self) -> Result<Vec<WifiAdapterInfo>, AdapterError> {
        let output = Command::new("nmcli")
            .args(["-t", "-f", "DEVICE,TYPE,STATE", "device", "status"])
            .output()
            .await
            .map_err(|_| AdapterError::SubprocessMissing("nmcli".into()))?;
        if !output.status.success() {
            return Err(AdapterError::SubprocessFailed(
                "nmcli".into(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }
        Ok(parse_device_list(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn scan_networks(&self, adapter: &str) -> Result<Vec<WifiNetwork>, AdapterError> {
        let output = Command::new("nmcli")
            .args(["-t", "-f", "SSID,BSSID,SIGNAL,CHAN,SECURITY", "device", "wifi", "list", "ifname", adapter])
            .output()
            .await
            .map_err(|_| AdapterError::SubprocessMissing("nmcli".into()))?;
        if !output.status.success() {
            return Err(AdapterError::SubprocessFailed(
                "nmcli".into(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }
        Ok(parse_scan_list(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_device_status_line() {
        let out = "wlan0:wifi:connected\neth0:ethernet:connected\n";
        let adapters = parse_device_list(out);
        assert_eq!(adapters.len(), 1);
        assert_eq!(adapters[0].name, "wlan0");
        assert!(adapters[0].connected);
    }

    #[test]
    fn parses_scan_results() {
        let out = "HomeNet:aa\\:bb\\:cc\\:dd\\:ee\\:ff:78:6:WPA2\n";
        let nets = parse_scan_list(out);
        assert_eq!(nets.len(), 1);
        assert_eq!(nets[0].ssid, "HomeNet");
        assert_eq!(nets[0].signal_percent, Some(78));
        assert_eq!(nets[0].channel, Some(6));
    }

    #[tokio::test]
    async fn no_op_adapter_lists_nothing() {
        let adapter = NoOpWifiAdapter;
        assert!(adapter.list_adapters().await.unwrap().is_empty());
        assert!(adapter.scan_networks("wlan0").await.unwrap().is_empty());
    }
}
