//! IP-to-MAC lookups against the host ARP/neighbor table.

use crate::error::AdapterError;
use async_trait::async_trait;
use std::net::IpAddr;
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpEntry {
    pub ip: IpAddr,
    pub mac: String,
    pub interface: Option<String>,
}

#[async_trait]
pub trait ArpAdapter: Send + Sync {
    async fn lookup(&self, ip: IpAddr) -> Result<Option<String>, AdapterError>;
    async fn table(&self) -> Result<Vec<ArpEntry>, AdapterError>;
    async fn add(&self, ip: IpAddr, mac: &str) -> Result<(), AdapterError>;
    async fn remove(&self, ip: IpAddr) -> Result<(), AdapterError>;
    async fn flush(&self) -> Result<(), AdapterError>;
}

/// Degrades every operation to "nothing known" rather than failing callers
/// outright — used wherever the host `arp` binary isn't available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpArpAdapter;

#[async_trait]
impl ArpAdapter for NoOpArpAdapter {
    async fn lookup(&self, _ip: IpAddr) -> Result<Option<String>, AdapterError> {
        Ok(None)
    }

    async fn table(&self) -> Result<Vec<ArpEntry>, AdapterError> {
        Ok(Vec::new())
    }

    async fn add(&self, _ip: IpAddr, _mac: &str) -> Result<(), AdapterError> {
        Err(AdapterError::Unsupported)
    }

    async fn remove(&self, _ip: IpAddr) -> Result<(), AdapterError> {
        Err(AdapterError::Unsupported)
    }

    async fn flush(&self) -> Result<(), AdapterError> {
        Err(AdapterError::Unsupported)
    }
}

/// Shells out to the system `arp` and `ip neighbor` tools.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemArpAdapter;

fn parse_arp_table(output: &str) -> Vec<ArpEntry> {
    // Linux `arp -a` line shape: "host (192.168.1.1) at aa:bb:cc:dd:ee:ff [ether] on eth0"
    let mut entries = Vec::new();
    for line in output.lines() {
        let ip_start = match line.find('(') {
            Some(i) => i + 1,
            None => continue,
        };
        let ip_end = match line[ip_start..].find(')') {
            Some(i) => ip_start + i,
            None => continue,
        };
        let ip: IpAddr = match line[ip_start..ip_end].parse() {
            Ok(ip) => ip,
            Err(_) => continue,
        };
        let mac = line
            .split("at ")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .map(str::to_string);
        let mac = match mac {
            Some(mac) if mac.contains(':') => mac,
            _ => continue,
        };
        let interface = line
            .rsplit("on ")
            .next()
            .filter(|s| *s != line)
            .map(|s| s.trim().to_string());
        entries.push(ArpEntry { ip, mac, interface });
    }
    entries
}

#[async_trait]
impl ArpAdapter for SystemArpAdapter {
    async fn lookup(&self, ip: IpAddr) -> Result<Option<String>, AdapterError> {
        Ok(self.table().await?.into_iter().find(|e| e.ip == ip).map(|e| e.mac))
    }

    async fn table(&self) -> Result<Vec<ArpEntry>, AdapterError> {
        let output = Command::new("arp")
            .arg("-a")
            .output()
            .await
            .map_err(|_| AdapterError::SubprocessMissing("arp".into()))?;
        if !output.status.success() {
            return Err(AdapterError::SubprocessFailed(
                "arp".into(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }
        Ok(parse_arp_table(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn add(&self, ip: IpAddr, mac: &str) -> Result<(), AdapterError> {
        let output = Command::new("arp")
            .args(["-s", &ip.to_string(), mac])
            .output()
            .await
            .map_err(|_| AdapterError::SubprocessMissing("arp".into()))?;
        if !output.status.success() {
            return Err(AdapterError::SubprocessFailed(
                "arp".into(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }
        Ok(())
    }

    async fn remove(&self, ip: IpAddr) -> Result<(), AdapterError> {
        let output = Command::new("arp")
            .args(["-d", &ip.to_string()])
            .output()
            .await
            .map_err(|_| AdapterError::SubprocessMissing("arp".into()))?;
        if !output.status.success() {
            return Err(AdapterError::SubprocessFailed(
                "arp".into(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), AdapterError> {
        for entry in self.table().await? {
            self.remove(entry.ip).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_linux_arp_a_line() {
        let out = "gateway.lan (192.168.1.1) at aa:bb:cc:dd:ee:ff [ether] on eth0\n";
        let entries = parse_arp_table(out);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].ip.to_string(), "192.168.1.1");
        assert_eq!(entries[0].mac, "aa:bb:cc:dd:ee:ff");
        assert_eq!(entries[0].interface.as_deref(), Some("eth0"));
    }

    #[test]
    fn skips_incomplete_entries() {
        let out = "? (192.168.1.2) at <incomplete> on eth0\n";
        assert!(parse_arp_table(out).is_empty());
    }

    #[tokio::test]
    async fn no_op_adapter_reports_nothing_known() {
        let adapter = NoOpArpAdapter;
        assert_eq!(adapter.lookup("10.0.0.1".parse().unwrap()).await.unwrap(), None);
        assert!(adapter.table().await.unwrap().is_empty());
        assert!(matches!(
            adapter.add("10.0.0.1".parse().unwrap(), "aa:bb:cc:dd:ee:ff").await,
            Err(AdapterError::Unsupported)
        ));
    }
}
