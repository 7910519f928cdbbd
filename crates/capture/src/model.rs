use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct CaptureDevice {
    pub name: String,
    pub description: Option<String>,
    pub is_loopback: bool,
    pub is_up: bool,
}

#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub device_name: String,
    pub snap_len: usize,
    pub promiscuous: bool,
    pub max_buffered_packets: usize,
    pub broadcast_sample_every: u32,
    pub broadcast_interval_ms: u64,
    pub broadcast_batch_size: usize,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            device_name: String::new(),
            snap_len: 65_535,
            promiscuous: false,
            max_buffered_packets: 10_000,
            broadcast_sample_every: 1,
            broadcast_interval_ms: 250,
            broadcast_batch_size: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PacketCaptureRecord {
    pub id: u64,
    pub captured_at_utc: DateTime<Utc>,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub protocol: Option<String>,
    pub length: usize,
    pub s_port: Option<u16>,
    pub d_port: Option<u16>,
    pub s_mac: Option<String>,
    pub d_mac: Option<String>,
    pub info: Option<String>,
}
