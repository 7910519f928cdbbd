use chrono::{DateTime, Utc};
use std::net::IpAddr;

/// A single syslog record after PRI/header parsing, RFC 5424- or
/// RFC 3164-shaped, or left unparsed if neither pattern matched.
#[derive(Debug, Clone)]
pub struct SyslogMessage {
    pub id: u64,
    pub received_at_utc: DateTime<Utc>,
    pub facility: Option<u8>,
    pub severity: Option<u8>,
    pub host: Option<String>,
    pub app_name: Option<String>,
    pub proc_id: Option<String>,
    pub msg_id: Option<String>,
    pub message: String,
    pub raw: String,
    pub source_ip: IpAddr,
    pub source_port: u16,
}

pub const UNPARSED_SENTINEL: &str = "[syslog unparsed]";
pub const REGEX_TIMEOUT_SENTINEL: &str = "[syslog regex_timeout]";
