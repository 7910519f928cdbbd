//! PRI decoding plus RFC 5424 and RFC 3164 header parsing.

use crate::model::{REGEX_TIMEOUT_SENTINEL, UNPARSED_SENTINEL};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

const REGEX_TIMEOUT: Duration = Duration::from_millis(50);

static RFC5424_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^<(?P<pri>\d{1,3})>(?P<version>\d)\s(?P<ts>\S+)\s(?P<host>\S+)\s(?P<app>\S+)\s(?P<procid>\S+)\s(?P<msgid>\S+)\s(?P<msg>.*)$",
    )
    .expect("static RFC 5424 pattern is valid")
});

static RFC3164_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^<(?P<pri>\d{1,3})>(?P<ts>[A-Z][a-z]{2}\s+\d{1,2}\s\d{2}:\d{2}:\d{2})\s(?P<host>\S+)\s(?P<app>[^\[:\s]+)(\[(?P<procid>\d+)\])?:\s?(?P<msg>.*)$",
    )
    .expect("static RFC 3164 pattern is valid")
});

pub struct Header {
    pub facility: Option<u8>,
    pub severity: Option<u8>,
    pub host: Option<String>,
    pub app_name: Option<String>,
    pub proc_id: Option<String>,
    pub msg_id: Option<String>,
    pub message: String,
}

fn nil_to_none(value: &str) -> Option<String> {
    if value == "-" || value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn decode_pri(pri: &str) -> (Option<u8>, Option<u8>) {
    match pri.parse::<u16>() {
        Ok(p) if p <= 191 => (Some((p / 8) as u8), Some((p % 8) as u8)),
        _ => (None, None),
    }
}

fn try_rfc5424(line: &str) -> Option<Header> {
    let caps = RFC5424_RE.captures(line)?;
    let (facility, severity) = decode_pri(&caps["pri"]);
    Some(Header {
        facility,
        severity,
        host: nil_to_none(&caps["host"]),
        app_name: nil_to_none(&caps["app"]),
        proc_id: nil_to_none(&caps["procid"]),
        msg_id: nil_to_none(&caps["msgid"]),
        message: caps["msg"].to_string(),
    })
}

fn try_rfc3164(line: &str) -> Option<Header> {
    let caps = RFC3164_RE.captures(line)?;
    let (facility, severity) = decode_pri(&caps["pri"]);
    Some(Header {
        facility,
        severity,
        host: Some(caps["host"].to_string()),
        app_name: Some(caps["app"].to_string()),
        proc_id: caps.name("procid").map(|m| m.as_str().to_string()),
        msg_id: None,
        message: caps["msg"].to_string(),
    })
}

/// Runs the regex-based header parsers with a wall-clock timeout so a
/// pathological payload can never hang the receive loop. Tries RFC 5424
/// first, then RFC 3164, then falls back to an unparsed sentinel.
pub async fn parse_with_timeout(line: &str) -> Header {
    let owned = line.to_string();
    let attempt = tokio::task::spawn_blocking(move || try_rfc5424(&owned).or_else(|| try_rfc3164(&owned)));

    match tokio::time::timeout(REGEX_TIMEOUT, attempt).await {
        Ok(Ok(Some(header))) => header,
        Ok(Ok(None)) => Header {
            facility: None,
            severity: None,
            host: None,
            app_name: None,
            proc_id: None,
            msg_id: None,
            message: if line.is_empty() { UNPARSED_SENTINEL.to_string() } else { line.to_string() },
        },
        Ok(Err(_)) | Err(_) => Header {
            facility: None,
            severity: None,
            host: None,
            app_name: None,
            proc_id: None,
            msg_id: None,
            message: REGEX_TIMEOUT_SENTINEL.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parses_rfc5424_header() {
        let line = "<34>1 2023-10-11T22:14:15.003Z mymachine.example.com su - ID47 - 'su root' failed";
        let header = parse_with_timeout(line).await;
        assert_eq!(header.facility, Some(4));
        assert_eq!(header.severity, Some(2));
        assert_eq!(header.host.as_deref(), Some("mymachine.example.com"));
        assert_eq!(header.app_name.as_deref(), Some("su"));
        assert_eq!(header.proc_id, None);
        assert_eq!(header.msg_id.as_deref(), Some("ID47"));
        assert!(header.message.contains("su root"));
    }

    #[tokio::test]
    async fn parses_rfc3164_header() {
        let line = "<34>Oct 11 22:14:15 mymachine su[1234]: 'su root' failed for lonvick";
        let header = parse_with_timeout(line).await;
        assert_eq!(header.facility, Some(4));
        assert_eq!(header.severity, Some(2));
        assert_eq!(header.host.as_deref(), Some("mymachine"));
        assert_eq!(header.app_name.as_deref(), Some("su"));
        assert_eq!(header.proc_id.as_deref(), Some("1234"));
        assert!(header.message.starts_with("'su root'"));
    }

    #[tokio::test]
    async fn unparsable_payload_falls_back_to_raw_message() {
        let line = "this is not syslog at all";
        let header = parse_with_timeout(line).await;
        assert_eq!(header.facility, None);
        assert_eq!(header.message, line);
    }

    #[test]
    fn decode_pri_splits_facility_and_severity() {
        assert_eq!(decode_pri("34"), (Some(4), Some(2)));
        assert_eq!(decode_pri("191"), (Some(23), Some(7)));
        assert_eq!(decode_pri("999"), (None, None));
    }

    #[test]
    fn nil_dash_normalizes_to_none() {
        assert_eq!(nil_to_none("-"), None);
        assert_eq!(nil_to_none("ID47"), Some("ID47".to_string()));
    }
}
