//! WHOIS with one referral hop, starting from the IANA root server.

use crate::error::ScannerError;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{self, Instant};

const ROOT_SERVER: &str = "whois.iana.org";
const OVERALL_DEADLINE: Duration = Duration::from_secs(7);

async fn query_once(server: &str, query: &str, deadline: Instant) -> Result<String, ScannerError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(ScannerError::Timeout);
    }
    let connect = time::timeout(remaining, TcpStream::connect((server, 43)))
        .await
        .map_err(|_| ScannerError::Timeout)?
        .map_err(|e| ScannerError::Whois(e.to_string()))?;
    let mut stream = connect;
    stream
        .write_all(format!("{query}\r\n").as_bytes())
        .await
        .map_err(|e| ScannerError::Whois(e.to_string()))?;

    let remaining = deadline.saturating_duration_since(Instant::now());
    let mut buf = Vec::new();
    time::timeout(remaining, stream.read_to_end(&mut buf))
        .await
        .map_err(|_| ScannerError::Timeout)?
        .map_err(|e| ScannerError::Whois(e.to_string()))?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn find_referral(body: &str) -> Option<String> {
    for line in body.lines() {
        let lower = line.to_ascii_lowercase();
        for prefix in ["refer:", "whois:", "referralserver:"] {
            if let Some(rest) = lower.strip_prefix(prefix) {
                let value = line[prefix.len()..].trim();
                let value = value.trim_start_matches("whois://");
                if !value.is_empty() {
                    let _ = rest;
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Queries `whois.iana.org`, then follows a single referral if the
/// response names one. The whole call is bounded to seven seconds.
pub async fn whois(query: &str) -> Result<String, ScannerError> {
    let deadline = Instant::now() + OVERALL_DEADLINE;
    let root_response = query_once(ROOT_SERVER, query, deadline).await?;

    match find_referral(&root_response) {
        Some(referral) if referral != ROOT_SERVER => {
            match query_once(&referral, query, deadline).await {
                Ok(referred) => Ok(referred),
                Err(_) => Ok(root_response),
            }
        }
        _ => Ok(root_response),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_refer_line() {
        let body = "domain: COM\nrefer:   whois.verisign-grs.com\n";
        assert_eq!(find_referral(body), Some("whois.verisign-grs.com".to_string()));
    }

    #[test]
    fn extracts_referralserver_with_scheme() {
        let body = "refer: none\nreferralserver: whois://whois.example.net\n";
        assert_eq!(find_referral(body), Some("whois.example.net".to_string()));
    }

    #[test]
    fn no_referral_present() {
        let body = "domain: EXAMPLE\nstatus: active\n";
        assert_eq!(find_referral(body), None);
    }
}
