//! Forward/reverse DNS lookups and per-resolver propagation checks.

use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::proto::rr::RecordType;
use hickory_resolver::TokioAsyncResolver;
use std::net::IpAddr;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DnsRecord {
    pub record_type: String,
    pub name: String,
    pub value: String,
    pub priority: Option<u16>,
}

#[derive(Debug, Clone, Default)]
pub struct DnsLookupResult {
    pub records: Vec<DnsRecord>,
    pub reverse: Vec<String>,
}

const QUERY_TYPES: [RecordType; 7] = [
    RecordType::A,
    RecordType::AAAA,
    RecordType::CNAME,
    RecordType::MX,
    RecordType::TXT,
    RecordType::NS,
    RecordType::SOA,
];

fn caching_resolver() -> TokioAsyncResolver {
    let mut opts = ResolverOpts::default();
    opts.timeout = Duration::from_secs(5);
    opts.attempts = 2; // 1 initial + 1 retry
    TokioAsyncResolver::tokio(ResolverConfig::default(), opts)
}

fn non_caching_resolver(server: IpAddr) -> TokioAsyncResolver {
    let mut opts = ResolverOpts::default();
    opts.timeout = Duration::from_secs(5);
    opts.attempts = 2;
    opts.cache_size = 0;
    let group = NameServerConfigGroup::from_ips_clear(&[server], 53, true);
    let config = ResolverConfig::from_parts(None, vec![], group);
    TokioAsyncResolver::tokio(config, opts)
}

fn dedup(mut records: Vec<DnsRecord>) -> Vec<DnsRecord> {
    let mut seen = std::collections::HashSet::new();
    records.retain(|r| seen.insert(r.clone()));
    records
}

async fn query_all(resolver: &TokioAsyncResolver, name: &str) -> Vec<DnsRecord> {
    let mut records = Vec::new();
    for record_type in QUERY_TYPES {
        let Ok(lookup) = resolver.lookup(name, record_type).await else { continue };
        for record in lookup.record_iter() {
            let (value, priority) = match record.data() {
                Some(data) => match record_type {
                    RecordType::MX => data
                        .as_mx()
                        .map(|mx| (mx.exchange().to_string(), Some(mx.preference())))
                        .unwrap_or((data.to_string(), None)),
                    _ => (data.to_string(), None),
                },
                None => continue,
            };
            records.push(DnsRecord {
                record_type: record_type.to_string(),
                name: name.to_string(),
                value,
                priority,
            });
        }
    }
    dedup(records)
}

/// Runs the sequential A/AAAA/CNAME/MX/TXT/NS/SOA sweep, optionally
/// following up with PTR lookups for every resolved address.
pub async fn lookup(name: &str, include_reverse: bool) -> DnsLookupResult {
    let resolver = caching_resolver();
    let records = query_all(&resolver, name).await;

    let mut reverse = Vec::new();
    if include_reverse {
        let mut targets: Vec<IpAddr> = records
            .iter()
            .filter(|r| r.record_type == "A" || r.record_type == "AAAA")
            .filter_map(|r| r.value.parse().ok())
            .collect();
        if let Ok(ip) = name.parse::<IpAddr>() {
            targets.push(ip);
        }
        for ip in targets {
            if let Ok(response) = resolver.reverse_lookup(ip).await {
                reverse.extend(response.iter().map(|name| name.to_string()));
            }
        }
    }

    DnsLookupResult { records, reverse }
}

#[derive(Debug, Clone)]
pub struct PropagationResult {
    pub server: IpAddr,
    pub resolved_address: Option<IpAddr>,
    pub records: Vec<DnsRecord>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Runs one non-caching query per (server, record_type) pair in parallel.
pub async fn check_propagation(name: &str, record_type: &str, servers: &[IpAddr]) -> Vec<PropagationResult> {
    let record_type = RecordType::from_str(record_type).unwrap_or(RecordType::A);
    let mut join_set = tokio::task::JoinSet::new();
    for &server in servers {
        let name = name.to_string();
        join_set.spawn(async move {
            let resolver = non_caching_resolver(server);
            let start = Instant::now();
            match resolver.lookup(name.clone(), record_type).await {
                Ok(response) => {
                    let records: Vec<DnsRecord> = response
                        .record_iter()
                        .filter_map(|r| {
                            r.data().map(|d| DnsRecord {
                                record_type: record_type.to_string(),
                                name: name.clone(),
                                value: d.to_string(),
                                priority: None,
                            })
                        })
                        .collect();
                    let resolved_address = records.first().and_then(|r| r.value.parse().ok());
                    PropagationResult {
                        server,
                        resolved_address,
                        records,
                        duration_ms: start.elapsed().as_millis() as u64,
                        error: None,
                    }
                }
                Err(e) => PropagationResult {
                    server,
                    resolved_address: None,
                    records: Vec::new(),
                    duration_ms: start.elapsed().as_millis() as u64,
                    error: Some(e.to_string()),
                },
            }
        });
    }

    let mut results = Vec::new();
    while let Some(res) = join_set.join_next().await {
        if let Ok(r) = res {
            results.push(r);
        }
    }
    results
}

use std::str::FromStr;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_drops_identical_records() {
        let record = DnsRecord {
            record_type: "A".into(),
            name: "example.com".into(),
            value: "1.2.3.4".into(),
            priority: None,
        };
        let deduped = dedup(vec![record.clone(), record.clone()]);
        assert_eq!(deduped.len(), 1);
    }
}
