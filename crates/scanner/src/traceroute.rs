//! Parallel-batch traceroute with ascending-TTL delivery and post-hoc
//! reverse-DNS/geo enrichment.

use crate::icmp::{self, IcmpOutcome};
use manlab_adapters::{GeoAdapter, GeoInfo};
use rand::random;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopStatus {
    Success,
    TtlExpired,
    DestinationUnreachable,
    TimedOut,
    Error,
}

#[derive(Debug, Clone)]
pub struct TraceHop {
    pub ttl: u8,
    pub address: Option<IpAddr>,
    pub status: HopStatus,
    pub rtt_ms: u64,
    pub hostname: Option<String>,
    pub geo: Option<GeoInfo>,
}

#[derive(Debug, Clone)]
pub struct TraceRouteResult {
    pub hops: Vec<TraceHop>,
    pub stopped_at_ttl: Option<u8>,
    pub geo_lookup_available: bool,
    pub geo_lookup_count: usize,
}

pub struct TraceRouteOptions {
    pub max_hops: u8,
    pub probe_timeout_ms: u64,
    pub batch_size: usize,
}

impl Default for TraceRouteOptions {
    fn default() -> Self {
        Self { max_hops: 30, probe_timeout_ms: 1000, batch_size: 6.min(num_cpus()) }
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

fn outcome_to_hop(ttl: u8, outcome: IcmpOutcome, elapsed: Duration) -> TraceHop {
    let rtt_floor = elapsed.as_millis() as u64;
    let (address, status, rtt_ms) = match outcome {
        IcmpOutcome::EchoReply { from } => (Some(IpAddr::V4(from)), HopStatus::Success, rtt_floor.max(1)),
        IcmpOutcome::TtlExpired { from } => (Some(IpAddr::V4(from)), HopStatus::TtlExpired, rtt_floor.max(1)),
        IcmpOutcome::DestinationUnreachable { from } => {
            (Some(IpAddr::V4(from)), HopStatus::DestinationUnreachable, rtt_floor)
        }
        IcmpOutcome::TimedOut => (None, HopStatus::TimedOut, rtt_floor),
        IcmpOutcome::Error => (None, HopStatus::Error, rtt_floor),
    };
    TraceHop { ttl, address, status, rtt_ms, hostname: None, geo: None }
}

fn continues(status: HopStatus) -> bool {
    matches!(status, HopStatus::TtlExpired | HopStatus::TimedOut)
}

/// Runs the probing phase, invoking `on_hop` for each hop in ascending
/// TTL order as soon as its batch resolves, then enriches every hop
/// that reported an address with reverse DNS and geolocation.
pub async fn trace_route(
    dest: Ipv4Addr,
    options: TraceRouteOptions,
    geo: Arc<dyn GeoAdapter>,
    mut on_hop: impl FnMut(&TraceHop),
) -> TraceRouteResult {
    let mut hops = Vec::new();
    let mut stopped_at_ttl = None;
    let batch_size = options.batch_size.max(1);

    let mut ttl = 1u8;
    'outer: while ttl <= options.max_hops {
        let batch_end = (ttl as u32 + batch_size as u32 - 1).min(options.max_hops as u32) as u8;
        let mut handles = Vec::new();
        for probe_ttl in ttl..=batch_end {
            let ident = random::<u16>();
            let seq = probe_ttl as u16;
            let timeout = Duration::from_millis(options.probe_timeout_ms);
            handles.push(tokio::spawn(async move {
                let result = icmp::probe(dest, probe_ttl, ident, seq, timeout).await;
                outcome_to_hop(probe_ttl, result.outcome, result.elapsed)
            }));
        }

        for handle in handles {
            let hop = handle.await.unwrap_or(TraceHop {
                ttl: 0,
                address: None,
                status: HopStatus::Error,
                rtt_ms: 0,
                hostname: None,
                geo: None,
            });
            on_hop(&hop);
            let stop = hop.status == HopStatus::Success || !continues(hop.status);
            let this_ttl = hop.ttl;
            hops.push(hop);
            if stop {
                stopped_at_ttl = Some(this_ttl);
                break 'outer;
            }
        }

        ttl = batch_end + 1;
    }

    let geo_cache: Arc<Mutex<HashMap<IpAddr, Option<GeoInfo>>>> = Arc::new(Mutex::new(HashMap::new()));
    let sem = Arc::new(Semaphore::new(8));
    let mut enrich_set = tokio::task::JoinSet::new();
    for (idx, hop) in hops.iter().enumerate() {
        let Some(addr) = hop.address else { continue };
        let sem = sem.clone();
        let geo = geo.clone();
        let cache = geo_cache.clone();
        enrich_set.spawn(async move {
            let _permit = sem.acquire_owned().await.ok();
            let hostname = tokio::net::lookup_host((addr.to_string().as_str(), 0))
                .await
                .ok()
                .and_then(|mut a| a.next())
                .map(|a| a.ip().to_string())
                .filter(|h| h != &addr.to_string());

            let cached = cache.lock().await.get(&addr).cloned();
            let geo_info = match cached {
                Some(g) => g,
                None => {
                    let fetched = geo.lookup(addr).await.ok().flatten();
                    cache.lock().await.insert(addr, fetched.clone());
                    fetched
                }
            };
            (idx, hostname, geo_info)
        });
    }

    let mut geo_lookup_count = 0;
    while let Some(res) = enrich_set.join_next().await {
        if let Ok((idx, hostname, geo_info)) = res {
            if geo_info.is_some() {
                geo_lookup_count += 1;
            }
            hops[idx].hostname = hostname;
            hops[idx].geo = geo_info;
        }
    }

    TraceRouteResult {
        hops,
        stopped_at_ttl,
        geo_lookup_available: geo_lookup_count > 0 || !geo_cache.try_lock().map(|c| c.is_empty()).unwrap_or(true),
        geo_lookup_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ms_success_is_clamped_to_one() {
        let hop = outcome_to_hop(1, IcmpOutcome::EchoReply { from: "1.1.1.1".parse().unwrap() }, Duration::ZERO);
        assert_eq!(hop.rtt_ms, 1);
    }

    #[test]
    fn ttl_expired_and_timed_out_continue_but_others_stop() {
        assert!(continues(HopStatus::TtlExpired));
        assert!(continues(HopStatus::TimedOut));
        assert!(!continues(HopStatus::Success));
        assert!(!continues(HopStatus::DestinationUnreachable));
        assert!(!continues(HopStatus::Error));
    }
}
