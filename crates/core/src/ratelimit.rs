//! Per-subject rate limiter and concurrent-scan gate.
//!
//! This is a fixed 60s window refreshed via TTL, not a true sliding log:
//! a burst at the boundary between two windows can momentarily allow
//! close to double the configured rate. Documented here so nobody
//! "fixes" this into a different algorithm without noticing the tradeoff.

use dashmap::DashMap;
use std::collections::HashMap;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Operation name (lowercase) -> requests allowed per 60s window.
    pub per_minute: HashMap<String, u32>,
    pub default_per_minute: u32,
    pub max_concurrent_scans: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut per_minute = HashMap::new();
        per_minute.insert("ping".to_string(), 60);
        per_minute.insert("traceroute".to_string(), 20);
        per_minute.insert("portscan".to_string(), 10);
        per_minute.insert("subnet".to_string(), 5);
        per_minute.insert("discovery".to_string(), 10);
        per_minute.insert("speedtest".to_string(), 5);
        Self {
            per_minute,
            default_per_minute: 30,
            max_concurrent_scans: 1,
        }
    }
}

struct Window {
    start: Instant,
    count: u32,
}

/// Outcome of [`RateLimiter::check_limit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitCheck {
    pub limited: bool,
    pub retry_after_secs: u64,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    windows: DashMap<(String, String), Window>,
    active_scans: DashMap<String, u32>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
            active_scans: DashMap::new(),
        }
    }

    fn limit_for(&self, operation: &str) -> u32 {
        self.config
            .per_minute
            .get(operation)
            .copied()
            .unwrap_or(self.config.default_per_minute)
    }

    /// Non-mutating check: would the *next* `record()` for this
    /// `(subject, operation)` exceed the limit?
    pub fn check_limit(&self, subject: &str, operation: &str) -> LimitCheck {
        let limit = self.limit_for(operation);
        let key = (subject.to_string(), operation.to_string());
        match self.windows.get(&key) {
            Some(window) => {
                let elapsed = window.start.elapsed();
                if elapsed >= WINDOW {
                    LimitCheck {
                        limited: false,
                        retry_after_secs: 0,
                    }
                } else if window.count >= limit {
                    let remaining = WINDOW - elapsed;
                    LimitCheck {
                        limited: true,
                        retry_after_secs: remaining.as_secs().max(1),
                    }
                } else {
                    LimitCheck {
                        limited: false,
                        retry_after_secs: 0,
                    }
                }
            }
            None => LimitCheck {
                limited: false,
                retry_after_secs: 0,
            },
        }
    }

    /// Records one use of `operation` by `subject`, rolling the window over
    /// if it has expired.
    pub fn record(&self, subject: &str, operation: &str) {
        let key = (subject.to_string(), operation.to_string());
        let now = Instant::now();
        self.windows
            .entry(key)
            .and_modify(|w| {
                if now.duration_since(w.start) >= WINDOW {
                    w.start = now;
                    w.count = 1;
                } else {
                    w.count += 1;
                }
            })
            .or_insert(Window { start: now, count: 1 });
    }

    /// Atomically increments `subject`'s active-scan count, rolling back
    /// and returning `false` if that would exceed `max_concurrent_scans`.
    pub fn try_start_scan(&self, subject: &str) -> bool {
        let mut entry = self.active_scans.entry(subject.to_string()).or_insert(0);
        if *entry >= self.config.max_concurrent_scans {
            return false;
        }
        *entry += 1;
        true
    }

    /// Releases one active-scan slot for `subject`.
    pub fn end_scan(&self, subject: &str) {
        if let Some(mut entry) = self.active_scans.get_mut(subject) {
            *entry = entry.saturating_sub(1);
        }
        self.active_scans.remove_if(subject, |_, v| *v == 0);
    }

    /// Drops all rate-limit and scan-gate state for `subject`, e.g. on
    /// transport-level disconnect.
    pub fn cleanup(&self, subject: &str) {
        self.windows.retain(|(s, _), _| s != subject);
        self.active_scans.remove(subject);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_is_never_limited() {
        let rl = RateLimiter::new(RateLimitConfig::default());
        let check = rl.check_limit("conn-1", "ping");
        assert!(!check.limited);
    }

    #[test]
    fn exceeding_op_limit_reports_limited_with_retry() {
        let mut cfg = RateLimitConfig::default();
        cfg.per_minute.insert("portscan".to_string(), 2);
        let rl = RateLimiter::new(cfg);

        rl.record("conn-1", "portscan");
        rl.record("conn-1", "portscan");
        let check = rl.check_limit("conn-1", "portscan");
        assert!(check.limited);
        assert!(check.retry_after_secs >= 1 && check.retry_after_secs <= 60);
    }

    #[test]
    fn unknown_operation_uses_default_limit() {
        let rl = RateLimiter::new(RateLimitConfig::default());
        for _ in 0..30 {
            rl.record("conn-1", "whois");
        }
        assert!(rl.check_limit("conn-1", "whois").limited);
    }

    #[test]
    fn limits_are_scoped_per_subject() {
        let mut cfg = RateLimitConfig::default();
        cfg.per_minute.insert("ping".to_string(), 1);
        let rl = RateLimiter::new(cfg);
        rl.record("conn-1", "ping");
        assert!(rl.check_limit("conn-1", "ping").limited);
        assert!(!rl.check_limit("conn-2", "ping").limited);
    }

    #[test]
    fn concurrent_scan_gate_respects_cap() {
        let mut cfg = RateLimitConfig::default();
        cfg.max_concurrent_scans = 1;
        let rl = RateLimiter::new(cfg);
        assert!(rl.try_start_scan("conn-1"));
        assert!(!rl.try_start_scan("conn-1"));
        rl.end_scan("conn-1");
        assert!(rl.try_start_scan("conn-1"));
    }

    #[test]
    fn end_scan_never_goes_negative() {
        let rl = RateLimiter::new(RateLimitConfig::default());
        rl.end_scan("conn-1");
        rl.end_scan("conn-1");
        assert!(rl.try_start_scan("conn-1"));
    }

    #[test]
    fn cleanup_clears_all_subject_state() {
        let mut cfg = RateLimitConfig::default();
        cfg.per_minute.insert("ping".to_string(), 1);
        let rl = RateLimiter::new(cfg);
        rl.record("conn-1", "ping");
        rl.try_start_scan("conn-1");
        rl.cleanup("conn-1");
        assert!(!rl.check_limit("conn-1", "ping").limited);
        assert!(rl.try_start_scan("conn-1"));
    }
}
