//! Time utilities for the notification fabric and rate limiting

use std::time::{Duration, Instant};

use chrono::Utc;

/// Get current Unix timestamp in nanoseconds (event stamps)
pub fn unix_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Flush rate of every per-user notification mailbox
pub const NOTIFY_FLUSH_MILLIS: u64 = 20;

pub fn notify_flush_interval() -> Duration {
    Duration::from_millis(NOTIFY_FLUSH_MILLIS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nanos_and_millis_agree() {
        let nanos = unix_nanos();
        let millis = unix_millis() as i64;
        assert!(nanos > 0);
        assert!((nanos / 1_000_000 - millis).abs() < 1_000);
    }

    #[test]
    fn uptime_starts_after_init() {
        init_server_time();
        assert!(uptime_secs() < 5);
    }
}
