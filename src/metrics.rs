//! Shared counters/gauges for the facilitator, exposed both as JSON
//! (`/status`) and as Prometheus text exposition (`/metrics`).
//!
//! Prometheus text *formatting* beyond this minimal exposition is out of
//! scope — this stays a thin, direct `write!`-based formatter over the same
//! counters the JSON endpoint reads, no metrics crate pulled in.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Process-wide facilitator metrics. Cheap to clone (it's all atomics behind
/// a shared reference); construct one and hand `Arc<Metrics>` around.
pub struct Metrics {
    started_at: Instant,
    started_at_utc: DateTime<Utc>,
    verify_total: AtomicU64,
    verify_success: AtomicU64,
    verify_failure: AtomicU64,
    settle_total: AtomicU64,
    settle_success: AtomicU64,
    settle_failure: AtomicU64,
    verify_latency_ms_sum: AtomicU64,
    settle_latency_ms_sum: AtomicU64,
    replay_attempts_blocked: AtomicU64,
    gas_used_total: AtomicU64,
}

/// JSON view returned by `/status`.
#[derive(Serialize)]
pub struct StatusSnapshot {
    pub started_at: String,
    pub uptime_seconds: u64,
    pub verify_total: u64,
    pub verify_success: u64,
    pub verify_failure: u64,
    pub settle_total: u64,
    pub settle_success: u64,
    pub settle_failure: u64,
    pub verify_avg_latency_ms: f64,
    pub settle_avg_latency_ms: f64,
    pub replay_attempts_blocked: u64,
    pub gas_used_total: u64,
    pub nonce_cache_size: usize,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            started_at_utc: Utc::now(),
            verify_total: AtomicU64::new(0),
            verify_success: AtomicU64::new(0),
            verify_failure: AtomicU64::new(0),
            settle_total: AtomicU64::new(0),
            settle_success: AtomicU64::new(0),
            settle_failure: AtomicU64::new(0),
            verify_latency_ms_sum: AtomicU64::new(0),
            settle_latency_ms_sum: AtomicU64::new(0),
            replay_attempts_blocked: AtomicU64::new(0),
            gas_used_total: AtomicU64::new(0),
        }
    }

    pub fn record_verify(&self, success: bool, latency_ms: u64) {
        self.verify_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.verify_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.verify_failure.fetch_add(1, Ordering::Relaxed);
        }
        self.verify_latency_ms_sum.fetch_add(latency_ms, Ordering::Relaxed);
    }

    pub fn record_settle(&self, success: bool, latency_ms: u64, gas_used: u64) {
        self.settle_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.settle_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.settle_failure.fetch_add(1, Ordering::Relaxed);
        }
        self.settle_latency_ms_sum.fetch_add(latency_ms, Ordering::Relaxed);
        self.gas_used_total.fetch_add(gas_used, Ordering::Relaxed);
    }

    pub fn record_replay_blocked(&self) {
        self.replay_attempts_blocked.fetch_add(1, Ordering::Relaxed);
    }

    fn avg(sum: &AtomicU64, count: u64) -> f64 {
        if count == 0 {
            0.0
        } else {
            sum.load(Ordering::Relaxed) as f64 / count as f64
        }
    }

    /// JSON snapshot for `/status`.
    pub fn snapshot(&self, nonce_cache_size: usize) -> StatusSnapshot {
        let verify_total = self.verify_total.load(Ordering::Relaxed);
        let settle_total = self.settle_total.load(Ordering::Relaxed);
        StatusSnapshot {
            started_at: self.started_at_utc.to_rfc3339(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            verify_total,
            verify_success: self.verify_success.load(Ordering::Relaxed),
            verify_failure: self.verify_failure.load(Ordering::Relaxed),
            settle_total,
            settle_success: self.settle_success.load(Ordering::Relaxed),
            settle_failure: self.settle_failure.load(Ordering::Relaxed),
            verify_avg_latency_ms: Self::avg(&self.verify_latency_ms_sum, verify_total),
            settle_avg_latency_ms: Self::avg(&self.settle_latency_ms_sum, settle_total),
            replay_attempts_blocked: self.replay_attempts_blocked.load(Ordering::Relaxed),
            gas_used_total: self.gas_used_total.load(Ordering::Relaxed),
            nonce_cache_size,
        }
    }

    /// Prometheus text exposition (`text/plain; version=0.0.4`).
    pub fn prometheus_text(&self, nonce_cache_size: usize) -> String {
        let s = self.snapshot(nonce_cache_size);
        let mut out = String::new();
        use std::fmt::Write as _;

        let _ = writeln!(out, "# HELP x402_uptime_seconds Facilitator process uptime.");
        let _ = writeln!(out, "# TYPE x402_uptime_seconds counter");
        let _ = writeln!(out, "x402_uptime_seconds {}", s.uptime_seconds);

        let _ = writeln!(out, "# HELP x402_verifications_total Total /verify requests by result.");
        let _ = writeln!(out, "# TYPE x402_verifications_total counter");
        let _ = writeln!(out, "x402_verifications_total{{result=\"success\"}} {}", s.verify_success);
        let _ = writeln!(out, "x402_verifications_total{{result=\"failure\"}} {}", s.verify_failure);

        let _ = writeln!(out, "# HELP x402_verification_latency_ms Average /verify latency.");
        let _ = writeln!(out, "# TYPE x402_verification_latency_ms gauge");
        let _ = writeln!(out, "x402_verification_latency_ms {}", s.verify_avg_latency_ms);

        let _ = writeln!(out, "# HELP x402_settlements_total Total /settle requests by result.");
        let _ = writeln!(out, "# TYPE x402_settlements_total counter");
        let _ = writeln!(out, "x402_settlements_total{{result=\"success\"}} {}", s.settle_success);
        let _ = writeln!(out, "x402_settlements_total{{result=\"failure\"}} {}", s.settle_failure);

        let _ = writeln!(out, "# HELP x402_settlement_latency_ms Average /settle latency.");
        let _ = writeln!(out, "# TYPE x402_settlement_latency_ms gauge");
        let _ = writeln!(out, "x402_settlement_latency_ms {}", s.settle_avg_latency_ms);

        let _ = writeln!(out, "# HELP x402_replay_attacks_blocked Nonce replays rejected by the in-memory cache.");
        let _ = writeln!(out, "# TYPE x402_replay_attacks_blocked counter");
        let _ = writeln!(out, "x402_replay_attacks_blocked {}", s.replay_attempts_blocked);

        let _ = writeln!(out, "# HELP x402_gas_used_total Cumulative gas used across settlements.");
        let _ = writeln!(out, "# TYPE x402_gas_used_total counter");
        let _ = writeln!(out, "x402_gas_used_total {}", s.gas_used_total);

        let _ = writeln!(out, "# HELP x402_nonce_cache_size Current nonce cache entry count.");
        let _ = writeln!(out, "# TYPE x402_nonce_cache_size gauge");
        let _ = writeln!(out, "x402_nonce_cache_size {}", s.nonce_cache_size);

        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_computes_averages() {
        let metrics = Metrics::new();
        metrics.record_verify(true, 10);
        metrics.record_verify(false, 30);
        let snapshot = metrics.snapshot(0);
        assert_eq!(snapshot.verify_total, 2);
        assert_eq!(snapshot.verify_success, 1);
        assert_eq!(snapshot.verify_avg_latency_ms, 20.0);
    }

    #[test]
    fn prometheus_text_includes_metric_names() {
        let metrics = Metrics::new();
        metrics.record_settle(true, 100, 21000);
        let text = metrics.prometheus_text(5);
        assert!(text.contains("x402_settlements_total{result=\"success\"} 1"));
        assert!(text.contains("x402_gas_used_total 21000"));
        assert!(text.contains("x402_nonce_cache_size 5"));
    }
}
