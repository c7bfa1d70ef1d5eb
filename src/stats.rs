// stats.rs
use hdrhistogram::{CreationError, Histogram};
use std::time::Duration;

// Upper bound of the latency histogram: 10s in microseconds.
const MAX_LATENCY_US: u64 = 10_000_000;

/// Counters for one session, owned by the frame-handling task.
pub struct SessionStats {
    handle_us: Histogram<u64>,
    pub frames_received: u64,
    pub frames_merged: u64,
    pub frames_dropped: u64,
    pub heartbeats: u64,
    pub fields_dropped: u64,
    pub server_errors: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsSummary {
    pub frames_received: u64,
    pub frames_merged: u64,
    pub frames_dropped: u64,
    pub heartbeats: u64,
    pub fields_dropped: u64,
    pub server_errors: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

impl SessionStats {
    pub fn new() -> Result<Self, CreationError> {
        Ok(Self {
            handle_us: Histogram::new_with_max(MAX_LATENCY_US, 3)?,
            frames_received: 0,
            frames_merged: 0,
            frames_dropped: 0,
            heartbeats: 0,
            fields_dropped: 0,
            server_errors: 0,
        })
    }

    pub fn record_handling(&mut self, elapsed: Duration) {
        let us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.handle_us.saturating_record(us);
    }

    pub fn summary(&self) -> StatsSummary {
        let h = &self.handle_us;
        StatsSummary {
            frames_received: self.frames_received,
            frames_merged: self.frames_merged,
            frames_dropped: self.frames_dropped,
            heartbeats: self.heartbeats,
            fields_dropped: self.fields_dropped,
            server_errors: self.server_errors,
            p50_us: h.value_at_quantile(0.50),
            p95_us: h.value_at_quantile(0.95),
            p99_us: h.value_at_quantile(0.99),
            max_us: h.max(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_summary_is_zeroed() {
        let stats = SessionStats::new().unwrap();
        let summary = stats.summary();
        assert_eq!(summary.frames_received, 0);
        assert_eq!(summary.p99_us, 0);
        assert_eq!(summary.max_us, 0);
    }

    #[test]
    fn latency_is_recorded_and_clamped() {
        let mut stats = SessionStats::new().unwrap();
        stats.record_handling(Duration::from_micros(250));
        stats.record_handling(Duration::from_secs(3600));
        let summary = stats.summary();
        assert!(summary.p50_us >= 249 && summary.p50_us <= 251);
        assert!(summary.max_us >= MAX_LATENCY_US);
    }
}
