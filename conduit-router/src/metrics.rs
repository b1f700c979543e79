use std::sync::atomic::{AtomicU64, Ordering};

/// Counters the periodic reporting snapshot surfaces alongside each
/// supervisor's own self-reported stats.
#[derive(Debug, Default)]
pub struct RouterMetrics {
    pub hop_limit_drops: AtomicU64,
    pub zero_match_drops: AtomicU64,
    pub slow_supervisor_events: AtomicU64,
    pub delivered: AtomicU64,
}

impl RouterMetrics {
    pub fn snapshot(&self) -> RouterMetricsSnapshot {
        RouterMetricsSnapshot {
            hop_limit_drops: self.hop_limit_drops.load(Ordering::Relaxed),
            zero_match_drops: self.zero_match_drops.load(Ordering::Relaxed),
            slow_supervisor_events: self.slow_supervisor_events.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterMetricsSnapshot {
    pub hop_limit_drops: u64,
    pub zero_match_drops: u64,
    pub slow_supervisor_events: u64,
    pub delivered: u64,
}
