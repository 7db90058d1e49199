// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters shared by the scheduler and the dispatcher.
#[derive(Debug, Default)]
pub struct ShipperStats {
    accepted: AtomicU64,
    evicted: AtomicU64,
    rejected: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    retries: AtomicU64,
    skipped: AtomicU64,
}

/// Point-in-time copy of [`ShipperStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Events admitted to the queue
    pub accepted: u64,
    /// Events dropped by queue eviction
    pub evicted: u64,
    /// Events refused because shutdown had begun
    pub rejected: u64,
    /// Events acknowledged by the collector
    pub delivered: u64,
    /// Events lost with an exhausted batch
    pub dropped: u64,
    /// Attempts beyond the first
    pub retries: u64,
    /// Events discarded because transmission is not configured
    pub skipped: u64,
}

impl ShipperStats {
    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_evicted(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self, count: usize) {
        self.delivered.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self, count: usize) {
        self.dropped.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self, count: usize) {
        self.skipped.fetch_add(count as u64, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = ShipperStats::default();
        stats.record_accepted();
        stats.record_accepted();
        stats.record_evicted();
        stats.record_delivered(5);
        stats.record_dropped(3);
        stats.record_retry();
        stats.record_skipped(2);
        stats.record_rejected();

        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                accepted: 2,
                evicted: 1,
                rejected: 1,
                delivered: 5,
                dropped: 3,
                retries: 1,
                skipped: 2,
            }
        );
    }
}
