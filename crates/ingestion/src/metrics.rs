//! Ingestion metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Ingestion metrics
///
/// Shared by every producer of one pipeline.
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Records placed on the measurement queue
    pub records_emitted: AtomicU64,

    /// Telegram lines that failed numeric coercion
    pub parse_errors: AtomicU64,

    /// Lines skipped by the non-zero validation rule
    pub validation_skipped: AtomicU64,

    /// Complete telegrams received
    pub telegrams_received: AtomicU64,

    /// Register reads that exhausted their retry budget
    pub failed_reads: AtomicU64,

    /// Completed inverter poll cycles
    pub poll_cycles: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_emitted(&self) {
        self.records_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_validation_skipped(&self) {
        self.validation_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_telegram(&self) {
        self.telegrams_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_read(&self) {
        self.failed_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_poll_cycle(&self) {
        self.poll_cycles.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_emitted: self.records_emitted.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            validation_skipped: self.validation_skipped.load(Ordering::Relaxed),
            telegrams_received: self.telegrams_received.load(Ordering::Relaxed),
            failed_reads: self.failed_reads.load(Ordering::Relaxed),
            poll_cycles: self.poll_cycles.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub records_emitted: u64,
    pub parse_errors: u64,
    pub validation_skipped: u64,
    pub telegrams_received: u64,
    pub failed_reads: u64,
    pub poll_cycles: u64,
}
