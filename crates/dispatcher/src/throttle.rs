//! Per-sink rate limiting (dispatch state)

use std::collections::HashMap;

use contracts::{MeasurementRecord, MeasurementValue, ThrottleKey};

/// Last forwarded sample of one dispatch key
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchEntry {
    pub value: MeasurementValue,
    /// Unix seconds of the forward
    pub timestamp: i64,
}

/// Throttle verdict for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    Forward,
    Suppress,
}

/// 单个 sink 的限流状态
///
/// A key is forwarded at most once per `3600 / max_rate_per_hour` seconds.
/// Suppressed records are dropped, never delayed. Records with
/// `max_rate_per_hour == 0` always pass and leave no state behind.
#[derive(Debug)]
pub struct RateLimiter {
    key: ThrottleKey,
    state: HashMap<String, DispatchEntry>,
}

impl RateLimiter {
    pub fn new(key: ThrottleKey) -> Self {
        Self {
            key,
            state: HashMap::new(),
        }
    }

    pub fn throttle_key(&self) -> ThrottleKey {
        self.key
    }

    /// Decide whether `record` is forwarded at `now` (unix seconds)
    ///
    /// A forward updates the stored state for the record's key.
    pub fn check(&mut self, record: &MeasurementRecord, now: i64) -> ThrottleDecision {
        let Some(min_interval) = record.min_interval_secs() else {
            return ThrottleDecision::Forward;
        };

        let key = self.key.key_for(record);
        if let Some(last) = self.state.get(&key) {
            if now < last.timestamp + min_interval {
                return ThrottleDecision::Suppress;
            }
        }

        self.state.insert(
            key,
            DispatchEntry {
                value: record.value.clone(),
                timestamp: now,
            },
        );
        ThrottleDecision::Forward
    }

    /// Last forwarded sample for a dispatch key
    pub fn last(&self, key: &str) -> Option<&DispatchEntry> {
        self.state.get(key)
    }

    /// Number of keys with state
    pub fn tracked_keys(&self) -> usize {
        self.state.len()
    }
}
