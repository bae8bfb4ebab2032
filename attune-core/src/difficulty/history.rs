//! Bounded, time-ordered performance history

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::policy::DifficultyTier;

/// One scored attempt. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub difficulty: DifficultyTier,
    /// Fraction correct in `[0, 1]`.
    pub accuracy: f64,
    pub completion_time_sec: f64,
    pub hints_used: u32,
    pub timestamp: DateTime<Utc>,
}

impl PerformanceRecord {
    pub fn new(difficulty: DifficultyTier, accuracy: f64) -> Self {
        Self {
            difficulty,
            accuracy: accuracy.clamp(0.0, 1.0),
            completion_time_sec: 0.0,
            hints_used: 0,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_completion_time(mut self, seconds: f64) -> Self {
        self.completion_time_sec = seconds.max(0.0);
        self
    }

    #[must_use]
    pub fn with_hints(mut self, hints_used: u32) -> Self {
        self.hints_used = hints_used;
        self
    }

    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Fixed-capacity FIFO of performance records, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingHistory {
    capacity: usize,
    records: VecDeque<PerformanceRecord>,
}

impl RollingHistory {
    /// Create an empty history. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a record, keeping timestamp order. Returns the evicted record
    /// when the history was already full.
    pub fn push(&mut self, record: PerformanceRecord) -> Option<PerformanceRecord> {
        // Records normally arrive in order; late arrivals slot in behind newer ones.
        let position = self
            .records
            .iter()
            .rposition(|r| r.timestamp <= record.timestamp)
            .map_or(0, |i| i + 1);
        self.records.insert(position, record);

        if self.records.len() > self.capacity {
            self.records.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &PerformanceRecord> + ExactSizeIterator {
        self.records.iter()
    }

    pub fn latest(&self) -> Option<&PerformanceRecord> {
        self.records.back()
    }

    /// Accuracies in timestamp order.
    pub fn accuracies(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.accuracy).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record_at(accuracy: f64, minutes: i64) -> PerformanceRecord {
        let base = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        PerformanceRecord::new(DifficultyTier::Medium, accuracy).at(base + Duration::minutes(minutes))
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut history = RollingHistory::new(10);
        for i in 0..25 {
            history.push(record_at(0.5, i));
            assert!(history.len() <= 10);
        }
        assert_eq!(history.len(), 10);
    }

    #[test]
    fn eleventh_record_evicts_exactly_the_oldest() {
        let mut history = RollingHistory::new(10);
        for i in 0..10 {
            assert!(history.push(record_at(i as f64 / 10.0, i)).is_none());
        }

        let evicted = history.push(record_at(0.99, 10)).unwrap();
        assert_eq!(evicted.accuracy, 0.0);
        assert_eq!(history.len(), 10);
        assert_eq!(history.iter().next().unwrap().accuracy, 0.1);
        assert_eq!(history.latest().unwrap().accuracy, 0.99);
    }

    #[test]
    fn late_record_is_kept_in_timestamp_order() {
        let mut history = RollingHistory::new(10);
        history.push(record_at(0.1, 0));
        history.push(record_at(0.3, 20));
        history.push(record_at(0.2, 10));
        assert_eq!(history.accuracies(), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn accuracy_is_clamped_on_construction() {
        assert_eq!(PerformanceRecord::new(DifficultyTier::Easy, 1.7).accuracy, 1.0);
        assert_eq!(PerformanceRecord::new(DifficultyTier::Easy, -0.2).accuracy, 0.0);
    }

    #[test]
    fn zero_capacity_holds_one_record() {
        let mut history = RollingHistory::new(0);
        history.push(record_at(0.4, 0));
        history.push(record_at(0.6, 1));
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.accuracies(), vec![0.6]);
    }
}
