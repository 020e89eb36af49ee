//! Operation timing aggregates.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Operations slower than this are logged as warnings.
pub const DEFAULT_SLOW_THRESHOLD: Duration = Duration::from_secs(1);

/// How many recent samples survive [`PerformanceMonitor::clear_metrics`].
const RETAINED_SAMPLES: usize = 10;

/// Per-operation aggregate statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationStats {
    /// How many times the operation completed.
    pub count: u64,
    /// Average duration in milliseconds.
    pub average_ms: f64,
    /// Slowest observed duration in milliseconds.
    pub max_ms: f64,
}

/// Snapshot of all timing aggregates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Aggregates keyed by operation name.
    pub operations: HashMap<String, OperationStats>,
    /// Names of operations that exceeded the slow threshold at least once.
    pub slow_operations: Vec<String>,
}

#[derive(Debug, Default)]
struct OperationRecord {
    samples_ms: Vec<f64>,
    count: u64,
    total_ms: f64,
    max_ms: f64,
    was_slow: bool,
}

/// Collects wall-clock timings per named operation.
#[derive(Debug)]
pub struct PerformanceMonitor {
    records: Mutex<HashMap<String, OperationRecord>>,
    in_flight: Mutex<HashMap<String, Instant>>,
    slow_threshold: Duration,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMonitor {
    /// Create a monitor with the default slow-operation threshold.
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_SLOW_THRESHOLD)
    }

    /// Create a monitor with an explicit slow-operation threshold.
    pub fn with_threshold(slow_threshold: Duration) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            slow_threshold,
        }
    }

    /// Mark the start of a named operation.
    pub fn start_operation(&self, name: &str) {
        self.in_flight
            .lock()
            .unwrap()
            .insert(name.to_string(), Instant::now());
    }

    /// Mark the end of a named operation and record its duration. Ends
    /// without a matching start are ignored.
    pub fn end_operation(&self, name: &str) -> Option<Duration> {
        let started = self.in_flight.lock().unwrap().remove(name)?;
        let elapsed = started.elapsed();
        self.record(name, elapsed);
        Some(elapsed)
    }

    /// Time a closure under the given operation name.
    pub fn measure<T>(&self, name: &str, op: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let value = op();
        self.record(name, started.elapsed());
        value
    }

    fn record(&self, name: &str, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        let slow = elapsed >= self.slow_threshold;
        if slow {
            warn!("perf: {name} took {ms:.1} ms");
        } else {
            debug!("perf: {name} took {ms:.1} ms");
        }

        let mut records = self.records.lock().unwrap();
        let record = records.entry(name.to_string()).or_default();
        record.count += 1;
        record.total_ms += ms;
        record.max_ms = record.max_ms.max(ms);
        record.was_slow |= slow;
        record.samples_ms.push(ms);
        if record.samples_ms.len() > RETAINED_SAMPLES {
            let excess = record.samples_ms.len() - RETAINED_SAMPLES;
            record.samples_ms.drain(..excess);
        }
    }

    /// Aggregate statistics for one operation.
    pub fn operation_stats(&self, name: &str) -> Option<OperationStats> {
        let records = self.records.lock().unwrap();
        records.get(name).map(|r| OperationStats {
            count: r.count,
            average_ms: if r.count > 0 {
                r.total_ms / r.count as f64
            } else {
                0.0
            },
            max_ms: r.max_ms,
        })
    }

    /// Full report across all recorded operations.
    pub fn export_report(&self) -> PerformanceReport {
        let records = self.records.lock().unwrap();
        let mut report = PerformanceReport::default();
        for (name, record) in records.iter() {
            report.operations.insert(
                name.clone(),
                OperationStats {
                    count: record.count,
                    average_ms: if record.count > 0 {
                        record.total_ms / record.count as f64
                    } else {
                        0.0
                    },
                    max_ms: record.max_ms,
                },
            );
            if record.was_slow {
                report.slow_operations.push(name.clone());
            }
        }
        report.slow_operations.sort();
        report
    }

    /// Reset aggregates, keeping only the most recent samples per
    /// operation so averages stay meaningful after the trim.
    pub fn clear_metrics(&self) {
        let mut records = self.records.lock().unwrap();
        for record in records.values_mut() {
            let samples = std::mem::take(&mut record.samples_ms);
            record.count = samples.len() as u64;
            record.total_ms = samples.iter().sum();
            record.max_ms = samples.iter().copied().fold(0.0, f64::max);
            record.was_slow = false;
            record.samples_ms = samples;
        }
        records.retain(|_, r| r.count > 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_end_records_duration() {
        let monitor = PerformanceMonitor::new();
        monitor.start_operation("load");
        std::thread::sleep(Duration::from_millis(5));
        let elapsed = monitor.end_operation("load").unwrap();
        assert!(elapsed >= Duration::from_millis(5));

        let stats = monitor.operation_stats("load").unwrap();
        assert_eq!(stats.count, 1);
        assert!(stats.average_ms >= 5.0);
    }

    #[test]
    fn test_end_without_start_is_ignored() {
        let monitor = PerformanceMonitor::new();
        assert!(monitor.end_operation("never-started").is_none());
        assert!(monitor.operation_stats("never-started").is_none());
    }

    #[test]
    fn test_measure_returns_value() {
        let monitor = PerformanceMonitor::new();
        let value = monitor.measure("sum", || 2 + 2);
        assert_eq!(value, 4);
        assert_eq!(monitor.operation_stats("sum").unwrap().count, 1);
    }

    #[test]
    fn test_aggregates_track_max() {
        let monitor = PerformanceMonitor::new();
        monitor.measure("op", || std::thread::sleep(Duration::from_millis(1)));
        monitor.measure("op", || std::thread::sleep(Duration::from_millis(10)));

        let stats = monitor.operation_stats("op").unwrap();
        assert_eq!(stats.count, 2);
        assert!(stats.max_ms >= 10.0);
        assert!(stats.max_ms >= stats.average_ms);
    }

    #[test]
    fn test_slow_operations_reported() {
        let monitor = PerformanceMonitor::with_threshold(Duration::from_millis(1));
        monitor.measure("slow", || std::thread::sleep(Duration::from_millis(5)));
        monitor.measure("fast", || ());

        let report = monitor.export_report();
        assert_eq!(report.slow_operations, vec!["slow"]);
        assert_eq!(report.operations.len(), 2);
    }

    #[test]
    fn test_clear_metrics_retains_recent_samples() {
        let monitor = PerformanceMonitor::new();
        for _ in 0..25 {
            monitor.measure("op", || ());
        }
        assert_eq!(monitor.operation_stats("op").unwrap().count, 25);

        monitor.clear_metrics();
        let stats = monitor.operation_stats("op").unwrap();
        assert_eq!(stats.count, RETAINED_SAMPLES as u64);
    }
}
