// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Counters for the reporting pipeline.
//!
//! Each [`Tracer`](crate::Tracer) owns one [`ReportMetrics`], shared with its
//! gateway, so hosts can see how many reports were built, delivered or dropped
//! and which failure categories fired.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use crate::error::FailureCategory;

/// Pipeline metrics for one tracer.
#[derive(Debug, Default)]
pub struct ReportMetrics {
    validated: AtomicU64,
    finalized: AtomicU64,
    sent: AtomicU64,
    queued: AtomicU64,
    skipped: AtomicU64,
    warnings: RwLock<HashMap<FailureCategory, u64>>,
    post_processing: RwLock<OperationMetrics>,
}

impl ReportMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// A report was seeded at the validate phase.
    pub fn record_validated(&self) {
        self.validated.fetch_add(1, Ordering::Relaxed);
    }

    /// A report passed the should-send gate and was post-processed.
    pub fn record_finalized(&self, post_processing: Duration) {
        self.finalized.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "telemetry")]
        self.post_processing
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .record(post_processing);
        #[cfg(not(feature = "telemetry"))]
        let _ = post_processing;
    }

    /// A payload was delivered over HTTP.
    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    /// A payload was handed to the dispatch queue.
    pub fn record_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    /// A report was dropped by the should-send predicate.
    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// A warning was logged for `category`.
    pub fn record_warning(&self, category: FailureCategory) {
        *self
            .warnings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(category)
            .or_insert(0) += 1;
    }

    /// Number of warnings logged for `category`.
    pub fn warnings(&self, category: FailureCategory) -> u64 {
        self.warnings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&category)
            .copied()
            .unwrap_or(0)
    }

    /// Take a snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            validated: self.validated.load(Ordering::Relaxed),
            finalized: self.finalized.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            warnings: self
                .warnings
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            post_processing: self
                .post_processing
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }
}

/// Duration statistics with a latency histogram.
#[derive(Debug, Clone)]
pub struct OperationMetrics {
    /// Number of operations.
    pub count: u64,

    /// Total duration.
    pub total_duration: Duration,

    /// Maximum duration.
    pub max_duration: Duration,

    /// Histogram buckets for latency distribution.
    pub histogram: Histogram,
}

impl OperationMetrics {
    pub fn new() -> Self {
        Self {
            count: 0,
            total_duration: Duration::ZERO,
            max_duration: Duration::ZERO,
            histogram: Histogram::default(),
        }
    }

    pub fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.total_duration += duration;
        self.max_duration = self.max_duration.max(duration);
        self.histogram.record(duration);
    }

    /// Calculate average duration.
    pub fn avg_duration(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.count as u32
        }
    }
}

impl Default for OperationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Simple histogram with fixed buckets for latency tracking.
#[derive(Debug, Clone)]
pub struct Histogram {
    /// Bucket boundaries in microseconds.
    buckets: Vec<u64>,

    /// Count per bucket, plus one overflow bucket.
    counts: Vec<u64>,
}

impl Histogram {
    /// Create a histogram with custom bucket boundaries (in microseconds).
    pub fn with_buckets(buckets: Vec<u64>) -> Self {
        let counts = vec![0; buckets.len() + 1];
        Self { buckets, counts }
    }

    pub fn record(&mut self, duration: Duration) {
        let micros = duration.as_micros() as u64;
        let bucket_idx = self
            .buckets
            .iter()
            .position(|&b| micros <= b)
            .unwrap_or(self.buckets.len());
        self.counts[bucket_idx] += 1;
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Approximate percentile, reported as the upper bound of its bucket.
    pub fn percentile(&self, p: f64) -> Duration {
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return Duration::ZERO;
        }

        let target = (total as f64 * p / 100.0).ceil() as u64;
        let mut cumulative = 0u64;

        for (i, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                let micros = if i < self.buckets.len() {
                    self.buckets[i]
                } else {
                    self.buckets.last().copied().unwrap_or(0) * 10
                };
                return Duration::from_micros(micros);
            }
        }

        Duration::ZERO
    }

    pub fn p99(&self) -> Duration {
        self.percentile(99.0)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        // Post-processing is sub-millisecond in the common case: 50us .. 100ms
        Self::with_buckets(vec![50, 100, 250, 500, 1_000, 10_000, 100_000])
    }
}

/// A snapshot of [`ReportMetrics`] at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub validated: u64,
    pub finalized: u64,
    pub sent: u64,
    pub queued: u64,
    pub skipped: u64,
    pub warnings: HashMap<FailureCategory, u64>,
    pub post_processing: OperationMetrics,
}

impl MetricsSnapshot {
    /// Format as a human-readable report.
    pub fn format_report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Hubburu Reporting ===\n\n");
        report.push_str(&format!(
            "Reports: {} validated, {} finalized, {} sent, {} queued, {} skipped\n",
            self.validated, self.finalized, self.sent, self.queued, self.skipped
        ));
        report.push_str(&format!(
            "Post-processing: avg {:.2?}, p99 {:.2?}\n",
            self.post_processing.avg_duration(),
            self.post_processing.histogram.p99()
        ));

        let warnings: Vec<_> = FailureCategory::ALL
            .iter()
            .filter_map(|c| self.warnings.get(c).filter(|n| **n > 0).map(|n| (c, n)))
            .collect();
        if !warnings.is_empty() {
            report.push_str("\nWarnings:\n");
            for (category, count) in warnings {
                report.push_str(&format!("  {}: {}\n", category.tag(), count));
            }
        }

        report
    }
}
