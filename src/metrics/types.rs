use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::MetricResult;

/// Cumulative CPU tick counters read at one instant. Only the difference
/// between two samples carries information.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSample {
    pub idle_ticks: u64,
    pub total_ticks: u64,
}

impl TickSample {
    pub fn new(idle_ticks: u64, total_ticks: u64) -> Self {
        TickSample {
            idle_ticks,
            total_ticks,
        }
    }
}

/// Snapshot of a filesystem-statistics query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesystemStat {
    pub total_blocks: u64,
    pub free_blocks: u64,
    pub block_size: u64,
}

impl FilesystemStat {
    pub fn total_bytes(&self) -> u64 {
        self.total_blocks.saturating_mul(self.block_size)
    }

    pub fn free_bytes(&self) -> u64 {
        self.free_blocks.saturating_mul(self.block_size)
    }
}

/// Page counts aggregated from a virtual-memory report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub used_pages: f64,
    pub total_pages: f64,
    /// Statistic lines that carried no number and were left out of the totals.
    pub skipped_lines: usize,
}

impl MemoryUsage {
    /// `used / total`, or `None` when nothing was counted.
    pub fn ratio(&self) -> Option<f64> {
        if self.total_pages > 0.0 {
            Some(self.used_pages / self.total_pages)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SampleEnvelope<T> {
    pub value: Option<T>,
    pub collected_at: DateTime<Utc>,
    pub valid_for_ms: u32,
    pub source: String,
    pub latency_ms: u32,
    pub error: Option<String>,
}

impl<T> SampleEnvelope<T> {
    pub fn fresh(
        value: T,
        collected_at: DateTime<Utc>,
        valid_for: Duration,
        latency: Duration,
        source: &str,
    ) -> Self {
        SampleEnvelope {
            value: Some(value),
            collected_at,
            valid_for_ms: clamp_millis(valid_for),
            source: source.to_string(),
            latency_ms: clamp_millis(latency),
            error: None,
        }
    }

    pub fn errored(
        collected_at: DateTime<Utc>,
        valid_for: Duration,
        latency: Duration,
        source: &str,
        error: String,
    ) -> Self {
        SampleEnvelope {
            value: None,
            collected_at,
            valid_for_ms: clamp_millis(valid_for),
            source: source.to_string(),
            latency_ms: clamp_millis(latency),
            error: Some(error),
        }
    }

    /// Wraps a metric result, stamping it with the current time.
    pub fn from_result(
        result: MetricResult<T>,
        valid_for: Duration,
        latency: Duration,
        source: &str,
    ) -> Self {
        let now = Utc::now();
        match result {
            Ok(value) => SampleEnvelope::fresh(value, now, valid_for, latency, source),
            Err(err) => SampleEnvelope::errored(now, valid_for, latency, source, err.to_string()),
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.value.is_some()
    }
}

fn clamp_millis(duration: Duration) -> u32 {
    duration.as_millis().min(u32::MAX as u128) as u32
}

/// CPU, memory and disk utilisation fractions captured in one pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub captured_at: DateTime<Utc>,
    pub cpu: SampleEnvelope<f64>,
    pub memory: SampleEnvelope<f64>,
    pub disk: SampleEnvelope<f64>,
    /// The filesystem read the disk fraction was computed from.
    pub filesystem: Option<FilesystemStat>,
}
