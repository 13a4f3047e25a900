use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::Utc;
use lazy_static::lazy_static;
use log::warn;

use super::cpu::{read_host_ticks, CpuLoadSampler};
use super::disk::{disk_usage, read_filesystem_stat};
use super::memory::{memory_usage_ratio, read_host_memory, read_vm_stat};
use super::types::{FilesystemStat, MemoryUsage, SampleEnvelope, TickSample, UsageSnapshot};
use crate::config::{MemorySource, SamplerConfig, SAMPLER_CONFIG};
use crate::error::{MetricError, MetricResult};

const CPU_SOURCE: &str = "host::cpu_ticks";
const MEMORY_SOURCE: &str = "host::vm_statistics";
const DISK_SOURCE: &str = "libc::statvfs";

/// Owns the CPU delta state and routes the three utilisation queries.
///
/// CPU readings are only meaningful relative to the previous call on the
/// same instance, so one logical sampling loop should own it. Use
/// [`global_sampler`] when the whole process shares one.
pub struct ResourceSampler {
    cpu: CpuLoadSampler,
    config: SamplerConfig,
}

impl Default for ResourceSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler {
    pub fn new() -> Self {
        Self::with_config(SamplerConfig::default())
    }

    pub fn with_config(config: SamplerConfig) -> Self {
        ResourceSampler {
            cpu: CpuLoadSampler::new(),
            config,
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn previous_ticks(&self) -> TickSample {
        self.cpu.previous()
    }

    /// Load fraction for an already-read tick sample. Advances the stored state.
    pub fn sample_cpu_load(&mut self, current: TickSample) -> f64 {
        self.cpu.sample(current)
    }

    /// Reads the host counters and samples them. A failed read leaves the
    /// stored state untouched.
    pub fn sample_host_cpu_load(&mut self) -> MetricResult<f64> {
        self.sample_cpu_load_with(read_host_ticks)
    }

    pub(crate) fn sample_cpu_load_with<F>(&mut self, read_ticks: F) -> MetricResult<f64>
    where
        F: FnOnce() -> MetricResult<TickSample>,
    {
        let current = read_ticks()?;
        Ok(self.cpu.sample(current))
    }

    pub fn sample_memory_usage<I, S>(&self, lines: I) -> MetricResult<f64>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        memory_usage_ratio(lines)
    }

    pub fn sample_host_memory_usage(&self) -> MetricResult<f64> {
        self.sample_memory_usage_with(read_host_memory)
    }

    pub(crate) fn sample_memory_usage_with<F>(&self, read_host: F) -> MetricResult<f64>
    where
        F: FnOnce() -> MetricResult<MemoryUsage>,
    {
        match self.config.memory_source {
            MemorySource::HostApi => usage_ratio(read_host()?),
            MemorySource::VmStat => self.sample_vm_stat(),
            MemorySource::Auto => match read_host().and_then(usage_ratio) {
                Ok(ratio) => Ok(ratio),
                Err(err) => {
                    warn!(
                        "host memory statistics failed: {}. Falling back to vm_stat",
                        err
                    );
                    self.sample_vm_stat()
                }
            },
        }
    }

    fn sample_vm_stat(&self) -> MetricResult<f64> {
        let lines = read_vm_stat(&self.config.vm_stat_program)?;
        memory_usage_ratio(&lines)
    }

    pub fn sample_disk_usage(&self, stat: &FilesystemStat) -> MetricResult<f64> {
        disk_usage(stat)
    }

    pub fn sample_host_disk_usage(&self) -> MetricResult<f64> {
        let stat = read_filesystem_stat(&self.config.disk_path)?;
        disk_usage(&stat)
    }

    /// Samples all three host metrics, recording per-metric errors instead
    /// of failing as a whole.
    pub fn snapshot(&mut self) -> UsageSnapshot {
        let cpu_valid_for = self.config.cpu_valid_for();
        let memory_valid_for = self.config.memory_valid_for();
        let disk_valid_for = self.config.disk_valid_for();

        let cpu = timed(cpu_valid_for, CPU_SOURCE, || self.sample_host_cpu_load());
        let memory = timed(memory_valid_for, MEMORY_SOURCE, || {
            self.sample_host_memory_usage()
        });
        let mut filesystem = None;
        let disk = timed(disk_valid_for, DISK_SOURCE, || {
            let stat = read_filesystem_stat(&self.config.disk_path)?;
            filesystem = Some(stat);
            disk_usage(&stat)
        });

        for (name, envelope) in [("cpu", &cpu), ("memory", &memory), ("disk", &disk)] {
            if let Some(err) = envelope.error.as_ref() {
                warn!("{} sampler error: {}", name, err);
            }
        }

        UsageSnapshot {
            captured_at: Utc::now(),
            cpu,
            memory,
            disk,
            filesystem,
        }
    }
}

fn usage_ratio(usage: MemoryUsage) -> MetricResult<f64> {
    usage.ratio().ok_or(MetricError::NoUsableData {
        origin: "host memory statistics",
        detail: "total page count is zero".to_string(),
    })
}

fn timed<F>(valid_for: Duration, source: &str, sample: F) -> SampleEnvelope<f64>
where
    F: FnOnce() -> MetricResult<f64>,
{
    let started = Instant::now();
    let result = sample();
    SampleEnvelope::from_result(result, valid_for, started.elapsed(), source)
}

lazy_static! {
    static ref GLOBAL_SAMPLER: Mutex<ResourceSampler> =
        Mutex::new(ResourceSampler::with_config(SAMPLER_CONFIG.clone()));
}

/// The process-wide sampler, configured from the environment.
pub fn global_sampler() -> &'static Mutex<ResourceSampler> {
    &GLOBAL_SAMPLER
}
