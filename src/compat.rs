//! Free functions returning plain values, for callers that expect a float in
//! `[0,1]` or `-1.0` and a string with a readable default.
//!
//! CPU load goes through [`global_sampler`], so every caller in the process
//! shares one delta state. The first call reports load averaged since boot.
//! Memory and disk read the same environment configuration without locking it.

use std::fmt::Write;
use std::sync::{Mutex, MutexGuard};

use crate::config::SAMPLER_CONFIG;
use crate::error::{MetricResult, OrSentinel};
use crate::host::HostInfo;
use crate::metrics::{global_sampler, ResourceSampler};

fn lock(sampler: &Mutex<ResourceSampler>) -> MutexGuard<'_, ResourceSampler> {
    sampler.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn as_f32(result: MetricResult<f64>) -> f32 {
    result.or_sentinel() as f32
}

pub fn cpu_load() -> f32 {
    as_f32(lock(global_sampler()).sample_host_cpu_load())
}

/// Memory and disk carry no cross-call state, so they skip the shared lock.
fn stateless_sampler() -> ResourceSampler {
    ResourceSampler::with_config(SAMPLER_CONFIG.clone())
}

pub fn memory_usage() -> f32 {
    as_f32(stateless_sampler().sample_host_memory_usage())
}

pub fn disk_usage() -> f32 {
    as_f32(stateless_sampler().sample_host_disk_usage())
}

pub fn architecture() -> String {
    HostInfo::collect().display_architecture()
}

pub fn host_name() -> String {
    HostInfo::collect().display_hostname()
}

pub fn model_name() -> String {
    HostInfo::collect().display_model()
}

pub fn os_name() -> String {
    HostInfo::collect().display_os_name()
}

pub fn os_version() -> String {
    HostInfo::collect().display_os_version()
}

pub fn kernel_name() -> String {
    HostInfo::collect().display_kernel_name()
}

/// Renders one `label: value%` line, or a failure notice for the sentinel.
pub fn format_percentage(label: &str, value: f32) -> String {
    if value < 0.0 {
        format!("Failed to retrieve {}", label.to_lowercase())
    } else {
        format!("{}: {:.2}%", label, value * 100.0)
    }
}

/// Short multi-line overview of the host and its current utilisation.
pub fn system_report() -> String {
    let mut report = String::new();
    let _ = writeln!(report, "CPU Architecture: {}", architecture());
    for (label, value) in [
        ("CPU Usage", cpu_load()),
        ("Memory Usage", memory_usage()),
        ("Disk Usage", disk_usage()),
    ] {
        let _ = writeln!(report, "{}", format_percentage(label, value));
    }
    report
}
