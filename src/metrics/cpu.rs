use log::debug;

use super::types::TickSample;
use crate::error::{MetricError, MetricResult};

/// Turns successive cumulative tick readings into a load fraction.
///
/// The previous reading starts at `{0, 0}`, so the first call after
/// construction measures load averaged since boot rather than an
/// instantaneous rate. Callers that need an accurate first value should
/// discard it.
///
/// Not safe for concurrent use; share it behind a mutex.
#[derive(Debug, Default)]
pub struct CpuLoadSampler {
    previous: TickSample,
    calls: u64,
}

impl CpuLoadSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous(&self) -> TickSample {
        self.previous
    }

    /// Load in `[0,1]` over the ticks elapsed since the previous call.
    ///
    /// With no elapsed ticks the idle share is taken as zero, giving `1.0`.
    /// The stored reading is replaced on every call.
    pub fn sample(&mut self, current: TickSample) -> f64 {
        if self.calls == 0 {
            debug!("first cpu sample is measured against boot, not a previous call");
        }

        let delta_total = current.total_ticks.saturating_sub(self.previous.total_ticks);
        let delta_idle = current.idle_ticks.saturating_sub(self.previous.idle_ticks);

        let idle_share = if delta_total > 0 {
            delta_idle as f64 / delta_total as f64
        } else {
            0.0
        };

        self.previous = current;
        self.calls = self.calls.saturating_add(1);

        (1.0 - idle_share).clamp(0.0, 1.0)
    }
}

/// Reads the host's cumulative CPU tick counters.
#[cfg(target_os = "macos")]
pub fn read_host_ticks() -> MetricResult<TickSample> {
    use libc::{
        host_cpu_load_info, host_statistics64, mach_msg_type_number_t, CPU_STATE_IDLE,
        CPU_STATE_MAX, HOST_CPU_LOAD_INFO, HOST_CPU_LOAD_INFO_COUNT,
    };
    use std::mem::MaybeUninit;

    unsafe {
        #[allow(deprecated)]
        let host = libc::mach_host_self();

        let mut info = MaybeUninit::<host_cpu_load_info>::uninit();
        let mut count: mach_msg_type_number_t = HOST_CPU_LOAD_INFO_COUNT;
        let result = host_statistics64(
            host,
            HOST_CPU_LOAD_INFO,
            info.as_mut_ptr() as *mut _,
            &mut count,
        );
        if result != 0 {
            return Err(MetricError::MachCall {
                call: "host_statistics64(HOST_CPU_LOAD_INFO)",
                code: result,
            });
        }
        let info = info.assume_init();

        let total_ticks = info.cpu_ticks[..CPU_STATE_MAX as usize]
            .iter()
            .map(|ticks| *ticks as u64)
            .sum();
        Ok(TickSample {
            idle_ticks: info.cpu_ticks[CPU_STATE_IDLE as usize] as u64,
            total_ticks,
        })
    }
}

#[cfg(target_os = "linux")]
const PROC_STAT: &str = "/proc/stat";

/// Reads the host's cumulative CPU tick counters.
#[cfg(target_os = "linux")]
pub fn read_host_ticks() -> MetricResult<TickSample> {
    let content = std::fs::read_to_string(PROC_STAT).map_err(|e| MetricError::Io {
        path: PROC_STAT.to_string(),
        source: e,
    })?;
    parse_proc_stat(&content)
}

/// Reads the host's cumulative CPU tick counters.
#[cfg(not(any(target_os = "macos", target_os = "linux")))]
pub fn read_host_ticks() -> MetricResult<TickSample> {
    Err(MetricError::Unsupported("cpu tick counters"))
}

/// Extracts the aggregate counters from `/proc/stat` text.
///
/// `cpu  user nice system idle iowait irq softirq steal guest guest_nice`:
/// total is user..steal (guest time is already folded into user), idle is
/// idle + iowait.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) fn parse_proc_stat(content: &str) -> MetricResult<TickSample> {
    let line = content
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| MetricError::Malformed {
            origin: "/proc/stat",
            detail: "no aggregate cpu line".to_string(),
        })?;

    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .map(|field| field.parse::<u64>())
        .collect::<Result<_, _>>()
        .map_err(|e| MetricError::Malformed {
            origin: "/proc/stat",
            detail: format!("bad tick counter in '{line}': {e}"),
        })?;

    if fields.len() < 4 {
        return Err(MetricError::Malformed {
            origin: "/proc/stat",
            detail: format!("expected at least 4 counters, got {}", fields.len()),
        });
    }

    let total_ticks = fields.iter().take(8).sum();
    let idle_ticks = fields[3] + fields.get(4).copied().unwrap_or(0);
    Ok(TickSample {
        idle_ticks,
        total_ticks,
    })
}
