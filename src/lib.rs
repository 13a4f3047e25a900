pub mod compat;
pub mod config;
mod error;
pub mod host;
mod metrics;

pub use config::{MemorySource, SamplerConfig};
pub use error::{MetricError, MetricResult, OrSentinel, SENTINEL};
pub use host::HostInfo;
pub use metrics::{
    disk_usage, global_sampler, memory_usage_ratio, parse_vm_stat, read_filesystem_stat,
    read_host_memory, read_host_ticks, read_vm_stat, CpuLoadSampler, FilesystemStat, LineKind,
    MemoryUsage, ResourceSampler, SampleEnvelope, StatLine, TickSample, UsageSnapshot,
};
