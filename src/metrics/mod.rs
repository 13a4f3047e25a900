mod cpu;
mod disk;
mod memory;
mod sampler;
#[cfg(test)]
mod tests;
mod types;

pub use cpu::{read_host_ticks, CpuLoadSampler};
pub use disk::{disk_usage, read_filesystem_stat};
pub use memory::{
    memory_usage_ratio, parse_vm_stat, read_host_memory, read_vm_stat, LineKind, StatLine,
};
pub use sampler::{global_sampler, ResourceSampler};
pub use types::{FilesystemStat, MemoryUsage, SampleEnvelope, TickSample, UsageSnapshot};
