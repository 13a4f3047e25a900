// src/config.rs

use std::path::PathBuf;
use std::time::Duration;

use lazy_static::lazy_static;
use log::warn;
use serde::{Deserialize, Serialize};

pub const DISK_PATH_ENV: &str = "SYSPROBE_DISK_PATH";
pub const VM_STAT_ENV: &str = "SYSPROBE_VM_STAT";
pub const MEMORY_SOURCE_ENV: &str = "SYSPROBE_MEMORY_SOURCE";

/// Where memory page counts come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemorySource {
    /// Structured host call, falling back to the `vm_stat` report.
    #[default]
    Auto,
    HostApi,
    VmStat,
}

impl MemorySource {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(MemorySource::Auto),
            "host" | "host_api" => Some(MemorySource::HostApi),
            "vm_stat" | "vmstat" => Some(MemorySource::VmStat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    pub disk_path: PathBuf,         // Default: "/"
    pub vm_stat_program: PathBuf,   // Default: /usr/bin/vm_stat
    pub memory_source: MemorySource,

    // How long each reading stays representative
    pub cpu_valid_for_ms: u64,    // Default: 1000
    pub memory_valid_for_ms: u64, // Default: 5000
    pub disk_valid_for_ms: u64,   // Default: 30000
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            disk_path: PathBuf::from("/"),
            vm_stat_program: PathBuf::from("/usr/bin/vm_stat"),
            memory_source: MemorySource::Auto,
            cpu_valid_for_ms: 1_000,
            memory_valid_for_ms: 5_000,
            disk_valid_for_ms: 30_000,
        }
    }
}

impl SamplerConfig {
    /// Defaults with any `SYSPROBE_*` overrides from the environment applied.
    pub fn from_env() -> Self {
        let mut config = SamplerConfig::default();

        if let Some(path) = non_empty_var(DISK_PATH_ENV) {
            config.disk_path = PathBuf::from(path);
        }
        if let Some(program) = non_empty_var(VM_STAT_ENV) {
            config.vm_stat_program = PathBuf::from(program);
        }
        if let Some(raw) = non_empty_var(MEMORY_SOURCE_ENV) {
            match MemorySource::parse(&raw) {
                Some(source) => config.memory_source = source,
                None => warn!(
                    "ignoring {}={:?}; expected auto, host or vm_stat",
                    MEMORY_SOURCE_ENV, raw
                ),
            }
        }

        config
    }

    pub fn cpu_valid_for(&self) -> Duration {
        Duration::from_millis(self.cpu_valid_for_ms)
    }

    pub fn memory_valid_for(&self) -> Duration {
        Duration::from_millis(self.memory_valid_for_ms)
    }

    pub fn disk_valid_for(&self) -> Duration {
        Duration::from_millis(self.disk_valid_for_ms)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

// Global configuration
lazy_static! {
    pub static ref SAMPLER_CONFIG: SamplerConfig = SamplerConfig::from_env();
}
