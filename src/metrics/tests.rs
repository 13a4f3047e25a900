#![cfg(test)]

use super::*;
use crate::error::{MetricError, OrSentinel, SENTINEL};
use chrono::Utc;
use std::time::Duration;

const VM_STAT_REPORT: &str = "\
Mach Virtual Memory Statistics: (page size of 16384 bytes)
Pages free:                               12005.
Pages active:                            301437.
Pages inactive:                          297150.
Pages speculative:                         2301.
Pages throttled:                              0.
Pages wired down:                        125066.
Pages purgeable:                           6180.
\"Translation faults\":                 1403938233.
Pages copy-on-write:                   52613472.
Pages zero filled:                    523858380.
";

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn first_call_with_zero_ticks_reports_full_load() {
    let mut sampler = CpuLoadSampler::new();
    assert_eq!(sampler.sample(TickSample::new(0, 0)), 1.0);
    assert_eq!(sampler.previous(), TickSample::new(0, 0));
    assert_eq!(sampler.sample(TickSample::new(0, 0)), 1.0);
}

#[test]
fn load_is_measured_against_previous_call() {
    let mut sampler = CpuLoadSampler::new();
    sampler.sample(TickSample::new(100, 200));
    let load = sampler.sample(TickSample::new(150, 400));
    assert!(approx_eq(load, 0.75));
    assert_eq!(sampler.previous(), TickSample::new(150, 400));
}

#[test]
fn first_call_reflects_since_boot_average() {
    let mut sampler = CpuLoadSampler::new();
    // 900 of 1000 ticks idle since boot.
    assert!(approx_eq(sampler.sample(TickSample::new(900, 1000)), 0.1));
}

#[test]
fn repeated_identical_input_changes_the_result() {
    let mut sampler = CpuLoadSampler::new();
    let ticks = TickSample::new(30, 100);
    let first = sampler.sample(ticks);
    let second = sampler.sample(ticks);
    assert!(approx_eq(first, 0.7));
    // No elapsed ticks the second time round.
    assert_eq!(second, 1.0);
}

#[test]
fn load_stays_in_unit_interval_for_valid_deltas() {
    let mut sampler = CpuLoadSampler::new();
    let mut idle = 0u64;
    let mut total = 0u64;
    for step in 1..50u64 {
        let delta_total = step * 7;
        let delta_idle = (step * 13) % (delta_total + 1);
        idle += delta_idle;
        total += delta_total;
        let load = sampler.sample(TickSample::new(idle, total));
        assert!((0.0..=1.0).contains(&load), "load {load} out of range");
    }
}

#[test]
fn parser_stops_at_first_non_statistic_line() {
    let lines = [
        "Mach Virtual Memory Statistics...",
        "Pages free: 1000.",
        "Pages active: 2000.",
        "Pages wired down: 500.",
        "Translation faults: 99999.",
    ];
    let ratio = memory_usage_ratio(lines).unwrap();
    assert!(approx_eq(ratio, 2500.0 / 3500.0));

    let usage = parse_vm_stat(lines).unwrap();
    assert_eq!(usage.used_pages, 2500.0);
    assert_eq!(usage.total_pages, 3500.0);
}

#[test]
fn parser_ignores_statistics_after_terminator() {
    let usage = parse_vm_stat(VM_STAT_REPORT.lines()).unwrap();
    let used = 301437.0 + 125066.0;
    let total = 12005.0 + 301437.0 + 297150.0 + 2301.0 + 0.0 + 125066.0 + 6180.0;
    assert_eq!(usage.used_pages, used);
    assert_eq!(usage.total_pages, total);
    assert!(usage.used_pages <= usage.total_pages);
}

#[test]
fn parser_without_statistics_returns_sentinel() {
    let lines = ["Mach Virtual Memory Statistics:", "Translation faults: 99999."];
    let err = memory_usage_ratio(lines).unwrap_err();
    assert!(matches!(err, MetricError::NoUsableData { .. }));
    assert_eq!(memory_usage_ratio(lines).or_sentinel(), SENTINEL);

    let empty: [&str; 0] = [];
    assert_eq!(memory_usage_ratio(empty).or_sentinel(), SENTINEL);
}

#[test]
fn parser_skips_statistics_without_digits() {
    let lines = [
        "Mach Virtual Memory Statistics:",
        "Pages free: n/a.",
        "Pages active: 300.",
        "Pages inactive: 100.",
    ];
    let usage = parse_vm_stat(lines).unwrap();
    assert_eq!(usage.skipped_lines, 1);
    assert_eq!(usage.total_pages, 400.0);
    assert!(approx_eq(usage.ratio().unwrap(), 0.75));
}

#[test]
fn parser_counts_statistic_on_first_line() {
    let usage = parse_vm_stat(["Pages wired down: 10.", "Pages free: 30."]).unwrap();
    assert_eq!(usage.used_pages, 10.0);
    assert_eq!(usage.total_pages, 40.0);
}

#[test]
fn parser_tolerates_repeated_banner_and_line_endings() {
    let lines = [
        "Mach Virtual Memory Statistics: (page size of 4096 bytes)\r\n",
        "Pages active: 50.\r\n",
        "Mach Virtual Memory Statistics: (page size of 4096 bytes)\r\n",
        "Pages free: 50.\r\n",
    ];
    assert!(approx_eq(memory_usage_ratio(lines).unwrap(), 0.5));
}

#[test]
fn stat_line_fields() {
    let stat = StatLine::parse("Pages wired down:                        125066.").unwrap();
    assert_eq!(stat.label, "Pages");
    assert_eq!(stat.name, "wired down");
    assert_eq!(stat.value, Some(125066.0));
    assert!(stat.counts_as_used());

    let stat = StatLine::parse("Pages inactive: 7.").unwrap();
    assert!(!stat.counts_as_used());
    assert!(StatLine::parse("File-backed pages: 1.").is_none());
}

#[test]
fn line_classification() {
    assert_eq!(LineKind::classify("anything at all", true), LineKind::Banner);
    assert_eq!(
        LineKind::classify("Mach Virtual Memory Statistics:", false),
        LineKind::Banner
    );
    assert_eq!(
        LineKind::classify("File-backed pages: 1.", false),
        LineKind::Unclassified
    );
    assert!(matches!(
        LineKind::classify("Pages free: 1.", false),
        LineKind::Statistic(_)
    ));
}

#[test]
fn disk_usage_is_used_fraction() {
    let stat = FilesystemStat {
        total_blocks: 1000,
        free_blocks: 250,
        block_size: 4096,
    };
    assert!(approx_eq(disk_usage(&stat).unwrap(), 0.75));
    // Pure: same input, same output.
    assert_eq!(disk_usage(&stat).unwrap(), disk_usage(&stat).unwrap());
    assert_eq!(stat.total_bytes(), 4_096_000);
    assert_eq!(stat.free_bytes(), 1_024_000);
}

#[test]
fn disk_usage_zero_total_is_sentinel() {
    let stat = FilesystemStat {
        total_blocks: 0,
        free_blocks: 0,
        block_size: 4096,
    };
    assert!(matches!(
        disk_usage(&stat),
        Err(MetricError::NoUsableData { .. })
    ));
    assert_eq!(disk_usage(&stat).or_sentinel(), SENTINEL);
}

#[test]
fn disk_usage_bounds() {
    let full = FilesystemStat {
        total_blocks: 10,
        free_blocks: 0,
        block_size: 512,
    };
    let empty = FilesystemStat {
        total_blocks: 10,
        free_blocks: 10,
        block_size: 512,
    };
    assert_eq!(disk_usage(&full).unwrap(), 1.0);
    assert_eq!(disk_usage(&empty).unwrap(), 0.0);
}

#[test]
fn facade_routes_to_owned_sampler() {
    let mut sampler = ResourceSampler::new();
    sampler.sample_cpu_load(TickSample::new(100, 200));
    assert!(approx_eq(
        sampler.sample_cpu_load(TickSample::new(150, 400)),
        0.75
    ));
    assert_eq!(sampler.previous_ticks(), TickSample::new(150, 400));

    let ratio = sampler
        .sample_memory_usage(["banner", "Pages active: 1.", "Pages free: 3."])
        .unwrap();
    assert!(approx_eq(ratio, 0.25));

    let stat = FilesystemStat {
        total_blocks: 4,
        free_blocks: 1,
        block_size: 1,
    };
    assert!(approx_eq(sampler.sample_disk_usage(&stat).unwrap(), 0.75));
}

#[test]
fn envelope_fresh_preserves_metadata() {
    let start = Utc::now();
    let envelope = SampleEnvelope::fresh(
        0.5f64,
        start,
        Duration::from_millis(1500),
        Duration::from_millis(12),
        "unit-test",
    );
    assert_eq!(envelope.value, Some(0.5));
    assert_eq!(envelope.source, "unit-test");
    assert_eq!(envelope.valid_for_ms, 1500);
    assert_eq!(envelope.latency_ms, 12);
    assert!(envelope.error.is_none());
}

#[test]
fn envelope_from_error_keeps_message() {
    let envelope: SampleEnvelope<f64> = SampleEnvelope::from_result(
        Err(MetricError::Unsupported("cpu tick counters")),
        Duration::from_secs(1),
        Duration::ZERO,
        "unit-test",
    );
    assert!(!envelope.is_fresh());
    assert_eq!(
        envelope.error.as_deref(),
        Some("cpu tick counters is not supported on this platform")
    );
}

#[test]
fn failed_tick_read_keeps_previous_sample() {
    let mut sampler = ResourceSampler::new();
    sampler.sample_cpu_load(TickSample::new(100, 200));

    let result =
        sampler.sample_cpu_load_with(|| Err(MetricError::Unsupported("cpu tick counters")));
    assert!(matches!(result, Err(MetricError::Unsupported(_))));
    assert_eq!(sampler.previous_ticks(), TickSample::new(100, 200));

    // The next good read is still measured against the last good one.
    let load = sampler
        .sample_cpu_load_with(|| Ok(TickSample::new(150, 400)))
        .unwrap();
    assert!(approx_eq(load, 0.75));
}

#[test]
fn host_only_memory_source_does_not_fall_back() {
    let sampler = ResourceSampler::with_config(crate::config::SamplerConfig {
        memory_source: crate::config::MemorySource::HostApi,
        vm_stat_program: "/nonexistent/vm_stat".into(),
        ..Default::default()
    });
    let err = sampler
        .sample_memory_usage_with(|| {
            Err(MetricError::MachCall {
                call: "host_statistics64",
                code: 5,
            })
        })
        .unwrap_err();
    assert!(matches!(err, MetricError::MachCall { .. }));
}

#[cfg(unix)]
#[test]
fn auto_memory_source_falls_back_to_vm_stat() {
    use crate::config::{MemorySource, SamplerConfig};
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    let temp = TempDir::new().unwrap();
    let script = temp.path().join("vm_stat");
    fs::write(
        &script,
        "#!/bin/sh\n\
         echo 'Mach Virtual Memory Statistics: (page size of 4096 bytes)'\n\
         echo 'Pages free:                               1000.'\n\
         echo 'Pages active:                             2000.'\n\
         echo 'Pages wired down:                          500.'\n\
         echo 'Translation faults:                      99999.'\n",
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let sampler = ResourceSampler::with_config(SamplerConfig {
        memory_source: MemorySource::Auto,
        vm_stat_program: script,
        ..SamplerConfig::default()
    });

    let ratio = sampler
        .sample_memory_usage_with(|| {
            Err(MetricError::MachCall {
                call: "host_statistics64",
                code: 5,
            })
        })
        .unwrap();
    assert!(approx_eq(ratio, 2500.0 / 3500.0));

    // An empty host reading also triggers the fallback.
    let ratio = sampler
        .sample_memory_usage_with(|| Ok(MemoryUsage::default()))
        .unwrap();
    assert!(approx_eq(ratio, 2500.0 / 3500.0));
}
