use std::path::Path;
use std::process::Command;

use log::{debug, warn};

use super::types::MemoryUsage;
use crate::error::{MetricError, MetricResult};

/// Category token that opens every page statistic in a `vm_stat` report.
const STAT_LABEL: &str = "Pages";
const BANNER_PREFIX: &str = "Mach Virtual Memory Statistics";
/// Page categories counted as in use. Matched as prefixes of the whole line,
/// so "Pages wired down" counts as wired.
const USED_PREFIXES: [&str; 2] = ["Pages wired", "Pages active"];

/// One `<label> <name>: <integer>.` record.
#[derive(Clone, Debug, PartialEq)]
pub struct StatLine<'a> {
    pub label: &'a str,
    pub name: &'a str,
    /// `None` when the line carries no digits.
    pub value: Option<f64>,
    line: &'a str,
}

impl<'a> StatLine<'a> {
    /// Parses a page statistic, or returns `None` if the line is not one.
    pub fn parse(line: &'a str) -> Option<Self> {
        if !line.starts_with(STAT_LABEL) {
            return None;
        }
        let rest = &line[STAT_LABEL.len()..];
        let name = rest.split(':').next().unwrap_or("").trim();
        Some(StatLine {
            label: STAT_LABEL,
            name,
            value: first_integer(rest),
            line,
        })
    }

    pub fn counts_as_used(&self) -> bool {
        USED_PREFIXES
            .iter()
            .any(|prefix| self.line.starts_with(prefix))
    }
}

/// How the parser treats a line of a report.
#[derive(Clone, Debug, PartialEq)]
pub enum LineKind<'a> {
    Banner,
    Statistic(StatLine<'a>),
    /// Anything else; consumption stops here.
    Unclassified,
}

impl<'a> LineKind<'a> {
    /// Classifies `line`. The first line of a report is its banner unless it
    /// is itself a statistic; later lines are banners only if they repeat
    /// the banner text.
    pub fn classify(line: &'a str, is_first: bool) -> Self {
        if let Some(stat) = StatLine::parse(line) {
            LineKind::Statistic(stat)
        } else if is_first || line.starts_with(BANNER_PREFIX) {
            LineKind::Banner
        } else {
            LineKind::Unclassified
        }
    }
}

/// Skips leading non-digits and reads the digit run that follows.
fn first_integer(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits = &text[start..];
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<f64>().ok()
}

/// Aggregates page statistics from a `vm_stat`-style report.
///
/// Lines are consumed while they classify as banner or statistic; the first
/// unclassified line ends the scan, so nothing after it is interpreted.
/// Wired and active pages count as used; every statistic counts toward the
/// total.
pub fn parse_vm_stat<I, S>(lines: I) -> MetricResult<MemoryUsage>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut usage = MemoryUsage::default();
    let mut banner_seen = false;

    for (index, line) in lines.into_iter().enumerate() {
        let line = line.as_ref().trim_end_matches(['\r', '\n']);
        match LineKind::classify(line, index == 0) {
            LineKind::Banner => banner_seen = true,
            LineKind::Statistic(stat) => match stat.value {
                Some(value) => {
                    if stat.counts_as_used() {
                        usage.used_pages += value;
                    }
                    usage.total_pages += value;
                }
                None => {
                    debug!("skipping page statistic without a value: {}", line);
                    usage.skipped_lines += 1;
                }
            },
            LineKind::Unclassified => break,
        }
    }

    if usage.total_pages > 0.0 {
        Ok(usage)
    } else {
        let detail = format!(
            "no page statistics (banner seen: {}, unparseable lines: {})",
            banner_seen, usage.skipped_lines
        );
        warn!("vm_stat report yielded {}", detail);
        Err(MetricError::NoUsableData {
            origin: "vm_stat",
            detail,
        })
    }
}

/// Memory usage ratio in `[0,1]` from a `vm_stat`-style report.
pub fn memory_usage_ratio<I, S>(lines: I) -> MetricResult<f64>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let usage = parse_vm_stat(lines)?;
    usage.ratio().ok_or(MetricError::NoUsableData {
        origin: "vm_stat",
        detail: "total page count is zero".to_string(),
    })
}

/// Runs the statistics tool and returns its output lines.
pub fn read_vm_stat(program: &Path) -> MetricResult<Vec<String>> {
    let program_name = program.display().to_string();
    let output = Command::new(program)
        .output()
        .map_err(|e| MetricError::Command {
            program: program_name.clone(),
            detail: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(MetricError::Command {
            program: program_name,
            detail: format!("exited with {}", output.status),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect())
}

/// Reads page counts straight from the Mach VM statistics.
///
/// Totals cover the same categories `vm_stat` prints ahead of its first
/// non-`Pages` line.
#[cfg(target_os = "macos")]
pub fn read_host_memory() -> MetricResult<MemoryUsage> {
    use libc::{
        host_statistics64, mach_msg_type_number_t, vm_statistics64, HOST_VM_INFO64,
        HOST_VM_INFO64_COUNT,
    };
    use std::mem::MaybeUninit;

    unsafe {
        #[allow(deprecated)]
        let host = libc::mach_host_self();

        let mut stats = MaybeUninit::<vm_statistics64>::uninit();
        let mut count: mach_msg_type_number_t = HOST_VM_INFO64_COUNT;
        let result = host_statistics64(
            host,
            HOST_VM_INFO64,
            stats.as_mut_ptr() as *mut _,
            &mut count,
        );
        if result != 0 {
            return Err(MetricError::MachCall {
                call: "host_statistics64(HOST_VM_INFO64)",
                code: result,
            });
        }
        let stats = stats.assume_init();

        let wired = stats.wire_count as f64;
        let active = stats.active_count as f64;
        let total = stats.free_count as f64
            + active
            + stats.inactive_count as f64
            + stats.speculative_count as f64
            + stats.throttled_count as f64
            + wired
            + stats.purgeable_count as f64;

        Ok(MemoryUsage {
            used_pages: wired + active,
            total_pages: total,
            skipped_lines: 0,
        })
    }
}

/// Derives page counts from the kernel's used/total memory figures.
#[cfg(not(target_os = "macos"))]
pub fn read_host_memory() -> MetricResult<MemoryUsage> {
    use sysinfo::System;

    let mut system = System::new();
    system.refresh_memory();

    let page_size = page_size() as f64;
    Ok(MemoryUsage {
        used_pages: system.used_memory() as f64 / page_size,
        total_pages: system.total_memory() as f64 / page_size,
        skipped_lines: 0,
    })
}

#[cfg(not(target_os = "macos"))]
fn page_size() -> u64 {
    let raw = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if raw > 0 {
        raw as u64
    } else {
        4096
    }
}
