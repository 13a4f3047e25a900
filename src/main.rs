use std::time::Duration;

use anyhow::Context;
use bytesize::ByteSize;
use clap::Parser;
use log::{info, warn};
use serde::Serialize;
use tokio::select;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use sysprobe_lib::compat::format_percentage;
use sysprobe_lib::{
    HostInfo, ResourceSampler, SamplerConfig, SampleEnvelope, UsageSnapshot, SENTINEL,
};

/// Point-in-time CPU, memory and disk utilisation.
#[derive(Parser, Debug)]
#[command(name = "sysprobe", version, about)]
struct Args {
    /// Print machine-readable JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Keep sampling until interrupted.
    #[arg(long)]
    watch: bool,

    /// Delay between samples in watch mode.
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Stop after this many reports in watch mode.
    #[arg(long)]
    count: Option<u64>,
}

#[derive(Serialize)]
struct Report<'a> {
    host: &'a HostInfo,
    usage: &'a UsageSnapshot,
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();

    let config = SamplerConfig::from_env();
    let mut sampler = ResourceSampler::with_config(config);
    let host = HostInfo::collect();

    if !args.watch {
        let snapshot = sampler.snapshot();
        return print_report(&args, &host, &snapshot);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build watch runtime")?;
    runtime.block_on(watch(args, host, sampler))
}

async fn watch(args: Args, host: HostInfo, mut sampler: ResourceSampler) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_cancel.cancel();
        }
    });

    // The first CPU reading averages since boot; take it now and discard it.
    if let Err(err) = sampler.sample_host_cpu_load() {
        warn!("initial cpu sample failed: {}", err);
    }

    let mut ticker = interval(Duration::from_millis(args.interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await;

    let mut reported = 0u64;
    loop {
        select! {
            _ = cancel.cancelled() => {
                info!("interrupted after {} reports", reported);
                break;
            }
            _ = ticker.tick() => {
                let Some((returned, snapshot)) = next_snapshot(sampler, &cancel).await? else {
                    info!("interrupted after {} reports", reported);
                    break;
                };
                sampler = returned;
                print_report(&args, &host, &snapshot)?;
                reported += 1;
                if args.count.is_some_and(|limit| reported >= limit) {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Runs one snapshot on the blocking pool. Returns `None` if cancelled first;
/// the sampler is dropped with the abandoned task in that case.
async fn next_snapshot(
    mut sampler: ResourceSampler,
    cancel: &CancellationToken,
) -> anyhow::Result<Option<(ResourceSampler, UsageSnapshot)>> {
    let task = tokio::task::spawn_blocking(move || {
        let snapshot = sampler.snapshot();
        (sampler, snapshot)
    });
    select! {
        biased;
        _ = cancel.cancelled() => Ok(None),
        joined = task => Ok(Some(joined.context("snapshot task failed")?)),
    }
}

fn print_report(args: &Args, host: &HostInfo, snapshot: &UsageSnapshot) -> anyhow::Result<()> {
    if args.json {
        let report = Report {
            host,
            usage: snapshot,
        };
        let line = if args.watch {
            serde_json::to_string(&report)
        } else {
            serde_json::to_string_pretty(&report)
        }
        .context("failed to serialise report")?;
        println!("{}", line);
        return Ok(());
    }

    if !args.watch {
        println!("Host: {}", host.display_hostname());
        println!("Model: {}", host.display_model());
        println!(
            "OS: {} {} ({})",
            host.display_os_name(),
            host.display_os_version(),
            host.display_kernel_name()
        );
        println!("CPU Architecture: {}", host.display_architecture());
    }
    println!("{}", format_percentage("CPU Usage", sentinel(&snapshot.cpu)));
    println!(
        "{}",
        format_percentage("Memory Usage", sentinel(&snapshot.memory))
    );

    let disk_line = format_percentage("Disk Usage", sentinel(&snapshot.disk));
    match snapshot.filesystem {
        Some(stat) if snapshot.disk.is_fresh() => println!(
            "{} of {} ({} free)",
            disk_line,
            ByteSize(stat.total_bytes()),
            ByteSize(stat.free_bytes())
        ),
        _ => println!("{}", disk_line),
    }
    Ok(())
}

fn sentinel(envelope: &SampleEnvelope<f64>) -> f32 {
    envelope.value.unwrap_or(SENTINEL) as f32
}
