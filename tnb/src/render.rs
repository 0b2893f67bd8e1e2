//! Terminal output: banner, host inventory, run plan and the end-of-run summary.

use console::style;
use std::time::Duration;
use tnb_bench::benchmarks::{SweepResult, SweepStatus};
use tnb_bench::{BenchmarkReport, PoolReport, PoolSelection, PoolStatus};
use tnb_common::{BenchConfig, DiskInfo, GIB, PoolInfo, SystemInfo};

pub fn banner() {
    println!(
        "{}",
        style(format!("TN-Bench v{}", env!("CARGO_PKG_VERSION")))
            .bold()
            .cyan()
    );
    println!("Sequential write/read throughput for storage pools and disks.");
    println!();
}

/// Whole-second human duration, e.g. `1h 2m 3s`.
pub fn format_duration(secs: f64) -> String {
    let secs = if secs.is_finite() && secs > 0.0 {
        secs.round() as u64
    } else {
        0
    };
    humantime::format_duration(Duration::from_secs(secs)).to_string()
}

pub fn format_mbps(mbps: Option<f64>) -> String {
    match mbps {
        Some(v) => format!("{v:.2}"),
        None => "n/a".to_string(),
    }
}

fn point_status(result: &SweepResult) -> String {
    match &result.status {
        SweepStatus::Complete => "complete".to_string(),
        SweepStatus::Incomplete { phase, .. } => format!("incomplete ({phase})"),
        SweepStatus::Degenerate => "degenerate".to_string(),
    }
}

fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

/// System, pool and disk tables as reported by the host.
pub fn inventory_lines(system: &SystemInfo, pools: &[PoolInfo], disks: &[DiskInfo]) -> Vec<String> {
    let mut lines = vec![style("System").bold().to_string()];
    lines.push(format!("  Version: {}", or_dash(system.version.as_deref())));
    lines.push(format!("  Hostname: {}", or_dash(system.hostname.as_deref())));
    lines.push(format!("  Product: {}", or_dash(system.system_product.as_deref())));
    lines.push(format!("  CPU: {}", or_dash(system.model.as_deref())));
    let physical = system
        .physical_cores
        .map(|c| format!(" ({c} physical)"))
        .unwrap_or_default();
    lines.push(format!("  Cores: {}{physical}", system.cores));
    lines.push(format!("  Memory: {:.2} GiB", system.memory_gib()));
    if let Some([one, five, fifteen]) = system.load_average {
        lines.push(format!("  Load average: {one:.2} {five:.2} {fifteen:.2}"));
    }

    lines.push(style("Pools").bold().to_string());
    if pools.is_empty() {
        lines.push("  none".to_string());
    } else {
        lines.push(format!(
            "  {:<16}  {:<24}  {:<10}  {:>5}  {:>5}",
            "Name", "Path", "Status", "Vdevs", "Disks"
        ));
        for pool in pools {
            lines.push(format!(
                "  {:<16}  {:<24}  {:<10}  {:>5}  {:>5}",
                pool.name,
                pool.path,
                or_dash(pool.status.as_deref()),
                pool.vdev_count,
                pool.disk_count
            ));
        }
    }

    lines.push(style("Disks").bold().to_string());
    if disks.is_empty() {
        lines.push("  none".to_string());
    } else {
        lines.push(format!(
            "  {:<10}  {:<24}  {:<20}  {:>10}  Pool",
            "Name", "Model", "Serial", "Size GiB"
        ));
        for disk in disks {
            let size = match disk.capacity_bytes {
                Some(_) => format!("{:.2}", disk.capacity_gib()),
                None => "unknown".to_string(),
            };
            lines.push(format!(
                "  {:<10}  {:<24}  {:<20}  {:>10}  {}",
                disk.name,
                or_dash(disk.model.as_deref()),
                or_dash(disk.serial.as_deref()),
                size,
                or_dash(disk.pool.as_deref())
            ));
        }
    }
    lines
}

/// What is about to run, shown before the confirmation prompt.
pub fn plan_lines(config: &BenchConfig, system: &SystemInfo, selection: &PoolSelection) -> Vec<String> {
    let per_thread_gib = config.per_thread_bytes() as f64 / GIB as f64;
    let mut lines = vec![
        style("Run plan").bold().to_string(),
        format!(
            "  System: {} cores, {:.1} GiB memory",
            system.cores,
            system.memory_gib()
        ),
        format!("  Pools: {selection}"),
        format!(
            "  Pool iterations: {}, {:.1} GiB written per thread, record size {}",
            config.pool_iterations, per_thread_gib, config.record_size
        ),
    ];
    if config.disk_benchmark {
        lines.push(format!("  Disk iterations: {}", config.disk_iterations));
    } else {
        lines.push("  Disk benchmark: disabled".to_string());
    }
    lines.push(format!(
        "  Each pool needs about {:.1} GiB free; runs can take hours on large systems.",
        per_thread_gib * 2.0 * f64::from(system.cores)
    ));
    lines
}

fn pool_lines(pool: &PoolReport) -> Vec<String> {
    let status = match pool.status {
        PoolStatus::Completed => style("completed").green(),
        PoolStatus::Skipped => style("skipped").yellow(),
        PoolStatus::Failed => style("failed").red(),
    };
    let mount = pool
        .mount_path
        .as_ref()
        .map(|p| format!(" {}", p.display()))
        .unwrap_or_default();
    let mut lines = vec![format!(
        "{} [{status}]{mount}",
        style(format!("Pool {}", pool.pool)).bold()
    )];
    if !pool.results.is_empty() {
        lines.push(format!(
            "  {:>7}  {:>12}  {:>12}  Status",
            "Threads", "Write MiB/s", "Read MiB/s"
        ));
        for result in &pool.results {
            lines.push(format!(
                "  {:>7}  {:>12}  {:>12}  {}",
                result.thread_count,
                format_mbps(result.average_write_mbps),
                format_mbps(result.average_read_mbps),
                point_status(result)
            ));
        }
    }
    for error in &pool.errors {
        lines.push(format!("  {} {error}", style("!").red()));
    }
    lines
}

/// End-of-run summary table.
pub fn summary_lines(report: &BenchmarkReport) -> Vec<String> {
    let mut lines = vec![style("Summary").bold().underlined().to_string()];
    if report.pools.is_empty() {
        lines.push("No pools benchmarked.".to_string());
    }
    for pool in &report.pools {
        lines.extend(pool_lines(pool));
    }

    if !report.disks.is_empty() || !report.skipped_disks.is_empty() {
        lines.push(style("Disks").bold().to_string());
        lines.push(format!(
            "  {:<10}  {:<10}  {:>10}  {:>14}  Runs",
            "Disk", "Pool", "Read GiB", "Avg MiB/s"
        ));
        for disk in &report.disks {
            let runs = disk
                .runs_mbps
                .iter()
                .map(|r| format!("{r:.2}"))
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!(
                "  {:<10}  {:<10}  {:>10.1}  {:>14}  {runs}",
                disk.disk,
                disk.pool.as_deref().unwrap_or("-"),
                disk.calibrated_read_volume as f64 / GIB as f64,
                format_mbps(disk.average_mbps),
            ));
            if let Some(failure) = &disk.failure {
                lines.push(format!("  {} {failure}", style("!").red()));
            }
        }
        for skipped in &report.skipped_disks {
            lines.push(format!("  {:<10}  skipped: {}", skipped.disk, skipped.reason));
        }
    }

    lines.push(format!(
        "Total benchmark time: {}",
        format_duration(report.metadata.duration_secs)
    ));
    lines
}

pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}
