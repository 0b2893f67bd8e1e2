//! `tnb run`: plan, confirm, benchmark, persist, clean up.

use crate::prompt::{self, DELETE_DEFAULT, LOW_SPACE_DEFAULT};
use crate::render;
use crate::{DeleteAction, LowSpaceAction, RunArgs};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tnb_bench::{BenchmarkReport, BenchmarkSession, DdRunner, SpaceDecision, SpacePolicy};
use tnb_common::{BenchConfig, ConfigSource, HostApi};
use tracing::{info, warn};

pub async fn run<H: HostApi>(host: H, mut config: BenchConfig, args: &RunArgs) -> Result<()> {
    let interactive = !args.yes && console::Term::stdout().is_term();
    render::banner();

    let mut selection = args.pools.clone().unwrap_or_default();

    if interactive {
        let system = host
            .system_info()
            .await
            .context("Failed to query system info")?;
        let pools = host.pools().await.context("Failed to query pools")?;
        let disks = host.disks().await.context("Failed to query disks")?;
        render::print_lines(&render::inventory_lines(&system, &pools, &disks));
        println!();

        if args.pools.is_none() {
            selection = prompt::select_pools(&pools)?;
        }
        ask_unset_options(&mut config)?;
        render::print_lines(&render::plan_lines(&config, &system, &selection));
        if !prompt::confirm("Start the benchmark?", true)? {
            info!("Benchmark cancelled");
            return Ok(());
        }
    }

    let runner = Arc::new(DdRunner::new(
        &config.dd_path,
        &config.random_source,
        &config.discard_sink,
    ));
    let output = config.output.clone();
    let session = BenchmarkSession::new(host, runner, config).with_selection(selection);

    let policy = space_policy(args.on_low_space, interactive);
    let outcome = session
        .run(policy.as_ref())
        .await
        .context("Benchmark run failed")?;

    for name in &outcome.unknown_pools {
        println!("{} pool '{name}' not found, ignored", console::style("warning:").yellow());
    }

    let report = &outcome.report;
    if !interactive {
        render::print_lines(&render::inventory_lines(
            &report.system,
            &report.inventory.pools,
            &report.inventory.disks,
        ));
    }
    println!();
    render::print_lines(&render::summary_lines(report));

    write_report(&outcome.report, &output).await?;
    println!("Results written to {}", output.display());
    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome.report)?);
    }

    for pool in &outcome.scratch_pools {
        if should_delete(args.delete_datasets, interactive, pool)? {
            match session.host().delete_scratch_dataset(pool).await {
                Ok(()) => info!(pool = %pool, "Scratch dataset deleted"),
                Err(e) => warn!(pool = %pool, error = %e, "Failed to delete scratch dataset"),
            }
        } else {
            info!(pool = %pool, "Scratch dataset kept");
        }
    }
    Ok(())
}

/// Prompt for options nobody set in a file, the environment or on the command line.
fn ask_unset_options(config: &mut BenchConfig) -> Result<()> {
    if config.source_of("pool_iterations") == ConfigSource::Default {
        config.pool_iterations = prompt::iterations("Pool", config.pool_iterations)?;
        config.set_cli("pool_iterations");
    }
    if config.source_of("disk_benchmark") == ConfigSource::Default {
        config.disk_benchmark = prompt::confirm("Run the per-disk read benchmark?", true)?;
        config.set_cli("disk_benchmark");
    }
    if config.disk_benchmark && config.source_of("disk_iterations") == ConfigSource::Default {
        config.disk_iterations = prompt::iterations("Disk", config.disk_iterations)?;
        config.set_cli("disk_iterations");
    }
    Ok(())
}

fn space_policy(action: LowSpaceAction, interactive: bool) -> Box<dyn SpacePolicy> {
    match action {
        LowSpaceAction::Skip => Box::new(SpaceDecision::Skip),
        LowSpaceAction::Proceed => Box::new(SpaceDecision::Proceed),
        LowSpaceAction::Ask if interactive => Box::new(prompt::ask_low_space),
        LowSpaceAction::Ask => Box::new(LOW_SPACE_DEFAULT),
    }
}

fn should_delete(action: DeleteAction, interactive: bool, pool: &str) -> Result<bool> {
    match action {
        DeleteAction::Yes => Ok(true),
        DeleteAction::No => Ok(false),
        DeleteAction::Ask if interactive => {
            prompt::confirm(&format!("Delete the scratch dataset on pool {pool}?"), DELETE_DEFAULT)
        }
        DeleteAction::Ask => Ok(DELETE_DEFAULT),
    }
}

async fn write_report(report: &BenchmarkReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
