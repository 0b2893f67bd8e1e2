//! TN-Bench - storage pool and disk throughput benchmark.
//!
//! Sweeps parallel `dd` write/read workloads across each selected pool and
//! reads every disk raw, then writes a JSON report.

#![forbid(unsafe_code)]

mod prompt;
mod render;
mod run;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tnb_bench::PoolSelection;
use tnb_common::host::{HostApi, parse_pool_spec};
use tnb_common::{BenchConfig, LocalHost, LogConfig, MidcltHost, init_logging};
use tracing::debug;

#[derive(Parser)]
#[command(name = "tnb")]
#[command(author, version, about = "TN-Bench - storage pool and disk throughput benchmark")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Host backend
    #[arg(long, value_enum, default_value_t = HostKind::Truenas, global = true)]
    host: HostKind,

    /// Directory pool for the local backend, as `name=dir` (repeatable)
    #[arg(long = "local-pool", value_name = "NAME=DIR", global = true)]
    local_pools: Vec<String>,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pool sweep and disk calibration
    Run(RunArgs),

    /// Print host inventory as JSON
    Inventory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum HostKind {
    /// TrueNAS middleware via `midclt`
    Truenas,
    /// Plain directories on a Linux host
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LowSpaceAction {
    Ask,
    Skip,
    Proceed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeleteAction {
    Ask,
    Yes,
    No,
}

#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Pools to benchmark: `all`, `none`, or a comma-separated list
    #[arg(long)]
    pub pools: Option<PoolSelection>,

    /// Trials per phase at each sweep point
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=2))]
    pub pool_iterations: Option<u32>,

    /// Reads per disk
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=2))]
    pub disk_iterations: Option<u32>,

    /// Skip the per-disk read benchmark
    #[arg(long)]
    pub no_disk_benchmark: bool,

    /// Record size for the scratch dataset (e.g. 1M, 128K)
    #[arg(long)]
    pub record_size: Option<String>,

    /// Per-thread write budget in MiB
    #[arg(long)]
    pub per_thread_mib: Option<u64>,

    /// Report output path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Answer prompts with their defaults and start without confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// What to do when a pool has less free space than the sweep needs
    #[arg(long, value_enum, default_value_t = LowSpaceAction::Ask)]
    pub on_low_space: LowSpaceAction,

    /// Whether to delete the scratch datasets after the run
    #[arg(long, value_enum, default_value_t = DeleteAction::Ask)]
    pub delete_datasets: DeleteAction,

    /// Also print the report as JSON to stdout
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    /// Overlay command-line values onto the resolved configuration.
    fn apply(&self, config: &mut BenchConfig) -> Result<()> {
        if let Some(n) = self.pool_iterations {
            config.pool_iterations = tnb_common::Iterations::new(n)?;
            config.set_cli("pool_iterations");
        }
        if let Some(n) = self.disk_iterations {
            config.disk_iterations = tnb_common::Iterations::new(n)?;
            config.set_cli("disk_iterations");
        }
        if self.no_disk_benchmark {
            config.disk_benchmark = false;
            config.set_cli("disk_benchmark");
        }
        if let Some(record_size) = &self.record_size {
            config.record_size = record_size.clone();
            config.set_cli("record_size");
        }
        if let Some(mib) = self.per_thread_mib {
            config.per_thread_mib = mib;
            config.set_cli("per_thread_mib");
        }
        if let Some(output) = &self.output {
            config.output = output.clone();
            config.set_cli("output");
        }
        config.validate()?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env("info").with_stderr();
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    let _logging_guards = init_logging(&log_config)?;

    let mut config = BenchConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Run(args) => {
            args.apply(&mut config)?;
            debug!(?config, "Resolved configuration");
            match cli.host {
                HostKind::Truenas => {
                    let host = MidcltHost::new(&config.dataset_name, &config.record_size);
                    run::run(host, config, &args).await
                }
                HostKind::Local => {
                    let host = local_host(&cli.local_pools, &config)?;
                    run::run(host, config, &args).await
                }
            }
        }
        Commands::Inventory => match cli.host {
            HostKind::Truenas => {
                print_inventory(&MidcltHost::new(&config.dataset_name, &config.record_size)).await
            }
            HostKind::Local => print_inventory(&local_host(&cli.local_pools, &config)?).await,
        },
    }
}

fn local_host(specs: &[String], config: &BenchConfig) -> Result<LocalHost> {
    let pools = specs
        .iter()
        .map(|spec| {
            parse_pool_spec(spec).with_context(|| format!("Invalid --local-pool value '{spec}'"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(LocalHost::new(pools, &config.dataset_name))
}

async fn print_inventory<H: HostApi>(host: &H) -> Result<()> {
    let system = host.system_info().await.context("Failed to query system info")?;
    let pools = host.pools().await.context("Failed to query pools")?;
    let disks = host.disks().await.context("Failed to query disks")?;
    let inventory = serde_json::json!({
        "system": system,
        "pools": pools,
        "disks": disks,
    });
    println!("{}", serde_json::to_string_pretty(&inventory)?);
    Ok(())
}
