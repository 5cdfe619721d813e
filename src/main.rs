use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use parking_lot::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use histogram_bench::export::{otlp, redis_list, Exporter, MemoryExporter, OtlpCollector, RedisExporter, StdoutExporter};
use histogram_bench::report::ComparisonReport;
use histogram_bench::server::{self, AppState};
use histogram_bench::{app, WorkloadConfig};

#[derive(Parser, Debug)]
#[command(name = "histogram-bench")]
#[command(version, about = "Compare explicit and base-2 exponential histogram buckets on a synthetic latency mix")]
struct Cli {
    /// JSON workload descriptor; omitted fields take the reference defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the number of generated samples
    #[arg(short = 'n', long)]
    iterations: Option<u64>,

    /// Master seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Override the export period
    #[arg(long)]
    export_interval_ms: Option<u64>,

    /// Multiply explicit boundaries by 1e6 for the nanosecond instrument
    #[arg(long)]
    scale_explicit_boundaries: bool,

    /// Where export batches go (repeatable)
    #[arg(short, long = "exporter", value_enum, default_value = "stdout")]
    exporters: Vec<ExporterKind>,

    #[arg(long, default_value = "redis://127.0.0.1:6379/")]
    redis_url: String,

    /// List the redis exporter pushes onto
    #[arg(long, default_value = "histogram-bench:exports")]
    redis_key: String,

    /// OTLP/gRPC collector for `--exporter otlp`
    #[arg(long, default_value = otlp::DEFAULT_ENDPOINT)]
    otlp_endpoint: String,

    /// Serve the live view on this address and keep running until Ctrl-C
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG wins when set
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ExporterKind {
    Stdout,
    Redis,
    Otlp,
    None,
}

impl Cli {
    fn workload(&self) -> anyhow::Result<WorkloadConfig> {
        let mut config = match &self.config {
            Some(path) => WorkloadConfig::load(path)
                .with_context(|| format!("loading workload from {}", path.display()))?,
            None => WorkloadConfig::default(),
        };
        if let Some(n) = self.iterations {
            config.iterations = n;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(ms) = self.export_interval_ms {
            config.export_interval_ms = ms;
        }
        if self.scale_explicit_boundaries {
            config.scale_explicit_boundaries = true;
        }
        config.validate().context("invalid workload")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries export batches
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = cli.workload()?;
    tracing::info!(
        iterations = config.iterations,
        export_interval_ms = config.export_interval_ms,
        exponential_max_size = config.exponential_max_size,
        scale_explicit_boundaries = config.scale_explicit_boundaries,
        "workload ready"
    );
    if !config.scale_explicit_boundaries {
        tracing::warn!("explicit-ns reuses millisecond boundaries; every nanosecond value will overflow");
    }

    // ── Exporters ────────────────────────────────────────────────
    let mut exporters = Vec::new();
    let mut collector = None;
    for kind in &cli.exporters {
        match kind {
            ExporterKind::Stdout => exporters.push(Exporter::Stdout(StdoutExporter::new())),
            ExporterKind::Redis => {
                tracing::info!(url = %cli.redis_url, key = %cli.redis_key, "connecting to Redis");
                let conn = redis_list::connect(&cli.redis_url)
                    .await
                    .with_context(|| format!("cannot connect to Redis at {}", cli.redis_url))?;
                exporters.push(Exporter::Redis(RedisExporter::new(
                    conn,
                    cli.redis_key.clone(),
                    redis_list::DEFAULT_MAX_LEN,
                )));
            }
            ExporterKind::Otlp if collector.is_none() => {
                collector = Some(
                    OtlpCollector::new(cli.otlp_endpoint.clone())
                        .with_context(|| format!("invalid OTLP endpoint {}", cli.otlp_endpoint))?,
                );
            }
            ExporterKind::Otlp | ExporterKind::None => {}
        }
    }

    // ── Live view ────────────────────────────────────────────────
    let report = Arc::new(Mutex::new(ComparisonReport::new()));
    let server_task = match cli.listen {
        Some(addr) => {
            let windows = MemoryExporter::default();
            exporters.push(Exporter::Memory(windows.clone()));
            let state = Arc::new(AppState {
                windows,
                report: report.clone(),
            });
            Some(
                server::spawn(addr, state)
                    .await
                    .with_context(|| format!("cannot bind live view to {addr}"))?,
            )
        }
        None => None,
    };

    // ── Run ──────────────────────────────────────────────────────
    let outcome = app::run(&config, exporters, collector, report).await?;

    eprintln!();
    for c in &outcome.summary.components {
        eprintln!("  {:<8} {:>10} draws  {:>6.2}%", c.name, c.draws, c.share * 100.0);
    }
    eprintln!(
        "  {} samples in {:.2}s ({:.0}/s), {} export ticks, {} failed exports",
        outcome.summary.iterations,
        outcome.summary.elapsed_secs,
        outcome.summary.samples_per_sec,
        outcome.export.ticks,
        outcome.export.failures,
    );
    eprintln!();
    eprint!("{}", outcome.report);

    if let Some(task) = server_task {
        tracing::info!("run complete; live view stays up until Ctrl-C");
        tokio::signal::ctrl_c().await?;
        task.abort();
    }
    Ok(())
}
