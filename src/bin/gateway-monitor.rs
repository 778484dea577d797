use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use probevisor::metrics::{Counter, Opts};
use probevisor::probes::{self, Gateway};
use probevisor::{
    Engine, EngineBuilder, EngineConfig, LogWriter, MetricsWriter, Registry, Subscribe, TaskFailure,
    wait_for_shutdown_signal,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Per-probe execution deadline in seconds (0 = unbounded)
    #[arg(long, env = "GATEWAY_MONITOR_TASK_TIMEOUT_SECS", default_value_t = 600)]
    task_timeout_secs: u64,

    /// Print the Prometheus text exposition on exit
    #[arg(long)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every probe once, ignoring the schedule
    Single {
        /// Loop forever, running each probe one after another
        #[arg(long = "loop")]
        forever: bool,

        /// Gateway base URL
        #[arg(default_value = "https://ipfs.io")]
        gateway: String,
    },
    /// Run probes on their schedule until a termination signal
    Daemon {
        /// Gateway base URL
        #[arg(default_value = "https://ipfs.io")]
        gateway: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cfg = EngineConfig::default().with_task_timeout(Duration::from_secs(args.task_timeout_secs));
    let registry = Arc::new(Registry::new());
    let subscribers: Vec<Arc<dyn Subscribe>> = vec![
        Arc::new(LogWriter::new()),
        Arc::new(MetricsWriter::register(&registry).context("registering engine metrics")?),
    ];

    let root = CancellationToken::new();
    let result = match args.command {
        Command::Single { forever, gateway } => {
            let gw = Gateway::new(&gateway).context("building HTTP client")?;
            let builder = EngineBuilder::new(gw)
                .with_config(cfg)
                .with_registry(Arc::clone(&registry))
                .with_subscribers(subscribers)
                .with_tasks(probes::all());
            let engine = if forever {
                info!(%gateway, "looping forever");
                builder.build_repeat_forever()?
            } else {
                builder.build_single()?
            };
            single(engine, root).await
        }
        Command::Daemon { gateway } => {
            let gw = Gateway::new(&gateway).context("building HTTP client")?;
            let engine = EngineBuilder::new(gw)
                .with_config(cfg)
                .with_registry(Arc::clone(&registry))
                .with_subscribers(subscribers)
                .with_tasks(probes::all())
                .build()?;
            info!(%gateway, "daemon started");
            daemon(engine, &registry, root).await
        }
    };

    if args.print_metrics {
        print!("{}", registry.render());
    }
    result
}

/// Drains the error stream of a batch or loop engine; Ctrl-C cancels the in-flight probe.
async fn single(engine: Engine<Gateway>, root: CancellationToken) -> anyhow::Result<()> {
    let mut errors = engine.start(root.clone())?;
    spawn_signal_watch(root);

    let mut failed = 0usize;
    while let Some(failure) = errors.recv().await {
        failed += 1;
        log_failure(&failure);
    }
    engine.wait().await;

    if failed > 0 {
        anyhow::bail!("{failed} probe run(s) failed");
    }
    Ok(())
}

/// Counts failures until a termination signal, then lets the in-flight probe finish.
async fn daemon(
    engine: Engine<Gateway>,
    registry: &Registry,
    root: CancellationToken,
) -> anyhow::Result<()> {
    let error_count = Counter::new(
        Opts::new("errors_count")
            .namespace("gatewaymonitor")
            .subsystem("daemon")
            .help("Failed probe runs"),
    );
    registry.register(error_count.clone())?;

    let mut errors = engine.start(root)?;
    let handle = engine.handle();
    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(signal) => info!(signal, "termination signal received, draining"),
            Err(e) => warn!(error = %e, "cannot listen for termination signals"),
        }
        handle.stop();
    });

    while let Some(failure) = errors.recv().await {
        error_count.inc();
        log_failure(&failure);
    }
    engine.wait().await;
    info!(errors = error_count.get(), "daemon stopped");
    Ok(())
}

fn spawn_signal_watch(root: CancellationToken) {
    tokio::spawn(async move {
        if wait_for_shutdown_signal().await.is_ok() {
            warn!("termination signal received, cancelling");
            root.cancel();
        }
    });
}

fn log_failure(failure: &TaskFailure) {
    error!(task = %failure.task, kind = failure.error.as_label(), "{}", failure.error);
}
