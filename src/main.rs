use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use telemetry_loader::archive::Archiver;
use telemetry_loader::config::validation::validate_config;
use telemetry_loader::config::{
    load_config, FetchFailurePolicy, LoaderConfig, RunMode, ScheduleConfig, WindowConfig,
};
use telemetry_loader::enrich::enrich;
use telemetry_loader::error::{CycleError, FetchError};
use telemetry_loader::fetch::{build_client, JaegerFetcher, LokiFetcher, Source};
use telemetry_loader::lifecycle::{signals, Shutdown};
use telemetry_loader::model::RecordKind;
use telemetry_loader::observability::{logging, metrics};
use telemetry_loader::scheduler::Scheduler;
use telemetry_loader::store::{DatasetLayout, MergeStore, RetentionPolicy};

#[derive(Parser)]
#[command(name = "telemetry-loader", version)]
#[command(about = "Incrementally load Jaeger spans and Loki logs into CSV/Parquet datasets", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch spans from Jaeger into the span dataset
    Traces(RunArgs),
    /// Fetch logs from Loki into the log dataset
    Logs(RunArgs),
    /// Join every span snapshot with the log dataset
    Enrich {
        /// Output CSV path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Keep running cycles until interrupted
    #[arg(long)]
    continuous: bool,

    /// Seconds between cycles in continuous mode
    #[arg(long)]
    interval_secs: Option<u64>,

    /// How far back each cycle queries
    #[arg(long)]
    lookback_secs: Option<u64>,

    /// Query the lookback in chunks of this many seconds
    #[arg(long)]
    chunk_secs: Option<u64>,
}

impl RunArgs {
    fn apply(&self, schedule: &mut ScheduleConfig, window: &mut WindowConfig) {
        if self.continuous {
            schedule.mode = RunMode::Continuous;
        }
        if let Some(secs) = self.interval_secs {
            schedule.interval_secs = secs;
        }
        if let Some(secs) = self.lookback_secs {
            window.lookback_secs = secs;
        }
        if self.chunk_secs.is_some() {
            window.chunk_secs = self.chunk_secs;
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("telemetry-loader: {e}");
            return ExitCode::FAILURE;
        }
    };
    match &cli.command {
        Commands::Traces(args) => args.apply(&mut config.schedule, &mut config.traces.window),
        Commands::Logs(args) => args.apply(&mut config.schedule, &mut config.logs.window),
        Commands::Enrich { output } => {
            if let Some(output) = output {
                config.enrich.output = output.clone();
            }
        }
    }
    if let Err(errors) = validate_config(&config) {
        for error in errors {
            eprintln!("telemetry-loader: invalid configuration: {error}");
        }
        return ExitCode::FAILURE;
    }

    if let Err(e) = logging::init(&config.observability) {
        eprintln!("telemetry-loader: cannot open log file: {e}");
        return ExitCode::FAILURE;
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "telemetry-loader starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    match cli.command {
        Commands::Traces(_) => run_traces(&config).await,
        Commands::Logs(_) => run_logs(&config).await,
        Commands::Enrich { .. } => run_enrich(&config),
    }
}

async fn run_traces(config: &LoaderConfig) -> ExitCode {
    let fetcher = build_client(&config.timeouts)
        .map_err(|e| e.to_string())
        .and_then(|client| {
            JaegerFetcher::new(client, &config.traces, &config.retries, &config.timeouts)
                .map_err(|e| e.to_string())
        });
    match fetcher {
        Ok(fetcher) => {
            run_source(
                config,
                fetcher,
                &config.traces.dataset,
                &config.traces.window,
                config.traces.on_fetch_failure,
            )
            .await
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to build Jaeger client");
            ExitCode::FAILURE
        }
    }
}

async fn run_logs(config: &LoaderConfig) -> ExitCode {
    let fetcher = build_client(&config.timeouts)
        .map_err(|e| e.to_string())
        .and_then(|client| {
            LokiFetcher::new(client, &config.logs, &config.retries, &config.timeouts)
                .map_err(|e| e.to_string())
        });
    match fetcher {
        Ok(fetcher) => {
            run_source(
                config,
                fetcher,
                &config.logs.dataset,
                &config.logs.window,
                config.logs.on_fetch_failure,
            )
            .await
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to build Loki client");
            ExitCode::FAILURE
        }
    }
}

async fn run_source<S: Source>(
    config: &LoaderConfig,
    source: S,
    dataset: &str,
    window: &WindowConfig,
    policy: FetchFailurePolicy,
) -> ExitCode {
    let kind: RecordKind = source.kind();
    let layout = DatasetLayout::new(&config.storage.data_dir, dataset);
    let store = match MergeStore::open(kind, layout, RetentionPolicy::from(&config.storage)) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load existing dataset");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    signals::spawn_listener(shutdown.clone());

    let archiver = config
        .archive
        .enabled
        .then(|| Archiver::new(&config.archive, &config.storage.data_dir, &config.timeouts));
    let mut scheduler = Scheduler::new(
        source,
        store,
        window.plan(),
        Duration::from_secs(config.schedule.interval_secs),
        shutdown.subscribe(),
    )
    .with_failure_policy(policy)
    .with_archiver(archiver);

    match config.schedule.mode {
        RunMode::Batch => match scheduler.run_once().await {
            Ok(report) => {
                tracing::info!(
                    cycle_id = %report.cycle_id,
                    fetched = report.fetched(),
                    total = report.merge.total,
                    "Run complete"
                );
                ExitCode::SUCCESS
            }
            Err(CycleError::Fetch(FetchError::Cancelled)) => {
                tracing::info!("Run cancelled before anything was written");
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!(error = %e, "Run failed");
                ExitCode::FAILURE
            }
        },
        RunMode::Continuous => match scheduler.run_forever().await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "Stopped on fetch failure");
                ExitCode::FAILURE
            }
        },
    }
}

fn run_enrich(config: &LoaderConfig) -> ExitCode {
    let spans = DatasetLayout::new(&config.storage.data_dir, &config.traces.dataset);
    let logs = DatasetLayout::new(&config.storage.data_dir, &config.logs.dataset);
    match enrich(&spans, &logs, &config.enrich.output, &config.enrich.collision_prefix) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Enrichment failed");
            ExitCode::FAILURE
        }
    }
}
