use clap::{Parser, Subcommand};
use dispatcher::config::Config as ProbeConfig;
use dispatcher::types::Trigger;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

mod config;
mod observability;

/// Scheduled HTTP probe dispatcher.
///
/// Configuration comes from the YAML file given with --config, or from
/// environment variables (SCHEDULE, BASE_URL, ENDPOINTS, QUERY_PARAMS, ...)
/// when no file is given.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Path to a YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Dispatch on the configured schedule
    Run,
    /// Dispatch on schedule and serve the HTTP control surface
    Serve,
    /// Run a single dispatch cycle and print the outcome batch as JSON
    Fire,
    /// Validate the configuration and exit
    CheckConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config::Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _sentry_guard = match observability::init(&config.common) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        }
    };

    let probe_config = match config.probe.validate() {
        Ok(probe_config) => Arc::new(probe_config),
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    rt.block_on(execute(cli.command, probe_config))
}

async fn execute(command: CliCommand, config: Arc<ProbeConfig>) -> ExitCode {
    match command {
        CliCommand::CheckConfig => {
            print_summary(&config);
            ExitCode::SUCCESS
        }
        CliCommand::Fire => fire(config).await,
        CliCommand::Run => run(config, false).await,
        CliCommand::Serve => run(config, true).await,
    }
}

fn print_summary(config: &ProbeConfig) {
    println!("schedule: {}", config.schedule.expression());
    println!("base_url: {}", config.base_url);
    println!("strategy: {}", config.strategy.as_str());
    println!("endpoints: {}", config.endpoints.len());
    println!("query_params: {}", config.query_params.len());
    println!("inbound_auth: {}", config.credentials.inbound.is_some());
    println!("outbound_auth: {}", config.credentials.outbound.is_some());
}

async fn fire(config: Arc<ProbeConfig>) -> ExitCode {
    let dispatcher = match dispatcher::build_dispatcher(config) {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            tracing::error!("Failed to build dispatcher: {e}");
            return ExitCode::FAILURE;
        }
    };

    let batch = dispatcher.run_cycle(Trigger::Manual).await;
    match serde_json::to_string_pretty(batch.as_ref()) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!("Failed to serialize outcome batch: {e}");
            return ExitCode::FAILURE;
        }
    }

    if batch.failed() == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn run(config: Arc<ProbeConfig>, serve_control: bool) -> ExitCode {
    match dispatcher::run(config, serve_control, shutdown_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Dispatcher error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
