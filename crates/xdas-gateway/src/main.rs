//! xdas binary.
//!
//! Keyspace-aware data-access gateway in front of a Redis cluster.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use xdas_gateway::{run, Configuration, APP_NAME, BUILD_TIME};

#[derive(Parser)]
#[command(name = "xdas", disable_version_flag = true)]
struct Cli {
    /// The config filename.
    #[arg(long, env = "XX_CONFIG")]
    config: Option<PathBuf>,

    /// The address to bind to, ex: 0.0.0.0:8080.
    #[arg(long, env = "WEB_ADDR")]
    addr: Option<String>,

    /// Turn on verbose logging.
    #[arg(long)]
    verbose: bool,

    /// Show version and exit.
    #[arg(short = 'v', long = "version")]
    version: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version {
        println!("{APP_NAME} {} {BUILD_TIME}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let mut config = match &cli.config {
        Some(path) => match Configuration::load_from(path) {
            Ok(config) => config,
            Err(err) => {
                init_tracing(false);
                error!(error = %err, path = %path.display(), "unable to load configuration");
                return ExitCode::FAILURE;
            }
        },
        None => Configuration::default(),
    };
    if let Some(addr) = cli.addr {
        config.web.addr = addr;
    }
    if cli.verbose {
        config.verbose = true;
    }

    init_tracing(config.verbose);
    info!("server is starting");

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, initiating graceful shutdown");
        cancel_on_signal.cancel();
    });

    if let Err(err) = run(config, cancel).await {
        error!(error = %err, "gateway error");
        return ExitCode::FAILURE;
    }

    info!("shutdown complete");
    ExitCode::SUCCESS
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
