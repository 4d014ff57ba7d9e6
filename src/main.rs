//! API Tracking Daemon - serves request-logged HTTP endpoints via Unix socket.
//!
//! ```bash
//! # Serve with the default configuration
//! api-tracking-daemon
//!
//! # Validate a configuration and list the endpoints it mounts
//! api-tracking-daemon --config ./config/daemon.toml --check
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api_tracking::config::Settings;
use api_tracking::endpoints::Router;
use api_tracking::socket::SocketListener;
use api_tracking::tracking::NullStore;

const DEFAULT_CONFIG_PATH: &str = "/etc/api-tracking/daemon.toml";

/// How long open connections get to finish after SIGTERM.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "api-tracking-daemon")]
#[command(version, about = "Request-logging API daemon serving HTTP envelopes via Unix socket")]
#[command(after_help = "SIGNALS:\n  SIGHUP           Rebuild endpoints from the configuration file\n  SIGTERM, SIGINT  Stop accepting connections and drain")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Validate the configuration, list the mounted endpoints and exit
    #[arg(long)]
    check: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load(&cli.config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading {}: {}", cli.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if cli.check {
        return check(&settings, &cli.config);
    }

    if let Err(e) = init_logging(&settings) {
        eprintln!("Error initializing logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        socket = %settings.socket.path.display(),
        "Starting API tracking daemon"
    );
    info!(
        persist = settings.tracking.persist,
        request_log = %settings.store.log_path.display(),
        path_length = settings.tracking.path_length,
        handler_overrides = settings.handlers.len(),
        "Request tracking configured"
    );

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(serve(settings, cli.config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Daemon failed");
            ExitCode::FAILURE
        }
    }
}

/// Build the endpoints without binding or opening the request log.
fn check(settings: &Settings, config_path: &Path) -> ExitCode {
    match Router::with_builtins(settings, Arc::new(NullStore::new()), None) {
        Ok(router) => {
            println!("{}: ok", config_path.display());
            let mut paths = router.paths();
            paths.sort_unstable();
            for path in paths {
                println!("  {}", path);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", config_path.display(), e);
            ExitCode::FAILURE
        }
    }
}

async fn serve(settings: Settings, config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let listener = SocketListener::bind(Arc::new(settings)).await?;
    log_endpoints(&listener);

    let shutdown = Arc::new(Notify::new());

    loop {
        tokio::select! {
            result = listener.run(Arc::clone(&shutdown)) => {
                result?;
                break;
            }
            _ = shutdown_signal() => {
                info!("Shutdown signal received, draining connections");
                shutdown.notify_waiters();

                if tokio::time::timeout(DRAIN_TIMEOUT, listener.wait_for_drain()).await.is_err() {
                    warn!(
                        timeout_secs = DRAIN_TIMEOUT.as_secs(),
                        active = listener.metrics().active(),
                        "Drain timed out, closing remaining connections"
                    );
                }
                break;
            }
            _ = reload_signal() => reload(&listener, &config_path),
        }
    }

    let metrics = listener.metrics();
    info!(
        requests_total = metrics.total_requests(),
        requests_failed = metrics.failed_requests(),
        requests_rejected = metrics.rejected_requests(),
        "Daemon stopped"
    );
    Ok(())
}

/// Re-read the configuration and swap in rebuilt endpoints.
///
/// A configuration that fails to load or validate leaves the running
/// endpoints in place.
fn reload(listener: &SocketListener, config_path: &Path) {
    info!(config = %config_path.display(), "Reloading endpoint configuration");
    match Settings::load(config_path).and_then(|settings| listener.reload(&settings)) {
        Ok(()) => log_endpoints(listener),
        Err(e) => error!(error = %e, "Reload failed, keeping current endpoints"),
    }
}

fn log_endpoints(listener: &SocketListener) {
    match listener.router() {
        Ok(router) => {
            let mut paths = router.paths();
            paths.sort_unstable();
            info!(endpoints = ?paths, "Endpoints mounted");
        }
        Err(e) => warn!(error = %e, "Could not list mounted endpoints"),
    }
}

/// Wait for SIGTERM or SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = unix_signal(signal::unix::SignalKind::terminate(), "SIGTERM") => {},
    }
}

/// Wait for SIGHUP.
async fn reload_signal() {
    unix_signal(signal::unix::SignalKind::hangup(), "SIGHUP").await
}

/// Wait for one delivery of `kind`. Never resolves if the handler cannot be
/// installed.
async fn unix_signal(kind: signal::unix::SignalKind, name: &str) {
    match signal::unix::signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!(error = %e, signal = name, "Failed to install signal handler");
            std::future::pending::<()>().await;
        }
    }
}

/// Initialize logging based on settings. `RUST_LOG` takes precedence.
fn init_logging(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if settings.logging.format.eq_ignore_ascii_case("json") {
        registry.with(fmt::layer().json()).try_init()?;
    } else {
        registry.with(fmt::layer().pretty()).try_init()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["api-tracking-daemon"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(!cli.check);

        let cli = Cli::try_parse_from(["api-tracking-daemon", "-c", "./daemon.toml", "--check"])
            .unwrap();
        assert_eq!(cli.config, PathBuf::from("./daemon.toml"));
        assert!(cli.check);
    }

    #[test]
    fn test_check_accepts_valid_config() {
        let settings = Settings::from_toml("[socket]\npath = \"/tmp/check.sock\"").unwrap();
        assert_eq!(
            format!("{:?}", check(&settings, Path::new("daemon.toml"))),
            format!("{:?}", ExitCode::SUCCESS)
        );
    }
}
