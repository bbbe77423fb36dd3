use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use inframon::config::{self, Config};
use inframon::engine::Engine;
use inframon::notification::{NotificationEvent, NotificationService};
use inframon::utils::privilege::check_privileges;
use inframon::{logging, panic_hook, probe};

/// How long running tasks get to wind down after a termination signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Infrastructure health monitor.
#[derive(Debug, Parser)]
#[command(name = "inframon", version, about)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "INFRAMON_CONFIG")]
    config: PathBuf,

    /// Write logs into this directory instead of the configured destination
    #[arg(long, env = "INFRAMON_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("invalid configuration {}", args.config.display()))?;
    if let Some(dir) = &args.log_dir {
        config.override_log_dir(dir.to_string_lossy());
        config::validate(&config).context("invalid logging override")?;
    }

    let logging = logging::init_logging(&config.logging()?)?;
    panic_hook::install(logging.file_settings());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        icmp_targets = config.icmp.len(),
        http_targets = config.http.len(),
        "inframon starting"
    );

    if config.has_icmp_targets() {
        check_privileges(config.configuration.privileged)?;
    }

    let token = CancellationToken::new();
    let notifier = Arc::new(NotificationService::from_config(&config)?);
    if !notifier.has_enabled_channels() {
        warn!("no notification channel enabled, state changes will only be logged");
    }

    let engine = Engine::new(
        config.targets(),
        Arc::clone(&notifier),
        config.health_check_interval(),
    )
    .with_summary(config.summary_schedule()?);
    let handle = engine.start(probe::probe_for, &token)?;
    let housekeeping = logging.start_housekeeping(token.clone());

    if config.configuration.startup_notification {
        if let Err(e) = notifier.notify(&NotificationEvent::runtime_start()).await {
            error!(error = %e, "failed to deliver startup notification");
        }
    }

    shutdown_signal().await?;
    info!("termination signal received");

    token.cancel();
    handle.join(SHUTDOWN_GRACE).await;
    if let Some(task) = housekeeping {
        let _ = task.await;
    }

    info!("inframon stopped");
    Ok(())
}

async fn shutdown_signal() -> std::io::Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}
