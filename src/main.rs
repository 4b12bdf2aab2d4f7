use clap::Parser;
use ctd_relay::cli::Cli;
use ctd_relay::config::{Config, Credentials};
use ctd_relay::ftp::{FtpDestination, FtpSource};
use ctd_relay::scheduler::Scheduler;
use ctd_relay::transfer::Transfer;
use std::path::Path;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.default_log_filter())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("CTD relay starting (pid {})", std::process::id());

    let config = Config::load(&cli.config).map_err(|e| {
        anyhow::anyhow!(
            "Failed to load configuration: {}\n\n\
             Make sure:\n\
             1. {} exists\n\
             2. All required environment variables are set\n\
             3. Create a .env file if needed",
            e,
            cli.config.display()
        )
    })?;
    info!("Configuration loaded from {}", cli.config.display());

    std::fs::create_dir_all(&config.processing.data_dir).map_err(|e| {
        anyhow::anyhow!(
            "Failed to create data directory {}: {}",
            config.processing.data_dir.display(),
            e
        )
    })?;

    let destination = if cli.dry_run {
        info!("Dry run: files will be converted but not uploaded");
        None
    } else {
        let credentials = Credentials::load(&config.destination.credentials_file)?;
        info!(
            "Uploading to {}:{} as {}",
            config.destination.host, config.destination.port, credentials.username
        );
        Some(FtpDestination::new(config.destination_endpoint(credentials)))
    };

    if !cli.exit_when_done {
        if let Some(pid_file) = &config.pid_file {
            write_pid_file(pid_file);
        }
    }

    // Set up shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn signal handler
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let transfer = Transfer::new(
        FtpSource::new(config.source_endpoint()),
        destination,
        config.transfer_settings(),
    );
    let mut scheduler = Scheduler::new(
        transfer,
        config.scheduler_settings(cli.exit_when_done),
        shutdown_rx,
    );

    match scheduler.run().await {
        Ok(cycles) => info!("Completed {} scan cycles", cycles),
        Err(e) => error!("Scheduler error: {}", e),
    }

    info!("CTD relay shutting down");
    Ok(())
}

fn write_pid_file(path: &Path) {
    match std::fs::write(path, format!("{}\n", std::process::id())) {
        Ok(()) => info!("PID written to {}", path.display()),
        Err(e) => warn!("Unable to write PID file {}: {}", path.display(), e),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
