use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use aurora_mentis::config::AcademyConfig;
use aurora_mentis::errors::{AcademyError, AcademyResult};
use aurora_mentis::firebase;
use aurora_mentis::formatter::Formatter;
use aurora_mentis::mailer::{Mailer, SmtpMailTransport};
use aurora_mentis::server::{build_router, AppState};
use tracing::{error, info, Level};

#[cfg(feature = "background-jobs")]
use aurora_mentis::jobs::{JobConfig, JobScheduler};

#[tokio::main]
async fn main() {
    let config = match AcademyConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let level = Level::from_str(&config.logging.level).unwrap_or(Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    if let Err(e) = run(config).await {
        error!(error = %e, "Server exited with an error");
        std::process::exit(1);
    }
}

async fn run(config: AcademyConfig) -> AcademyResult<()> {
    let timezone = config.timezone()?;

    let (store, identity) = firebase::connect(&config.firebase)?;
    info!(
        database_url = %config.firebase.database_url,
        "Connected Firebase clients"
    );

    let transport = SmtpMailTransport::from_config(&config.smtp)?;
    let formatter = Formatter::new(&config.mail.academy_name, &config.mail.contact_phone)?;
    let mailer = Mailer::new(Arc::new(transport), formatter, &config.smtp.username);

    let state = AppState::new(Arc::new(store), Arc::new(identity), mailer, timezone);

    #[cfg(feature = "background-jobs")]
    let mut scheduler = if config.jobs.enabled {
        let job_config = JobConfig::from_config(&config.jobs)
            .map_err(|e| AcademyError::ConfigError(e.to_string()))?;
        let scheduler = JobScheduler::new(state.clone(), job_config)
            .await
            .map_err(|e| AcademyError::ConfigError(e.to_string()))?;
        scheduler
            .start()
            .await
            .map_err(|e| AcademyError::ConfigError(e.to_string()))?;
        Some(scheduler)
    } else {
        info!("Scheduled sweeps are disabled");
        None
    };

    let app = build_router(state.clone(), &config.allowed_origins());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| AcademyError::ConfigError(format!("invalid bind address: {e}")))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AcademyError::ConfigError(format!("cannot bind {addr}: {e}")))?;

    info!(%addr, origins = ?config.allowed_origins(), "Aurora Mentis listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .map_err(|e| AcademyError::ConfigError(format!("server error: {e}")))?;

    #[cfg(feature = "background-jobs")]
    if let Some(scheduler) = scheduler.as_mut() {
        if let Err(e) = scheduler.shutdown().await {
            error!(error = %e, "Failed to stop sweep scheduler");
        }
    }

    info!(pending = state.tasks.len(), "Waiting for deferred work to finish");
    state.tasks.drain().await;
    info!("Shutdown complete");

    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received");
}
