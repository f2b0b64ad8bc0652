//! LapTrack server binary.
//!
//! Wires RFID readers and browser displays to the ingestion pipeline and
//! serves the admin pages.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `laptrack-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Connect to `PostgreSQL` and run migrations; on failure keep going
//!    without storage
//! 4. Start the ingestion coordinator and broadcast hub
//! 5. Bind and serve HTTP until Ctrl-C or SIGTERM
//!
//! # Shutdown Sequence
//!
//! 1. Stop accepting connections (graceful HTTP shutdown)
//! 2. Quit the coordinator, then the hub, waiting for each to acknowledge
//! 3. Close the database pool

mod error;

use std::path::Path;
use std::sync::Arc;

use laptrack_core::{LapPipeline, LapTrackConfig};
use laptrack_db::{DbError, PostgresConfig, PostgresPool};
use laptrack_web::{AppState, ServerConfig, build_router};
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::ServerBinError;

const CONFIG_FILE: &str = "laptrack-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the listener cannot bind,
/// or a signal handler cannot be installed.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging. RUST_LOG wins over the config file.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        host = config.http.host,
        port = config.http.port,
        tag_capacity = config.channels.tag_capacity,
        subscriber_capacity = config.channels.subscriber_capacity,
        write_timeout_ms = config.sink.write_timeout_ms,
        "laptrack-server starting"
    );

    // 3. Storage. Failure here degrades the process instead of ending it.
    let pool = connect_storage(&config).await;

    // 4. Pipeline. The coordinator acquires its dedicated connection itself.
    let writer_pool = pool.clone();
    let pipeline = LapPipeline::start(
        async move {
            match writer_pool {
                Some(pool) => pool.lap_writer().await,
                None => Err(DbError::Config(String::from("database is not connected"))),
            }
        },
        &config.channels,
    );

    let directory = pool.as_ref().map(PostgresPool::directory);
    let state = Arc::new(AppState::from_pipeline(&pipeline, directory, &config));
    let router = build_router(state);

    // 5. HTTP.
    let listener = match laptrack_web::bind(&ServerConfig::from(&config.http)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, "cannot listen, shutting down");
            pipeline.shutdown(config.shutdown.grace()).await;
            close_storage(pool).await;
            return Err(ServerBinError::from(e).into());
        }
    };
    let (stop_http, http_stopped) = oneshot::channel::<()>();
    let mut server = laptrack_web::spawn_server(listener, router, async move {
        let _ = http_stopped.await;
    });

    let outcome = tokio::select! {
        signal = shutdown_signal() => signal,
        served = &mut server => {
            warn!("HTTP server exited before a shutdown signal");
            match served {
                Ok(result) => result.map_err(ServerBinError::from),
                Err(e) => Err(ServerBinError::Task { message: e.to_string() }),
            }
        }
    };

    // Shutdown: stop accepting, quit singletons, release the pool.
    info!("shutting down");
    let grace = config.shutdown.grace();
    let _ = stop_http.send(());
    let report = pipeline.shutdown(grace).await;
    close_storage(pool).await;

    if !server.is_finished() && tokio::time::timeout(grace, &mut server).await.is_err() {
        warn!(grace_ms = config.shutdown.grace_ms, "open connections outlived the grace period");
        server.abort();
    }

    info!(clean = report.is_clean(), "laptrack-server stopped");
    outcome.map_err(Into::into)
}

/// Load configuration from `laptrack-config.yaml` in the working directory.
///
/// If the file does not exist, defaults are used (environment overrides
/// still apply).
fn load_config() -> Result<LapTrackConfig, ServerBinError> {
    let config_path = Path::new(CONFIG_FILE);
    if config_path.exists() {
        Ok(LapTrackConfig::from_file(config_path)?)
    } else {
        Ok(LapTrackConfig::parse("")?)
    }
}

/// Connect to `PostgreSQL` and apply migrations. Returns `None` when the
/// database cannot be reached.
async fn connect_storage(config: &LapTrackConfig) -> Option<PostgresPool> {
    let pg = PostgresConfig::from(&config.database);
    let pool = match PostgresPool::connect(&pg).await {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "database unavailable, lap ingestion and admin pages disabled");
            return None;
        }
    };
    info!("database connected");

    if config.database.run_migrations {
        if let Err(e) = pool.run_migrations().await {
            error!(error = %e, "migrations failed, continuing without storage");
            pool.close().await;
            return None;
        }
        info!("migrations applied");
    }
    Some(pool)
}

async fn close_storage(pool: Option<PostgresPool>) {
    if let Some(pool) = pool {
        pool.close().await;
        info!("database pool closed");
    }
}

/// Resolve on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() -> Result<(), ServerBinError> {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| ServerBinError::Signal {
                message: format!("ctrl-c: {e}"),
            })
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = signal(SignalKind::terminate()).map_err(|e| ServerBinError::Signal {
            message: format!("SIGTERM: {e}"),
        })?;
        tokio::select! {
            r = ctrl_c => {
                info!("received Ctrl-C");
                r
            }
            _ = term.recv() => {
                info!("received SIGTERM");
                Ok(())
            }
        }
    }

    #[cfg(not(unix))]
    {
        let r = ctrl_c.await;
        info!("received Ctrl-C");
        r
    }
}
