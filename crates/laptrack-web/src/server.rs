//! HTTP server lifecycle.
//!
//! [`bind`] claims the listening socket up front so an address conflict is
//! reported before anything else starts. [`spawn_server`] then serves the
//! router on a background task until the supplied shutdown future resolves,
//! letting in-flight requests finish.

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use laptrack_core::config::HttpConfig;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Listener address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// The TCP port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: 8080,
        }
    }
}

impl From<&HttpConfig> for ServerConfig {
    fn from(http: &HttpConfig) -> Self {
        Self {
            host: http.host.clone(),
            port: http.port,
        }
    }
}

/// Bind the listening socket.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address is malformed or in use.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;

    info!(%addr, "LapTrack server listening");
    Ok(listener)
}

/// Serve `router` on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] if the server hits a fatal I/O error.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))
}

/// Run [`serve`] on a background task. Errors are logged there and also
/// returned through the handle.
pub fn spawn_server<F>(
    listener: TcpListener,
    router: Router,
    shutdown: F,
) -> JoinHandle<Result<(), ServerError>>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let result = serve(listener, router, shutdown).await;
        match &result {
            Ok(()) => info!("HTTP server stopped accepting connections"),
            Err(e) => error!(error = %e, "HTTP server failed"),
        }
        result
    })
}

/// Errors that can occur when starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}
