//! Error types for the LapTrack server binary.
//!
//! Only failures that stop the process before it can serve anything end up
//! here. An unreachable database is not one of them: the server starts in
//! a degraded mode instead.

/// Top-level error for the server binary.
#[derive(Debug, thiserror::Error)]
pub enum ServerBinError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: laptrack_core::ConfigError,
    },

    /// The HTTP server could not bind or failed while serving.
    #[error("http error: {source}")]
    Http {
        /// The underlying server error.
        #[from]
        source: laptrack_web::ServerError,
    },

    /// Installing a signal handler failed.
    #[error("signal handler error: {message}")]
    Signal {
        /// Description of the failure.
        message: String,
    },

    /// The HTTP server task panicked or was cancelled.
    #[error("server task error: {message}")]
    Task {
        /// Description of the failure.
        message: String,
    },
}
