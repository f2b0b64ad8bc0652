//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`] which wraps the underlying
//! [`sqlx`] errors and adds the lookup failures the lap path can hit.

use laptrack_types::{TagId, TeamId};

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The reader reported a tag that is not assigned to any team.
    #[error("unknown tag: {0}")]
    UnknownTag(TagId),

    /// A team id did not match any team.
    #[error("unknown team: {0}")]
    UnknownTeam(TeamId),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
