//! Data layer for the LapTrack relay dashboard.
//!
//! Implements the storage seams defined in `laptrack-core`:
//!
//! ```text
//! IngestionCoordinator --LapStore--> PgLapWriter (one dedicated session)
//! admin pages ------TeamDirectory--> PgTeamDirectory (shared pool)
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- `PostgreSQL` pool, configuration, and migrations
//! - [`lap_store`] -- The atomic lap increment statement
//! - [`team_store`] -- Team and tag listings
//! - [`memory`] -- In-memory implementation of both seams
//! - [`error`] -- Shared error types

pub mod error;
pub mod lap_store;
pub mod memory;
pub mod postgres;
pub mod team_store;

// Re-export primary types for convenience.
pub use error::DbError;
pub use lap_store::PgLapWriter;
pub use memory::MemoryStore;
pub use postgres::{PostgresConfig, PostgresPool};
pub use team_store::{PgTeamDirectory, TagRow, TeamRow};
