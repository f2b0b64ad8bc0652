//! Ingestion and broadcast core for the LapTrack relay dashboard.
//!
//! RFID readers report tag crossings; browser displays show lap counts as
//! they change. Between the two sit exactly two long-lived tasks that talk
//! only through bounded channels:
//!
//! ```text
//! reader conns --TagId--> IngestionCoordinator --Notification--> BroadcastHub
//!                               |                                    |
//!                           LapStore                     per-display queues
//! ```
//!
//! - [`coordinator`] -- sole writer of lap counts, serializes every increment
//! - [`hub`] -- sole owner of the display membership set, fans out updates
//! - [`pipeline`] -- wiring plus the quit/done shutdown handshake
//! - [`store`] -- traits the storage layer implements
//! - [`config`] -- `laptrack-config.yaml` loader

pub mod config;
pub mod coordinator;
pub mod hub;
pub mod pipeline;
pub mod store;

// Re-export primary types for convenience.
pub use config::{ConfigError, LapTrackConfig};
pub use coordinator::{IngestionCoordinator, IngestionStats};
pub use hub::{BroadcastHub, DeliveryQueue, HubClosed, HubHandle, HubStats, Subscriber};
pub use pipeline::{LapPipeline, ShutdownReport, SingletonHandle};
pub use store::{LapStore, TeamDirectory};
