//! HTTP and `WebSocket` surface for the LapTrack relay dashboard.
//!
//! This crate provides an Axum server that exposes:
//!
//! - **Reader endpoint** (`/laps`) where RFID readers stream tag ids into
//!   the ingestion channel
//! - **Display endpoint** (`/notify`) where browsers receive a JSON frame
//!   for every lap, fed by the broadcast hub
//! - **Admin pages** (`/teams/`, `/team/{id}`) rendered with `minijinja`,
//!   plus `/api/teams` as JSON
//! - **Static files** under `/templates/` and `/clients/`
//!
//! The core pipeline lives in `laptrack-core`; this crate only adapts
//! transports onto its channels.

pub mod error;
pub mod handlers;
pub mod pages;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::WebError;
pub use pages::Pages;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, bind, serve, spawn_server};
pub use state::{AppState, AssetDirs, DisplaySettings};
