//! Shared type definitions for the LapTrack relay dashboard.
//!
//! Every crate in the workspace speaks in these types. The [`Notification`]
//! record is also exported to `TypeScript` via `ts-rs` so the browser
//! display decodes exactly what the server encodes.
//!
//! # Modules
//!
//! - [`ids`] -- Typed identifiers for tags, teams, and display subscribers
//! - [`notification`] -- The broadcastable result of one lap increment
//! - [`team`] -- Team and tag records served by the admin pages

pub mod ids;
pub mod notification;
pub mod team;

// Re-export all public types at crate root for convenience.
pub use ids::{ParseTagIdError, SubscriberId, TagId, TeamId};
pub use notification::Notification;
pub use team::{Tag, Team};
