//! `WebSocket` endpoints for readers and displays.
//!
//! - [`laps`] -- `GET /laps`, one connection per RFID reader, inbound tag
//!   ids only
//! - [`notify`] -- `GET /notify`, one connection per display, outbound
//!   notification JSON only
//!
//! Both adapters are written against `futures` `Stream`/`Sink` rather than
//! the concrete socket type so they can be driven by in-memory channels.

pub mod laps;
pub mod notify;

pub use laps::{ReaderSummary, run_tag_source, ws_laps};
pub use notify::{DisplayExit, run_notification_sink, ws_notify};
