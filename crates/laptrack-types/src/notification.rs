//! The broadcastable result of one lap increment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{TagId, TeamId};

/// Snapshot produced by the storage layer after a successful lap increment.
///
/// Created exactly once per increment and never mutated afterwards. The hub
/// shares one allocation across every subscriber, so all displays render the
/// same bytes in the same order.
///
/// Encoded on the display socket as JSON:
///
/// ```json
/// {"team_id":3,"tag_id":42,"team":"Falcons","laps":7,"recorded_at":"2026-10-17T09:30:00Z"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Notification {
    /// Team that owns the tag.
    pub team_id: TeamId,
    /// Tag whose read produced this increment.
    pub tag_id: TagId,
    /// Team display name.
    pub team: String,
    /// Lap count after the increment.
    #[ts(type = "number")]
    pub laps: i64,
    /// When the increment was applied.
    pub recorded_at: DateTime<Utc>,
}
