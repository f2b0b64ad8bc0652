//! Team and tag records served by the admin pages.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{TagId, TeamId};

/// A relay team and its running lap total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Team {
    /// Storage key.
    pub team_id: TeamId,
    /// Display name.
    pub name: String,
    /// Laps completed so far.
    #[ts(type = "number")]
    pub laps: i64,
}

/// An RFID tag assigned to a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Tag {
    /// The number the reader reports.
    pub tag_id: TagId,
    /// Owning team.
    pub team_id: TeamId,
}
