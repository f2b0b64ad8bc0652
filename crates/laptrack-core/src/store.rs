//! Storage collaborator seams.
//!
//! The core never talks to a database directly. The ingestion coordinator
//! owns one [`LapStore`] (the only write path for lap counts) and the admin
//! pages read through a cloneable [`TeamDirectory`]. `laptrack-db` provides
//! the `PostgreSQL` and in-memory implementations.

use std::future::Future;

use laptrack_types::{Notification, Tag, TagId, Team, TeamId};

/// Write path for lap increments.
///
/// Exactly one value of this type exists per running process, moved into
/// the ingestion coordinator, so implementations never see concurrent calls.
pub trait LapStore: Send + Sized + 'static {
    /// Failure of a single increment. Never fatal to the caller.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Resolve `tag_id` to its team, add one lap, and return the snapshot.
    ///
    /// Must be atomic: either the count is incremented and a notification
    /// returned, or nothing changes.
    fn increment_laps(
        &mut self,
        tag_id: TagId,
    ) -> impl Future<Output = Result<Notification, Self::Error>> + Send;

    /// Release the underlying handle. Called once when the coordinator quits.
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Read-only team and tag listings for the admin pages.
pub trait TeamDirectory: Clone + Send + Sync + 'static {
    /// Failure of a lookup.
    type Error: std::error::Error + Send + Sync + 'static;

    /// All teams, ordered by name.
    fn list_teams(&self) -> impl Future<Output = Result<Vec<Team>, Self::Error>> + Send;

    /// One team, or `None` when the id is unknown.
    fn get_team(
        &self,
        team_id: TeamId,
    ) -> impl Future<Output = Result<Option<Team>, Self::Error>> + Send;

    /// Tags registered to a team, ordered by tag id. Unknown team yields an
    /// empty list.
    fn tags_for_team(
        &self,
        team_id: TeamId,
    ) -> impl Future<Output = Result<Vec<Tag>, Self::Error>> + Send;
}
