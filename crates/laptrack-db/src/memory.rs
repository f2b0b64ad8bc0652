//! In-memory store for demos and tests.
//!
//! Implements both [`LapStore`] and [`TeamDirectory`] over one shared table
//! set, so a test can hand a clone to the ingestion coordinator and another
//! to the admin pages and watch lap counts move without a database.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use laptrack_core::store::{LapStore, TeamDirectory};
use laptrack_types::{Notification, Tag, TagId, Team, TeamId};
use tokio::sync::RwLock;

use crate::error::DbError;

#[derive(Debug, Default)]
struct Tables {
    teams: BTreeMap<TeamId, Team>,
    tags: BTreeMap<TagId, TeamId>,
    next_team_id: i64,
}

/// Cloneable handle to a shared in-memory team/tag table.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a team with zero laps and return its id.
    pub async fn add_team(&self, name: &str) -> TeamId {
        let mut tables = self.tables.write().await;
        tables.next_team_id = tables.next_team_id.saturating_add(1);
        let team_id = TeamId(tables.next_team_id);
        tables.teams.insert(
            team_id,
            Team {
                team_id,
                name: name.to_owned(),
                laps: 0,
            },
        );
        team_id
    }

    /// Assign `tag_id` to `team_id`, replacing any previous assignment.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnknownTeam`] if the team does not exist.
    pub async fn assign_tag(&self, tag_id: TagId, team_id: TeamId) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        if !tables.teams.contains_key(&team_id) {
            return Err(DbError::UnknownTeam(team_id));
        }
        tables.tags.insert(tag_id, team_id);
        Ok(())
    }

    /// Overwrite a team's lap count.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnknownTeam`] if the team does not exist.
    pub async fn set_laps(&self, team_id: TeamId, laps: i64) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        let team = tables
            .teams
            .get_mut(&team_id)
            .ok_or(DbError::UnknownTeam(team_id))?;
        team.laps = laps;
        Ok(())
    }

    /// Current lap count of a team.
    pub async fn laps(&self, team_id: TeamId) -> Option<i64> {
        self.tables.read().await.teams.get(&team_id).map(|t| t.laps)
    }
}

impl LapStore for MemoryStore {
    type Error = DbError;

    async fn increment_laps(&mut self, tag_id: TagId) -> Result<Notification, DbError> {
        let mut tables = self.tables.write().await;
        let team_id = *tables.tags.get(&tag_id).ok_or(DbError::UnknownTag(tag_id))?;
        let team = tables
            .teams
            .get_mut(&team_id)
            .ok_or(DbError::UnknownTeam(team_id))?;
        team.laps = team.laps.saturating_add(1);

        Ok(Notification {
            team_id,
            tag_id,
            team: team.name.clone(),
            laps: team.laps,
            recorded_at: Utc::now(),
        })
    }

    async fn close(self) {
        tracing::debug!("memory store released");
    }
}

impl TeamDirectory for MemoryStore {
    type Error = DbError;

    async fn list_teams(&self) -> Result<Vec<Team>, DbError> {
        let tables = self.tables.read().await;
        let mut teams: Vec<Team> = tables.teams.values().cloned().collect();
        teams.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(teams)
    }

    async fn get_team(&self, team_id: TeamId) -> Result<Option<Team>, DbError> {
        Ok(self.tables.read().await.teams.get(&team_id).cloned())
    }

    async fn tags_for_team(&self, team_id: TeamId) -> Result<Vec<Tag>, DbError> {
        let tables = self.tables.read().await;
        Ok(tables
            .tags
            .iter()
            .filter(|&(_, owner)| *owner == team_id)
            .map(|(&tag_id, &team_id)| Tag { tag_id, team_id })
            .collect())
    }
}
