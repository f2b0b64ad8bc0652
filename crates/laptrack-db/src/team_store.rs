//! Read-only team and tag queries for the admin pages.

use laptrack_core::store::TeamDirectory;
use laptrack_types::{Tag, TagId, Team, TeamId};
use sqlx::PgPool;

use crate::error::DbError;

/// Team listings served from the shared pool.
#[derive(Debug, Clone)]
pub struct PgTeamDirectory {
    pool: PgPool,
}

impl PgTeamDirectory {
    /// Create a directory bound to a connection pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// A row from the `teams` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TeamRow {
    /// Team primary key.
    pub team_id: i64,
    /// Display name.
    pub name: String,
    /// Current lap count.
    pub laps: i64,
}

impl From<TeamRow> for Team {
    fn from(row: TeamRow) -> Self {
        Self {
            team_id: TeamId(row.team_id),
            name: row.name,
            laps: row.laps,
        }
    }
}

/// A row from the `tags` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TagRow {
    /// Tag number reported by the readers.
    pub tag_id: i64,
    /// Owning team.
    pub team_id: i64,
}

impl From<TagRow> for Tag {
    fn from(row: TagRow) -> Self {
        Self {
            tag_id: TagId(row.tag_id),
            team_id: TeamId(row.team_id),
        }
    }
}

impl TeamDirectory for PgTeamDirectory {
    type Error = DbError;

    async fn list_teams(&self) -> Result<Vec<Team>, DbError> {
        let rows = sqlx::query_as::<_, TeamRow>(
            r"SELECT team_id, name, laps
              FROM teams
              ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Team::from).collect())
    }

    async fn get_team(&self, team_id: TeamId) -> Result<Option<Team>, DbError> {
        let row = sqlx::query_as::<_, TeamRow>(
            r"SELECT team_id, name, laps
              FROM teams
              WHERE team_id = $1",
        )
        .bind(team_id.into_inner())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Team::from))
    }

    async fn tags_for_team(&self, team_id: TeamId) -> Result<Vec<Tag>, DbError> {
        let rows = sqlx::query_as::<_, TagRow>(
            r"SELECT tag_id, team_id
              FROM tags
              WHERE team_id = $1
              ORDER BY tag_id",
        )
        .bind(team_id.into_inner())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Tag::from).collect())
    }
}
