//! The lap increment write path on `PostgreSQL`.

use chrono::{DateTime, Utc};
use laptrack_core::store::LapStore;
use laptrack_types::{Notification, TagId, TeamId};
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use tracing::{debug, warn};

use crate::error::DbError;

/// Holds one pooled session for the ingestion coordinator.
///
/// The session is kept across increments. If it breaks (the server
/// restarted, the socket dropped) it is discarded and the next increment
/// checks out a fresh one, so an outage costs only the reads that arrive
/// while the database is down.
pub struct PgLapWriter {
    pool: PgPool,
    conn: Option<PoolConnection<Postgres>>,
}

impl PgLapWriter {
    pub(crate) const fn new(pool: PgPool, conn: PoolConnection<Postgres>) -> Self {
        Self {
            pool,
            conn: Some(conn),
        }
    }

    /// Whether a session is currently checked out.
    pub const fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    async fn session(&mut self) -> Result<&mut PoolConnection<Postgres>, DbError> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                debug!("lap writer acquiring a fresh connection");
                self.pool.acquire().await?
            }
        };
        Ok(self.conn.insert(conn))
    }
}

/// Errors after which the session cannot be trusted for another statement.
pub(crate) const fn breaks_session(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

/// Row returned by the increment statement.
#[derive(Debug, sqlx::FromRow)]
struct LapRow {
    team_id: i64,
    name: String,
    laps: i64,
    recorded_at: DateTime<Utc>,
}

impl LapStore for PgLapWriter {
    type Error = DbError;

    /// Resolve the tag and bump its team's counter in one statement, so the
    /// read-modify-write cannot interleave with anything else.
    async fn increment_laps(&mut self, tag_id: TagId) -> Result<Notification, DbError> {
        let conn = self.session().await?;
        let result = sqlx::query_as::<_, LapRow>(
            r"UPDATE teams
              SET laps = teams.laps + 1
              FROM tags
              WHERE tags.tag_id = $1 AND teams.team_id = tags.team_id
              RETURNING teams.team_id, teams.name, teams.laps, now() AS recorded_at",
        )
        .bind(tag_id.into_inner())
        .fetch_optional(&mut **conn)
        .await;

        let row = match result {
            Ok(row) => row.ok_or(DbError::UnknownTag(tag_id))?,
            Err(e) => {
                if breaks_session(&e) {
                    warn!(error = %e, "lap writer connection lost, will reconnect");
                    self.conn = None;
                }
                return Err(e.into());
            }
        };

        Ok(Notification {
            team_id: TeamId(row.team_id),
            tag_id,
            team: row.name,
            laps: row.laps,
            recorded_at: row.recorded_at,
        })
    }

    async fn close(self) {
        // Dropping the pooled connection hands it back to the pool, which
        // the binary closes once the pipeline has shut down.
        drop(self.conn);
        debug!("lap writer connection released");
    }
}
