//! Admin page and JSON handlers.
//!
//! All handlers read through the optional [`TeamDirectory`] in
//! [`AppState`]. When storage was unreachable at startup they answer
//! `503 Service Unavailable`; readers and displays keep working.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Redirect to `/teams/` |
//! | `GET` | `/teams/` | Team list with totals (HTML) |
//! | `GET` | `/team/{id}` | One team and its tags (HTML) |
//! | `GET` | `/api/teams` | Team list (JSON) |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{Html, Redirect};
use laptrack_core::TeamDirectory;
use laptrack_types::{Tag, Team, TeamId};
use serde::Serialize;

use crate::error::WebError;
use crate::pages::{TEAM_TEMPLATE, TEAMS_TEMPLATE};
use crate::state::AppState;

/// Track length in metres.
pub const METERS_PER_LAP: f64 = 400.0;

const FEET_PER_METER: f64 = 3.28084;
const FEET_PER_MILE: f64 = 5280.0;

/// Distance covered by `laps` laps of the track, in miles.
#[allow(clippy::cast_precision_loss)] // lap totals stay far below 2^52
pub fn laps_to_miles(laps: i64) -> f64 {
    laps as f64 * METERS_PER_LAP * FEET_PER_METER / FEET_PER_MILE
}

// ---------------------------------------------------------------------------
// Page contexts
// ---------------------------------------------------------------------------

/// Context for `teams.html`.
#[derive(Debug, Clone, Serialize)]
pub struct TeamsPage {
    /// Every team, ordered by name.
    pub teams: Vec<Team>,
    /// Sum of all teams' laps.
    pub total_laps: i64,
    /// `total_laps` in miles.
    pub total_miles: f64,
}

impl TeamsPage {
    /// Compute totals over `teams`.
    pub fn new(teams: Vec<Team>) -> Self {
        let total_laps = teams
            .iter()
            .fold(0_i64, |sum, team| sum.saturating_add(team.laps));
        Self {
            teams,
            total_laps,
            total_miles: laps_to_miles(total_laps),
        }
    }
}

/// Context for `team.html`.
#[derive(Debug, Clone, Serialize)]
pub struct TeamPage {
    /// The team.
    pub team: Team,
    /// Its tags, ordered by id.
    pub tags: Vec<Tag>,
    /// The team's laps in miles.
    pub miles: f64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /` -- send browsers to the team list.
pub async fn index() -> Redirect {
    Redirect::to("/teams/")
}

/// `GET /teams/` -- render the team list.
pub async fn teams_page<D: TeamDirectory>(
    State(state): State<Arc<AppState<D>>>,
) -> Result<Html<String>, WebError> {
    let teams = state
        .directory()?
        .list_teams()
        .await
        .map_err(WebError::storage)?;
    let html = state.pages.render(TEAMS_TEMPLATE, TeamsPage::new(teams))?;
    Ok(Html(html))
}

/// `GET /team/{id}` -- render one team with its tags.
///
/// A non-integer id is rejected by the path extractor with 400.
pub async fn team_page<D: TeamDirectory>(
    State(state): State<Arc<AppState<D>>>,
    Path(team_id): Path<i64>,
) -> Result<Html<String>, WebError> {
    let directory = state.directory()?;
    let team_id = TeamId::from(team_id);
    let team = directory
        .get_team(team_id)
        .await
        .map_err(WebError::storage)?
        .ok_or_else(|| WebError::NotFound(format!("team {team_id}")))?;
    let tags = directory
        .tags_for_team(team_id)
        .await
        .map_err(WebError::storage)?;

    let page = TeamPage {
        miles: laps_to_miles(team.laps),
        team,
        tags,
    };
    let html = state.pages.render(TEAM_TEMPLATE, page)?;
    Ok(Html(html))
}

/// `GET /api/teams` -- team list as JSON, loaded by displays on connect.
pub async fn list_teams<D: TeamDirectory>(
    State(state): State<Arc<AppState<D>>>,
) -> Result<Json<Vec<Team>>, WebError> {
    let teams = state
        .directory()?
        .list_teams()
        .await
        .map_err(WebError::storage)?;
    Ok(Json(teams))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_laps_is_about_two_and_a_half_miles() {
        let miles = laps_to_miles(10);
        assert!((miles - 2.485_484_8).abs() < 1e-6, "got {miles}");
    }

    #[test]
    fn totals_sum_every_team() {
        let page = TeamsPage::new(vec![
            Team {
                team_id: TeamId::from(1),
                name: String::from("Falcons"),
                laps: 7,
            },
            Team {
                team_id: TeamId::from(2),
                name: String::from("Hares"),
                laps: 5,
            },
        ]);
        assert_eq!(page.total_laps, 12);
        assert!((page.total_miles - laps_to_miles(12)).abs() < f64::EPSILON);
    }

    #[test]
    fn no_teams_means_no_distance() {
        let page = TeamsPage::new(Vec::new());
        assert_eq!(page.total_laps, 0);
        assert!(page.total_miles.abs() < f64::EPSILON);
    }
}
