//! Axum router construction.
//!
//! Assembles every route (admin pages, JSON, both `WebSocket` endpoints,
//! and the two static directories) into a single [`Router`] with CORS and
//! request tracing.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use laptrack_core::TeamDirectory;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete router.
///
/// - `GET /` -- 303 redirect to `/teams/`
/// - `GET /teams`, `GET /teams/` -- team list page
/// - `GET /team/{id}` -- single team page
/// - `GET /api/teams` -- team list JSON
/// - `GET /laps` -- reader `WebSocket`
/// - `GET /notify` -- display `WebSocket`
/// - `/templates/*`, `/clients/*` -- static files
///
/// CORS allows any origin so displays can be served from elsewhere.
pub fn build_router<D: TeamDirectory>(state: Arc<AppState<D>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let templates = ServeDir::new(&state.assets.templates);
    let clients = ServeDir::new(&state.assets.clients);

    Router::new()
        // Admin pages
        .route("/", get(handlers::index))
        .route("/teams", get(handlers::teams_page::<D>))
        .route("/teams/", get(handlers::teams_page::<D>))
        .route("/team/{id}", get(handlers::team_page::<D>))
        .route("/api/teams", get(handlers::list_teams::<D>))
        // WebSocket
        .route("/laps", get(ws::ws_laps::<D>))
        .route("/notify", get(ws::ws_notify::<D>))
        // Static files
        .nest_service("/templates", templates)
        .nest_service("/clients", clients)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
