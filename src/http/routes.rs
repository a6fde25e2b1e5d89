//! HTTP route definitions

use axum::{
    extract::{Extension, State},
    http::{header, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::app::AppState;
use crate::game::{PlayerStats, UserId};
use crate::http::middleware::{require_auth, AuthenticatedUser};
use crate::util::time::uptime_secs;
use crate::ws::{play_handler, watch_handler};

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    // Public routes; the socket handlers authenticate themselves
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/play", get(play_handler))
        .route("/watch", get(watch_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/stats", get(stats_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    server_time: String,
    uptime_secs: u64,
    roster_size: usize,
    active_sessions: usize,
    attached_watchers: usize,
    round_stopped: bool,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        server_time: chrono::Utc::now().to_rfc3339(),
        uptime_secs: uptime_secs(),
        roster_size: state.distributor.roster().len(),
        active_sessions: state.sessions.active(),
        attached_watchers: state.distributor.attached(),
        round_stopped: state.distributor.is_stopped(),
    })
}

// ============================================================================
// Scoreboard endpoint
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Render id of the requesting user
    me: String,
    players: Vec<PlayerStats>,
}

async fn stats_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<StatsResponse>, AppError> {
    let player = state
        .battle
        .player(auth.user_id)
        .ok_or(AppError::NotFound(auth.user_id))?;

    Ok(Json(StatsResponse {
        me: player.render_id().to_string(),
        players: state.battle.stats(),
    }))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("No player for user {0}")]
    NotFound(UserId),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, Json(body)).into_response()
    }
}
