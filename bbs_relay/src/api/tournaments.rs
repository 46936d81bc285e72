//! Read-only tournament endpoints for lobby pages and sysop tools.
//!
//! Everything that changes a tournament goes over the bus; these handlers
//! only report.
//!
//! ```bash
//! curl http://localhost:6969/api/v1/tournaments
//! curl http://localhost:6969/api/v1/players/ann/stats
//! ```

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use bbs_tourney::{
    PlayerId, TournamentId,
    tournament::models::{CareerStats, TournamentInfo},
};
use serde::Serialize;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

/// List live tournaments, oldest first.
pub async fn list_tournaments(State(state): State<AppState>) -> Json<Vec<TournamentInfo>> {
    Json(state.manager.list_tournaments().await)
}

/// Lobby view of one tournament.
pub async fn get_tournament(
    State(state): State<AppState>,
    Path(tournament_id): Path<String>,
) -> ApiResult<TournamentInfo> {
    let id = TournamentId::from(tournament_id.as_str());
    let handle = state.manager.get_tournament(&id).await.map_err(|e| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
    })?;

    match handle.info().await {
        Some(info) => Ok(Json(info)),
        None => Err((
            StatusCode::GONE,
            Json(ErrorResponse {
                error: format!("Tournament {id} has stopped"),
            }),
        )),
    }
}

/// Career record across saved tournaments.
pub async fn player_stats(
    State(state): State<AppState>,
    Path(player): Path<String>,
) -> ApiResult<CareerStats> {
    state
        .manager
        .career_stats(&PlayerId::new(&player))
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!("Failed to load stats for {}: {}", player, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Failed to load player stats".to_string(),
                }),
            )
        })
}
