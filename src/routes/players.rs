use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::stats::{HistoryEntryView, PlayerStatsView},
    error::AppError,
    services::history,
    state::{SharedState, session::GameKind},
};

/// Read-only history and statistics endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/players/{player_id}/history", get(player_history))
        .route("/players/{player_id}/stats/{kind}", get(player_stats))
}

/// Finished games of a player, most recent first.
#[utoipa::path(
    get,
    path = "/players/{player_id}/history",
    tag = "players",
    params(("player_id" = String, Path, description = "Player identifier")),
    responses((status = 200, description = "Game history", body = [HistoryEntryView]))
)]
pub async fn player_history(
    State(state): State<SharedState>,
    Path(player_id): Path<String>,
) -> Result<Json<Vec<HistoryEntryView>>, AppError> {
    let entries = history::list_history(&state, player_id).await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

/// Aggregated results of a player for one game kind.
#[utoipa::path(
    get,
    path = "/players/{player_id}/stats/{kind}",
    tag = "players",
    params(
        ("player_id" = String, Path, description = "Player identifier"),
        ("kind" = GameKind, Path, description = "Game kind")
    ),
    responses((status = 200, description = "Player statistics", body = PlayerStatsView))
)]
pub async fn player_stats(
    State(state): State<SharedState>,
    Path((player_id, kind)): Path<(String, GameKind)>,
) -> Result<Json<PlayerStatsView>, AppError> {
    let stats = history::get_player_stats(&state, player_id, kind).await?;
    Ok(Json(stats.into()))
}
