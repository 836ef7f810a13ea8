use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::game::{GameView, PauseRequest, PlayerActionRequest, ResumeCheckResponse},
    error::AppError,
    services::presence,
    state::SharedState,
};

/// Pause and resume endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games/{id}/pause", post(pause_game))
        .route("/games/{id}/resume", post(resume_game).get(can_resume_game))
}

/// Suspend a running game.
#[utoipa::path(
    post,
    path = "/games/{id}/pause",
    tag = "presence",
    params(("id" = Uuid, Path, description = "Session identifier")),
    request_body = PauseRequest,
    responses(
        (status = 200, description = "Game paused", body = GameView),
        (status = 409, description = "Game is not running")
    )
)]
pub async fn pause_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<PauseRequest>>,
) -> Result<Json<GameView>, AppError> {
    let session = presence::pause_game(&state, id, &payload.player_id, payload.reason).await?;
    Ok(Json(GameView::for_viewer(&session, Some(&payload.player_id))))
}

/// Resume a paused game.
#[utoipa::path(
    post,
    path = "/games/{id}/resume",
    tag = "presence",
    params(("id" = Uuid, Path, description = "Session identifier")),
    request_body = PlayerActionRequest,
    responses(
        (status = 200, description = "Game resumed", body = GameView),
        (status = 403, description = "Only the disconnected player may resume"),
        (status = 409, description = "Game is not paused")
    )
)]
pub async fn resume_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<PlayerActionRequest>>,
) -> Result<Json<GameView>, AppError> {
    let session = presence::resume_game(&state, id, &payload.player_id).await?;
    Ok(Json(GameView::for_viewer(&session, Some(&payload.player_id))))
}

/// Whether a paused game is still within its resume window.
#[utoipa::path(
    get,
    path = "/games/{id}/resume",
    tag = "presence",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses((status = 200, description = "Resume window status", body = ResumeCheckResponse))
)]
pub async fn can_resume_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeCheckResponse>, AppError> {
    let can_resume = presence::can_resume_game(&state, id).await?;
    Ok(Json(ResumeCheckResponse { can_resume }))
}
