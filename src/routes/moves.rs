use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::game::{DrawResponse, GameView, MarkRequest, PlayerActionRequest, TileMoveRequest},
    error::AppError,
    services::turn_coordinator,
    state::SharedState,
};

/// Turn-taking endpoints for both game kinds.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games/{id}/moves/mark", post(play_mark))
        .route("/games/{id}/moves/tile", post(place_tile))
        .route("/games/{id}/moves/draw", post(draw_tile))
        .route("/games/{id}/moves/pass", post(pass_turn))
}

/// Place the caller's symbol on a tic-tac-toe cell.
#[utoipa::path(
    post,
    path = "/games/{id}/moves/mark",
    tag = "moves",
    params(("id" = Uuid, Path, description = "Session identifier")),
    request_body = MarkRequest,
    responses(
        (status = 200, description = "Move applied", body = GameView),
        (status = 409, description = "Not the caller's turn or game not running"),
        (status = 422, description = "Move rejected by the rules")
    )
)]
pub async fn play_mark(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<MarkRequest>>,
) -> Result<Json<GameView>, AppError> {
    let session =
        turn_coordinator::play_mark(&state, id, &payload.player_id, payload.position).await?;
    Ok(Json(GameView::for_viewer(&session, Some(&payload.player_id))))
}

/// Lay a domino at one end of the chain.
#[utoipa::path(
    post,
    path = "/games/{id}/moves/tile",
    tag = "moves",
    params(("id" = Uuid, Path, description = "Session identifier")),
    request_body = TileMoveRequest,
    responses(
        (status = 200, description = "Tile placed", body = GameView),
        (status = 409, description = "Not the caller's turn or game not running"),
        (status = 422, description = "Tile does not fit or is not in hand")
    )
)]
pub async fn place_tile(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<TileMoveRequest>>,
) -> Result<Json<GameView>, AppError> {
    let session = turn_coordinator::place_tile(
        &state,
        id,
        &payload.player_id,
        payload.tile,
        payload.side,
    )
    .await?;
    Ok(Json(GameView::for_viewer(&session, Some(&payload.player_id))))
}

/// Draw one tile from the pile.
#[utoipa::path(
    post,
    path = "/games/{id}/moves/draw",
    tag = "moves",
    params(("id" = Uuid, Path, description = "Session identifier")),
    request_body = PlayerActionRequest,
    responses(
        (status = 200, description = "Tile drawn", body = DrawResponse),
        (status = 409, description = "Draw pile empty or not the caller's turn")
    )
)]
pub async fn draw_tile(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<PlayerActionRequest>>,
) -> Result<Json<DrawResponse>, AppError> {
    let (tile, session) = turn_coordinator::draw_tile(&state, id, &payload.player_id).await?;
    Ok(Json(DrawResponse {
        tile,
        game: GameView::for_viewer(&session, Some(&payload.player_id)),
    }))
}

/// Pass the turn when no tile can be played.
#[utoipa::path(
    post,
    path = "/games/{id}/moves/pass",
    tag = "moves",
    params(("id" = Uuid, Path, description = "Session identifier")),
    request_body = PlayerActionRequest,
    responses(
        (status = 200, description = "Turn passed", body = GameView),
        (status = 422, description = "A legal move or a draw is still available")
    )
)]
pub async fn pass_turn(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<PlayerActionRequest>>,
) -> Result<Json<GameView>, AppError> {
    let session = turn_coordinator::pass_turn(&state, id, &payload.player_id).await?;
    Ok(Json(GameView::for_viewer(&session, Some(&payload.player_id))))
}
