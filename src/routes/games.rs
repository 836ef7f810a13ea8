use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::game::{
        CreateGameRequest, GameView, JoinGameRequest, LeaveResponse, PlayerActionRequest,
        ReadyRequest, ViewerQuery,
    },
    error::AppError,
    services::matchmaking::{self, LeaveOutcome},
    state::SharedState,
};

/// Routes covering room creation, joining and the waiting-room lifecycle.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", post(create_game))
        .route("/games/join", post(join_game))
        .route("/games/{id}", get(get_game))
        .route("/games/{id}/ready", post(set_ready))
        .route("/games/{id}/start", post(start_game))
        .route("/games/{id}/leave", post(leave_game))
}

/// Open a new room hosted by the caller.
#[utoipa::path(
    post,
    path = "/games",
    tag = "games",
    request_body = CreateGameRequest,
    responses(
        (status = 200, description = "Room created", body = GameView),
        (status = 400, description = "Invalid board or profile"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateGameRequest>>,
) -> Result<Json<GameView>, AppError> {
    let host_id = payload.host.player_id.clone();
    let session =
        matchmaking::create_game(&state, payload.host.into(), payload.game.into()).await?;
    Ok(Json(GameView::for_viewer(&session, Some(&host_id))))
}

/// Join a waiting room by its code.
#[utoipa::path(
    post,
    path = "/games/join",
    tag = "games",
    request_body = JoinGameRequest,
    responses(
        (status = 200, description = "Joined the room", body = GameView),
        (status = 404, description = "Unknown room code"),
        (status = 409, description = "Room full, already joined or already started")
    )
)]
pub async fn join_game(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<JoinGameRequest>>,
) -> Result<Json<GameView>, AppError> {
    let player_id = payload.player.player_id.clone();
    let session =
        matchmaking::join_game_by_code(&state, &payload.room_code, payload.player.into()).await?;
    Ok(Json(GameView::for_viewer(&session, Some(&player_id))))
}

/// Fetch a session as seen by the optional viewer.
#[utoipa::path(
    get,
    path = "/games/{id}",
    tag = "games",
    params(("id" = Uuid, Path, description = "Session identifier"), ViewerQuery),
    responses(
        (status = 200, description = "Current session", body = GameView),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(viewer): Query<ViewerQuery>,
) -> Result<Json<GameView>, AppError> {
    let session = matchmaking::get_game(&state, id).await?;
    Ok(Json(GameView::for_viewer(&session, viewer.player_id.as_deref())))
}

/// Toggle the readiness flag of a player in a waiting room.
#[utoipa::path(
    post,
    path = "/games/{id}/ready",
    tag = "games",
    params(("id" = Uuid, Path, description = "Session identifier")),
    request_body = ReadyRequest,
    responses((status = 200, description = "Readiness updated", body = GameView))
)]
pub async fn set_ready(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<ReadyRequest>>,
) -> Result<Json<GameView>, AppError> {
    let session =
        matchmaking::set_player_ready(&state, id, &payload.player_id, payload.is_ready).await?;
    Ok(Json(GameView::for_viewer(&session, Some(&payload.player_id))))
}

/// Start the game once both players are ready. Host only.
#[utoipa::path(
    post,
    path = "/games/{id}/start",
    tag = "games",
    params(("id" = Uuid, Path, description = "Session identifier")),
    request_body = PlayerActionRequest,
    responses(
        (status = 200, description = "Game started", body = GameView),
        (status = 403, description = "Caller is not the host"),
        (status = 409, description = "Players missing or not ready")
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<PlayerActionRequest>>,
) -> Result<Json<GameView>, AppError> {
    let session = matchmaking::start_game(&state, id, &payload.player_id).await?;
    Ok(Json(GameView::for_viewer(&session, Some(&payload.player_id))))
}

/// Leave a room; forfeits a running game.
#[utoipa::path(
    post,
    path = "/games/{id}/leave",
    tag = "games",
    params(("id" = Uuid, Path, description = "Session identifier")),
    request_body = PlayerActionRequest,
    responses((status = 200, description = "Player left", body = LeaveResponse))
)]
pub async fn leave_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<PlayerActionRequest>>,
) -> Result<Json<LeaveResponse>, AppError> {
    let response = match matchmaking::leave_game(&state, id, &payload.player_id).await? {
        LeaveOutcome::Deleted => LeaveResponse {
            deleted: true,
            game: None,
        },
        LeaveOutcome::Left(session) => LeaveResponse {
            deleted: false,
            game: Some(GameView::for_viewer(&session, Some(&payload.player_id))),
        },
    };
    Ok(Json(response))
}
