use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, Query, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{
    dto::game::ViewerQuery, error::AppError, services::sse_service, state::SharedState,
};

#[utoipa::path(
    get,
    path = "/games/{id}/events",
    tag = "sse",
    params(("id" = Uuid, Path, description = "Session identifier"), ViewerQuery),
    responses(
        (status = 200, description = "Session update stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown session")
    )
)]
/// Stream every committed change of a session to the caller.
pub async fn session_stream(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(viewer): Query<ViewerQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let subscription = sse_service::subscribe_session(&state, id, viewer.player_id).await?;
    info!(session_id = %id, "new session SSE connection");
    Ok(sse_service::to_sse_stream(state, subscription))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/games/{id}/events", get(session_stream))
}
