use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the DuoPlay backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::games::create_game,
        crate::routes::games::join_game,
        crate::routes::games::get_game,
        crate::routes::games::set_ready,
        crate::routes::games::start_game,
        crate::routes::games::leave_game,
        crate::routes::moves::play_mark,
        crate::routes::moves::place_tile,
        crate::routes::moves::draw_tile,
        crate::routes::moves::pass_turn,
        crate::routes::presence::pause_game,
        crate::routes::presence::resume_game,
        crate::routes::presence::can_resume_game,
        crate::routes::players::player_history,
        crate::routes::players::player_stats,
        crate::routes::sse::session_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::game::ProfileInput,
            crate::dto::game::PlayerInput,
            crate::dto::game::GameSetupInput,
            crate::dto::game::CreateGameRequest,
            crate::dto::game::JoinGameRequest,
            crate::dto::game::PlayerActionRequest,
            crate::dto::game::ReadyRequest,
            crate::dto::game::MarkRequest,
            crate::dto::game::TileMoveRequest,
            crate::dto::game::PauseRequest,
            crate::dto::game::GameView,
            crate::dto::game::PlayerView,
            crate::dto::game::DominoesPlayerView,
            crate::dto::game::BoardView,
            crate::dto::game::PlacedTileView,
            crate::dto::game::MoveView,
            crate::dto::game::PauseView,
            crate::dto::game::DrawResponse,
            crate::dto::game::LeaveResponse,
            crate::dto::game::ResumeCheckResponse,
            crate::dto::stats::HistoryEntryView,
            crate::dto::stats::PlayerStatsView,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::engine::dominoes::Tile,
            crate::engine::dominoes::Side,
            crate::engine::tictactoe::Symbol,
            crate::state::lifecycle::SessionStatus,
            crate::state::session::GameKind,
            crate::state::session::WinReason,
            crate::state::session::PauseReason,
            crate::state::session::MovePayload,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "games", description = "Room creation and waiting-room lifecycle"),
        (name = "moves", description = "Turn-taking for tic-tac-toe and dominoes"),
        (name = "presence", description = "Pause and resume"),
        (name = "players", description = "Game history and player statistics"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/games",
            "/games/join",
            "/games/{id}",
            "/games/{id}/moves/tile",
            "/games/{id}/resume",
            "/games/{id}/events",
            "/players/{player_id}/stats/{kind}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
