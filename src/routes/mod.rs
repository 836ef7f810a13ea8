use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod games;
pub mod health;
pub mod moves;
pub mod players;
pub mod presence;
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(games::router())
        .merge(moves::router())
        .merge(presence::router())
        .merge(players::router())
        .merge(sse::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
