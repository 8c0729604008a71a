use axum::Router;

use crate::state::SharedState;

pub mod display;
pub mod docs;
pub mod health;
pub mod host;
pub mod setup;
pub mod sse;

/// Every route tree of the server. Host routes carry their own auth layer.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(sse::router())
        .merge(display::router())
        .merge(host::router(state.clone()))
        .merge(setup::router(state.clone()))
        .merge(docs::router())
        .with_state(state)
}
