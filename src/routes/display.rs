use axum::{Json, Router, extract::State, routing::get};

use crate::{dto::snapshot::DisplaySnapshot, services::game_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/display/snapshot",
    tag = "display",
    responses((status = 200, description = "What the displays currently render", body = DisplaySnapshot))
)]
/// Public view of the match; never includes the correct option before the reveal.
pub async fn display_snapshot(State(state): State<SharedState>) -> Json<DisplaySnapshot> {
    Json(game_service::display_snapshot(&state))
}

pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/display/snapshot", get(display_snapshot))
}
