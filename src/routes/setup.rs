use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post, put},
};
use axum_valid::Valid;

use crate::{
    dto::setup::{PrizeStructureInput, RequiredSetsResponse, TeamInput},
    error::AppError,
    routes::host::require_host,
    services::{
        config_sync::SyncOutcome, setup_readiness::ReadinessReport, setup_service,
    },
    state::{
        SharedState,
        game::{PrizeStructure, QuestionSetMetadata, Team},
    },
};

/// Host-only setup endpoints. Edits are rejected once the match started.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/host/teams", get(list_teams).post(create_team))
        .route("/host/teams/{id}", put(update_team).delete(delete_team))
        .route("/host/prize-structure", put(set_prize_structure))
        .route("/host/question-sets/publish", post(publish_question_sets))
        .route("/host/setup/readiness", get(readiness))
        .route("/host/setup/required-sets", get(required_sets))
        .route("/host/config/sync", post(sync_config))
        .route_layer(middleware::from_fn_with_state(state, require_host))
}

/// Teams in play-queue order.
#[utoipa::path(
    get,
    path = "/host/teams",
    tag = "setup",
    params(("X-Host-Id" = String, Header, description = "Host identity listed in allowed-hosts")),
    responses((status = 200, description = "Registered teams", body = [Team]))
)]
pub async fn list_teams(State(state): State<SharedState>) -> Json<Vec<Team>> {
    Json(setup_service::list_teams(&state))
}

#[utoipa::path(
    post,
    path = "/host/teams",
    tag = "setup",
    params(("X-Host-Id" = String, Header, description = "Host identity listed in allowed-hosts")),
    request_body = TeamInput,
    responses(
        (status = 200, description = "Team created", body = Team),
        (status = 409, description = "Match already started or team limit reached")
    )
)]
pub async fn create_team(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<TeamInput>>,
) -> Result<Json<Team>, AppError> {
    Ok(Json(setup_service::create_team(&state, payload).await?))
}

#[utoipa::path(
    put,
    path = "/host/teams/{id}",
    tag = "setup",
    params(
        ("X-Host-Id" = String, Header, description = "Host identity listed in allowed-hosts"),
        ("id" = String, Path, description = "Identifier of the team to update")
    ),
    request_body = TeamInput,
    responses((status = 200, description = "Team updated", body = Team))
)]
pub async fn update_team(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<TeamInput>>,
) -> Result<Json<Team>, AppError> {
    Ok(Json(setup_service::update_team(&state, &id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/host/teams/{id}",
    tag = "setup",
    params(
        ("X-Host-Id" = String, Header, description = "Host identity listed in allowed-hosts"),
        ("id" = String, Path, description = "Identifier of the team to delete")
    ),
    responses((status = 204, description = "Team deleted"))
)]
pub async fn delete_team(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    setup_service::delete_team(&state, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Replace the prize ladder.
#[utoipa::path(
    put,
    path = "/host/prize-structure",
    tag = "setup",
    params(("X-Host-Id" = String, Header, description = "Host identity listed in allowed-hosts")),
    request_body = PrizeStructureInput,
    responses((status = 200, description = "Prize ladder stored", body = PrizeStructure))
)]
pub async fn set_prize_structure(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<PrizeStructureInput>>,
) -> Result<Json<PrizeStructure>, AppError> {
    Ok(Json(
        setup_service::set_prize_structure(&state, payload).await?,
    ))
}

/// Publish the locally cached question sets under `question-sets`.
#[utoipa::path(
    post,
    path = "/host/question-sets/publish",
    tag = "setup",
    params(("X-Host-Id" = String, Header, description = "Host identity listed in allowed-hosts")),
    responses((status = 200, description = "Metadata published", body = [QuestionSetMetadata]))
)]
pub async fn publish_question_sets(
    State(state): State<SharedState>,
) -> Result<Json<Vec<QuestionSetMetadata>>, AppError> {
    Ok(Json(setup_service::publish_question_sets(&state).await?))
}

/// Run every setup check without starting the match.
#[utoipa::path(
    get,
    path = "/host/setup/readiness",
    tag = "setup",
    params(("X-Host-Id" = String, Header, description = "Host identity listed in allowed-hosts")),
    responses((status = 200, description = "Readiness report", body = ReadinessReport))
)]
pub async fn readiness(
    State(state): State<SharedState>,
) -> Result<Json<ReadinessReport>, AppError> {
    Ok(Json(setup_service::readiness(&state).await?))
}

/// Check the question sets assigned to a running match against the local bank.
#[utoipa::path(
    get,
    path = "/host/setup/required-sets",
    tag = "setup",
    params(("X-Host-Id" = String, Header, description = "Host identity listed in allowed-hosts")),
    responses((status = 200, description = "Required sets report", body = RequiredSetsResponse))
)]
pub async fn required_sets(
    State(state): State<SharedState>,
) -> Result<Json<RequiredSetsResponse>, AppError> {
    Ok(Json(setup_service::required_sets(&state).await?))
}

/// Align the remote config mirror with the authoritative configuration.
#[utoipa::path(
    post,
    path = "/host/config/sync",
    tag = "setup",
    params(("X-Host-Id" = String, Header, description = "Host identity listed in allowed-hosts")),
    responses((status = 200, description = "Reconciler outcome", body = SyncOutcome))
)]
pub async fn sync_config(State(state): State<SharedState>) -> Result<Json<SyncOutcome>, AppError> {
    Ok(Json(setup_service::sync_config(&state).await?))
}
