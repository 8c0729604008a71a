use axum::{
    Json, Router,
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, request::Parts},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dao::remote_store::Partition,
    dto::{
        host::{
            ActivateLifelineRequest, HOST_ID_HEADER, OBSERVED_HEADER, SelectOptionRequest,
            TransitionResponse,
        },
        snapshot::HostSnapshot,
    },
    error::AppError,
    services::{game_service, lifeline_service},
    state::SharedState,
};

/// Host-only endpoints driving the match.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/host/snapshot", get(snapshot))
        .route("/host/match/start", post(start_match))
        .route("/host/match/question/show", post(show_question))
        .route("/host/match/options/show", post(show_options))
        .route("/host/match/answer/select", post(select_option))
        .route("/host/match/answer/lock", post(lock_answer))
        .route("/host/match/question/advance", post(advance_question))
        .route("/host/match/lifeline/activate", post(activate_lifeline))
        .route("/host/match/lifeline/resume", post(resume_from_lifeline))
        .route("/host/match/complete", post(complete_match))
        .route("/host/match/abandon", post(abandon_match))
        .route("/host/match/reset", post(reset_match))
        .route_layer(middleware::from_fn_with_state(state, require_host))
}

/// `lastUpdated` the host panel based its action on, read from `x-observed-last-updated`.
#[derive(Debug, Clone, Copy)]
pub struct ObservedLastUpdated(pub Option<i64>);

impl<S: Send + Sync> FromRequestParts<S> for ObservedLastUpdated {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get(OBSERVED_HEADER) else {
            return Ok(Self(None));
        };
        raw.to_str()
            .ok()
            .and_then(|value| value.trim().parse::<i64>().ok())
            .map(|value| Self(Some(value)))
            .ok_or_else(|| {
                AppError::BadRequest(format!("header `{OBSERVED_HEADER}` must be an integer"))
            })
    }
}

/// Current synchronized snapshot, including sync diagnostics.
#[utoipa::path(
    get,
    path = "/host/snapshot",
    tag = "host",
    params(("X-Host-Id" = String, Header, description = "Host identity listed in allowed-hosts")),
    responses((status = 200, description = "Host snapshot", body = HostSnapshot))
)]
pub async fn snapshot(State(state): State<SharedState>) -> Json<HostSnapshot> {
    Json(game_service::host_snapshot(&state))
}

/// Seat the first team and start the match. Fails with the readiness report when setup is
/// incomplete.
#[utoipa::path(
    post,
    path = "/host/match/start",
    tag = "host",
    params(
        ("X-Host-Id" = String, Header, description = "Host identity listed in allowed-hosts"),
        ("X-Observed-Last-Updated" = Option<i64>, Header, description = "lastUpdated the host acted upon")
    ),
    responses(
        (status = 200, description = "Match started", body = TransitionResponse),
        (status = 409, description = "Setup incomplete or match already started")
    )
)]
pub async fn start_match(
    State(state): State<SharedState>,
    ObservedLastUpdated(observed): ObservedLastUpdated,
) -> Result<Json<TransitionResponse>, AppError> {
    Ok(Json(game_service::start_match(&state, observed).await?))
}

/// Load and show the current question.
#[utoipa::path(
    post,
    path = "/host/match/question/show",
    tag = "host",
    params(
        ("X-Host-Id" = String, Header, description = "Host identity listed in allowed-hosts"),
        ("X-Observed-Last-Updated" = Option<i64>, Header, description = "lastUpdated the host acted upon")
    ),
    responses(
        (status = 200, description = "Question shown", body = TransitionResponse),
        (status = 404, description = "Question missing from the local bank")
    )
)]
pub async fn show_question(
    State(state): State<SharedState>,
    ObservedLastUpdated(observed): ObservedLastUpdated,
) -> Result<Json<TransitionResponse>, AppError> {
    Ok(Json(game_service::show_question(&state, observed).await?))
}

#[utoipa::path(
    post,
    path = "/host/match/options/show",
    tag = "host",
    params(
        ("X-Host-Id" = String, Header, description = "Host identity listed in allowed-hosts"),
        ("X-Observed-Last-Updated" = Option<i64>, Header, description = "lastUpdated the host acted upon")
    ),
    responses((status = 200, description = "Options shown", body = TransitionResponse))
)]
pub async fn show_options(
    State(state): State<SharedState>,
    ObservedLastUpdated(observed): ObservedLastUpdated,
) -> Result<Json<TransitionResponse>, AppError> {
    Ok(Json(game_service::show_options(&state, observed).await?))
}

/// Record the option the contestants picked.
#[utoipa::path(
    post,
    path = "/host/match/answer/select",
    tag = "host",
    params(
        ("X-Host-Id" = String, Header, description = "Host identity listed in allowed-hosts"),
        ("X-Observed-Last-Updated" = Option<i64>, Header, description = "lastUpdated the host acted upon")
    ),
    request_body = SelectOptionRequest,
    responses(
        (status = 200, description = "Option selected", body = TransitionResponse),
        (status = 400, description = "Not one of the visible options")
    )
)]
pub async fn select_option(
    State(state): State<SharedState>,
    ObservedLastUpdated(observed): ObservedLastUpdated,
    Valid(Json(payload)): Valid<Json<SelectOptionRequest>>,
) -> Result<Json<TransitionResponse>, AppError> {
    Ok(Json(
        game_service::select_option(&state, payload.option, observed).await?,
    ))
}

/// Lock the selection and reveal the verdict.
#[utoipa::path(
    post,
    path = "/host/match/answer/lock",
    tag = "host",
    params(
        ("X-Host-Id" = String, Header, description = "Host identity listed in allowed-hosts"),
        ("X-Observed-Last-Updated" = Option<i64>, Header, description = "lastUpdated the host acted upon")
    ),
    responses((status = 200, description = "Answer revealed", body = TransitionResponse))
)]
pub async fn lock_answer(
    State(state): State<SharedState>,
    ObservedLastUpdated(observed): ObservedLastUpdated,
) -> Result<Json<TransitionResponse>, AppError> {
    Ok(Json(game_service::lock_answer(&state, observed).await?))
}

/// Move to the next question, the next team, or complete the match.
#[utoipa::path(
    post,
    path = "/host/match/question/advance",
    tag = "host",
    params(
        ("X-Host-Id" = String, Header, description = "Host identity listed in allowed-hosts"),
        ("X-Observed-Last-Updated" = Option<i64>, Header, description = "lastUpdated the host acted upon")
    ),
    responses((status = 200, description = "Advanced", body = TransitionResponse))
)]
pub async fn advance_question(
    State(state): State<SharedState>,
    ObservedLastUpdated(observed): ObservedLastUpdated,
) -> Result<Json<TransitionResponse>, AppError> {
    Ok(Json(game_service::advance_question(&state, observed).await?))
}

/// Use a lifeline for the current team. Phone-a-friend starts the countdown.
#[utoipa::path(
    post,
    path = "/host/match/lifeline/activate",
    tag = "host",
    params(
        ("X-Host-Id" = String, Header, description = "Host identity listed in allowed-hosts"),
        ("X-Observed-Last-Updated" = Option<i64>, Header, description = "lastUpdated the host acted upon")
    ),
    request_body = ActivateLifelineRequest,
    responses(
        (status = 200, description = "Lifeline active", body = TransitionResponse),
        (status = 409, description = "Lifeline disabled, already used, or not allowed now")
    )
)]
pub async fn activate_lifeline(
    State(state): State<SharedState>,
    ObservedLastUpdated(observed): ObservedLastUpdated,
    Valid(Json(payload)): Valid<Json<ActivateLifelineRequest>>,
) -> Result<Json<TransitionResponse>, AppError> {
    Ok(Json(
        lifeline_service::activate_lifeline(&state, payload.kind, observed).await?,
    ))
}

/// End the active lifeline, stopping the countdown if it is still running.
#[utoipa::path(
    post,
    path = "/host/match/lifeline/resume",
    tag = "host",
    params(
        ("X-Host-Id" = String, Header, description = "Host identity listed in allowed-hosts"),
        ("X-Observed-Last-Updated" = Option<i64>, Header, description = "lastUpdated the host acted upon")
    ),
    responses((status = 200, description = "Back to the question", body = TransitionResponse))
)]
pub async fn resume_from_lifeline(
    State(state): State<SharedState>,
    ObservedLastUpdated(observed): ObservedLastUpdated,
) -> Result<Json<TransitionResponse>, AppError> {
    Ok(Json(
        lifeline_service::resume_from_lifeline(&state, observed).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/host/match/complete",
    tag = "host",
    params(
        ("X-Host-Id" = String, Header, description = "Host identity listed in allowed-hosts"),
        ("X-Observed-Last-Updated" = Option<i64>, Header, description = "lastUpdated the host acted upon")
    ),
    responses((status = 200, description = "Match completed", body = TransitionResponse))
)]
pub async fn complete_match(
    State(state): State<SharedState>,
    ObservedLastUpdated(observed): ObservedLastUpdated,
) -> Result<Json<TransitionResponse>, AppError> {
    Ok(Json(game_service::complete_match(&state, observed).await?))
}

#[utoipa::path(
    post,
    path = "/host/match/abandon",
    tag = "host",
    params(
        ("X-Host-Id" = String, Header, description = "Host identity listed in allowed-hosts"),
        ("X-Observed-Last-Updated" = Option<i64>, Header, description = "lastUpdated the host acted upon")
    ),
    responses((status = 200, description = "Match abandoned", body = TransitionResponse))
)]
pub async fn abandon_match(
    State(state): State<SharedState>,
    ObservedLastUpdated(observed): ObservedLastUpdated,
) -> Result<Json<TransitionResponse>, AppError> {
    Ok(Json(game_service::abandon_match(&state, observed).await?))
}

/// Return to `not-started` and clear team progress.
#[utoipa::path(
    post,
    path = "/host/match/reset",
    tag = "host",
    params(
        ("X-Host-Id" = String, Header, description = "Host identity listed in allowed-hosts"),
        ("X-Observed-Last-Updated" = Option<i64>, Header, description = "lastUpdated the host acted upon")
    ),
    responses((status = 200, description = "Match reset", body = TransitionResponse))
)]
pub async fn reset_match(
    State(state): State<SharedState>,
    ObservedLastUpdated(observed): ObservedLastUpdated,
) -> Result<Json<TransitionResponse>, AppError> {
    Ok(Json(game_service::reset_match(&state, observed).await?))
}

/// Reject requests whose `x-host-id` is not listed under `allowed-hosts`.
pub(crate) async fn require_host(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(HOST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Unauthorized("missing host header `X-Host-Id`".into()))?;

    let snapshot = state.sync().current();
    if !snapshot.loaded.contains(&Partition::AllowedHosts) {
        return Err(AppError::ServiceUnavailable(
            "allowed hosts not synchronized yet".into(),
        ));
    }

    if snapshot.allowed_hosts.iter().any(|host| *host == provided) {
        Ok(next.run(req).await)
    } else {
        Err(AppError::Unauthorized(format!(
            "host `{provided}` is not allowed"
        )))
    }
}
