use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Hotseat Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::display_stream,
        crate::routes::sse::host_stream,
        crate::routes::display::display_snapshot,
        crate::routes::host::snapshot,
        crate::routes::host::start_match,
        crate::routes::host::show_question,
        crate::routes::host::show_options,
        crate::routes::host::select_option,
        crate::routes::host::lock_answer,
        crate::routes::host::advance_question,
        crate::routes::host::activate_lifeline,
        crate::routes::host::resume_from_lifeline,
        crate::routes::host::complete_match,
        crate::routes::host::abandon_match,
        crate::routes::host::reset_match,
        crate::routes::setup::list_teams,
        crate::routes::setup::create_team,
        crate::routes::setup::update_team,
        crate::routes::setup::delete_team,
        crate::routes::setup::set_prize_structure,
        crate::routes::setup::publish_question_sets,
        crate::routes::setup::readiness,
        crate::routes::setup::required_sets,
        crate::routes::setup::sync_config,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::TransitionEvent,
            crate::dto::sse::LifelineResolvedEvent,
            crate::state::lifeline_timer::TimerView,
            crate::dto::phase::VisibleGamePhase,
            crate::dto::snapshot::HostSnapshot,
            crate::dto::snapshot::DisplaySnapshot,
            crate::dto::host::SelectOptionRequest,
            crate::dto::host::ActivateLifelineRequest,
            crate::dto::host::TransitionResponse,
            crate::dto::setup::TeamInput,
            crate::dto::setup::PrizeStructureInput,
            crate::dto::setup::RequiredSetsResponse,
            crate::services::setup_readiness::ReadinessReport,
            crate::services::config_sync::SyncOutcome,
            crate::state::game::GameState,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "display", description = "Read-only views for the displays"),
        (name = "host", description = "Match control for the host panel"),
        (name = "setup", description = "Teams, prize ladder and readiness checks"),
    )
)]
pub struct ApiDoc;
