//! Host-driven match actions.
//!
//! Every action goes through [`transitions::dispatch`], which serializes writers and applies
//! the optimistic `lastUpdated` check.

use crate::{
    dto::{
        host::TransitionResponse,
        snapshot::{DisplaySnapshot, HostSnapshot},
    },
    error::ServiceError,
    services::lifeline_service,
    state::{
        SharedState,
        state_machine::GameAction,
        transitions::{self, TransitionOutcome},
    },
};

/// Current host view of the match, straight from the synchronized snapshot.
pub fn host_snapshot(state: &SharedState) -> HostSnapshot {
    HostSnapshot::build(&state.sync().current(), state.config(), state.is_degraded())
}

/// Current display view of the match.
pub fn display_snapshot(state: &SharedState) -> DisplaySnapshot {
    DisplaySnapshot::build(&state.sync().current(), state.config())
}

pub async fn start_match(
    state: &SharedState,
    observed: Option<i64>,
) -> Result<TransitionResponse, ServiceError> {
    run(state, GameAction::StartMatch, observed).await
}

pub async fn show_question(
    state: &SharedState,
    observed: Option<i64>,
) -> Result<TransitionResponse, ServiceError> {
    run(state, GameAction::ShowQuestion, observed).await
}

pub async fn show_options(
    state: &SharedState,
    observed: Option<i64>,
) -> Result<TransitionResponse, ServiceError> {
    run(state, GameAction::ShowOptions, observed).await
}

/// Record the contestants' pick; normalization happens in the state machine.
pub async fn select_option(
    state: &SharedState,
    option: String,
    observed: Option<i64>,
) -> Result<TransitionResponse, ServiceError> {
    run(state, GameAction::SelectOption(option), observed).await
}

/// Lock the selected option and reveal the verdict.
pub async fn lock_answer(
    state: &SharedState,
    observed: Option<i64>,
) -> Result<TransitionResponse, ServiceError> {
    run(state, GameAction::LockAnswer, observed).await
}

pub async fn advance_question(
    state: &SharedState,
    observed: Option<i64>,
) -> Result<TransitionResponse, ServiceError> {
    run(state, GameAction::AdvanceQuestion, observed).await
}

/// Close the match normally. A running countdown is stopped first.
pub async fn complete_match(
    state: &SharedState,
    observed: Option<i64>,
) -> Result<TransitionResponse, ServiceError> {
    let outcome =
        lifeline_service::stop_timer_and_dispatch(state, GameAction::CompleteMatch, observed).await?;
    Ok(outcome.into())
}

pub async fn abandon_match(
    state: &SharedState,
    observed: Option<i64>,
) -> Result<TransitionResponse, ServiceError> {
    let outcome =
        lifeline_service::stop_timer_and_dispatch(state, GameAction::AbandonMatch, observed).await?;
    Ok(outcome.into())
}

/// Return to `not-started`, clearing team progress.
pub async fn reset_match(
    state: &SharedState,
    observed: Option<i64>,
) -> Result<TransitionResponse, ServiceError> {
    let outcome =
        lifeline_service::stop_timer_and_dispatch(state, GameAction::ResetMatch, observed).await?;
    Ok(outcome.into())
}

async fn run(
    state: &SharedState,
    action: GameAction,
    observed: Option<i64>,
) -> Result<TransitionResponse, ServiceError> {
    let outcome: TransitionOutcome = transitions::dispatch(state, action, observed).await?;
    Ok(outcome.into())
}
