//! Lifeline activation and the phone-a-friend countdown.
//!
//! The countdown handle lives in [`AppState::lifeline_timer`](crate::state::AppState). Expiry
//! and a manual resume race through [`TimerHandle::cancel`]; whichever resolves the timer runs
//! the single `ResumeFromLifeline` transition.

use tracing::{info, warn};

use crate::{
    dto::host::TransitionResponse,
    error::ServiceError,
    services::sse_events,
    state::{
        SharedState,
        game::LifelineKind,
        lifeline_timer::{self, Resolution, TimerHandle, TimerState},
        now_ms,
        state_machine::{GameAction, GamePhase},
        transitions::{self, TransitionOutcome},
    },
};

/// Activate `kind` for the current team. Phone-a-friend also starts the countdown.
///
/// The timer slot stays locked from the dispatch until the handle is stored, so a concurrent
/// resume either runs before the activation or finds the new countdown.
pub async fn activate_lifeline(
    state: &SharedState,
    kind: LifelineKind,
    observed: Option<i64>,
) -> Result<TransitionResponse, ServiceError> {
    let mut slot = state.lifeline_timer().lock().await;
    let outcome = transitions::dispatch(state, GameAction::ActivateLifeline(kind), observed).await?;

    if outcome.applied && kind == LifelineKind::PhoneAFriend {
        if let Some(previous) = slot.replace(start_countdown(state)) {
            previous.cancel().await;
        }
        info!(
            seconds = state.config().phone_timer.as_secs(),
            "phone-a-friend countdown started"
        );
    }

    Ok(outcome.into())
}

/// Leave the active lifeline. Stops a running countdown first; if the countdown already expired,
/// its own resume wins and this call reports that without writing.
pub async fn resume_from_lifeline(
    state: &SharedState,
    observed: Option<i64>,
) -> Result<TransitionResponse, ServiceError> {
    let mut slot = state.lifeline_timer().lock().await;

    let resolution = match slot.take() {
        Some(handle) => match handle.cancel().await {
            Some(resolution) => Some(resolution),
            None => return Ok(already_expired(state)),
        },
        None => None,
    };
    if let Some(resolution) = resolution {
        sse_events::broadcast_lifeline_resolved(state, resolution);
    }

    let outcome =
        transitions::dispatch(state, GameAction::ResumeFromLifeline, observed).await?;
    let mut response = TransitionResponse::from(outcome);
    response.timer = resolution;
    Ok(response)
}

/// Cancel a running countdown, then run `action` (which clears the lifeline itself) before any
/// other lifeline operation can start.
pub async fn stop_timer_and_dispatch(
    state: &SharedState,
    action: GameAction,
    observed: Option<i64>,
) -> Result<TransitionOutcome, ServiceError> {
    let mut slot = state.lifeline_timer().lock().await;
    if let Some(handle) = slot.take()
        && let Some(resolution) = handle.cancel().await
    {
        sse_events::broadcast_lifeline_resolved(state, resolution);
    }
    transitions::dispatch(state, action, observed).await
}

/// Whether a countdown is currently running.
pub async fn countdown_running(state: &SharedState) -> bool {
    match state.lifeline_timer().lock().await.as_ref() {
        Some(handle) => matches!(handle.state().await, TimerState::Running { .. }),
        None => false,
    }
}

fn start_countdown(state: &SharedState) -> TimerHandle {
    let ticks = state.clone();
    let expiry = state.clone();
    lifeline_timer::spawn(
        state.config().phone_timer,
        now_ms(),
        move |view| sse_events::broadcast_lifeline_tick(&ticks, &view),
        move || async move {
            info!("phone-a-friend countdown expired; resuming");
            sse_events::broadcast_lifeline_resolved(&expiry, Resolution::Expired);
            if let Err(err) =
                transitions::dispatch(&expiry, GameAction::ResumeFromLifeline, None).await
            {
                warn!(error = %err, "failed to resume after countdown expiry");
            }
        },
    )
}

fn already_expired(state: &SharedState) -> TransitionResponse {
    let game = state.sync().current().game_or_default();
    let phase = GamePhase::of(&game);
    TransitionResponse {
        action: GameAction::ResumeFromLifeline.name().to_string(),
        from: phase.into(),
        to: phase.into(),
        applied: false,
        last_updated: game.last_updated,
        verdict: None,
        game,
        timer: Some(Resolution::Expired),
    }
}
