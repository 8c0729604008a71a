//! Runs state-machine transitions against the store with optimistic concurrency.

use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::{
    config::QuizConfig,
    dao::{
        models::{self, QuestionSetsEntity, TeamsEntity, question_sets_from_entity, teams_from_entity},
        remote_store::{Partition, RemoteStore},
    },
    error::ServiceError,
    services::{answer_validator::AnswerVerdict, sse_events::broadcast_transition},
    state::{
        SharedState, now_ms,
        game::{GameState, Question},
        state_machine::{self, GameAction, GamePhase, MatchSnapshot, TransitionContext},
    },
};

/// Result of a dispatched action.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub action: &'static str,
    pub from: GamePhase,
    pub to: GamePhase,
    /// Game state after the action (unchanged when nothing was written).
    pub game: GameState,
    pub verdict: Option<AnswerVerdict>,
    /// Whether the store was written.
    pub applied: bool,
}

/// Read every partition a transition depends on, bypassing the synchronized cache.
pub async fn load_match_snapshot(
    store: &dyn RemoteStore,
    config: &QuizConfig,
) -> Result<MatchSnapshot, ServiceError> {
    let (game, teams, prize_structure, question_sets) = futures::try_join!(
        store.read(Partition::GameState.path()),
        store.read(Partition::Teams.path()),
        store.read(Partition::PrizeStructure.path()),
        store.read(Partition::QuestionSets.path()),
    )?;

    Ok(MatchSnapshot {
        game: models::decode::<GameState>(Partition::GameState, game)?.unwrap_or_default(),
        teams: models::decode::<TeamsEntity>(Partition::Teams, teams)?
            .map(teams_from_entity)
            .unwrap_or_default(),
        prize_structure: models::decode(Partition::PrizeStructure, prize_structure)?,
        question_sets: models::decode::<QuestionSetsEntity>(Partition::QuestionSets, question_sets)?
            .map(question_sets_from_entity)
            .unwrap_or_default(),
        config: config.clone(),
    })
}

/// Apply `action` to the match and broadcast the result.
///
/// `observed` is the `lastUpdated` the caller based its decision on. A stale attempt is retried
/// once against a fresh snapshot; a second stale attempt is surfaced.
pub async fn dispatch(
    state: &SharedState,
    action: GameAction,
    observed: Option<i64>,
) -> Result<TransitionOutcome, ServiceError> {
    let gate = state.transition_gate().lock().await;
    let store = state.require_store().await?;

    let work = run_with_retry(state, store.as_ref(), &action, observed);
    let outcome = match state.transition_timeout() {
        Some(limit) => timeout(limit, work)
            .await
            .map_err(|_| ServiceError::Timeout)??,
        None => work.await?,
    };
    drop(gate);

    if outcome.applied {
        broadcast_transition(state, &outcome);
    }
    Ok(outcome)
}

async fn run_with_retry(
    state: &SharedState,
    store: &dyn RemoteStore,
    action: &GameAction,
    observed: Option<i64>,
) -> Result<TransitionOutcome, ServiceError> {
    match attempt(state, store, action.clone(), observed).await {
        Err(ServiceError::StaleWrite { observed, actual }) => {
            debug!(
                action = action.name(),
                observed, actual, "stale write; retrying against a fresh snapshot"
            );
            attempt(state, store, action.clone(), None).await
        }
        other => other,
    }
}

async fn attempt(
    state: &SharedState,
    store: &dyn RemoteStore,
    action: GameAction,
    observed: Option<i64>,
) -> Result<TransitionOutcome, ServiceError> {
    let snapshot = load_match_snapshot(store, state.config()).await?;
    let base = snapshot.game.last_updated;
    if let Some(observed) = observed
        && base > observed
    {
        return Err(ServiceError::StaleWrite {
            observed,
            actual: base,
        });
    }

    let context = TransitionContext {
        now_ms: now_ms(),
        seed: rand::random(),
        question: resolve_question(state, &snapshot, &action),
    };
    let name = action.name();
    let Some(transition) = state_machine::plan(&snapshot, action, context)? else {
        let phase = GamePhase::of(&snapshot.game);
        return Ok(TransitionOutcome {
            action: name,
            from: phase,
            to: phase,
            game: snapshot.game,
            verdict: None,
            applied: false,
        });
    };
    let updates = transition.store_updates()?;

    let current = read_last_updated(store).await?;
    if current != base {
        return Err(ServiceError::StaleWrite {
            observed: base,
            actual: current,
        });
    }
    store.update(updates).await?;

    info!(
        action = name,
        from = %transition.from,
        to = %transition.to,
        last_updated = transition.next.last_updated,
        "transition applied"
    );
    Ok(TransitionOutcome {
        action: name,
        from: transition.from,
        to: transition.to,
        game: transition.next,
        verdict: transition.verdict,
        applied: true,
    })
}

async fn read_last_updated(store: &dyn RemoteStore) -> Result<i64, ServiceError> {
    let value = store
        .read(&Partition::GameState.child("lastUpdated"))
        .await?;
    Ok(value.as_ref().and_then(Value::as_i64).unwrap_or(0))
}

fn resolve_question(
    state: &SharedState,
    snapshot: &MatchSnapshot,
    action: &GameAction,
) -> Option<Question> {
    if *action != GameAction::ShowQuestion {
        return None;
    }
    let (_, set_id) = snapshot.current_assignment()?;
    state
        .question_bank()
        .question(set_id, snapshot.game.current_question_number)
}
