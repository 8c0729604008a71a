//! Setup editing (teams, prize ladder) and the readiness reports.
//!
//! Edits are only accepted while the match is `not-started`. They take the transition gate so
//! they never interleave with a `startMatch`.

use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        models::{self, QuestionSetsEntity},
        remote_store::{Partition, RemoteStore},
    },
    dto::setup::{PrizeStructureInput, RequiredSetsResponse, TeamInput},
    error::ServiceError,
    services::{
        config_sync::{self, SyncOutcome},
        setup_readiness::{self, ReadinessReport},
    },
    state::{
        SharedState,
        game::{GameState, GameStatus, PrizeStructure, QuestionSetMetadata, Team},
        now_ms,
        transitions::load_match_snapshot,
    },
};

/// Teams in play-queue order.
pub fn list_teams(state: &SharedState) -> Vec<Team> {
    state.sync().current().teams.into_values().collect()
}

/// Register a new team.
pub async fn create_team(state: &SharedState, input: TeamInput) -> Result<Team, ServiceError> {
    let _gate = state.transition_gate().lock().await;
    let store = state.require_store().await?;
    let snapshot = load_match_snapshot(store.as_ref(), state.config()).await?;
    ensure_not_started(&snapshot.game)?;

    let max_teams = state.config().max_teams as usize;
    if snapshot.teams.len() >= max_teams {
        return Err(ServiceError::InvalidState(format!(
            "the match is limited to {max_teams} team(s)"
        )));
    }

    let input = input.normalized();
    let team = Team {
        id: Uuid::new_v4().simple().to_string(),
        name: input.name,
        participants: input.participants,
        contact_phone: input.contact_phone.unwrap_or_default(),
        created_at: now_ms(),
        ..Team::default()
    };
    write_team(store.as_ref(), &team).await?;

    info!(team_id = %team.id, name = %team.name, "team created");
    Ok(team)
}

/// Replace the editable fields of a team. Progress fields are kept.
pub async fn update_team(
    state: &SharedState,
    id: &str,
    input: TeamInput,
) -> Result<Team, ServiceError> {
    let _gate = state.transition_gate().lock().await;
    let store = state.require_store().await?;
    let snapshot = load_match_snapshot(store.as_ref(), state.config()).await?;
    ensure_not_started(&snapshot.game)?;

    let Some(mut team) = snapshot.teams.get(id).cloned() else {
        return Err(ServiceError::NotFound(format!("team `{id}` not found")));
    };

    let input = input.normalized();
    team.name = input.name;
    team.participants = input.participants;
    team.contact_phone = input.contact_phone.unwrap_or_default();
    write_team(store.as_ref(), &team).await?;

    info!(team_id = %team.id, "team updated");
    Ok(team)
}

pub async fn delete_team(state: &SharedState, id: &str) -> Result<(), ServiceError> {
    let _gate = state.transition_gate().lock().await;
    let store = state.require_store().await?;
    let snapshot = load_match_snapshot(store.as_ref(), state.config()).await?;
    ensure_not_started(&snapshot.game)?;

    if !snapshot.teams.contains_key(id) {
        return Err(ServiceError::NotFound(format!("team `{id}` not found")));
    }
    if snapshot.game.play_queue.iter().any(|queued| queued == id) {
        return Err(ServiceError::InvalidState(format!(
            "team `{id}` is still in the play queue"
        )));
    }

    store
        .write(&Partition::Teams.child(id), Value::Null)
        .await?;
    info!(team_id = %id, "team deleted");
    Ok(())
}

/// Replace the prize ladder.
pub async fn set_prize_structure(
    state: &SharedState,
    input: PrizeStructureInput,
) -> Result<PrizeStructure, ServiceError> {
    let _gate = state.transition_gate().lock().await;
    let store = state.require_store().await?;
    let snapshot = load_match_snapshot(store.as_ref(), state.config()).await?;
    ensure_not_started(&snapshot.game)?;

    let ladder = PrizeStructure::from(input);
    store
        .write(Partition::PrizeStructure.path(), serde_json::to_value(&ladder)?)
        .await?;
    info!(
        questions = ladder.values.len(),
        milestones = ?ladder.milestones,
        "prize structure replaced"
    );
    Ok(ladder)
}

/// Readiness report computed from a fresh read of the store.
pub async fn readiness(state: &SharedState) -> Result<ReadinessReport, ServiceError> {
    let store = state.require_store().await?;
    let snapshot = load_match_snapshot(store.as_ref(), state.config()).await?;
    Ok(setup_readiness::validate_complete_setup(
        &snapshot.teams,
        &snapshot.question_sets,
        snapshot.prize_structure.as_ref(),
        state.config(),
    ))
}

/// Check that every set assigned to a team can be served by the local question bank.
pub async fn required_sets(state: &SharedState) -> Result<RequiredSetsResponse, ServiceError> {
    let store = state.require_store().await?;
    let snapshot = load_match_snapshot(store.as_ref(), state.config()).await?;
    let local: Vec<String> = state
        .question_bank()
        .sets_metadata()
        .into_iter()
        .map(|set| set.id)
        .collect();

    Ok(RequiredSetsResponse {
        game_status: snapshot.game.game_status,
        report: setup_readiness::required_sets_for_match(&snapshot.game, &local),
    })
}

/// Publish the local question bank's metadata under `question-sets`, replacing what is there.
pub async fn publish_question_sets(
    state: &SharedState,
) -> Result<Vec<QuestionSetMetadata>, ServiceError> {
    let _gate = state.transition_gate().lock().await;
    let store = state.require_store().await?;

    let sets = state.question_bank().sets_metadata();
    let entity: QuestionSetsEntity = sets
        .iter()
        .map(|set| (set.id.clone(), set.clone()))
        .collect();
    store
        .write(Partition::QuestionSets.path(), serde_json::to_value(&entity)?)
        .await?;

    info!(count = sets.len(), "question set metadata published");
    Ok(models::question_sets_from_entity(entity)
        .into_values()
        .collect())
}

/// Run the config reconciler against the installed store.
pub async fn sync_config(state: &SharedState) -> Result<SyncOutcome, ServiceError> {
    let store = state.require_store().await?;
    Ok(config_sync::sync_config(store.as_ref(), state.auth(), state.config()).await?)
}

fn ensure_not_started(game: &GameState) -> Result<(), ServiceError> {
    if game.game_status != GameStatus::NotStarted {
        return Err(ServiceError::InvalidState(
            "setup can only be edited before the match starts".into(),
        ));
    }
    Ok(())
}

async fn write_team(store: &dyn RemoteStore, team: &Team) -> Result<(), ServiceError> {
    store
        .write(&Partition::Teams.child(&team.id), serde_json::to_value(team)?)
        .await?;
    Ok(())
}
