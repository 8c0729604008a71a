use std::{collections::BTreeMap, fmt};

use indexmap::IndexMap;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde_json::Value;
use thiserror::Error;

use crate::{
    config::QuizConfig,
    dao::remote_store::Partition,
    services::{
        answer_validator::{self, AnswerVerdict, InvalidAnswerOption},
        setup_readiness::{self, ReadinessReport},
    },
    state::game::{
        AnswerOption, CompletionReason, GameState, GameStatus, LifelineKind, PrizeStructure,
        Question, QuestionSetId, QuestionSetMetadata, Team, TeamId,
    },
};

/// High-level phases the match can be in, derived from the stored [`GameState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// Setup is editable; no team is playing.
    NotStarted,
    /// A team is in the hot seat.
    InProgress(RoundPhase),
    /// The match is over; only a reset leaves this phase.
    Completed,
}

/// Position inside the per-question cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// Nothing shown yet for the current question number.
    AwaitingQuestion,
    /// Prompt visible, options still hidden.
    QuestionShown,
    /// Options visible; the team may select, lock or use a lifeline.
    OptionsShown,
    /// A lifeline suspends every answer-affecting action.
    LifelineActive(LifelineKind),
    /// Verdict visible; the host may advance.
    AnswerRevealed,
}

impl GamePhase {
    /// Derive the phase from the stored flags. Flags are checked from the latest step backwards.
    pub fn of(game: &GameState) -> Self {
        match game.game_status {
            GameStatus::NotStarted => GamePhase::NotStarted,
            GameStatus::Completed => GamePhase::Completed,
            GameStatus::InProgress => GamePhase::InProgress(match game.active_lifeline {
                Some(kind) => RoundPhase::LifelineActive(kind),
                None if game.answer_revealed => RoundPhase::AnswerRevealed,
                None if game.options_visible => RoundPhase::OptionsShown,
                None if game.question_visible => RoundPhase::QuestionShown,
                None => RoundPhase::AwaitingQuestion,
            }),
        }
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GamePhase::NotStarted => f.write_str("not-started"),
            GamePhase::Completed => f.write_str("completed"),
            GamePhase::InProgress(round) => {
                let step = match round {
                    RoundPhase::AwaitingQuestion => "awaiting-question",
                    RoundPhase::QuestionShown => "question-shown",
                    RoundPhase::OptionsShown => "options-shown",
                    RoundPhase::LifelineActive(LifelineKind::PhoneAFriend) => {
                        "lifeline-phone-a-friend"
                    }
                    RoundPhase::LifelineActive(LifelineKind::FiftyFifty) => "lifeline-fifty-fifty",
                    RoundPhase::AnswerRevealed => "answer-revealed",
                };
                write!(f, "in-progress:{step}")
            }
        }
    }
}

/// Host actions that can be applied to the match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameAction {
    /// Initialize the queue and put the first team in the hot seat.
    StartMatch,
    /// Reveal the question for the current question number.
    ShowQuestion,
    /// Reveal the four options.
    ShowOptions,
    /// Record the team's choice (raw input, normalized by the machine).
    SelectOption(String),
    /// Validate the selection and reveal the verdict.
    LockAnswer,
    /// Move on after a revealed verdict.
    AdvanceQuestion,
    /// Use a lifeline for the current team.
    ActivateLifeline(LifelineKind),
    /// Clear the active lifeline; a no-op when none is active.
    ResumeFromLifeline,
    /// End the match on the host's call.
    CompleteMatch,
    /// End the match early; no winner is recorded.
    AbandonMatch,
    /// Return to `not-started` from any phase, clearing team progress.
    ResetMatch,
}

impl GameAction {
    /// Stable name used in logs and error payloads.
    pub fn name(&self) -> &'static str {
        match self {
            GameAction::StartMatch => "startMatch",
            GameAction::ShowQuestion => "showQuestion",
            GameAction::ShowOptions => "showOptions",
            GameAction::SelectOption(_) => "selectOption",
            GameAction::LockAnswer => "lockAnswer",
            GameAction::AdvanceQuestion => "advanceQuestion",
            GameAction::ActivateLifeline(_) => "activateLifeline",
            GameAction::ResumeFromLifeline => "resumeFromLifeline",
            GameAction::CompleteMatch => "completeMatch",
            GameAction::AbandonMatch => "abandonMatch",
            GameAction::ResetMatch => "resetMatch",
        }
    }
}

/// Error returned when an action cannot be applied from the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {action} cannot be applied while in {from}")]
pub struct InvalidTransition {
    /// The phase the match was in when the action was received.
    pub from: GamePhase,
    /// Name of the rejected action.
    pub action: &'static str,
}

/// Reasons a transition is rejected. Nothing is written in any of these cases.
#[derive(Debug, Clone, Error)]
pub enum TransitionError {
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error(transparent)]
    InvalidAnswer(#[from] InvalidAnswerOption),
    /// `startMatch` refused by the readiness gate.
    #[error("setup incomplete: {}", .0.summary)]
    SetupIncomplete(Box<ReadinessReport>),
    /// The local bank has no content for the current question.
    #[error("question {number} of set {set_id:?} is not available for team `{team_id}`")]
    QuestionUnavailable {
        team_id: TeamId,
        set_id: Option<QuestionSetId>,
        number: u32,
    },
}

/// Everything a transition may read: the freshly loaded partitions plus the authoritative config.
#[derive(Debug, Clone, Default)]
pub struct MatchSnapshot {
    /// `not-started` default when the partition is absent.
    pub game: GameState,
    /// Teams keyed by id, in store order.
    pub teams: IndexMap<TeamId, Team>,
    pub prize_structure: Option<PrizeStructure>,
    /// Published question-set metadata.
    pub question_sets: IndexMap<QuestionSetId, QuestionSetMetadata>,
    /// Authoritative config, never the remote mirror.
    pub config: QuizConfig,
}

impl MatchSnapshot {
    /// Question set assigned to the team currently in the hot seat.
    pub fn current_assignment(&self) -> Option<(&TeamId, &QuestionSetId)> {
        let team_id = self.game.current_team_id.as_ref()?;
        let set_id = self.game.question_set_assignments.get(team_id)?;
        Some((team_id, set_id))
    }
}

/// External inputs of a transition, so that the transition itself stays deterministic.
#[derive(Debug, Clone, Default)]
pub struct TransitionContext {
    /// Wall-clock reading in milliseconds.
    pub now_ms: i64,
    /// Seed for the 50:50 option pick.
    pub seed: u64,
    /// Question resolved from the bank for the current team and question number.
    pub question: Option<Question>,
}

/// A validated transition, ready to be written in one atomic update.
#[derive(Debug, Clone)]
pub struct Transition {
    /// Phase before the action.
    pub from: GamePhase,
    /// Phase after the action.
    pub to: GamePhase,
    /// Action name, as in [`GameAction::name`].
    pub action: &'static str,
    /// Game state to write, `lastUpdated` already bumped.
    pub next: GameState,
    /// Teams whose lifeline flags or prize changed.
    pub team_updates: Vec<Team>,
    /// Verdict computed by `lockAnswer`.
    pub verdict: Option<AnswerVerdict>,
}

impl Transition {
    /// Multi-path update covering the game state and every touched team.
    pub fn store_updates(&self) -> serde_json::Result<BTreeMap<String, Value>> {
        let mut updates = BTreeMap::new();
        updates.insert(
            Partition::GameState.path().to_string(),
            serde_json::to_value(&self.next)?,
        );
        for team in &self.team_updates {
            updates.insert(Partition::Teams.child(&team.id), serde_json::to_value(team)?);
        }
        Ok(updates)
    }
}

/// Compute the transition for `action`.
///
/// Returns `Ok(None)` when the action is valid but changes nothing (resuming with no active
/// lifeline), so callers can skip the write.
pub fn plan(
    snapshot: &MatchSnapshot,
    action: GameAction,
    context: TransitionContext,
) -> Result<Option<Transition>, TransitionError> {
    let from = GamePhase::of(&snapshot.game);
    let name = action.name();
    let invalid = || InvalidTransition { from, action: name };

    let mut next = snapshot.game.clone();
    let mut team_updates = Vec::new();
    let mut verdict = None;

    match (from, action) {
        (GamePhase::NotStarted, GameAction::StartMatch) => {
            start_match(snapshot, &mut next, context.now_ms)?;
        }
        (GamePhase::InProgress(RoundPhase::AwaitingQuestion), GameAction::ShowQuestion) => {
            let team_id = next.current_team_id.clone().ok_or_else(invalid)?;
            let question = context
                .question
                .ok_or_else(|| TransitionError::QuestionUnavailable {
                    set_id: next.question_set_assignments.get(&team_id).cloned(),
                    team_id,
                    number: next.current_question_number,
                })?;
            next.current_question = Some(question);
            next.question_visible = true;
        }
        (GamePhase::InProgress(RoundPhase::QuestionShown), GameAction::ShowOptions) => {
            next.options_visible = true;
        }
        (GamePhase::InProgress(RoundPhase::OptionsShown), GameAction::SelectOption(raw)) => {
            let option = answer_validator::normalize_option(Some(&raw))
                .filter(|option| !next.hidden_options.contains(option))
                .ok_or_else(|| InvalidAnswerOption {
                    selected: Some(raw.clone()),
                    correct: None,
                })?;
            next.selected_option = Some(option);
        }
        (GamePhase::InProgress(RoundPhase::OptionsShown), GameAction::LockAnswer) => {
            let selected = next.selected_option.ok_or_else(invalid)?;
            let question = next.current_question.as_ref().ok_or_else(invalid)?;
            let result =
                answer_validator::validate(Some(selected.as_str()), Some(&question.correct_option))?;

            next.answer_revealed = true;
            next.option_was_correct = Some(result.is_correct);
            next.correct_option = Some(result.normalized_correct);
            verdict = Some(result);

            if result.is_correct {
                let won = snapshot
                    .prize_structure
                    .as_ref()
                    .and_then(|ladder| ladder.prize_for(next.current_question_number));
                if let (Some(won), Some(team)) = (won, current_team(snapshot)) {
                    let mut team = team.clone();
                    team.prize_won = won;
                    team_updates.push(team);
                }
            }
        }
        (GamePhase::InProgress(RoundPhase::AnswerRevealed), GameAction::AdvanceQuestion) => {
            advance(snapshot, &mut next, &mut team_updates, context.now_ms);
        }
        (
            GamePhase::InProgress(RoundPhase::OptionsShown),
            GameAction::ActivateLifeline(kind),
        ) => {
            let enabled = match kind {
                LifelineKind::PhoneAFriend => snapshot.config.lifelines.phone_a_friend,
                LifelineKind::FiftyFifty => snapshot.config.lifelines.fifty_fifty,
            };
            let team = current_team(snapshot).ok_or_else(invalid)?;
            if !enabled || team.lifelines.is_used(kind) {
                return Err(invalid().into());
            }

            if kind == LifelineKind::FiftyFifty {
                let question = next.current_question.as_ref().ok_or_else(invalid)?;
                let correct = answer_validator::normalize_option(Some(&question.correct_option))
                    .ok_or_else(|| InvalidAnswerOption {
                        selected: None,
                        correct: Some(question.correct_option.clone()),
                    })?;
                next.hidden_options = pick_hidden_options(correct, context.seed);
                if next
                    .selected_option
                    .is_some_and(|option| next.hidden_options.contains(&option))
                {
                    next.selected_option = None;
                }
            }

            next.active_lifeline = Some(kind);
            let mut team = team.clone();
            team.lifelines.mark_used(kind);
            team_updates.push(team);
        }
        (GamePhase::InProgress(RoundPhase::LifelineActive(_)), GameAction::ResumeFromLifeline) => {
            next.active_lifeline = None;
        }
        (_, GameAction::ResumeFromLifeline) => return Ok(None),
        (GamePhase::InProgress(_), GameAction::CompleteMatch) => {
            complete(&mut next, CompletionReason::HostCompleted, context.now_ms);
        }
        (GamePhase::InProgress(_), GameAction::AbandonMatch) => {
            complete(&mut next, CompletionReason::HostAbandoned, context.now_ms);
        }
        (_, GameAction::ResetMatch) => {
            next = GameState::default();
            team_updates = snapshot
                .teams
                .values()
                .map(|team| Team {
                    lifelines: Default::default(),
                    prize_won: 0,
                    ..team.clone()
                })
                .collect();
        }
        _ => return Err(invalid().into()),
    }

    next.last_updated = context.now_ms.max(snapshot.game.last_updated + 1);

    Ok(Some(Transition {
        from,
        to: GamePhase::of(&next),
        action: name,
        next,
        team_updates,
        verdict,
    }))
}

fn current_team(snapshot: &MatchSnapshot) -> Option<&Team> {
    let id = snapshot.game.current_team_id.as_ref()?;
    snapshot.teams.get(id)
}

fn start_match(
    snapshot: &MatchSnapshot,
    next: &mut GameState,
    now_ms: i64,
) -> Result<(), TransitionError> {
    let report = setup_readiness::validate_complete_setup(
        &snapshot.teams,
        &snapshot.question_sets,
        snapshot.prize_structure.as_ref(),
        &snapshot.config,
    );
    if !report.is_ready {
        return Err(TransitionError::SetupIncomplete(Box::new(report)));
    }

    let mut queue: Vec<&Team> = snapshot.teams.values().collect();
    queue.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    let usable = setup_readiness::usable_question_sets(&snapshot.question_sets, &snapshot.config);

    *next = GameState {
        current_team_id: queue.first().map(|team| team.id.clone()),
        current_question_number: 1,
        game_status: GameStatus::InProgress,
        play_queue: queue.iter().map(|team| team.id.clone()).collect(),
        question_set_assignments: queue
            .iter()
            .zip(usable.iter().cycle())
            .map(|(team, set)| (team.id.clone(), set.id.clone()))
            .collect(),
        initialized_at: Some(now_ms),
        started_at: Some(now_ms),
        ..GameState::default()
    };
    Ok(())
}

/// Number of questions the current team may play before its turn ends.
fn turn_length(snapshot: &MatchSnapshot) -> u32 {
    let per_team = snapshot.config.questions_per_team;
    let set_count = snapshot
        .current_assignment()
        .and_then(|(_, set_id)| snapshot.question_sets.get(set_id))
        .map(|set| set.question_count);
    let ladder = snapshot
        .prize_structure
        .as_ref()
        .map(|ladder| u32::try_from(ladder.values.len()).unwrap_or(u32::MAX));
    match set_count.or(ladder) {
        Some(limit) => limit.min(per_team),
        None => per_team,
    }
}

fn advance(
    snapshot: &MatchSnapshot,
    next: &mut GameState,
    team_updates: &mut Vec<Team>,
    now_ms: i64,
) {
    let correct = next.option_was_correct == Some(true);
    let turn_over = !correct || next.current_question_number >= turn_length(snapshot);
    next.reset_question_cycle();

    if !turn_over {
        next.current_question_number += 1;
        return;
    }

    if !correct {
        if let Some(team) = current_team(snapshot) {
            let guaranteed = snapshot
                .prize_structure
                .as_ref()
                .map(|ladder| ladder.guaranteed_before(next.current_question_number))
                .unwrap_or(0);
            let mut team = team.clone();
            team.prize_won = guaranteed;
            team_updates.push(team);
        }
    }

    if let Some(current) = next.current_team_id.take() {
        next.play_queue.retain(|id| *id != current);
    }

    match next.play_queue.first().cloned() {
        Some(upcoming) => {
            next.current_team_id = Some(upcoming);
            next.current_question_number = 1;
        }
        None => {
            next.current_question_number = 0;
            complete(next, CompletionReason::QueueExhausted, now_ms);
        }
    }
}

fn complete(next: &mut GameState, reason: CompletionReason, now_ms: i64) {
    next.game_status = GameStatus::Completed;
    next.completion_reason = Some(reason);
    next.completed_at = Some(now_ms);
    next.active_lifeline = None;
    next.hidden_options.clear();
}

/// Two incorrect options, in display order.
fn pick_hidden_options(correct: AnswerOption, seed: u64) -> Vec<AnswerOption> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut incorrect: Vec<AnswerOption> = AnswerOption::ALL
        .into_iter()
        .filter(|option| *option != correct)
        .collect();
    incorrect.shuffle(&mut rng);
    incorrect.truncate(2);
    incorrect.sort();
    incorrect
}
