//! Projections of the synchronized snapshot sent to the host panel and the displays.

use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    config::QuizConfig,
    dto::{format_ms, phase::VisibleGamePhase},
    state::{
        game::{
            AnswerOption, CompletionReason, GameState, GameStatus, LifelineKind, LifelineUsage,
            PrizeStructure, QuestionSetMetadata, Team, TeamId,
        },
        state_machine::GamePhase,
        sync::SyncedSnapshot,
    },
};

/// Everything the host panel needs, including sync diagnostics.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HostSnapshot {
    pub phase: VisibleGamePhase,
    pub is_loading: bool,
    pub degraded: bool,
    pub generation: u64,
    pub game: GameState,
    pub teams: Vec<Team>,
    pub prize_structure: Option<PrizeStructure>,
    pub question_sets: Vec<QuestionSetMetadata>,
    /// Authoritative configuration.
    pub config: QuizConfig,
    /// Copy found in the store, if any.
    pub remote_config: Option<QuizConfig>,
    pub allowed_hosts: Vec<String>,
    /// Last error per partition path.
    pub errors: BTreeMap<String, String>,
    pub last_updated_at: Option<String>,
}

impl HostSnapshot {
    pub fn build(snapshot: &SyncedSnapshot, config: &QuizConfig, degraded: bool) -> Self {
        let game = snapshot.game_or_default();
        Self {
            phase: GamePhase::of(&game).into(),
            is_loading: snapshot.is_loading(),
            degraded,
            generation: snapshot.generation,
            last_updated_at: (game.last_updated > 0).then(|| format_ms(game.last_updated)),
            game,
            teams: snapshot.teams.values().cloned().collect(),
            prize_structure: snapshot.prize_structure.clone(),
            question_sets: snapshot.question_sets.values().cloned().collect(),
            config: config.clone(),
            remote_config: snapshot.config.clone(),
            allowed_hosts: snapshot.allowed_hosts.clone(),
            errors: snapshot
                .errors
                .iter()
                .map(|(partition, error)| (partition.path().to_string(), error.clone()))
                .collect(),
        }
    }
}

/// Public team card.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DisplayTeam {
    pub id: TeamId,
    pub name: String,
    pub participants: Vec<String>,
    pub prize_won: u64,
    pub lifelines: LifelineUsage,
}

impl From<&Team> for DisplayTeam {
    fn from(team: &Team) -> Self {
        Self {
            id: team.id.clone(),
            name: team.name.clone(),
            participants: team.participants.clone(),
            prize_won: team.prize_won,
            lifelines: team.lifelines.clone(),
        }
    }
}

/// Question as displayed: options appear once shown, minus the ones hidden by 50:50.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DisplayQuestion {
    pub prompt: String,
    pub options: BTreeMap<AnswerOption, String>,
}

/// What passive screens render. Never carries the correct option before the reveal.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySnapshot {
    pub phase: VisibleGamePhase,
    pub is_loading: bool,
    pub game_status: GameStatus,
    pub current_team: Option<DisplayTeam>,
    pub question_number: u32,
    pub question: Option<DisplayQuestion>,
    pub selected_option: Option<AnswerOption>,
    pub answer_revealed: bool,
    pub correct_option: Option<AnswerOption>,
    pub option_was_correct: Option<bool>,
    pub active_lifeline: Option<LifelineKind>,
    pub completion_reason: Option<CompletionReason>,
    pub reveal_delay_ms: u64,
    /// Present when the prize ladder is enabled on displays.
    pub prize_ladder: Option<PrizeStructure>,
    /// Present when the roster is enabled on displays.
    pub teams: Option<Vec<DisplayTeam>>,
}

impl DisplaySnapshot {
    pub fn build(snapshot: &SyncedSnapshot, config: &QuizConfig) -> Self {
        let game = snapshot.game_or_default();
        let question = game
            .current_question
            .as_ref()
            .filter(|_| game.question_visible)
            .map(|question| DisplayQuestion {
                prompt: question.prompt.clone(),
                options: if game.options_visible {
                    question
                        .options
                        .iter()
                        .filter(|(option, _)| !game.hidden_options.contains(option))
                        .map(|(option, text)| (*option, text.clone()))
                        .collect()
                } else {
                    BTreeMap::new()
                },
            });

        Self {
            phase: GamePhase::of(&game).into(),
            is_loading: snapshot.is_loading(),
            game_status: game.game_status,
            current_team: game
                .current_team_id
                .as_ref()
                .and_then(|id| snapshot.teams.get(id))
                .map(DisplayTeam::from),
            question_number: game.current_question_number,
            question,
            selected_option: game.selected_option,
            answer_revealed: game.answer_revealed,
            correct_option: game.correct_option.filter(|_| game.answer_revealed),
            option_was_correct: game.option_was_correct,
            active_lifeline: game.active_lifeline,
            completion_reason: game.completion_reason,
            reveal_delay_ms: config.display.reveal_delay_ms,
            prize_ladder: snapshot
                .prize_structure
                .clone()
                .filter(|_| config.display.show_prize_ladder),
            teams: config
                .display
                .show_team_roster
                .then(|| snapshot.teams.values().map(DisplayTeam::from).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::{GameStatus, Question};

    fn synced_game(game: GameState) -> SyncedSnapshot {
        SyncedSnapshot {
            game: Some(game),
            ..SyncedSnapshot::default()
        }
    }

    fn question() -> Question {
        Question {
            prompt: "Largest planet?".into(),
            options: AnswerOption::ALL
                .into_iter()
                .zip(["Mars", "Jupiter", "Venus", "Earth"])
                .map(|(option, text)| (option, text.to_string()))
                .collect(),
            correct_option: "B".into(),
        }
    }

    #[test]
    fn display_never_leaks_the_answer_before_reveal() {
        let game = GameState {
            game_status: GameStatus::InProgress,
            current_question_number: 1,
            current_question: Some(question()),
            question_visible: true,
            ..GameState::default()
        };
        let display = DisplaySnapshot::build(&synced_game(game), &QuizConfig::default());
        let shown = display.question.unwrap();
        assert!(shown.options.is_empty());
        assert!(display.correct_option.is_none());

        let json = serde_json::to_string(&DisplaySnapshot::build(
            &synced_game(GameState {
                game_status: GameStatus::InProgress,
                current_question: Some(question()),
                question_visible: true,
                options_visible: true,
                ..GameState::default()
            }),
            &QuizConfig::default(),
        ))
        .unwrap();
        assert!(!json.contains("correctOption\":\"B"));
    }

    #[test]
    fn hidden_options_are_removed_and_settings_respected() {
        let game = GameState {
            game_status: GameStatus::InProgress,
            current_question: Some(question()),
            question_visible: true,
            options_visible: true,
            hidden_options: vec![AnswerOption::A, AnswerOption::C],
            ..GameState::default()
        };
        let mut config = QuizConfig::default();
        config.display.show_team_roster = false;

        let display = DisplaySnapshot::build(&synced_game(game), &config);
        let options: Vec<_> = display.question.unwrap().options.into_keys().collect();
        assert_eq!(options, vec![AnswerOption::B, AnswerOption::D]);
        assert!(display.teams.is_none());
    }
}
