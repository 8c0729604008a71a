//! Shared match data as it lives in the remote store partitions.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Identifier of a team (key under the `teams` partition).
pub type TeamId = String;
/// Identifier of an uploaded question set.
pub type QuestionSetId = String;

/// One of the four answer slots of a question.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
pub enum AnswerOption {
    A,
    B,
    C,
    D,
}

impl AnswerOption {
    /// Every option in display order.
    pub const ALL: [AnswerOption; 4] = [
        AnswerOption::A,
        AnswerOption::B,
        AnswerOption::C,
        AnswerOption::D,
    ];

    /// Single-letter tag used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            AnswerOption::A => "A",
            AnswerOption::B => "B",
            AnswerOption::C => "C",
            AnswerOption::D => "D",
        }
    }
}

impl fmt::Display for AnswerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall lifecycle of the match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum GameStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

/// Why a match reached [`GameStatus::Completed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionReason {
    /// Every team left the play queue.
    QueueExhausted,
    /// The host closed the match normally.
    HostCompleted,
    /// The host abandoned the match.
    HostAbandoned,
}

/// Assist a team may use once per match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum LifelineKind {
    /// Call the team's contact, bounded by the lifeline timer.
    PhoneAFriend,
    /// Hide two incorrect options.
    FiftyFifty,
}

impl fmt::Display for LifelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifelineKind::PhoneAFriend => f.write_str("phoneAFriend"),
            LifelineKind::FiftyFifty => f.write_str("fiftyFifty"),
        }
    }
}

/// Question payload shown to the teams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub prompt: String,
    pub options: BTreeMap<AnswerOption, String>,
    /// Raw correct-option tag as stored upstream; validated when the answer is locked.
    pub correct_option: String,
}

/// Singleton state of the match, exclusively written by the game state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct GameState {
    pub current_team_id: Option<TeamId>,
    pub current_question_number: u32,
    pub current_question: Option<Question>,
    pub question_visible: bool,
    pub options_visible: bool,
    pub answer_revealed: bool,
    pub correct_option: Option<AnswerOption>,
    pub selected_option: Option<AnswerOption>,
    pub option_was_correct: Option<bool>,
    pub active_lifeline: Option<LifelineKind>,
    /// Options removed from display by the 50:50 lifeline.
    pub hidden_options: Vec<AnswerOption>,
    pub game_status: GameStatus,
    pub play_queue: Vec<TeamId>,
    pub question_set_assignments: BTreeMap<TeamId, QuestionSetId>,
    pub initialized_at: Option<i64>,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub completion_reason: Option<CompletionReason>,
    /// Monotonic write timestamp (ms) used for optimistic staleness checks.
    pub last_updated: i64,
}

impl GameState {
    /// Clear every per-question field, keeping match progression untouched.
    pub fn reset_question_cycle(&mut self) {
        self.current_question = None;
        self.question_visible = false;
        self.options_visible = false;
        self.answer_revealed = false;
        self.correct_option = None;
        self.selected_option = None;
        self.option_was_correct = None;
        self.active_lifeline = None;
        self.hidden_options.clear();
    }

    /// Check the structural invariants linking the visibility flags and answer fields.
    pub fn is_consistent(&self) -> bool {
        let visibility = (!self.answer_revealed || self.options_visible)
            && (!self.options_visible || self.question_visible);
        let verdict = self.option_was_correct.is_some() == self.answer_revealed;
        let lifeline =
            self.active_lifeline.is_none() || self.game_status == GameStatus::InProgress;
        visibility && verdict && lifeline
    }
}

/// Per-lifeline usage flags of a team.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct LifelineUsage {
    pub phone_a_friend: bool,
    pub fifty_fifty: bool,
}

impl LifelineUsage {
    pub fn is_used(&self, kind: LifelineKind) -> bool {
        match kind {
            LifelineKind::PhoneAFriend => self.phone_a_friend,
            LifelineKind::FiftyFifty => self.fifty_fifty,
        }
    }

    pub fn mark_used(&mut self, kind: LifelineKind) {
        match kind {
            LifelineKind::PhoneAFriend => self.phone_a_friend = true,
            LifelineKind::FiftyFifty => self.fifty_fifty = true,
        }
    }
}

/// A competing team.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub participants: Vec<String>,
    /// Phone number dialled for the phone-a-friend lifeline.
    pub contact_phone: String,
    pub lifelines: LifelineUsage,
    pub prize_won: u64,
    /// Creation timestamp (ms); orders the play queue.
    pub created_at: i64,
}

/// Prize ladder indexed by question number (1-based).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct PrizeStructure {
    pub values: Vec<u64>,
    /// Question numbers whose prize is guaranteed once reached.
    pub milestones: Vec<u32>,
}

impl PrizeStructure {
    /// Prize awarded for answering `question_number` correctly.
    pub fn prize_for(&self, question_number: u32) -> Option<u64> {
        let index = usize::try_from(question_number).ok()?.checked_sub(1)?;
        self.values.get(index).copied()
    }

    /// Highest milestone prize strictly below `question_number`, or 0.
    pub fn guaranteed_before(&self, question_number: u32) -> u64 {
        self.milestones
            .iter()
            .copied()
            .filter(|milestone| *milestone < question_number)
            .max()
            .and_then(|milestone| self.prize_for(milestone))
            .unwrap_or(0)
    }
}

/// Metadata about a question set published by the question bank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct QuestionSetMetadata {
    pub id: QuestionSetId,
    pub question_count: u32,
    pub checksum: String,
    pub uploaded_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_state_round_trips_camel_case_keys() {
        let state = GameState {
            current_team_id: Some("t1".into()),
            game_status: GameStatus::InProgress,
            ..GameState::default()
        };
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["currentTeamId"], "t1");
        assert_eq!(value["gameStatus"], "in-progress");
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let state: GameState = serde_json::from_str(r#"{"gameStatus":"completed"}"#).unwrap();
        assert_eq!(state.game_status, GameStatus::Completed);
        assert!(state.play_queue.is_empty());
        assert!(state.is_consistent());
    }

    #[test]
    fn guaranteed_prize_uses_highest_milestone_below_question() {
        let ladder = PrizeStructure {
            values: vec![100, 200, 300, 500, 1_000],
            milestones: vec![2, 4],
        };
        assert_eq!(ladder.guaranteed_before(1), 0);
        assert_eq!(ladder.guaranteed_before(3), 200);
        assert_eq!(ladder.guaranteed_before(4), 200);
        assert_eq!(ladder.guaranteed_before(5), 500);
        assert_eq!(ladder.prize_for(0), None);
        assert_eq!(ladder.prize_for(5), Some(1_000));
    }

    #[test]
    fn lifeline_kind_uses_camel_case_tags() {
        let value = serde_json::to_value(LifelineKind::PhoneAFriend).unwrap();
        assert_eq!(value, "phoneAFriend");
    }
}
