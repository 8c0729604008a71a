use serde::Serialize;
use utoipa::ToSchema;

use crate::state::{
    game::LifelineKind,
    state_machine::{GamePhase, RoundPhase},
};

/// Match phase exposed to clients (REST/SSE).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum VisibleGamePhase {
    /// Setup is still editable.
    NotStarted,
    /// A team is seated; the question is not shown yet.
    AwaitingQuestion,
    QuestionShown,
    OptionsShown,
    /// Phone-a-friend countdown running.
    PhoneAFriend,
    /// Two options hidden, waiting for the host to resume.
    FiftyFifty,
    AnswerRevealed,
    Completed,
}

impl From<GamePhase> for VisibleGamePhase {
    fn from(value: GamePhase) -> Self {
        match value {
            GamePhase::NotStarted => VisibleGamePhase::NotStarted,
            GamePhase::Completed => VisibleGamePhase::Completed,
            GamePhase::InProgress(RoundPhase::AwaitingQuestion) => {
                VisibleGamePhase::AwaitingQuestion
            }
            GamePhase::InProgress(RoundPhase::QuestionShown) => VisibleGamePhase::QuestionShown,
            GamePhase::InProgress(RoundPhase::OptionsShown) => VisibleGamePhase::OptionsShown,
            GamePhase::InProgress(RoundPhase::LifelineActive(LifelineKind::PhoneAFriend)) => {
                VisibleGamePhase::PhoneAFriend
            }
            GamePhase::InProgress(RoundPhase::LifelineActive(LifelineKind::FiftyFifty)) => {
                VisibleGamePhase::FiftyFifty
            }
            GamePhase::InProgress(RoundPhase::AnswerRevealed) => VisibleGamePhase::AnswerRevealed,
        }
    }
}
