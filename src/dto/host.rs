//! Request and response bodies of the host control endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::phase::VisibleGamePhase,
    services::answer_validator::AnswerVerdict,
    state::{
        game::{GameState, LifelineKind},
        lifeline_timer::Resolution,
        transitions::TransitionOutcome,
    },
};

/// Header carrying the host identity checked against `allowed-hosts`.
pub const HOST_ID_HEADER: &str = "x-host-id";
/// Optional header carrying the `lastUpdated` the host panel acted upon.
pub const OBSERVED_HEADER: &str = "x-observed-last-updated";

/// Option picked by the contestants, as typed by the host.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SelectOptionRequest {
    /// `A`..`D`, case and surrounding whitespace ignored.
    #[validate(length(min = 1, max = 8))]
    pub option: String,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ActivateLifelineRequest {
    pub kind: LifelineKind,
}

/// Result of a host action.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResponse {
    pub action: String,
    pub from: VisibleGamePhase,
    pub to: VisibleGamePhase,
    /// `false` when the action had nothing left to do.
    pub applied: bool,
    pub last_updated: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<AnswerVerdict>,
    pub game: GameState,
    /// How the phone-a-friend countdown ended, when this action ended it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer: Option<Resolution>,
}

impl From<TransitionOutcome> for TransitionResponse {
    fn from(outcome: TransitionOutcome) -> Self {
        Self {
            action: outcome.action.to_string(),
            from: outcome.from.into(),
            to: outcome.to.into(),
            applied: outcome.applied,
            last_updated: outcome.game.last_updated,
            verdict: outcome.verdict,
            game: outcome.game,
            timer: None,
        }
    }
}
