use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::phase::VisibleGamePhase,
    services::answer_validator::AnswerVerdict,
    state::{lifeline_timer::Resolution, transitions::TransitionOutcome},
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream (`display` or `host`).
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a store connection.
    pub degraded: bool,
    /// Whether some partitions have not delivered yet.
    pub loading: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Broadcast after every applied host action.
pub struct TransitionEvent {
    pub action: String,
    pub from: VisibleGamePhase,
    pub to: VisibleGamePhase,
    pub last_updated: i64,
    /// Only set once the answer is revealed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<AnswerVerdict>,
}

impl From<&TransitionOutcome> for TransitionEvent {
    fn from(outcome: &TransitionOutcome) -> Self {
        Self {
            action: outcome.action.to_string(),
            from: outcome.from.into(),
            to: outcome.to.into(),
            last_updated: outcome.game.last_updated,
            verdict: outcome.verdict,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the phone-a-friend countdown ends.
pub struct LifelineResolvedEvent {
    pub resolution: Resolution,
}
