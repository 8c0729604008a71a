//! Payloads used by the setup endpoints (teams and prize ladder).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dto::validation::{validate_name, validate_phone},
    services::setup_readiness::RequiredSetsReport,
    state::game::{GameStatus, PrizeStructure},
};

/// Team definition submitted by the host.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamInput {
    pub name: String,
    #[serde(default)]
    pub participants: Vec<String>,
    /// Number dialled for phone-a-friend.
    #[serde(default)]
    pub contact_phone: Option<String>,
}

impl Validate for TeamInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_name(&self.name) {
            errors.add("name", e);
        }

        if self.participants.is_empty() {
            let mut err = ValidationError::new("participants_empty");
            err.message = Some("At least one participant is required".into());
            errors.add("participants", err);
        } else if let Some(e) = self
            .participants
            .iter()
            .find_map(|participant| validate_name(participant).err())
        {
            errors.add("participants", e);
        }

        if let Some(Err(e)) = self.contact_phone.as_deref().map(validate_phone) {
            errors.add("contact_phone", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl TeamInput {
    /// Trimmed copy of the submitted fields.
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            participants: self
                .participants
                .into_iter()
                .map(|participant| participant.trim().to_string())
                .collect(),
            contact_phone: self
                .contact_phone
                .map(|phone| phone.trim().to_string())
                .filter(|phone| !phone.is_empty()),
        }
    }
}

/// Prize ladder submitted by the host.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrizeStructureInput {
    /// Prize per question, in question order.
    pub values: Vec<u64>,
    /// 1-based question numbers whose prize is guaranteed once reached.
    #[serde(default)]
    pub milestones: Vec<u32>,
}

impl Validate for PrizeStructureInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.values.is_empty() {
            let mut err = ValidationError::new("values_empty");
            err.message = Some("The ladder needs at least one prize".into());
            errors.add("values", err);
        } else if self.values.windows(2).any(|pair| pair[1] < pair[0]) {
            let mut err = ValidationError::new("values_order");
            err.message = Some("Prizes must not decrease along the ladder".into());
            errors.add("values", err);
        }

        let len = self.values.len();
        if let Some(milestone) = self
            .milestones
            .iter()
            .find(|milestone| **milestone == 0 || **milestone as usize > len)
        {
            let mut err = ValidationError::new("milestone_range");
            err.message =
                Some(format!("Milestone {milestone} is outside the ladder (1..={len})").into());
            errors.add("milestones", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl From<PrizeStructureInput> for PrizeStructure {
    fn from(input: PrizeStructureInput) -> Self {
        let mut milestones = input.milestones;
        milestones.sort_unstable();
        milestones.dedup();
        Self {
            values: input.values,
            milestones,
        }
    }
}

/// Required question sets of a running match.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequiredSetsResponse {
    pub game_status: GameStatus,
    /// `None` while the match is `not-started`; nothing is assigned yet.
    pub report: Option<RequiredSetsReport>,
}
