//! Checks deciding whether a match may be initialized, and whether an initialized match can be
//! resumed on this device.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    config::QuizConfig,
    state::game::{
        GameState, GameStatus, PrizeStructure, QuestionSetId, QuestionSetMetadata, Team, TeamId,
    },
};

/// Identifies one readiness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum CheckId {
    Teams,
    PrizeStructure,
    QuestionSets,
    QuestionSetCoverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    /// Soft issue; does not block initialization.
    Warn,
    Fail,
}

/// Result of one independently evaluated check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessCheck {
    pub id: CheckId,
    pub status: CheckStatus,
    pub message: String,
    /// Individual problems found by the check.
    pub details: Vec<String>,
}

impl ReadinessCheck {
    fn new(id: CheckId, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            id,
            status,
            message: message.into(),
            details: Vec::new(),
        }
    }

    fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }
}

/// Aggregated verdict of [`validate_complete_setup`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessReport {
    pub is_ready: bool,
    pub has_warnings: bool,
    pub checks: Vec<ReadinessCheck>,
    pub summary: String,
}

impl ReadinessReport {
    pub fn failed_checks(&self) -> impl Iterator<Item = &ReadinessCheck> {
        self.checks
            .iter()
            .filter(|check| check.status == CheckStatus::Fail)
    }
}

/// Which assigned question sets can be resolved locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequiredSetsReport {
    pub all_found: bool,
    pub missing_set_ids: Vec<QuestionSetId>,
    pub found_set_ids: Vec<QuestionSetId>,
}

/// Question sets holding enough questions for a full turn, in the given order.
pub fn usable_question_sets<'a>(
    question_sets: &'a IndexMap<QuestionSetId, QuestionSetMetadata>,
    config: &QuizConfig,
) -> Vec<&'a QuestionSetMetadata> {
    question_sets
        .values()
        .filter(|set| set.question_count >= config.questions_per_team)
        .collect()
}

/// Run every setup check. Checks never short-circuit so all problems surface at once.
pub fn validate_complete_setup(
    teams: &IndexMap<TeamId, Team>,
    question_sets: &IndexMap<QuestionSetId, QuestionSetMetadata>,
    prize_structure: Option<&PrizeStructure>,
    config: &QuizConfig,
) -> ReadinessReport {
    let usable = usable_question_sets(question_sets, config);
    let checks = vec![
        check_teams(teams, config),
        check_prize_structure(prize_structure, config),
        check_question_sets(question_sets, usable.len(), config),
        check_coverage(teams.len(), usable.len()),
    ];

    let failures = checks
        .iter()
        .filter(|check| check.status == CheckStatus::Fail)
        .count();
    let warnings = checks
        .iter()
        .filter(|check| check.status == CheckStatus::Warn)
        .count();

    let summary = match (failures, warnings) {
        (0, 0) => format!(
            "setup complete: {} team(s), {} usable question set(s)",
            teams.len(),
            usable.len()
        ),
        (0, warnings) => format!("ready with {warnings} warning(s)"),
        (failures, _) => format!("{failures} blocking issue(s) must be fixed before starting"),
    };

    ReadinessReport {
        is_ready: failures == 0,
        has_warnings: warnings > 0,
        checks,
        summary,
    }
}

fn check_teams(teams: &IndexMap<TeamId, Team>, config: &QuizConfig) -> ReadinessCheck {
    if teams.is_empty() {
        return ReadinessCheck::new(CheckId::Teams, CheckStatus::Fail, "no team registered");
    }

    let mut problems = Vec::new();
    if teams.len() > config.max_teams as usize {
        problems.push(format!(
            "{} teams registered but at most {} allowed",
            teams.len(),
            config.max_teams
        ));
    }

    for (id, team) in teams {
        let label = if team.name.trim().is_empty() {
            id.as_str()
        } else {
            team.name.as_str()
        };
        if team.name.trim().is_empty() {
            problems.push(format!("team `{id}` has no name"));
        }
        if team.participants.iter().all(|p| p.trim().is_empty()) {
            problems.push(format!("team `{label}` has no participant"));
        }
        if config.lifelines.phone_a_friend && team.contact_phone.trim().is_empty() {
            problems.push(format!("team `{label}` has no lifeline contact phone"));
        }
    }

    if problems.is_empty() {
        ReadinessCheck::new(
            CheckId::Teams,
            CheckStatus::Pass,
            format!("{} team(s) ready", teams.len()),
        )
    } else {
        ReadinessCheck::new(CheckId::Teams, CheckStatus::Fail, "team roster incomplete")
            .with_details(problems)
    }
}

fn check_prize_structure(
    prize_structure: Option<&PrizeStructure>,
    config: &QuizConfig,
) -> ReadinessCheck {
    let Some(ladder) = prize_structure else {
        return ReadinessCheck::new(
            CheckId::PrizeStructure,
            CheckStatus::Fail,
            "no prize ladder configured",
        );
    };

    let mut problems = Vec::new();
    let expected = config.questions_per_team as usize;
    if ladder.values.len() != expected {
        problems.push(format!(
            "ladder has {} entries but {} questions are played per team",
            ladder.values.len(),
            expected
        ));
    }
    if let Some(position) = ladder.values.windows(2).position(|pair| pair[1] < pair[0]) {
        problems.push(format!(
            "prize for question {} is lower than for question {}",
            position + 2,
            position + 1
        ));
    }
    for milestone in &ladder.milestones {
        if *milestone == 0 || *milestone as usize > ladder.values.len() {
            problems.push(format!("milestone {milestone} is outside the ladder"));
        }
    }

    if problems.is_empty() {
        ReadinessCheck::new(
            CheckId::PrizeStructure,
            CheckStatus::Pass,
            format!("{} prize levels", ladder.values.len()),
        )
    } else {
        ReadinessCheck::new(
            CheckId::PrizeStructure,
            CheckStatus::Fail,
            "prize ladder invalid",
        )
        .with_details(problems)
    }
}

fn check_question_sets(
    question_sets: &IndexMap<QuestionSetId, QuestionSetMetadata>,
    usable: usize,
    config: &QuizConfig,
) -> ReadinessCheck {
    if question_sets.is_empty() {
        return ReadinessCheck::new(
            CheckId::QuestionSets,
            CheckStatus::Fail,
            "no question set uploaded",
        );
    }
    if usable == 0 {
        let details = question_sets
            .values()
            .map(|set| format!("set `{}` has {} question(s)", set.id, set.question_count))
            .collect();
        return ReadinessCheck::new(
            CheckId::QuestionSets,
            CheckStatus::Fail,
            format!(
                "no question set holds the {} questions needed per team",
                config.questions_per_team
            ),
        )
        .with_details(details);
    }
    ReadinessCheck::new(
        CheckId::QuestionSets,
        CheckStatus::Pass,
        format!("{usable} usable question set(s)"),
    )
}

fn check_coverage(team_count: usize, usable: usize) -> ReadinessCheck {
    if team_count > 0 && usable > 0 && usable < team_count {
        return ReadinessCheck::new(
            CheckId::QuestionSetCoverage,
            CheckStatus::Warn,
            format!("{team_count} teams share {usable} question set(s); sets will be reused"),
        );
    }
    ReadinessCheck::new(
        CheckId::QuestionSetCoverage,
        CheckStatus::Pass,
        "every team gets its own question set",
    )
}

/// Report which assigned set ids are missing from `available`.
pub fn validate_required_question_sets<'a>(
    assignments: &BTreeMap<TeamId, QuestionSetId>,
    available: impl IntoIterator<Item = &'a QuestionSetId>,
) -> RequiredSetsReport {
    let available: BTreeSet<&QuestionSetId> = available.into_iter().collect();
    let required: BTreeSet<&QuestionSetId> = assignments.values().collect();

    let (found, missing): (Vec<&QuestionSetId>, Vec<&QuestionSetId>) =
        required.into_iter().partition(|id| available.contains(id));

    RequiredSetsReport {
        all_found: missing.is_empty(),
        missing_set_ids: missing.into_iter().cloned().collect(),
        found_set_ids: found.into_iter().cloned().collect(),
    }
}

/// Run [`validate_required_question_sets`] for matches that already left `not-started`.
pub fn required_sets_for_match<'a>(
    game: &GameState,
    available: impl IntoIterator<Item = &'a QuestionSetId>,
) -> Option<RequiredSetsReport> {
    (game.game_status != GameStatus::NotStarted)
        .then(|| validate_required_question_sets(&game.question_set_assignments, available))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(id: &str) -> Team {
        Team {
            id: id.into(),
            name: format!("Team {id}"),
            participants: vec!["Ada".into()],
            contact_phone: "+33100000000".into(),
            ..Team::default()
        }
    }

    fn teams(ids: &[&str]) -> IndexMap<TeamId, Team> {
        ids.iter().map(|id| (id.to_string(), team(id))).collect()
    }

    fn sets(counts: &[(&str, u32)]) -> IndexMap<QuestionSetId, QuestionSetMetadata> {
        counts
            .iter()
            .map(|(id, count)| {
                (
                    id.to_string(),
                    QuestionSetMetadata {
                        id: id.to_string(),
                        question_count: *count,
                        ..QuestionSetMetadata::default()
                    },
                )
            })
            .collect()
    }

    fn ladder(len: u64) -> PrizeStructure {
        PrizeStructure {
            values: (1..=len).map(|level| level * 100).collect(),
            milestones: vec![5, 10],
        }
    }

    fn status(report: &ReadinessReport, id: CheckId) -> CheckStatus {
        report
            .checks
            .iter()
            .find(|check| check.id == id)
            .map(|check| check.status)
            .unwrap()
    }

    #[test]
    fn empty_setup_lists_every_blocking_issue() {
        let config = QuizConfig::default();
        let report =
            validate_complete_setup(&IndexMap::new(), &IndexMap::new(), None, &config);
        assert!(!report.is_ready);
        assert_eq!(status(&report, CheckId::Teams), CheckStatus::Fail);
        assert_eq!(status(&report, CheckId::QuestionSets), CheckStatus::Fail);
        assert_eq!(status(&report, CheckId::PrizeStructure), CheckStatus::Fail);
        assert_eq!(report.failed_checks().count(), 3);
    }

    #[test]
    fn single_team_with_full_set_and_ladder_is_ready() {
        let config = QuizConfig::default();
        let report = validate_complete_setup(
            &teams(&["t1"]),
            &sets(&[("s1", 20)]),
            Some(&ladder(20)),
            &config,
        );
        assert!(report.is_ready, "{report:?}");
        assert!(!report.has_warnings);
    }

    #[test]
    fn fewer_sets_than_teams_only_warns() {
        let config = QuizConfig::default();
        let report = validate_complete_setup(
            &teams(&["t1", "t2", "t3"]),
            &sets(&[("s1", 25), ("s2", 3)]),
            Some(&ladder(20)),
            &config,
        );
        assert!(report.is_ready);
        assert!(report.has_warnings);
        assert_eq!(status(&report, CheckId::QuestionSetCoverage), CheckStatus::Warn);
    }

    #[test]
    fn incomplete_team_and_decreasing_ladder_are_both_reported() {
        let config = QuizConfig::default();
        let mut roster = teams(&["t1"]);
        roster["t1"].participants.clear();
        roster["t1"].contact_phone.clear();
        let mut prizes = ladder(20);
        prizes.values.swap(3, 4);

        let report =
            validate_complete_setup(&roster, &sets(&[("s1", 20)]), Some(&prizes), &config);
        assert!(!report.is_ready);
        let team_check = &report.checks[0];
        assert_eq!(team_check.details.len(), 2);
        assert_eq!(status(&report, CheckId::PrizeStructure), CheckStatus::Fail);
    }

    #[test]
    fn short_ladder_fails() {
        let config = QuizConfig::default();
        let report = validate_complete_setup(
            &teams(&["t1"]),
            &sets(&[("s1", 20)]),
            Some(&ladder(15)),
            &config,
        );
        assert_eq!(status(&report, CheckId::PrizeStructure), CheckStatus::Fail);
    }

    #[test]
    fn required_sets_report_names_missing_ids() {
        let assignments = BTreeMap::from([
            ("t1".to_string(), "s1".to_string()),
            ("t2".to_string(), "s2".to_string()),
            ("t3".to_string(), "s1".to_string()),
        ]);
        let available = ["s1".to_string(), "s9".to_string()];
        let report = validate_required_question_sets(&assignments, available.iter());
        assert!(!report.all_found);
        assert_eq!(report.missing_set_ids, vec!["s2".to_string()]);
        assert_eq!(report.found_set_ids, vec!["s1".to_string()]);
    }

    #[test]
    fn required_sets_are_skipped_before_the_match_starts() {
        let game = GameState::default();
        assert!(required_sets_for_match(&game, std::iter::empty()).is_none());
    }
}
