//! Normalization and checking of answer options.
//!
//! Input may come from different keyboards and UIs, so matching ignores case and surrounding
//! whitespace. Anything that is not one of `A`..`D` is rejected instead of counted as wrong.

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::state::game::AnswerOption;

/// Raised when either side of a comparison is not a recognizable option.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid answer option (selected: {selected:?}, correct: {correct:?})")]
pub struct InvalidAnswerOption {
    pub selected: Option<String>,
    pub correct: Option<String>,
}

/// Outcome of comparing the selected option with the canonical one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerVerdict {
    pub is_correct: bool,
    pub normalized_selected: AnswerOption,
    pub normalized_correct: AnswerOption,
}

/// Trim, upper-case and map to an option; `None` for anything else.
pub fn normalize_option(raw: Option<&str>) -> Option<AnswerOption> {
    let raw = raw?.trim().to_ascii_uppercase();
    match raw.as_str() {
        "A" => Some(AnswerOption::A),
        "B" => Some(AnswerOption::B),
        "C" => Some(AnswerOption::C),
        "D" => Some(AnswerOption::D),
        _ => None,
    }
}

/// Compare the selected option with the correct one after normalizing both identically.
pub fn validate(
    selected: Option<&str>,
    correct: Option<&str>,
) -> Result<AnswerVerdict, InvalidAnswerOption> {
    match (normalize_option(selected), normalize_option(correct)) {
        (Some(normalized_selected), Some(normalized_correct)) => Ok(AnswerVerdict {
            is_correct: normalized_selected == normalized_correct,
            normalized_selected,
            normalized_correct,
        }),
        _ => Err(InvalidAnswerOption {
            selected: selected.map(str::to_owned),
            correct: correct.map(str::to_owned),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_and_whitespace_are_ignored_on_both_sides() {
        let verdict = validate(Some("b"), Some("B")).unwrap();
        assert!(verdict.is_correct);
        assert_eq!(verdict.normalized_selected, AnswerOption::B);

        let verdict = validate(Some("  c\t"), Some(" a ")).unwrap();
        assert!(!verdict.is_correct);
        assert_eq!(verdict.normalized_correct, AnswerOption::A);
    }

    #[test]
    fn normalization_is_symmetric() {
        for raw in ["a", " A", "d ", "\nC\n", "e", "", "1", "ab", "b."] {
            let left = validate(Some(raw), Some("A")).map(|v| v.normalized_selected);
            let right = validate(Some("A"), Some(raw)).map(|v| v.normalized_correct);
            assert_eq!(left.ok(), right.ok(), "asymmetric normalization for {raw:?}");
        }
    }

    #[test]
    fn unknown_options_fail_instead_of_counting_as_wrong() {
        let err = validate(Some("e"), Some("A")).unwrap_err();
        assert_eq!(err.selected.as_deref(), Some("e"));
        assert!(validate(None, Some("A")).is_err());
        assert!(validate(Some("A"), Some("2")).is_err());
        assert!(validate(Some("a!"), Some("A")).is_err());
    }
}
