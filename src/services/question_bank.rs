//! Local question content. Uploading and storage formats of the bank live elsewhere; this side
//! only answers lookups.

use std::{fs, io, path::Path};

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::state::game::{Question, QuestionSetId, QuestionSetMetadata};

/// Read-only view of the question sets cached on this device.
pub trait QuestionBank: Send + Sync {
    fn sets_metadata(&self) -> Vec<QuestionSetMetadata>;
    /// Question `number` (1-based) of set `set_id`.
    fn question(&self, set_id: &str, number: u32) -> Option<Question>;
}

#[derive(Debug, Error)]
pub enum QuestionBankError {
    #[error("failed to read question bank `{path}`")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse question bank `{path}`")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A full question set as found in the local bank file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSet {
    pub id: QuestionSetId,
    #[serde(default)]
    pub checksum: String,
    #[serde(default)]
    pub uploaded_at: Option<i64>,
    pub questions: Vec<Question>,
}

/// In-memory bank, usually loaded from a JSON array of [`QuestionSet`].
#[derive(Debug, Clone, Default)]
pub struct LocalQuestionBank {
    sets: IndexMap<QuestionSetId, QuestionSet>,
}

impl LocalQuestionBank {
    pub fn new(sets: impl IntoIterator<Item = QuestionSet>) -> Self {
        Self {
            sets: sets.into_iter().map(|set| (set.id.clone(), set)).collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, QuestionBankError> {
        let shown_path = path.display().to_string();
        let contents = fs::read_to_string(path).map_err(|source| QuestionBankError::Read {
            path: shown_path.clone(),
            source,
        })?;
        let sets: Vec<QuestionSet> =
            serde_json::from_str(&contents).map_err(|source| QuestionBankError::Parse {
                path: shown_path.clone(),
                source,
            })?;
        info!(path = %shown_path, sets = sets.len(), "loaded question bank");
        Ok(Self::new(sets))
    }
}

impl QuestionBank for LocalQuestionBank {
    fn sets_metadata(&self) -> Vec<QuestionSetMetadata> {
        self.sets
            .values()
            .map(|set| QuestionSetMetadata {
                id: set.id.clone(),
                question_count: u32::try_from(set.questions.len()).unwrap_or(u32::MAX),
                checksum: set.checksum.clone(),
                uploaded_at: set.uploaded_at,
            })
            .collect()
    }

    fn question(&self, set_id: &str, number: u32) -> Option<Question> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.sets.get(set_id)?.questions.get(index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANK: &str = r#"[
        {"id": "s1", "questions": [
            {"prompt": "2 + 2?", "options": {"A": "3", "B": "4", "C": "5", "D": "22"}, "correctOption": "B"}
        ]}
    ]"#;

    #[test]
    fn questions_are_addressed_from_one() {
        let sets: Vec<QuestionSet> = serde_json::from_str(BANK).unwrap();
        let bank = LocalQuestionBank::new(sets);

        assert!(bank.question("s1", 0).is_none());
        assert_eq!(bank.question("s1", 1).unwrap().correct_option, "B");
        assert!(bank.question("s1", 2).is_none());
        assert!(bank.question("missing", 1).is_none());
        assert_eq!(bank.sets_metadata()[0].question_count, 1);
    }

    #[test]
    fn load_reads_a_bank_file_and_reports_bad_ones() {
        let dir = std::env::temp_dir().join(format!("hotseat-bank-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let good = dir.join("bank.json");
        fs::write(&good, BANK).unwrap();
        let bank = LocalQuestionBank::load(&good).unwrap();
        assert_eq!(bank.question("s1", 1).unwrap().prompt, "2 + 2?");

        let broken = dir.join("broken.json");
        fs::write(&broken, "{not json").unwrap();
        assert!(matches!(
            LocalQuestionBank::load(&broken),
            Err(QuestionBankError::Parse { .. })
        ));
        assert!(matches!(
            LocalQuestionBank::load(&dir.join("absent.json")),
            Err(QuestionBankError::Read { .. })
        ));

        fs::remove_dir_all(&dir).unwrap();
    }
}
