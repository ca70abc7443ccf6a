use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::ids::{QuestionId, RecordId};
use crate::model::question::OptionKey;

/// Reward credit earned per correctly answered question.
pub const CREDIT_PER_CORRECT: u32 = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HistoryError {
    #[error("score ({score}) exceeds total question count ({total})")]
    ScoreExceedsTotal { score: u32, total: u32 },

    #[error("credit ({credit}) is inconsistent with score ({score})")]
    InconsistentCredit { credit: u32, score: u32 },

    #[error("answer map holds {len} entries for {total} questions")]
    TooManyAnswers { len: usize, total: u32 },
}

/// Immutable summary of one completed quiz session.
///
/// Records are append-only: the engine writes exactly one per finished
/// session and never mutates past entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    id: RecordId,
    recorded_at: DateTime<Utc>,
    score: u32,
    total: u32,
    credit: u32,
    duration_secs: u32,
    answers: BTreeMap<QuestionId, OptionKey>,
}

impl HistoryRecord {
    /// Builds a record for a freshly finished session, deriving the credit
    /// from the score.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::ScoreExceedsTotal` or
    /// `HistoryError::TooManyAnswers` if the counts do not line up.
    pub fn new(
        id: RecordId,
        recorded_at: DateTime<Utc>,
        score: u32,
        total: u32,
        duration_secs: u32,
        answers: BTreeMap<QuestionId, OptionKey>,
    ) -> Result<Self, HistoryError> {
        let credit = score.saturating_mul(CREDIT_PER_CORRECT);
        Self::from_persisted(id, recorded_at, score, total, credit, duration_secs, answers)
    }

    /// Rehydrates a record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError` when the persisted counts are inconsistent:
    /// a score above the total, a credit that does not match the score, or
    /// more recorded answers than questions.
    pub fn from_persisted(
        id: RecordId,
        recorded_at: DateTime<Utc>,
        score: u32,
        total: u32,
        credit: u32,
        duration_secs: u32,
        answers: BTreeMap<QuestionId, OptionKey>,
    ) -> Result<Self, HistoryError> {
        if score > total {
            return Err(HistoryError::ScoreExceedsTotal { score, total });
        }
        if credit != score.saturating_mul(CREDIT_PER_CORRECT) {
            return Err(HistoryError::InconsistentCredit { credit, score });
        }
        if answers.len() > total as usize {
            return Err(HistoryError::TooManyAnswers {
                len: answers.len(),
                total,
            });
        }

        Ok(Self {
            id,
            recorded_at,
            score,
            total,
            credit,
            duration_secs,
            answers,
        })
    }

    #[must_use]
    pub fn id(&self) -> RecordId {
        self.id
    }

    #[must_use]
    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn credit(&self) -> u32 {
        self.credit
    }

    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    /// The raw chosen-option map, keyed by question id. Questions that timed
    /// out carry no entry.
    #[must_use]
    pub fn answers(&self) -> &BTreeMap<QuestionId, OptionKey> {
        &self.answers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::question::OptionKey;
    use crate::time::fixed_now;

    fn key(c: char) -> OptionKey {
        OptionKey::new(c).unwrap()
    }

    #[test]
    fn new_derives_credit_from_score() {
        let mut answers = BTreeMap::new();
        answers.insert(QuestionId::new("q1"), key('A'));
        answers.insert(QuestionId::new("q2"), key('B'));

        let record = HistoryRecord::new(
            RecordId::generate(),
            fixed_now(),
            2,
            2,
            17,
            answers,
        )
        .unwrap();

        assert_eq!(record.score(), 2);
        assert_eq!(record.credit(), 20);
        assert_eq!(record.duration_secs(), 17);
    }

    #[test]
    fn zero_score_earns_zero_credit() {
        let record = HistoryRecord::new(
            RecordId::generate(),
            fixed_now(),
            0,
            3,
            30,
            BTreeMap::new(),
        )
        .unwrap();
        assert_eq!(record.credit(), 0);
    }

    #[test]
    fn rejects_score_above_total() {
        let err = HistoryRecord::new(
            RecordId::generate(),
            fixed_now(),
            3,
            2,
            10,
            BTreeMap::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            HistoryError::ScoreExceedsTotal { score: 3, total: 2 }
        ));
    }

    #[test]
    fn rejects_inconsistent_persisted_credit() {
        let err = HistoryRecord::from_persisted(
            RecordId::generate(),
            fixed_now(),
            1,
            2,
            99,
            10,
            BTreeMap::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            HistoryError::InconsistentCredit { credit: 99, score: 1 }
        ));
    }

    #[test]
    fn rejects_more_answers_than_questions() {
        let mut answers = BTreeMap::new();
        answers.insert(QuestionId::new("q1"), key('A'));
        answers.insert(QuestionId::new("q2"), key('B'));

        let err = HistoryRecord::new(RecordId::generate(), fixed_now(), 1, 1, 5, answers)
            .unwrap_err();
        assert!(matches!(err, HistoryError::TooManyAnswers { len: 2, total: 1 }));
    }
}
