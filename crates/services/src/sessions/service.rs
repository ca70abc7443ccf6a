use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

use quiz_core::model::{HistoryRecord, OptionKey, Question, QuestionId, RecordId};

use super::progress::SessionProgress;
use crate::error::SessionError;

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// Lifecycle phase of a quiz session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Counting down and accepting answers.
    Running,
    /// All questions handled; the history record has been built.
    Finished,
    /// Abandoned before the last question; no record exists.
    Idle,
}

/// Result of applying one answer (manual or timeout) to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub question_id: QuestionId,
    pub chosen: Option<OptionKey>,
    pub is_finished: bool,
}

/// Result of one countdown tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The countdown decreased; the current question is unchanged.
    Counting { remaining_secs: u32 },
    /// The countdown ran out and the question advanced with no answer.
    Expired(AnswerOutcome),
    /// The session is not running; stray ticks are discarded.
    Ignored,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory state machine for one timed quiz run.
///
/// Every transition is a pure mutation of the session state: timestamps come
/// from the caller so the services layer keeps a single time source, and the
/// one side effect — appending the finished record to the history log —
/// belongs to `QuizLoopService`.
pub struct QuizSession {
    questions: Vec<Question>,
    phase: SessionPhase,
    current: usize,
    answers: BTreeMap<QuestionId, OptionKey>,
    remaining_secs: u32,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    record: Option<HistoryRecord>,
    persisted: bool,
}

impl QuizSession {
    /// Start a session over the given question sequence.
    ///
    /// The first question's countdown begins immediately.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyCatalog` if no questions are provided.
    pub fn start(
        questions: Vec<Question>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        let Some(first) = questions.first() else {
            return Err(SessionError::EmptyCatalog);
        };
        let remaining_secs = first.time_limit_secs();

        Ok(Self {
            questions,
            phase: SessionPhase::Running,
            current: 0,
            answers: BTreeMap::new(),
            remaining_secs,
            started_at,
            finished_at: None,
            record: None,
            persisted: false,
        })
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.phase == SessionPhase::Finished
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<QuestionId, OptionKey> {
        &self.answers
    }

    /// The record built on the finish transition, if any.
    #[must_use]
    pub fn record(&self) -> Option<&HistoryRecord> {
        self.record.as_ref()
    }

    /// Whether the finished record has reached the history log.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Total number of questions in this session.
    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        if self.phase == SessionPhase::Running {
            self.questions.get(self.current)
        } else {
            None
        }
    }

    /// Returns a summary of the current session progress.
    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            total: self.questions.len(),
            current: self.current,
            answered: self.answers.len(),
            remaining_secs: self.remaining_secs,
            is_finished: self.is_finished(),
        }
    }

    /// Count of questions whose recorded answer matches their correct key.
    #[must_use]
    pub fn score(&self) -> u32 {
        let correct = self
            .questions
            .iter()
            .filter(|question| {
                self.answers
                    .get(question.id())
                    .is_some_and(|key| question.is_correct(*key))
            })
            .count();
        u32::try_from(correct).unwrap_or(u32::MAX)
    }

    /// Apply an answer for the question at `index`.
    ///
    /// `index` must match the current question: a submission that raced a
    /// timer advance carries the old index and is rejected without touching
    /// state. `None` stands for "no answer" and leaves the answer map alone.
    ///
    /// Answering the last question moves the session to `Finished`, stamps
    /// the finish time, and builds the history record; any other question
    /// advances by exactly one and resets the countdown.
    ///
    /// # Errors
    ///
    /// Returns a state-conflict variant outside `Running`, `StaleAnswer` for
    /// an index mismatch, and `UnknownOption` for a key the current question
    /// does not offer.
    pub fn submit_answer(
        &mut self,
        index: usize,
        chosen: Option<OptionKey>,
        at: DateTime<Utc>,
    ) -> Result<AnswerOutcome, SessionError> {
        match self.phase {
            SessionPhase::Running => {}
            SessionPhase::Finished => return Err(SessionError::AlreadyFinished),
            SessionPhase::Idle => return Err(SessionError::NotRunning),
        }
        if index != self.current {
            return Err(SessionError::StaleAnswer {
                submitted: index,
                current: self.current,
            });
        }

        let question = &self.questions[self.current];
        if let Some(key) = chosen {
            if !question.has_option(key) {
                return Err(SessionError::UnknownOption { key });
            }
            self.answers.insert(question.id().clone(), key);
        }
        let question_id = question.id().clone();

        let is_finished = self.current + 1 == self.questions.len();
        if is_finished {
            self.phase = SessionPhase::Finished;
            self.finished_at = Some(at);
        } else {
            self.current += 1;
            self.remaining_secs = self.questions[self.current].time_limit_secs();
        }

        Ok(AnswerOutcome {
            question_id,
            chosen,
            is_finished,
        })
    }

    /// Apply one 1-second countdown tick.
    ///
    /// The `time_limit`-th tick without a manual answer expires the question:
    /// it advances exactly as a "no answer" submission would. Ticks outside
    /// `Running` return `Ignored`, which is how stray timer events delivered
    /// after an abandon or finish are neutralized.
    pub fn tick(&mut self, at: DateTime<Utc>) -> TickOutcome {
        if self.phase != SessionPhase::Running {
            return TickOutcome::Ignored;
        }

        if self.remaining_secs <= 1 {
            self.remaining_secs = 0;
            // Phase and index were checked above, and "no answer" skips the
            // option lookup, so this submission cannot fail.
            match self.submit_answer(self.current, None, at) {
                Ok(outcome) => TickOutcome::Expired(outcome),
                Err(_) => TickOutcome::Ignored,
            }
        } else {
            self.remaining_secs -= 1;
            TickOutcome::Counting {
                remaining_secs: self.remaining_secs,
            }
        }
    }

    /// Abandon the run without writing history.
    ///
    /// `Running` moves to `Idle`; `Idle` stays `Idle`. A finished session is
    /// terminal and left untouched.
    pub fn abandon(&mut self) {
        if self.phase == SessionPhase::Running {
            self.phase = SessionPhase::Idle;
        }
    }

    /// Build the history record for a finished session.
    ///
    /// Duration is the wall-clock delta between start and finish, clamped at
    /// zero.
    pub(crate) fn build_record(&self) -> Result<HistoryRecord, SessionError> {
        let finished_at = self.finished_at.ok_or(SessionError::NotFinished)?;
        let total = u32::try_from(self.questions.len()).unwrap_or(u32::MAX);
        let duration = (finished_at - self.started_at).num_seconds().max(0);
        let duration_secs = u32::try_from(duration).unwrap_or(u32::MAX);

        Ok(HistoryRecord::new(
            RecordId::generate(),
            finished_at,
            self.score(),
            total,
            duration_secs,
            self.answers.clone(),
        )?)
    }

    pub(crate) fn set_record(&mut self, record: HistoryRecord) {
        self.record = Some(record);
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.persisted = true;
    }
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("phase", &self.phase)
            .field("questions_len", &self.questions.len())
            .field("current", &self.current)
            .field("answers_len", &self.answers.len())
            .field("remaining_secs", &self.remaining_secs)
            .field("started_at", &self.started_at)
            .field("finished_at", &self.finished_at)
            .field("persisted", &self.persisted)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
