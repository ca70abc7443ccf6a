use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("option key must be a single ASCII letter, got {0:?}")]
    InvalidOptionKey(char),

    #[error("option key must be a single ASCII letter, got {0:?}")]
    InvalidOptionKeyInput(String),

    #[error("question id cannot be empty")]
    EmptyId,

    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("time limit must be at least 1 second")]
    InvalidTimeLimit,

    #[error("a question needs at least two options, got {0}")]
    TooFewOptions(usize),

    #[error("duplicate option key: {0}")]
    DuplicateOptionKey(OptionKey),

    #[error("correct key {0} does not match any option")]
    UnknownCorrectKey(OptionKey),
}

//
// ─── OPTION KEY ────────────────────────────────────────────────────────────────
//

/// Single-letter key identifying one option of a question (`A`, `B`, ...).
///
/// Lowercase input is normalized to uppercase so `a` and `A` select the same
/// option.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OptionKey(char);

impl OptionKey {
    /// Creates a key from a single letter.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::InvalidOptionKey` if the character is not an
    /// ASCII letter.
    pub fn new(key: char) -> Result<Self, QuestionError> {
        if key.is_ascii_alphabetic() {
            Ok(Self(key.to_ascii_uppercase()))
        } else {
            Err(QuestionError::InvalidOptionKey(key))
        }
    }

    /// Returns the underlying letter.
    #[must_use]
    pub fn value(&self) -> char {
        self.0
    }
}

impl fmt::Debug for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OptionKey({})", self.0)
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OptionKey {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(key), None) => OptionKey::new(key),
            _ => Err(QuestionError::InvalidOptionKeyInput(s.to_string())),
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// One selectable option: a key and its display text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    key: OptionKey,
    text: String,
}

impl Choice {
    #[must_use]
    pub fn new(key: OptionKey, text: impl Into<String>) -> Self {
        Self {
            key,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn key(&self) -> OptionKey {
        self.key
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A multiple-choice question with a per-question countdown limit.
///
/// Immutable once built; the constructor rejects malformed input so the
/// engine never has to re-validate mid-session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    time_limit_secs: u32,
    options: Vec<Choice>,
    correct: OptionKey,
}

impl Question {
    /// Builds a validated question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the id or prompt is empty, the time limit
    /// is zero, fewer than two options are given, option keys repeat, or
    /// `correct` matches no option.
    pub fn new(
        id: QuestionId,
        prompt: impl Into<String>,
        time_limit_secs: u32,
        options: Vec<Choice>,
        correct: OptionKey,
    ) -> Result<Self, QuestionError> {
        if id.is_empty() {
            return Err(QuestionError::EmptyId);
        }
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if time_limit_secs == 0 {
            return Err(QuestionError::InvalidTimeLimit);
        }
        if options.len() < 2 {
            return Err(QuestionError::TooFewOptions(options.len()));
        }

        let mut seen = HashSet::new();
        for option in &options {
            if !seen.insert(option.key()) {
                return Err(QuestionError::DuplicateOptionKey(option.key()));
            }
        }
        if !seen.contains(&correct) {
            return Err(QuestionError::UnknownCorrectKey(correct));
        }

        Ok(Self {
            id,
            prompt,
            time_limit_secs,
            options,
            correct,
        })
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> u32 {
        self.time_limit_secs
    }

    #[must_use]
    pub fn options(&self) -> &[Choice] {
        &self.options
    }

    #[must_use]
    pub fn correct(&self) -> OptionKey {
        self.correct
    }

    /// Returns true when the question offers an option under `key`.
    #[must_use]
    pub fn has_option(&self, key: OptionKey) -> bool {
        self.options.iter().any(|option| option.key() == key)
    }

    /// Returns true when `key` selects the correct option.
    #[must_use]
    pub fn is_correct(&self, key: OptionKey) -> bool {
        self.correct == key
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
