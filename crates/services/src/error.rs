//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{HistoryError, OptionKey};
use storage::repository::StorageError;

/// Errors emitted by catalog providers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("question catalog is unavailable: {0}")]
    Unavailable(String),
}

/// Errors emitted by the quiz session engine and its services.
///
/// Operations against a session in the wrong lifecycle phase are rejected
/// with an explicit variant rather than silently ignored; the exception is
/// `QuizSession::tick`, which discards stray ticks instead of erroring.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("catalog contains no questions")]
    EmptyCatalog,

    #[error("session is already finished")]
    AlreadyFinished,

    #[error("session is not running")]
    NotRunning,

    #[error("session has not finished yet")]
    NotFinished,

    #[error("answer for question {submitted} arrived after the session moved on to question {current}")]
    StaleAnswer { submitted: usize, current: usize },

    #[error("option {key} is not offered by the current question")]
    UnknownOption { key: OptionKey },

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
