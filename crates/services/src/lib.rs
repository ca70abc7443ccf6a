#![forbid(unsafe_code)]

pub mod catalog;
pub mod error;
pub mod sessions;

pub use quiz_core::Clock;

pub use catalog::{QuestionCatalog, StaticCatalog};
pub use error::{CatalogError, SessionError};
pub use sessions::{
    AnswerOutcome, HistoryListItem, HistoryService, QuizLoopService, QuizSession,
    SessionAnswerResult, SessionPhase, SessionProgress, SessionTickResult, TickOutcome,
};
