mod progress;
mod service;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use progress::SessionProgress;
pub use service::{AnswerOutcome, QuizSession, SessionPhase, TickOutcome};
pub use view::{HistoryListItem, HistoryService};
pub use workflow::{QuizLoopService, SessionAnswerResult, SessionTickResult};
