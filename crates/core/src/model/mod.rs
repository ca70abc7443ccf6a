mod history;
mod ids;
mod question;

pub use history::{CREDIT_PER_CORRECT, HistoryError, HistoryRecord};
pub use ids::{ParseIdError, QuestionId, RecordId};
pub use question::{Choice, OptionKey, Question, QuestionError};
