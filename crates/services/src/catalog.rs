use async_trait::async_trait;

use quiz_core::model::{Choice, OptionKey, Question, QuestionId};

use crate::error::CatalogError;

/// Source of the ordered question sequence for a session.
///
/// The real system fetches this from a backend; the engine only depends on
/// this seam, so the backing can be swapped without touching session code.
#[async_trait]
pub trait QuestionCatalog: Send + Sync {
    /// Load the ordered question sequence.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Unavailable` when the source cannot be reached.
    async fn load(&self) -> Result<Vec<Question>, CatalogError>;
}

/// Countdown limit shared by the sample questions.
const SAMPLE_TIME_LIMIT_SECS: u32 = 10;

/// Catalog backed by a fixed in-memory question list.
#[derive(Clone)]
pub struct StaticCatalog {
    questions: Vec<Question>,
}

impl StaticCatalog {
    #[must_use]
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    /// Built-in sample set in the shape real catalogs use: four options
    /// keyed `A` through `D`, ten-second limits, one correct key each.
    ///
    /// # Panics
    ///
    /// Panics if the hard-coded set fails validation; a test guards this.
    #[must_use]
    pub fn sample() -> Self {
        Self::new(vec![
            sample_question(
                "q1",
                "Which planet is closest to the Sun?",
                ["Mercury", "Venus", "Mars", "Jupiter"],
                'A',
            ),
            sample_question(
                "q2",
                "What is the chemical symbol for gold?",
                ["Ag", "Au", "Fe", "Pb"],
                'B',
            ),
            sample_question(
                "q3",
                "Which ocean is the largest?",
                ["Atlantic", "Indian", "Pacific", "Arctic"],
                'C',
            ),
            sample_question(
                "q4",
                "How many continents are there?",
                ["Five", "Six", "Seven", "Eight"],
                'C',
            ),
            sample_question(
                "q5",
                "Which language has the most native speakers?",
                ["English", "Mandarin", "Spanish", "Hindi"],
                'B',
            ),
            sample_question(
                "q6",
                "In which year did the first crewed Moon landing happen?",
                ["1965", "1967", "1969", "1972"],
                'C',
            ),
        ])
    }
}

fn sample_question(id: &str, prompt: &str, options: [&str; 4], correct: char) -> Question {
    let keys = ['A', 'B', 'C', 'D'];
    let options = keys
        .iter()
        .zip(options)
        .map(|(key, text)| {
            Choice::new(
                OptionKey::new(*key).expect("sample option key is a letter"),
                text,
            )
        })
        .collect();
    Question::new(
        QuestionId::new(id),
        prompt,
        SAMPLE_TIME_LIMIT_SECS,
        options,
        OptionKey::new(correct).expect("sample correct key is a letter"),
    )
    .expect("sample question is valid")
}

#[async_trait]
impl QuestionCatalog for StaticCatalog {
    async fn load(&self) -> Result<Vec<Question>, CatalogError> {
        Ok(self.questions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sample_catalog_loads() {
        let questions = StaticCatalog::sample().load().await.unwrap();

        assert!(!questions.is_empty());
        for question in &questions {
            assert_eq!(question.options().len(), 4);
            assert_eq!(question.time_limit_secs(), SAMPLE_TIME_LIMIT_SECS);
            assert!(question.has_option(question.correct()));
        }
    }

    #[tokio::test]
    async fn custom_catalog_returns_given_questions() {
        let question = sample_question("only", "Pick A or B?", ["a", "b", "c", "d"], 'A');
        let catalog = StaticCatalog::new(vec![question.clone()]);

        let loaded = catalog.load().await.unwrap();
        assert_eq!(loaded, vec![question]);
    }
}
