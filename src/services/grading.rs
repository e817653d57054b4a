//! Automatic grading of submitted answers against a question's answer key.

use indexmap::IndexMap;
use tracing::debug;

use crate::state::{
    game::{AnswerError, AnswerPayload, PlayerRecord, StoredAnswer},
    quiz::{ChoiceSet, Question, QuestionKind},
};

/// Outcome of grading one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grade {
    /// Whether the answer matches the key.
    pub correct: bool,
    /// Suggested score: the question's points when correct, else 0.
    pub points: u32,
}

impl Grade {
    fn correct(question: &Question) -> Self {
        Self {
            correct: true,
            points: question.points,
        }
    }

    fn incorrect() -> Self {
        Self {
            correct: false,
            points: 0,
        }
    }
}

/// Grade a stored answer. Missing or malformed answers are incorrect.
pub fn grade(question: &Question, answer: &StoredAnswer) -> Grade {
    let payload = match AnswerPayload::interpret(question, answer) {
        Ok(payload) => payload,
        Err(AnswerError::Missing) => return Grade::incorrect(),
        Err(err) => {
            debug!(question = %question.id, error = %err, "grading malformed answer as incorrect");
            return Grade::incorrect();
        }
    };

    let correct = match (&payload, &question.kind) {
        (
            AnswerPayload::Choice(key),
            QuestionKind::MultipleChoice(set) | QuestionKind::TrueFalse(set),
        ) => grade_choice(key, set),
        (
            AnswerPayload::FreeText(text),
            QuestionKind::TextInput { answer } | QuestionKind::ImageInput { answer },
        ) => grade_free_text(text, answer),
        (AnswerPayload::Ordering(items), QuestionKind::Ordering { answer, .. }) => {
            grade_ordering(items, answer)
        }
        _ => false,
    };

    if correct {
        Grade::correct(question)
    } else {
        Grade::incorrect()
    }
}

/// Suggested score for every player, in the order given.
pub fn grade_all(
    question: &Question,
    players: &IndexMap<String, PlayerRecord>,
) -> IndexMap<String, u32> {
    players
        .iter()
        .map(|(name, record)| (name.clone(), grade(question, &record.answer).points))
        .collect()
}

/// Choice questions compare option keys, never labels.
fn grade_choice(key: &str, set: &ChoiceSet) -> bool {
    clean_answer(key) == clean_answer(&set.answer)
}

fn grade_free_text(text: &str, expected: &str) -> bool {
    clean_answer(text) == clean_answer(expected)
}

fn grade_ordering(submitted: &[String], expected: &[String]) -> bool {
    submitted == expected
}

fn clean_answer(answer: &str) -> String {
    answer.trim().to_lowercase()
}
