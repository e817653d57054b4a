use serde_json::Value;
use thiserror::Error;

use crate::{
    dao::models::{GameStateEntity, PlayerEntity},
    state::{
        quiz::{Question, QuestionKind, QuestionType, is_arrangement_of, scalar_string},
        state_machine::{GamePhase, UnknownPhase},
    },
};

/// Authoritative position of the live game.
///
/// A selected question always comes with its round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    /// Current phase.
    pub phase: GamePhase,
    /// Selected round, if any.
    pub current_round_id: Option<String>,
    /// Selected question, if any.
    pub current_question_id: Option<String>,
}

impl GameState {
    /// Lobby with nothing selected.
    pub fn waiting() -> Self {
        Self {
            phase: GamePhase::Waiting,
            current_round_id: None,
            current_question_id: None,
        }
    }

    /// Title card of `round_id`.
    pub fn round_interstitial(round_id: impl Into<String>) -> Self {
        Self {
            phase: GamePhase::RoundInterstitial,
            current_round_id: Some(round_id.into()),
            current_question_id: None,
        }
    }

    /// Question open for answers.
    pub fn active(round_id: impl Into<String>, question_id: impl Into<String>) -> Self {
        Self {
            phase: GamePhase::Active,
            current_round_id: Some(round_id.into()),
            current_question_id: Some(question_id.into()),
        }
    }

    /// Game over; identifiers are cleared.
    pub fn ended() -> Self {
        Self {
            phase: GamePhase::Ended,
            current_round_id: None,
            current_question_id: None,
        }
    }

    /// Same position under another phase.
    pub fn with_phase(mut self, phase: GamePhase) -> Self {
        self.phase = phase;
        self
    }

    /// Selected (round, question) pair, if both are set.
    pub fn position(&self) -> Option<(&str, &str)> {
        Some((
            self.current_round_id.as_deref()?,
            self.current_question_id.as_deref()?,
        ))
    }
}

/// Stored game state that breaks the position rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameStateError {
    /// The phase name is not recognised.
    #[error(transparent)]
    UnknownPhase(#[from] UnknownPhase),
    /// A question id is set while the round id is empty.
    #[error("question `{0}` is selected without a round")]
    QuestionWithoutRound(String),
}

impl TryFrom<GameStateEntity> for GameState {
    type Error = GameStateError;

    fn try_from(entity: GameStateEntity) -> Result<Self, Self::Error> {
        let phase = entity.phase.parse::<GamePhase>()?;
        if let (None, Some(question)) = (&entity.current_round_id, &entity.current_question_id) {
            return Err(GameStateError::QuestionWithoutRound(question.clone()));
        }
        Ok(Self {
            phase,
            current_round_id: entity.current_round_id,
            current_question_id: entity.current_question_id,
        })
    }
}

impl From<&GameState> for GameStateEntity {
    fn from(state: &GameState) -> Self {
        Self {
            phase: state.phase.as_str().to_string(),
            current_round_id: state.current_round_id.clone(),
            current_question_id: state.current_question_id.clone(),
        }
    }
}

/// Answer payload exactly as found in a player record.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredAnswer {
    /// Ordered list of items.
    Sequence(Vec<String>),
    /// A choice key or free text.
    Text(String),
    /// Anything else (numbers, booleans, objects, mixed lists, null).
    Other(Value),
}

impl Default for StoredAnswer {
    fn default() -> Self {
        StoredAnswer::Text(String::new())
    }
}

impl StoredAnswer {
    /// `""`, `[]` and `null` all mean "no answer yet".
    pub fn is_empty(&self) -> bool {
        match self {
            StoredAnswer::Sequence(items) => items.is_empty(),
            StoredAnswer::Text(text) => text.is_empty(),
            StoredAnswer::Other(value) => value.is_null(),
        }
    }

    /// String form of a scalar answer; `None` for lists and objects.
    pub fn string_form(&self) -> Option<String> {
        match self {
            StoredAnswer::Text(text) => Some(text.clone()),
            StoredAnswer::Other(value) => scalar_string(value),
            StoredAnswer::Sequence(_) => None,
        }
    }

    /// JSON value to write back to the store.
    pub fn to_value(&self) -> Value {
        match self {
            StoredAnswer::Sequence(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
            StoredAnswer::Text(text) => Value::String(text.clone()),
            StoredAnswer::Other(value) => value.clone(),
        }
    }
}

impl From<Value> for StoredAnswer {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => StoredAnswer::Text(text),
            Value::Array(items) if items.iter().all(Value::is_string) => StoredAnswer::Sequence(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::String(text) => Some(text),
                        _ => None,
                    })
                    .collect(),
            ),
            other => StoredAnswer::Other(other),
        }
    }
}

/// Per-player ledger entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerRecord {
    /// Committed total, never decreases during a game.
    pub score: u32,
    /// Answer to the current question; cleared when a question opens.
    pub answer: StoredAnswer,
}

impl From<PlayerEntity> for PlayerRecord {
    fn from(entity: PlayerEntity) -> Self {
        Self {
            score: entity.score,
            answer: entity.answer.into(),
        }
    }
}

impl From<&PlayerRecord> for PlayerEntity {
    fn from(record: &PlayerRecord) -> Self {
        Self {
            score: record.score,
            answer: record.answer.to_value(),
        }
    }
}

/// Answer interpreted against the question it was given for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerPayload {
    /// Key of the selected option.
    Choice(String),
    /// Typed answer.
    FreeText(String),
    /// Items in the submitted order.
    Ordering(Vec<String>),
}

/// Answer that cannot be graded or accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnswerError {
    /// Nothing was submitted.
    #[error("no answer was submitted")]
    Missing,
    /// Payload shape does not match the question type.
    #[error("answer does not fit a {expected:?} question")]
    Malformed {
        /// Type of the question the answer was given for.
        expected: QuestionType,
    },
    /// Choice key that is not among the question's options.
    #[error("`{0}` is not one of the options")]
    UnknownChoice(String),
    /// Ordering that does not use every item exactly once.
    #[error("ordering must arrange every item exactly once")]
    IncompleteOrdering,
}

impl AnswerPayload {
    /// Interpret a stored answer for `question`.
    pub fn interpret(question: &Question, answer: &StoredAnswer) -> Result<Self, AnswerError> {
        if answer.is_empty() {
            return Err(AnswerError::Missing);
        }
        let malformed = AnswerError::Malformed {
            expected: question.question_type(),
        };
        match (&question.kind, answer) {
            (QuestionKind::Ordering { .. }, StoredAnswer::Sequence(items)) => {
                Ok(AnswerPayload::Ordering(items.clone()))
            }
            (QuestionKind::Ordering { .. }, _) | (_, StoredAnswer::Sequence(_)) => Err(malformed),
            (QuestionKind::MultipleChoice(_) | QuestionKind::TrueFalse(_), other) => other
                .string_form()
                .map(AnswerPayload::Choice)
                .ok_or(malformed),
            (QuestionKind::TextInput { .. } | QuestionKind::ImageInput { .. }, other) => other
                .string_form()
                .map(AnswerPayload::FreeText)
                .ok_or(malformed),
        }
    }

    /// Stricter check applied before a player writes: choice keys must exist
    /// and orderings must be a full arrangement of the items.
    pub fn validate_for(&self, question: &Question) -> Result<(), AnswerError> {
        match (self, &question.kind) {
            (
                AnswerPayload::Choice(key),
                QuestionKind::MultipleChoice(set) | QuestionKind::TrueFalse(set),
            ) => {
                let needle = key.trim().to_lowercase();
                if set
                    .options
                    .keys()
                    .any(|option| option.trim().to_lowercase() == needle)
                {
                    Ok(())
                } else {
                    Err(AnswerError::UnknownChoice(key.clone()))
                }
            }
            (
                AnswerPayload::FreeText(text),
                QuestionKind::TextInput { .. } | QuestionKind::ImageInput { .. },
            ) => {
                if text.trim().is_empty() {
                    Err(AnswerError::Missing)
                } else {
                    Ok(())
                }
            }
            (AnswerPayload::Ordering(items), QuestionKind::Ordering { items: expected, .. }) => {
                if is_arrangement_of(expected, items) {
                    Ok(())
                } else {
                    Err(AnswerError::IncompleteOrdering)
                }
            }
            _ => Err(AnswerError::Malformed {
                expected: question.question_type(),
            }),
        }
    }

    /// Stored form of the payload.
    pub fn into_stored(self) -> StoredAnswer {
        match self {
            AnswerPayload::Choice(text) | AnswerPayload::FreeText(text) => StoredAnswer::Text(text),
            AnswerPayload::Ordering(items) => StoredAnswer::Sequence(items),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::state::quiz::tests::sample_quiz;

    #[test]
    fn entity_round_trip_keeps_empty_ids_as_none() {
        let entity: GameStateEntity = serde_json::from_value(json!({
            "phase": "round_interstitial",
            "currentRoundId": "round1",
            "currentQuestionId": ""
        }))
        .unwrap();
        let state = GameState::try_from(entity).unwrap();
        assert_eq!(state, GameState::round_interstitial("round1"));

        let stored = serde_json::to_value(GameStateEntity::from(&GameState::ended())).unwrap();
        assert_eq!(
            stored,
            json!({"phase": "ended", "currentRoundId": "", "currentQuestionId": ""})
        );
    }

    #[test]
    fn question_without_round_is_rejected() {
        let entity = GameStateEntity {
            phase: "active".into(),
            current_round_id: None,
            current_question_id: Some("q1".into()),
        };
        assert_eq!(
            GameState::try_from(entity),
            Err(GameStateError::QuestionWithoutRound("q1".into()))
        );
    }

    #[test]
    fn stored_answers_are_classified_by_shape() {
        assert_eq!(StoredAnswer::from(json!("b")), StoredAnswer::Text("b".into()));
        assert_eq!(
            StoredAnswer::from(json!(["a", "b"])),
            StoredAnswer::Sequence(vec!["a".into(), "b".into()])
        );
        assert_eq!(StoredAnswer::from(json!(true)).string_form(), Some("true".into()));
        assert!(StoredAnswer::from(json!([])).is_empty());
        assert!(StoredAnswer::from(Value::Null).is_empty());
        assert!(!StoredAnswer::from(json!([1, "a"])).is_empty());
    }

    #[test]
    fn interpret_maps_shape_to_question_type() {
        let quiz = sample_quiz();
        let text = quiz.question("round1", "q1").unwrap();
        let choice = quiz.question("round1", "q3").unwrap();
        let ordering = quiz.question("round1", "q4").unwrap();

        assert_eq!(
            AnswerPayload::interpret(text, &StoredAnswer::Text("Paris".into())),
            Ok(AnswerPayload::FreeText("Paris".into()))
        );
        assert_eq!(
            AnswerPayload::interpret(choice, &StoredAnswer::Text("b".into())),
            Ok(AnswerPayload::Choice("b".into()))
        );
        assert_eq!(
            AnswerPayload::interpret(ordering, &StoredAnswer::Text("Rome".into())),
            Err(AnswerError::Malformed {
                expected: QuestionType::Ordering
            })
        );
        assert_eq!(
            AnswerPayload::interpret(text, &StoredAnswer::Sequence(vec!["x".into()])),
            Err(AnswerError::Malformed {
                expected: QuestionType::TextInput
            })
        );
        assert_eq!(
            AnswerPayload::interpret(text, &StoredAnswer::default()),
            Err(AnswerError::Missing)
        );
    }

    #[test]
    fn validate_for_checks_keys_and_arrangements() {
        let quiz = sample_quiz();
        let choice = quiz.question("round1", "q3").unwrap();
        let ordering = quiz.question("round1", "q4").unwrap();

        assert!(AnswerPayload::Choice("B".into()).validate_for(choice).is_ok());
        assert_eq!(
            AnswerPayload::Choice("z".into()).validate_for(choice),
            Err(AnswerError::UnknownChoice("z".into()))
        );
        let partial = AnswerPayload::Ordering(vec!["Rome".into(), "Athens".into()]);
        assert_eq!(
            partial.validate_for(ordering),
            Err(AnswerError::IncompleteOrdering)
        );
        let full = AnswerPayload::Ordering(vec!["Rome".into(), "Babylon".into(), "Athens".into()]);
        assert!(full.validate_for(ordering).is_ok());
        assert!(
            AnswerPayload::FreeText("x".into())
                .validate_for(ordering)
                .is_err()
        );
    }
}
