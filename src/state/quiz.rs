//! Immutable quiz script: rounds, questions, answer keys and traversal.

use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    dao::{
        live_game::LiveGameRepository,
        models::{AnswerDetailsEntity, OptionsEntity, QuestionEntity, QuizEntity, RoundEntity},
    },
    error::ServiceError,
    state::game::{GameState, StoredAnswer},
};

/// Points awarded for a correct answer when the question does not say.
pub const DEFAULT_POINTS: u32 = 10;
/// Welcome headline used when the quiz does not define one.
pub const DEFAULT_TITLE: &str = "Trivia Night!";

const ORDERING_SEPARATOR: &str = " → ";
const SUBMISSION_SEPARATOR: &str = ", ";
const NO_ANSWER: &str = "No answer";

/// Kinds of questions a quiz can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// Pick one of several options.
    MultipleChoice,
    /// Pick true or false.
    TrueFalse,
    /// Type a free-text answer.
    TextInput,
    /// Identify a picture in free text.
    ImageInput,
    /// Arrange items in order.
    Ordering,
}

impl FromStr for QuestionType {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "multiple_choice" => Ok(Self::MultipleChoice),
            "true_false" => Ok(Self::TrueFalse),
            "text_input" => Ok(Self::TextInput),
            "image_input" => Ok(Self::ImageInput),
            "ordering" => Ok(Self::Ordering),
            _ => Err(()),
        }
    }
}

/// Options of a choice question together with the key of the right one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceSet {
    /// Choice key → label, in display order.
    pub options: IndexMap<String, String>,
    /// Key of the correct option.
    pub answer: String,
}

impl ChoiceSet {
    /// Label of the correct option.
    pub fn answer_label(&self) -> &str {
        self.options
            .get(&self.answer)
            .map(String::as_str)
            .unwrap_or(&self.answer)
    }
}

/// Type-specific body of a question, answer key included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionKind {
    /// Options with one correct key.
    MultipleChoice(ChoiceSet),
    /// `true`/`false` options.
    TrueFalse(ChoiceSet),
    /// Free text compared case-insensitively.
    TextInput {
        /// Expected text.
        answer: String,
    },
    /// Free text about the question image.
    ImageInput {
        /// Expected text.
        answer: String,
    },
    /// Items to arrange.
    Ordering {
        /// Items to arrange, as authored.
        items: Vec<String>,
        /// Items in their correct order.
        answer: Vec<String>,
    },
}

/// Extra explanation shown when the answer is revealed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerDetails {
    /// Ordering item → detail.
    PerItem(IndexMap<String, String>),
    /// Choice key → detail.
    PerOption(IndexMap<String, String>),
    /// One line for the whole question.
    Single(String),
}

/// A published question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Identifier within its round.
    pub id: String,
    /// Question text.
    pub text: String,
    /// Type-specific body.
    pub kind: QuestionKind,
    /// Points for a correct answer.
    pub points: u32,
    /// Picture shown with the question.
    pub image_ref: Option<String>,
    /// Explanations for the reveal.
    pub answer_details: Option<AnswerDetails>,
}

impl Question {
    /// Discriminant of [`Question::kind`].
    pub fn question_type(&self) -> QuestionType {
        match self.kind {
            QuestionKind::MultipleChoice(_) => QuestionType::MultipleChoice,
            QuestionKind::TrueFalse(_) => QuestionType::TrueFalse,
            QuestionKind::TextInput { .. } => QuestionType::TextInput,
            QuestionKind::ImageInput { .. } => QuestionType::ImageInput,
            QuestionKind::Ordering { .. } => QuestionType::Ordering,
        }
    }

    /// Choice options for multiple choice and true/false questions.
    pub fn choices(&self) -> Option<&ChoiceSet> {
        match &self.kind {
            QuestionKind::MultipleChoice(set) | QuestionKind::TrueFalse(set) => Some(set),
            _ => None,
        }
    }

    /// Human readable correct answer.
    pub fn answer_display(&self) -> String {
        match &self.kind {
            QuestionKind::MultipleChoice(set) | QuestionKind::TrueFalse(set) => {
                set.answer_label().to_string()
            }
            QuestionKind::TextInput { answer } | QuestionKind::ImageInput { answer } => {
                answer.clone()
            }
            QuestionKind::Ordering { answer, .. } => answer.join(ORDERING_SEPARATOR),
        }
    }

    /// Human readable rendering of what a player submitted.
    pub fn submission_display(&self, answer: &StoredAnswer) -> String {
        if answer.is_empty() {
            return NO_ANSWER.to_string();
        }
        match answer {
            StoredAnswer::Sequence(items) => items.join(SUBMISSION_SEPARATOR),
            other => {
                let raw = other.string_form().unwrap_or_default();
                self.choices()
                    .and_then(|set| set.options.get(&raw))
                    .cloned()
                    .unwrap_or(raw)
            }
        }
    }

    /// Detail attached to one ordering item or choice key.
    pub fn detail_for(&self, key: &str) -> Option<&str> {
        match &self.answer_details {
            Some(AnswerDetails::PerItem(map)) | Some(AnswerDetails::PerOption(map)) => {
                map.get(key).map(String::as_str)
            }
            _ => None,
        }
    }

    /// Single explanatory line, if the question carries one.
    pub fn single_detail(&self) -> Option<&str> {
        match &self.answer_details {
            Some(AnswerDetails::Single(detail)) => Some(detail),
            _ => None,
        }
    }
}

/// Ordered group of questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    /// Identifier within the quiz.
    pub id: String,
    /// Title shown on the round card.
    pub title: String,
    /// Presentation tag only.
    pub round_type: Option<String>,
    /// Questions in play order.
    pub questions: IndexMap<String, Question>,
}

impl Round {
    /// First question of the round.
    pub fn first_question(&self) -> Option<&Question> {
        self.questions.values().next()
    }

    /// Look a question up by id.
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.get(id)
    }

    /// Question following `id` in this round.
    pub fn question_after(&self, id: &str) -> Option<&Question> {
        let index = self.questions.get_index_of(id)?;
        self.questions.get_index(index + 1).map(|(_, q)| q)
    }

    /// 1-based position of a question within the round.
    pub fn question_number(&self, id: &str) -> Option<usize> {
        self.questions.get_index_of(id).map(|index| index + 1)
    }
}

/// Where the master goes after the current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    /// Another question in the same round.
    Question {
        /// Round of the question.
        round_id: String,
        /// Question to open.
        question_id: String,
    },
    /// The next round's title card.
    Round {
        /// Round to open.
        round_id: String,
    },
    /// Nothing left to play.
    End,
}

/// Immutable script for one live game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizContent {
    /// Headline of the welcome slide.
    pub title: String,
    /// Event name under the title.
    pub subtitle: Option<String>,
    /// Rounds in play order.
    pub rounds: IndexMap<String, Round>,
}

impl QuizContent {
    /// First round, if the quiz has any.
    pub fn first_round(&self) -> Option<&Round> {
        self.rounds.values().next()
    }

    /// Look a round up by id.
    pub fn round(&self, id: &str) -> Option<&Round> {
        self.rounds.get(id)
    }

    /// 1-based position of a round.
    pub fn round_number(&self, id: &str) -> Option<usize> {
        self.rounds.get_index_of(id).map(|index| index + 1)
    }

    /// Round following `id`.
    pub fn round_after(&self, id: &str) -> Option<&Round> {
        let index = self.rounds.get_index_of(id)?;
        self.rounds.get_index(index + 1).map(|(_, round)| round)
    }

    /// Resolve a (round, question) pair.
    pub fn question(&self, round_id: &str, question_id: &str) -> Option<&Question> {
        self.round(round_id)?.question(question_id)
    }

    /// Round selected by the game state, if it exists in this quiz.
    pub fn current_round(&self, state: &GameState) -> Option<&Round> {
        self.round(state.current_round_id.as_deref()?)
    }

    /// Question selected by the game state, if it exists in this quiz.
    pub fn current_question(&self, state: &GameState) -> Option<&Question> {
        self.question(
            state.current_round_id.as_deref()?,
            state.current_question_id.as_deref()?,
        )
    }

    /// Position that follows the given question. `None` when the position
    /// does not exist in this quiz.
    pub fn next_after(&self, round_id: &str, question_id: &str) -> Option<NextStep> {
        let round = self.round(round_id)?;
        round.question(question_id)?;

        if let Some(question) = round.question_after(question_id) {
            return Some(NextStep::Question {
                round_id: round.id.clone(),
                question_id: question.id.clone(),
            });
        }
        Some(match self.round_after(round_id) {
            Some(next) => NextStep::Round {
                round_id: next.id.clone(),
            },
            None => NextStep::End,
        })
    }
}

/// Content that cannot be played.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuizError {
    /// The `type` field names no known question type.
    #[error("question `{question}` has unknown type `{value}`")]
    UnknownQuestionType {
        /// Offending question.
        question: String,
        /// Type as written.
        value: String,
    },
    /// Options are missing or have the wrong shape.
    #[error("question `{question}` needs {expected}")]
    OptionsShape {
        /// Offending question.
        question: String,
        /// Shape the type requires.
        expected: &'static str,
    },
    /// A choice answer that is not an option key.
    #[error("question `{question}` answer `{answer}` is not one of its options")]
    AnswerNotAnOption {
        /// Offending question.
        question: String,
        /// Answer as written.
        answer: String,
    },
    /// An ordering key that is not a permutation of the items.
    #[error("question `{question}` answer must be a reordering of its items")]
    InvalidOrderingKey {
        /// Offending question.
        question: String,
    },
    /// Answer key of the wrong JSON type.
    #[error("question `{question}` answer has the wrong shape for its type")]
    InvalidAnswerShape {
        /// Offending question.
        question: String,
    },
    /// Zero or negative points.
    #[error("question `{question}` must award a positive number of points (got {points})")]
    InvalidPoints {
        /// Offending question.
        question: String,
        /// Points as written.
        points: i64,
    },
    /// A round without questions.
    #[error("round `{round}` has no questions")]
    EmptyRound {
        /// Offending round.
        round: String,
    },
}

/// Load and validate the quiz selected by `liveGame/activeQuizId`.
pub async fn load_active_quiz(
    repo: &LiveGameRepository,
) -> Result<(String, QuizContent), ServiceError> {
    let id = repo
        .active_quiz_id()
        .await?
        .ok_or_else(|| ServiceError::NotFound("no active quiz is selected".into()))?;
    let entity = repo
        .quiz(&id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("quiz `{id}` does not exist")))?;
    let content = QuizContent::try_from(entity)
        .map_err(|err| ServiceError::InvalidState(format!("quiz `{id}` is invalid: {err}")))?;
    Ok((id, content))
}

impl TryFrom<QuizEntity> for QuizContent {
    type Error = QuizError;

    fn try_from(entity: QuizEntity) -> Result<Self, Self::Error> {
        let rounds = entity
            .rounds
            .into_iter()
            .map(|(id, round)| Ok((id.clone(), build_round(id, round)?)))
            .collect::<Result<IndexMap<_, _>, QuizError>>()?;

        Ok(Self {
            title: entity.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            subtitle: entity.subtitle,
            rounds,
        })
    }
}

fn build_round(id: String, entity: RoundEntity) -> Result<Round, QuizError> {
    if entity.questions.is_empty() {
        return Err(QuizError::EmptyRound { round: id });
    }
    let questions = entity
        .questions
        .into_iter()
        .map(|(qid, question)| Ok((qid.clone(), build_question(qid, question)?)))
        .collect::<Result<IndexMap<_, _>, QuizError>>()?;

    Ok(Round {
        id,
        title: entity.title,
        round_type: entity.round_type,
        questions,
    })
}

fn build_question(id: String, entity: QuestionEntity) -> Result<Question, QuizError> {
    let question_type =
        QuestionType::from_str(&entity.question_type).map_err(|_| QuizError::UnknownQuestionType {
            question: id.clone(),
            value: entity.question_type.clone(),
        })?;

    let points = match entity.points {
        None => DEFAULT_POINTS,
        Some(points) if points > 0 => u32::try_from(points).unwrap_or(u32::MAX),
        Some(points) => {
            return Err(QuizError::InvalidPoints {
                question: id,
                points,
            });
        }
    };

    let kind = match question_type {
        QuestionType::MultipleChoice => {
            let options = match entity.options {
                Some(OptionsEntity::Choices(options)) if !options.is_empty() => options,
                _ => {
                    return Err(QuizError::OptionsShape {
                        question: id,
                        expected: "a non-empty key → label option map",
                    });
                }
            };
            QuestionKind::MultipleChoice(choice_set(&id, options, &entity.answer)?)
        }
        QuestionType::TrueFalse => {
            let options = match entity.options {
                Some(OptionsEntity::Choices(options)) if !options.is_empty() => options,
                None => IndexMap::from([
                    ("true".to_string(), "True".to_string()),
                    ("false".to_string(), "False".to_string()),
                ]),
                Some(_) => {
                    return Err(QuizError::OptionsShape {
                        question: id,
                        expected: "a key → label option map",
                    });
                }
            };
            QuestionKind::TrueFalse(choice_set(&id, options, &entity.answer)?)
        }
        QuestionType::TextInput | QuestionType::ImageInput => {
            let answer = scalar_string(&entity.answer)
                .ok_or_else(|| QuizError::InvalidAnswerShape { question: id.clone() })?;
            if question_type == QuestionType::TextInput {
                QuestionKind::TextInput { answer }
            } else {
                QuestionKind::ImageInput { answer }
            }
        }
        QuestionType::Ordering => {
            let items = match entity.options {
                Some(OptionsEntity::Items(items)) if !items.is_empty() => items,
                _ => {
                    return Err(QuizError::OptionsShape {
                        question: id,
                        expected: "a non-empty item list",
                    });
                }
            };
            let answer = sequence_strings(&entity.answer)
                .ok_or_else(|| QuizError::InvalidAnswerShape { question: id.clone() })?;
            if !is_arrangement_of(&items, &answer) {
                return Err(QuizError::InvalidOrderingKey { question: id });
            }
            QuestionKind::Ordering { items, answer }
        }
    };

    let answer_details = entity.answer_details.map(|details| match details {
        AnswerDetailsEntity::PerItem(items) => AnswerDetails::PerItem(
            items
                .into_iter()
                .map(|item| (item.option, item.detail))
                .collect(),
        ),
        AnswerDetailsEntity::PerOption { options } => AnswerDetails::PerOption(options),
        AnswerDetailsEntity::Single { detail } => AnswerDetails::Single(detail),
    });

    Ok(Question {
        id,
        text: entity.text,
        kind,
        points,
        image_ref: entity.image_ref,
        answer_details,
    })
}

fn choice_set(
    id: &str,
    options: IndexMap<String, String>,
    answer: &Value,
) -> Result<ChoiceSet, QuizError> {
    let raw = scalar_string(answer).ok_or_else(|| QuizError::InvalidAnswerShape {
        question: id.to_string(),
    })?;
    let needle = raw.trim().to_lowercase();
    let key = options
        .keys()
        .find(|key| key.trim().to_lowercase() == needle)
        .cloned()
        .ok_or_else(|| QuizError::AnswerNotAnOption {
            question: id.to_string(),
            answer: raw.clone(),
        })?;
    Ok(ChoiceSet {
        options,
        answer: key,
    })
}

/// String form of a scalar JSON value.
pub(crate) fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn sequence_strings(value: &Value) -> Option<Vec<String>> {
    value.as_array()?.iter().map(scalar_string).collect()
}

/// True when `candidate` uses every item exactly once.
pub(crate) fn is_arrangement_of(items: &[String], candidate: &[String]) -> bool {
    if items.len() != candidate.len() {
        return false;
    }
    let mut left = items.to_vec();
    let mut right = candidate.to_vec();
    left.sort();
    right.sort();
    left == right
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::json;

    use super::*;

    /// One round with one question of every type, plus a second short round.
    pub(crate) fn sample_quiz() -> QuizContent {
        let entity: QuizEntity = serde_json::from_value(json!({
            "subtitle": "Office party",
            "rounds": {
                "round1": {
                    "title": "General Knowledge",
                    "type": "knowledge",
                    "questions": {
                        "q1": { "type": "text_input", "text": "Capital of France?", "answer": "Paris" },
                        "q2": { "type": "true_false", "text": "The sun is a star.", "answer": true, "points": 5 },
                        "q3": {
                            "type": "multiple_choice",
                            "text": "Largest planet?",
                            "options": { "a": "Mars", "b": "Jupiter", "c": "Venus" },
                            "answer": "b",
                            "answerDetails": { "options": { "a": "Too small", "b": "Gas giant", "c": "Too hot" } }
                        },
                        "q4": {
                            "type": "ordering",
                            "text": "Oldest first",
                            "options": ["Rome", "Athens", "Babylon"],
                            "answer": ["Babylon", "Athens", "Rome"],
                            "answerDetails": [ { "option": "Babylon", "detail": "c. 2300 BC" } ]
                        }
                    }
                },
                "round2": {
                    "title": "Pictures",
                    "questions": {
                        "q1": {
                            "type": "image_input",
                            "text": "Who is this?",
                            "imageUrl": "img/who.png",
                            "answer": "Ada Lovelace",
                            "answerDetails": { "detail": "First programmer" }
                        }
                    }
                }
            }
        }))
        .unwrap();
        QuizContent::try_from(entity).unwrap()
    }

    fn single_question(question: Value) -> Result<QuizContent, QuizError> {
        let entity: QuizEntity = serde_json::from_value(json!({
            "rounds": { "r": { "title": "R", "questions": { "q": question } } }
        }))
        .unwrap();
        QuizContent::try_from(entity)
    }

    #[test]
    fn defaults_are_applied() {
        let quiz = sample_quiz();
        assert_eq!(quiz.title, DEFAULT_TITLE);
        assert_eq!(quiz.subtitle.as_deref(), Some("Office party"));

        let q1 = quiz.question("round1", "q1").unwrap();
        assert_eq!(q1.points, DEFAULT_POINTS);

        let q2 = quiz.question("round1", "q2").unwrap();
        assert_eq!(q2.points, 5);
        let set = q2.choices().unwrap();
        assert_eq!(set.answer, "true");
        assert_eq!(set.answer_label(), "True");
    }

    #[test]
    fn order_of_rounds_and_questions_is_preserved() {
        let quiz = sample_quiz();
        let ids: Vec<_> = quiz.rounds.keys().cloned().collect();
        assert_eq!(ids, ["round1", "round2"]);
        let round = quiz.first_round().unwrap();
        let ids: Vec<_> = round.questions.keys().cloned().collect();
        assert_eq!(ids, ["q1", "q2", "q3", "q4"]);
        assert_eq!(round.question_number("q3"), Some(3));
        assert_eq!(quiz.round_number("round2"), Some(2));
    }

    #[test]
    fn next_after_walks_questions_then_rounds_then_ends() {
        let quiz = sample_quiz();
        assert_eq!(
            quiz.next_after("round1", "q1"),
            Some(NextStep::Question {
                round_id: "round1".into(),
                question_id: "q2".into()
            })
        );
        assert_eq!(
            quiz.next_after("round1", "q4"),
            Some(NextStep::Round {
                round_id: "round2".into()
            })
        );
        assert_eq!(quiz.next_after("round2", "q1"), Some(NextStep::End));
        assert_eq!(quiz.next_after("round9", "q1"), None);
        assert_eq!(quiz.next_after("round1", "q9"), None);
    }

    #[test]
    fn answer_display_follows_question_type() {
        let quiz = sample_quiz();
        assert_eq!(quiz.question("round1", "q1").unwrap().answer_display(), "Paris");
        assert_eq!(quiz.question("round1", "q3").unwrap().answer_display(), "Jupiter");
        assert_eq!(
            quiz.question("round1", "q4").unwrap().answer_display(),
            "Babylon → Athens → Rome"
        );
    }

    #[test]
    fn submission_display_uses_labels_and_placeholder() {
        let quiz = sample_quiz();
        let q3 = quiz.question("round1", "q3").unwrap();
        assert_eq!(q3.submission_display(&StoredAnswer::default()), "No answer");
        assert_eq!(q3.submission_display(&StoredAnswer::Text("a".into())), "Mars");
        assert_eq!(q3.submission_display(&StoredAnswer::Text("zz".into())), "zz");

        let q4 = quiz.question("round1", "q4").unwrap();
        let seq = StoredAnswer::Sequence(vec!["Rome".into(), "Athens".into()]);
        assert_eq!(q4.submission_display(&seq), "Rome, Athens");
    }

    #[test]
    fn details_are_indexed_by_item_or_key() {
        let quiz = sample_quiz();
        assert_eq!(
            quiz.question("round1", "q4").unwrap().detail_for("Babylon"),
            Some("c. 2300 BC")
        );
        assert_eq!(
            quiz.question("round1", "q3").unwrap().detail_for("b"),
            Some("Gas giant")
        );
        let q = quiz.question("round2", "q1").unwrap();
        assert_eq!(q.single_detail(), Some("First programmer"));
        assert_eq!(q.image_ref.as_deref(), Some("img/who.png"));
    }

    #[test]
    fn rejects_choice_answer_outside_options() {
        let err = single_question(json!({
            "type": "multiple_choice", "text": "?", "options": {"a": "A"}, "answer": "b"
        }))
        .unwrap_err();
        assert!(matches!(err, QuizError::AnswerNotAnOption { .. }));
    }

    #[test]
    fn rejects_ordering_key_that_is_not_a_permutation() {
        let err = single_question(json!({
            "type": "ordering", "text": "?", "options": ["a", "b"], "answer": ["a", "a"]
        }))
        .unwrap_err();
        assert_eq!(err, QuizError::InvalidOrderingKey { question: "q".into() });
    }

    #[test]
    fn rejects_non_positive_points_and_unknown_types() {
        let err = single_question(json!({
            "type": "text_input", "text": "?", "answer": "x", "points": 0
        }))
        .unwrap_err();
        assert!(matches!(err, QuizError::InvalidPoints { points: 0, .. }));

        let err = single_question(json!({ "type": "essay", "text": "?", "answer": "x" })).unwrap_err();
        assert!(matches!(err, QuizError::UnknownQuestionType { .. }));
    }

    #[test]
    fn rejects_empty_rounds() {
        let entity: QuizEntity = serde_json::from_value(json!({
            "rounds": { "r": { "title": "R", "questions": {} } }
        }))
        .unwrap();
        assert_eq!(
            QuizContent::try_from(entity).unwrap_err(),
            QuizError::EmptyRound { round: "r".into() }
        );
    }

    #[test]
    fn numeric_answers_are_stringified() {
        let quiz = single_question(json!({ "type": "text_input", "text": "Year?", "answer": 1969 }))
            .unwrap();
        assert_eq!(quiz.question("r", "q").unwrap().answer_display(), "1969");
    }
}
