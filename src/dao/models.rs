use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{NoneAsEmptyString, serde_as};

/// Game position as stored under `liveGame/gameState`.
#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameStateEntity {
    /// Phase name, e.g. `active`.
    pub phase: String,
    /// Empty string when no round is selected.
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub current_round_id: Option<String>,
    /// Empty string when no question is selected.
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub current_question_id: Option<String>,
}

/// Player record as stored under `liveGame/players/{name}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerEntity {
    /// Committed total.
    #[serde(default)]
    pub score: u32,
    /// Empty string, choice key, free text or item list.
    #[serde(default = "empty_answer")]
    pub answer: Value,
}

fn empty_answer() -> Value {
    Value::String(String::new())
}

/// Quiz script as stored under `quizzes/{id}`. Map order is play order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizEntity {
    /// Headline shown on the welcome slide.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Secondary line shown on the welcome slide (event name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    /// Rounds keyed by their identifier.
    #[serde(default)]
    pub rounds: IndexMap<String, RoundEntity>,
}

/// Round entry inside a quiz.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundEntity {
    /// Title shown on the round slide.
    pub title: String,
    /// Presentation tag (e.g. "music", "geography").
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub round_type: Option<String>,
    /// Questions keyed by their identifier.
    #[serde(default)]
    pub questions: IndexMap<String, QuestionEntity>,
}

/// Question entry inside a round, as authored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionEntity {
    /// One of the question type names, e.g. `multiple_choice`.
    #[serde(rename = "type")]
    pub question_type: String,
    /// Question as read out.
    pub text: String,
    /// Choice map for choice questions or item list for ordering questions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<OptionsEntity>,
    /// Answer key; a string, a number/boolean or a list depending on the type.
    pub answer: Value,
    /// Points awarded for a correct answer; defaults to 10.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<i64>,
    /// Picture shown with the question.
    #[serde(
        default,
        alias = "imageUrl",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_ref: Option<String>,
    /// Explanations shown on the reveal slide.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_details: Option<AnswerDetailsEntity>,
}

/// Options as stored: a key→label map or an ordered item list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OptionsEntity {
    /// Items of an ordering question.
    Items(Vec<String>),
    /// Key → label of a choice question.
    Choices(IndexMap<String, String>),
}

/// Supplementary reveal text as stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AnswerDetailsEntity {
    /// One detail per ordering item.
    PerItem(Vec<ItemDetailEntity>),
    /// One detail per choice key.
    PerOption {
        /// Choice key → detail.
        options: IndexMap<String, String>,
    },
    /// One detail for the whole question.
    Single {
        /// Detail text.
        detail: String,
    },
}

/// Explanation attached to one ordering item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemDetailEntity {
    /// Ordering item the detail belongs to.
    pub option: String,
    /// Detail text.
    pub detail: String,
}
