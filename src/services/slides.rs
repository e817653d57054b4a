//! Presenter projection: which slide the shared screen shows for a game state.

use serde::Serialize;
use utoipa::ToSchema;

use crate::state::{
    game::GameState,
    quiz::{DEFAULT_TITLE, Question, QuestionKind, QuizContent},
    state_machine::GamePhase,
};

/// Subtitle of the welcome slide shown when the position cannot be resolved.
pub const FALLBACK_SUBTITLE: &str = "Please wait...";

/// One line of the answer-reveal slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RevealLine {
    /// Option label or ordering item.
    pub label: String,
    /// Explanation authored for this line.
    pub detail: Option<String>,
    /// Whether this line is (part of) the correct answer.
    pub correct: bool,
}

/// Slide rendered by the presenter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "slide", rename_all = "snake_case")]
pub enum Slide {
    /// Game state or quiz content not available yet.
    Loading,
    /// Lobby, end of game and fallback screen.
    Welcome {
        /// Quiz title.
        title: String,
        /// Event name, or the fallback notice.
        subtitle: Option<String>,
    },
    /// Round title card.
    Round {
        /// 1-based round number.
        round_number: usize,
        /// Round title.
        title: String,
        /// Presentation tag of the round.
        round_type: Option<String>,
    },
    /// Open question. Never carries the answer key.
    Question {
        /// 1-based round number.
        round_number: usize,
        /// 1-based position within the round.
        question_number: usize,
        /// Question text.
        text: String,
        /// Choice labels, in display order.
        options: Vec<String>,
        /// Picture shown with the question.
        image_ref: Option<String>,
        /// Points at stake.
        points: u32,
    },
    /// Question closed, answer shown.
    AnswerReveal {
        /// 1-based position within the round.
        question_number: usize,
        /// Question text.
        text: String,
        /// Formatted correct answer.
        answer: String,
        /// Options or items with their explanations.
        lines: Vec<RevealLine>,
        /// Explanation for the whole question.
        note: Option<String>,
    },
}

/// Derive the slide for a game state. Total and side-effect free: anything
/// that cannot be resolved yields the fallback welcome slide.
pub fn derive_slide(state: Option<&GameState>, quiz: Option<&QuizContent>) -> Slide {
    let (Some(state), Some(quiz)) = (state, quiz) else {
        return Slide::Loading;
    };

    match state.phase {
        GamePhase::Waiting | GamePhase::Ended => Slide::Welcome {
            title: quiz.title.clone(),
            subtitle: quiz.subtitle.clone(),
        },
        GamePhase::RoundInterstitial => quiz
            .current_round(state)
            .map(|round| Slide::Round {
                round_number: quiz.round_number(&round.id).unwrap_or(1),
                title: round.title.clone(),
                round_type: round.round_type.clone(),
            })
            .unwrap_or_else(|| fallback(quiz)),
        GamePhase::Active => match (quiz.current_round(state), quiz.current_question(state)) {
            (Some(round), Some(question)) => Slide::Question {
                round_number: quiz.round_number(&round.id).unwrap_or(1),
                question_number: round.question_number(&question.id).unwrap_or(1),
                text: question.text.clone(),
                options: question
                    .choices()
                    .map(|set| set.options.values().cloned().collect())
                    .unwrap_or_default(),
                image_ref: question.image_ref.clone(),
                points: question.points,
            },
            _ => fallback(quiz),
        },
        GamePhase::Moderating => match (quiz.current_round(state), quiz.current_question(state)) {
            (Some(round), Some(question)) => Slide::AnswerReveal {
                question_number: round.question_number(&question.id).unwrap_or(1),
                text: question.text.clone(),
                answer: question.answer_display(),
                lines: reveal_lines(question),
                note: question.single_detail().map(str::to_string),
            },
            _ => fallback(quiz),
        },
    }
}

fn fallback(quiz: &QuizContent) -> Slide {
    Slide::Welcome {
        title: if quiz.title.is_empty() {
            DEFAULT_TITLE.to_string()
        } else {
            quiz.title.clone()
        },
        subtitle: Some(FALLBACK_SUBTITLE.to_string()),
    }
}

fn reveal_lines(question: &Question) -> Vec<RevealLine> {
    match &question.kind {
        QuestionKind::Ordering { answer, .. } => answer
            .iter()
            .map(|item| RevealLine {
                label: item.clone(),
                detail: question.detail_for(item).map(str::to_string),
                correct: true,
            })
            .collect(),
        QuestionKind::MultipleChoice(set) | QuestionKind::TrueFalse(set) => set
            .options
            .iter()
            .map(|(key, label)| RevealLine {
                label: label.clone(),
                detail: question.detail_for(key).map(str::to_string),
                correct: *key == set.answer,
            })
            .collect(),
        QuestionKind::TextInput { .. } | QuestionKind::ImageInput { .. } => Vec::new(),
    }
}
