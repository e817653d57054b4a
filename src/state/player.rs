//! Player agent: joins the game, derives what a player should see and submits
//! at most one answer per question.

use std::sync::Arc;

use async_stream::stream;
use futures::Stream;
use rand::{rng, seq::SliceRandom};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::{
    dao::{
        live_game::{LiveGameRepository, decode_game_state},
        shared_store::SharedStore,
    },
    dto::validation::validate_player_name,
    error::ServiceError,
    state::{
        game::{AnswerPayload, GameState, PlayerRecord, StoredAnswer},
        quiz::{QuestionKind, QuizContent, load_active_quiz},
        state_machine::GamePhase,
    },
};

/// One selectable option of a choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ChoiceOption {
    /// Value to submit.
    pub key: String,
    /// Text on the button.
    pub label: String,
}

/// Input surface matching the question type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerSurface {
    /// One button per option; the key is submitted.
    Choices {
        /// Options in display order.
        options: Vec<ChoiceOption>,
    },
    /// Text box, optionally under an image.
    FreeText {
        /// Picture to identify.
        image_ref: Option<String>,
    },
    /// Items to drag into order, shuffled once per question.
    Ordering {
        /// Items in their initial shuffled order.
        items: Vec<String>,
    },
}

/// What a player's screen shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum PlayerView {
    /// Quiz content is not available yet.
    Loading,
    /// Waiting for the master to begin.
    Lobby {
        /// Name the player joined with.
        player: String,
    },
    /// Round title card.
    RoundIntro {
        /// 1-based round number.
        round_number: usize,
        /// Round title.
        title: String,
    },
    /// Question open for answers.
    Question {
        /// Round being played.
        round_id: String,
        /// Open question.
        question_id: String,
        /// 1-based position within the round.
        question_number: usize,
        /// Question text.
        text: String,
        /// Points at stake.
        points: u32,
        /// How to answer.
        surface: AnswerSurface,
        /// An answer was already recorded for this question.
        submitted: bool,
    },
    /// Answers closed; the correct answer is shown.
    Reveal {
        /// Question text.
        text: String,
        /// Formatted answer key.
        correct_answer: String,
        /// Formatted submission, or "No answer".
        your_answer: String,
    },
    /// Game over.
    Ended {
        /// Final committed total.
        score: u32,
    },
}

type Position = (String, String);

/// Client-local bookkeeping; the store does not version answers by question.
#[derive(Debug, Default)]
struct SubmissionTracker {
    submitted_for: Option<Position>,
    seen: Option<Position>,
    shuffled: Vec<String>,
}

impl SubmissionTracker {
    /// Register that `position` is on screen. The first time a question is
    /// seen, a non-empty stored answer marks it as already submitted.
    fn observe(&mut self, position: &Position, record: Option<&PlayerRecord>, items: &[String]) {
        if self.seen.as_ref() == Some(position) {
            return;
        }
        self.seen = Some(position.clone());
        self.shuffled = items.to_vec();
        self.shuffled.shuffle(&mut rng());
        if record.is_some_and(|record| !record.answer.is_empty()) {
            self.submitted_for = Some(position.clone());
        }
    }

    fn submitted(&self, position: &Position) -> bool {
        self.submitted_for.as_ref() == Some(position)
    }

    /// Forget every position; a new game can revisit the same questions.
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// One player's client-side logic.
pub struct PlayerAgent {
    name: String,
    repo: LiveGameRepository,
    quiz: RwLock<Option<Arc<QuizContent>>>,
    tracker: Mutex<SubmissionTracker>,
}

impl PlayerAgent {
    /// Join the live game under `raw_name` (trimmed). A record that already
    /// exists is reused so a reloading client keeps its score.
    pub async fn join(store: Arc<dyn SharedStore>, raw_name: &str) -> Result<Self, ServiceError> {
        validate_player_name(raw_name).map_err(|err| {
            ServiceError::InvalidInput(
                err.message
                    .map(|message| message.to_string())
                    .unwrap_or_else(|| "invalid player name".into()),
            )
        })?;
        let name = raw_name.trim().to_string();
        let repo = LiveGameRepository::new(store);

        if repo.player(&name).await?.is_some() {
            info!(player = %name, "player re-attached to existing record");
        } else {
            repo.put_player(&name, &PlayerRecord::default()).await?;
            info!(player = %name, "player joined");
        }

        Ok(Self {
            name,
            repo,
            quiz: RwLock::new(None),
            tracker: Mutex::new(SubmissionTracker::default()),
        })
    }

    /// Trimmed player name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Submit an answer for the open question.
    pub async fn submit_answer(&self, raw: Value) -> Result<(), ServiceError> {
        let state = self
            .repo
            .game_state()
            .await?
            .filter(|state| state.phase == GamePhase::Active)
            .ok_or_else(|| ServiceError::InvalidState("no question is open".into()))?;
        let quiz = self.quiz().await?;
        let question = quiz.current_question(&state).ok_or_else(|| {
            ServiceError::InvalidState("the open question is not part of the loaded quiz".into())
        })?;
        let position = (
            state.current_round_id.clone().unwrap_or_default(),
            question.id.clone(),
        );

        let payload = AnswerPayload::interpret(question, &StoredAnswer::from(raw))
            .and_then(|payload| payload.validate_for(question).map(|()| payload))
            .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

        let mut tracker = self.tracker.lock().await;
        if tracker.submitted(&position) {
            return Err(ServiceError::InvalidState(
                "an answer was already submitted for this question".into(),
            ));
        }
        // Best effort only: another tab may still write between this read and
        // the write below.
        let record = self.repo.player(&self.name).await?.ok_or_else(|| {
            ServiceError::NotFound(format!("player `{}` is no longer in the game", self.name))
        })?;
        if !record.answer.is_empty() {
            tracker.submitted_for = Some(position);
            return Err(ServiceError::InvalidState(
                "an answer was already submitted for this question".into(),
            ));
        }

        self.repo
            .write_answer(&self.name, &payload.into_stored())
            .await?;
        tracker.submitted_for = Some(position);
        info!(player = %self.name, question = %question.id, "answer submitted");
        Ok(())
    }

    /// View for the game state currently in the store.
    pub async fn current_view(&self) -> Result<PlayerView, ServiceError> {
        let state = self.repo.game_state().await?;
        Ok(self.view_for(state.as_ref()).await)
    }

    /// View for a given game state. Store failures degrade to what can be
    /// derived without them.
    pub async fn view_for(&self, state: Option<&GameState>) -> PlayerView {
        let Some(state) = state else {
            return PlayerView::Lobby {
                player: self.name.clone(),
            };
        };
        let quiz = match self.quiz().await {
            Ok(quiz) => quiz,
            Err(err) => {
                debug!(player = %self.name, error = %err, "quiz unavailable for player view");
                return PlayerView::Loading;
            }
        };
        let record = match self.repo.player(&self.name).await {
            Ok(record) => record,
            Err(err) => {
                warn!(player = %self.name, error = %err, "failed to read player record");
                None
            }
        };

        let mut tracker = self.tracker.lock().await;
        derive_player_view(&self.name, state, &quiz, record.as_ref(), &mut tracker)
    }

    /// Views derived from every game state change, starting with the current one.
    pub fn views(self: Arc<Self>) -> impl Stream<Item = PlayerView> + Send + 'static {
        stream! {
            let mut subscription = match self.repo.subscribe_game_state().await {
                Ok(subscription) => subscription,
                Err(err) => {
                    warn!(player = %self.name, error = %err, "cannot watch game state");
                    return;
                }
            };
            while let Some(snapshot) = subscription.recv().await {
                let state = decode_game_state(&snapshot);
                yield self.view_for(state.as_ref()).await;
            }
        }
    }

    async fn quiz(&self) -> Result<Arc<QuizContent>, ServiceError> {
        if let Some(quiz) = self.quiz.read().await.as_ref() {
            return Ok(quiz.clone());
        }
        let (_, content) = load_active_quiz(&self.repo).await?;
        let content = Arc::new(content);
        *self.quiz.write().await = Some(content.clone());
        Ok(content)
    }
}

fn derive_player_view(
    name: &str,
    state: &GameState,
    quiz: &QuizContent,
    record: Option<&PlayerRecord>,
    tracker: &mut SubmissionTracker,
) -> PlayerView {
    let lobby = || PlayerView::Lobby {
        player: name.to_string(),
    };

    match state.phase {
        GamePhase::Waiting => {
            tracker.reset();
            lobby()
        }
        GamePhase::Ended => {
            tracker.reset();
            PlayerView::Ended {
                score: record.map(|record| record.score).unwrap_or(0),
            }
        }
        GamePhase::RoundInterstitial => {
            let Some(round) = quiz.current_round(state) else {
                return lobby();
            };
            PlayerView::RoundIntro {
                round_number: quiz.round_number(&round.id).unwrap_or(1),
                title: round.title.clone(),
            }
        }
        GamePhase::Active => {
            let (Some(round), Some(question)) =
                (quiz.current_round(state), quiz.current_question(state))
            else {
                return lobby();
            };
            let position = (round.id.clone(), question.id.clone());
            let items: &[String] = match &question.kind {
                QuestionKind::Ordering { items, .. } => items.as_slice(),
                _ => &[],
            };
            tracker.observe(&position, record, items);

            let surface = match &question.kind {
                QuestionKind::MultipleChoice(set) | QuestionKind::TrueFalse(set) => {
                    AnswerSurface::Choices {
                        options: set
                            .options
                            .iter()
                            .map(|(key, label)| ChoiceOption {
                                key: key.clone(),
                                label: label.clone(),
                            })
                            .collect(),
                    }
                }
                QuestionKind::TextInput { .. } | QuestionKind::ImageInput { .. } => {
                    AnswerSurface::FreeText {
                        image_ref: question.image_ref.clone(),
                    }
                }
                QuestionKind::Ordering { .. } => AnswerSurface::Ordering {
                    items: tracker.shuffled.clone(),
                },
            };

            PlayerView::Question {
                question_number: round.question_number(&question.id).unwrap_or(1),
                round_id: position.0.clone(),
                question_id: position.1.clone(),
                text: question.text.clone(),
                points: question.points,
                surface,
                submitted: tracker.submitted(&position),
            }
        }
        GamePhase::Moderating => {
            let Some(question) = quiz.current_question(state) else {
                return lobby();
            };
            let answer = record.map(|record| record.answer.clone()).unwrap_or_default();
            PlayerView::Reveal {
                text: question.text.clone(),
                correct_answer: question.answer_display(),
                your_answer: question.submission_display(&answer),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        dao::{memory_store::MemoryStore, models::QuizEntity, paths},
        state::master::MasterController,
    };

    async fn setup() -> (MemoryStore, MasterController) {
        let store = MemoryStore::new();
        let master = MasterController::new(Arc::new(store.clone()));
        let quiz: QuizEntity = serde_json::from_value(json!({
            "rounds": {
                "r1": {
                    "title": "Mixed",
                    "questions": {
                        "q1": {
                            "type": "multiple_choice",
                            "text": "Largest planet?",
                            "options": { "a": "Mars", "b": "Jupiter" },
                            "answer": "b"
                        },
                        "q2": {
                            "type": "ordering",
                            "text": "Smallest first",
                            "options": ["1", "10", "100", "1000"],
                            "answer": ["1", "10", "100", "1000"]
                        }
                    }
                }
            }
        }))
        .unwrap();
        master
            .repository()
            .publish_quiz("t", &quiz)
            .await
            .unwrap();
        master.start().await.unwrap();
        (store, master)
    }

    #[tokio::test]
    async fn join_trims_and_rejects_bad_names() {
        let (store, _master) = setup().await;
        let agent = PlayerAgent::join(Arc::new(store.clone()), "  Alice ")
            .await
            .unwrap();
        assert_eq!(agent.name(), "Alice");
        assert_eq!(
            store.read(&paths::player("Alice")).await.unwrap(),
            Some(json!({"score": 0, "answer": ""}))
        );

        for bad in ["", "a.b", "x/y"] {
            assert!(matches!(
                PlayerAgent::join(Arc::new(store.clone()), bad).await,
                Err(ServiceError::InvalidInput(_))
            ));
        }
    }

    #[tokio::test]
    async fn rejoin_keeps_the_existing_record() {
        let (store, master) = setup().await;
        master
            .repository()
            .put_player(
                "Alice",
                &PlayerRecord {
                    score: 30,
                    ..PlayerRecord::default()
                },
            )
            .await
            .unwrap();
        PlayerAgent::join(Arc::new(store.clone()), "Alice")
            .await
            .unwrap();
        assert_eq!(
            store.read(&paths::player_score("Alice")).await.unwrap(),
            Some(json!(30))
        );
    }

    #[tokio::test]
    async fn submissions_require_an_open_question_and_happen_once() {
        let (store, master) = setup().await;
        let agent = PlayerAgent::join(Arc::new(store.clone()), "Alice")
            .await
            .unwrap();

        assert!(matches!(
            agent.submit_answer(json!("b")).await,
            Err(ServiceError::InvalidState(_))
        ));

        master.advance().await.unwrap();
        master.advance().await.unwrap();

        assert!(matches!(
            agent.submit_answer(json!("z")).await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            agent.submit_answer(json!(["a"])).await,
            Err(ServiceError::InvalidInput(_))
        ));
        agent.submit_answer(json!("b")).await.unwrap();
        assert!(matches!(
            agent.submit_answer(json!("a")).await,
            Err(ServiceError::InvalidState(_))
        ));
        assert_eq!(
            store.read(&paths::player_answer("Alice")).await.unwrap(),
            Some(json!("b"))
        );
    }

    #[tokio::test]
    async fn reloaded_client_rehydrates_submitted_flag() {
        let (store, master) = setup().await;
        let first = PlayerAgent::join(Arc::new(store.clone()), "Alice")
            .await
            .unwrap();
        master.advance().await.unwrap();
        master.advance().await.unwrap();
        first.submit_answer(json!("a")).await.unwrap();

        let reloaded = PlayerAgent::join(Arc::new(store.clone()), "Alice")
            .await
            .unwrap();
        match reloaded.current_view().await.unwrap() {
            PlayerView::Question { submitted, .. } => assert!(submitted),
            other => panic!("unexpected view {other:?}"),
        }
        assert!(matches!(
            reloaded.submit_answer(json!("b")).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn ordering_surface_is_shuffled_once_per_question() {
        let (store, master) = setup().await;
        let agent = PlayerAgent::join(Arc::new(store.clone()), "Alice")
            .await
            .unwrap();
        master.advance().await.unwrap();
        master.advance().await.unwrap();
        agent.submit_answer(json!("b")).await.unwrap();
        master.reveal().await.unwrap();

        match agent.current_view().await.unwrap() {
            PlayerView::Reveal {
                correct_answer,
                your_answer,
                ..
            } => {
                assert_eq!(correct_answer, "Jupiter");
                assert_eq!(your_answer, "Jupiter");
            }
            other => panic!("unexpected view {other:?}"),
        }

        master.advance().await.unwrap();
        let first = agent.current_view().await.unwrap();
        let second = agent.current_view().await.unwrap();
        assert_eq!(first, second);
        match first {
            PlayerView::Question {
                surface: AnswerSurface::Ordering { mut items },
                submitted,
                question_number,
                ..
            } => {
                assert!(!submitted);
                assert_eq!(question_number, 2);
                items.sort();
                assert_eq!(items, ["1", "10", "100", "1000"]);
            }
            other => panic!("unexpected view {other:?}"),
        }

        assert!(matches!(
            agent.submit_answer(json!(["1", "10"])).await,
            Err(ServiceError::InvalidInput(_))
        ));
        agent
            .submit_answer(json!(["1000", "100", "10", "1"]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn restart_forgets_previous_submissions() {
        let (store, master) = setup().await;
        let agent = PlayerAgent::join(Arc::new(store.clone()), "Alice")
            .await
            .unwrap();
        master.advance().await.unwrap();
        master.advance().await.unwrap();
        agent.submit_answer(json!("b")).await.unwrap();

        master.start().await.unwrap();
        assert!(matches!(
            agent.current_view().await.unwrap(),
            PlayerView::Lobby { .. }
        ));
        PlayerAgent::join(Arc::new(store.clone()), "Alice")
            .await
            .unwrap();
        master.advance().await.unwrap();
        master.advance().await.unwrap();

        match agent.current_view().await.unwrap() {
            PlayerView::Question {
                question_id,
                submitted,
                ..
            } => {
                assert_eq!(question_id, "q1");
                assert!(!submitted);
            }
            other => panic!("unexpected view {other:?}"),
        }
        agent.submit_answer(json!("a")).await.unwrap();
    }

    #[tokio::test]
    async fn view_stream_follows_the_game() {
        use futures::StreamExt;

        let (store, master) = setup().await;
        let agent = Arc::new(
            PlayerAgent::join(Arc::new(store.clone()), "Alice")
                .await
                .unwrap(),
        );
        let mut views = Box::pin(agent.clone().views());
        assert_eq!(
            views.next().await,
            Some(PlayerView::Lobby {
                player: "Alice".into()
            })
        );

        master.advance().await.unwrap();
        assert_eq!(
            views.next().await,
            Some(PlayerView::RoundIntro {
                round_number: 1,
                title: "Mixed".into()
            })
        );

        master.advance().await.unwrap();
        assert!(matches!(
            views.next().await,
            Some(PlayerView::Question { .. })
        ));
    }
}
