//! Presenter observer: keeps the slide for the shared screen in sync with the store.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    dao::{
        live_game::{LiveGameRepository, decode_game_state, decode_quiz_id},
        shared_store::SharedStore,
    },
    error::ServiceError,
    services::slides::{Slide, derive_slide},
    state::{game::GameState, quiz::QuizContent},
};

/// Read-only observer of `liveGame/gameState` and `liveGame/activeQuizId`.
pub struct PresenterProjection {
    repo: LiveGameRepository,
    slide: watch::Sender<Slide>,
}

impl PresenterProjection {
    /// Projection showing [`Slide::Loading`] until [`run`](Self::run) starts.
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        let (slide, _rx) = watch::channel(Slide::Loading);
        Self {
            repo: LiveGameRepository::new(store),
            slide,
        }
    }

    /// Slide currently on screen.
    pub fn current(&self) -> Slide {
        self.slide.borrow().clone()
    }

    /// Receiver notified on every slide change.
    pub fn watch(&self) -> watch::Receiver<Slide> {
        self.slide.subscribe()
    }

    /// Follow the store until its subscriptions close, calling `on_change`
    /// for every slide that differs from the previous one.
    pub async fn run<F>(self: Arc<Self>, mut on_change: F) -> Result<(), ServiceError>
    where
        F: FnMut(&Slide) + Send,
    {
        let mut quiz_ids = self.repo.subscribe_active_quiz_id().await?;
        let mut states = self.repo.subscribe_game_state().await?;
        let mut quiz_id: Option<String> = None;
        let mut quiz: Option<QuizContent> = None;
        let mut state: Option<GameState> = None;

        info!("presenter projection started");
        loop {
            tokio::select! {
                snapshot = quiz_ids.recv() => {
                    let Some(snapshot) = snapshot else { break };
                    let id = decode_quiz_id(&snapshot);
                    if id != quiz_id {
                        quiz = match id.as_deref() {
                            Some(id) => self.load_quiz(id).await,
                            None => None,
                        };
                        quiz_id = id;
                    }
                }
                snapshot = states.recv() => {
                    let Some(snapshot) = snapshot else { break };
                    state = decode_game_state(&snapshot);
                    // the quiz may have been published after its id
                    if quiz.is_none() {
                        if let Some(id) = quiz_id.as_deref() {
                            quiz = self.load_quiz(id).await;
                        }
                    }
                }
            }

            let next = derive_slide(state.as_ref(), quiz.as_ref());
            let changed = self.slide.send_if_modified(|current| {
                if *current == next {
                    false
                } else {
                    *current = next.clone();
                    true
                }
            });
            if changed {
                debug!(slide = ?next, "presenter slide changed");
                on_change(&next);
            }
        }

        info!("presenter projection stopped");
        Ok(())
    }

    async fn load_quiz(&self, id: &str) -> Option<QuizContent> {
        match self.repo.quiz(id).await {
            Ok(Some(entity)) => match QuizContent::try_from(entity) {
                Ok(content) => Some(content),
                Err(err) => {
                    warn!(quiz_id = %id, error = %err, "active quiz is invalid");
                    None
                }
            },
            Ok(None) => {
                warn!(quiz_id = %id, "active quiz does not exist");
                None
            }
            Err(err) => {
                warn!(quiz_id = %id, error = %err, "failed to read active quiz");
                None
            }
        }
    }
}
