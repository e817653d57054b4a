//! Master controller: the only writer of the game state and of player scores.

use std::{sync::Arc, time::Duration};

use indexmap::IndexMap;
use tokio::{
    sync::{Mutex, MutexGuard, RwLock},
    time::timeout,
};
use tracing::{info, warn};

use crate::{
    dao::{
        live_game::{LiveGameRepository, LivePatch},
        shared_store::SharedStore,
    },
    error::ServiceError,
    services::grading,
    state::{
        game::GameState,
        moderation::ModerationDraft,
        quiz::{NextStep, QuizContent, load_active_quiz},
        state_machine::{
            AbortError, ApplyError, FinishReason, GameEvent, GamePhase, GameStateMachine, Plan,
            PlanError, PlanId, Snapshot,
        },
    },
};

/// Default upper bound for the store writes of one command.
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of a master command.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterOutcome {
    /// Game state after the command.
    pub state: Option<GameState>,
    /// Draft scores after the command.
    pub draft: ModerationDraft,
    /// Totals written by a score commit.
    pub committed: Option<IndexMap<String, u32>>,
    /// Draft discarded by a forced end.
    pub forfeited: Option<ModerationDraft>,
}

impl MasterOutcome {
    fn new(state: Option<GameState>, draft: ModerationDraft) -> Self {
        Self {
            state,
            draft,
            committed: None,
            forfeited: None,
        }
    }

    /// Phase after the command.
    pub fn phase(&self) -> Option<GamePhase> {
        self.state.as_ref().map(|state| state.phase)
    }
}

/// Issues validated transitions, grades answers and commits moderated scores.
///
/// Commands are serialised by a gate; before planning, the local state machine
/// is synced with the game state read from the store.
pub struct MasterController {
    repo: LiveGameRepository,
    machine: RwLock<GameStateMachine>,
    quiz: RwLock<Option<Arc<QuizContent>>>,
    draft: RwLock<ModerationDraft>,
    transition_gate: Mutex<()>,
    transition_timeout: Option<Duration>,
}

impl MasterController {
    /// Controller over `store` with no transition timeout.
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self {
            repo: LiveGameRepository::new(store),
            machine: RwLock::new(GameStateMachine::new()),
            quiz: RwLock::new(None),
            draft: RwLock::new(ModerationDraft::new()),
            transition_gate: Mutex::new(()),
            transition_timeout: Some(DEFAULT_TRANSITION_TIMEOUT),
        }
    }

    /// Override the per-command write timeout; `None` disables it.
    pub fn with_transition_timeout(mut self, limit: Option<Duration>) -> Self {
        self.transition_timeout = limit;
        self
    }

    /// Repository used for every store access.
    pub fn repository(&self) -> &LiveGameRepository {
        &self.repo
    }

    /// Current draft scores.
    pub async fn draft(&self) -> ModerationDraft {
        self.draft.read().await.clone()
    }

    /// Snapshot of the local state machine.
    pub async fn snapshot(&self) -> Snapshot {
        self.machine.read().await.snapshot()
    }

    /// Quiz content in use, loading it on first access.
    pub async fn quiz(&self) -> Result<Arc<QuizContent>, ServiceError> {
        if let Some(quiz) = self.quiz.read().await.as_ref() {
            return Ok(quiz.clone());
        }
        self.reload_quiz().await
    }

    /// Read the active quiz from the store and cache it.
    pub async fn reload_quiz(&self) -> Result<Arc<QuizContent>, ServiceError> {
        let (id, content) = load_active_quiz(&self.repo).await?;
        let content = Arc::new(content);
        *self.quiz.write().await = Some(content.clone());
        info!(quiz_id = %id, rounds = content.rounds.len(), "quiz content loaded");
        Ok(content)
    }

    /// Reset the game: phase waiting, every player record removed.
    pub async fn start(&self) -> Result<MasterOutcome, ServiceError> {
        let gate = self.transition_gate.lock().await;
        self.sync().await?;
        self.reload_quiz().await?;

        let repo = self.repo.clone();
        let state = self
            .run_transition(&gate, GameEvent::Start, |next| async move {
                let patch = LivePatch::new().game_state(&next)?.reset_players();
                repo.apply(patch).await?;
                Ok(())
            })
            .await
            .map(|((), state)| state)?;

        self.draft.write().await.take();
        info!("game reset to lobby");
        Ok(MasterOutcome::new(Some(state), ModerationDraft::new()))
    }

    /// Move forward: open the first round, open the round's first question, or
    /// commit the draft and move past the question under moderation.
    pub async fn advance(&self) -> Result<MasterOutcome, ServiceError> {
        let gate = self.transition_gate.lock().await;
        let current = self.sync().await?;
        let quiz = self.quiz().await?;

        match current.as_ref().map(|state| state.phase) {
            None | Some(GamePhase::Waiting) | Some(GamePhase::Ended) => {
                let Some(round) = quiz.first_round() else {
                    info!("quiz has no rounds; nothing to advance to");
                    return Ok(MasterOutcome::new(current, self.draft().await));
                };
                let event = GameEvent::OpenRound {
                    round_id: round.id.clone(),
                };
                let state = self.write_state(&gate, event).await?;
                Ok(MasterOutcome::new(Some(state), self.draft().await))
            }
            Some(GamePhase::RoundInterstitial) => {
                let round = current
                    .as_ref()
                    .and_then(|state| quiz.current_round(state))
                    .ok_or_else(|| unresolvable(current.as_ref()))?;
                let question = round.first_question().ok_or_else(|| {
                    ServiceError::InvalidState(format!("round `{}` has no questions", round.id))
                })?;
                let event = GameEvent::OpenQuestion {
                    round_id: round.id.clone(),
                    question_id: question.id.clone(),
                };
                let state = self.open_question(&gate, event).await?;
                Ok(MasterOutcome::new(Some(state), self.draft().await))
            }
            Some(GamePhase::Active) => Err(ServiceError::InvalidState(
                "reveal the current question before advancing".into(),
            )),
            Some(GamePhase::Moderating) => self.commit_and_advance(&gate, current, &quiz).await,
        }
    }

    /// Close answers, grade every submission from one snapshot and enter
    /// moderation.
    pub async fn reveal(&self) -> Result<MasterOutcome, ServiceError> {
        let gate = self.transition_gate.lock().await;
        let current = self.sync().await?;
        let quiz = self.quiz().await?;
        let question = current
            .as_ref()
            .and_then(|state| quiz.current_question(state))
            .cloned();

        let repo = self.repo.clone();
        let (draft, state) = self
            .run_transition(&gate, GameEvent::Reveal, |next| async move {
                let question = question.ok_or_else(|| unresolvable(Some(&next)))?;
                let players = repo.players().await?;
                let suggestions = grading::grade_all(&question, &players);
                repo.apply(LivePatch::new().game_state(&next)?).await?;
                info!(
                    question = %question.id,
                    graded = suggestions.len(),
                    correct = suggestions.values().filter(|points| **points > 0).count(),
                    "answers graded"
                );
                Ok(ModerationDraft::from_suggestions(suggestions))
            })
            .await?;

        *self.draft.write().await = draft.clone();
        Ok(MasterOutcome::new(Some(state), draft))
    }

    /// Force the game to end. Pending draft scores are forfeited.
    pub async fn end(&self) -> Result<MasterOutcome, ServiceError> {
        let gate = self.transition_gate.lock().await;
        self.sync().await?;

        let state = self
            .write_state(&gate, GameEvent::Finish(FinishReason::ManualStop))
            .await?;

        let forfeited = self.draft.write().await.take();
        if !forfeited.is_empty() {
            warn!(
                players = forfeited.iter().count(),
                "game ended during moderation; draft scores were not committed"
            );
        }
        let mut outcome = MasterOutcome::new(Some(state), ModerationDraft::new());
        outcome.forfeited = Some(forfeited);
        Ok(outcome)
    }

    /// Add `delta` to a player's draft score. Only valid while moderating.
    pub async fn adjust_draft_score(&self, player: &str, delta: i64) -> Result<u32, ServiceError> {
        self.edit_draft(player, |draft| draft.adjust(player, delta))
            .await
    }

    /// Replace a player's draft score. Only valid while moderating.
    pub async fn set_draft_score(&self, player: &str, value: i64) -> Result<u32, ServiceError> {
        self.edit_draft(player, |draft| draft.set(player, value))
            .await
    }

    async fn edit_draft<F>(&self, player: &str, edit: F) -> Result<u32, ServiceError>
    where
        F: FnOnce(&mut ModerationDraft) -> u32,
    {
        let _gate = self.transition_gate.lock().await;
        let current = self.sync().await?;
        if current.as_ref().map(|state| state.phase) != Some(GamePhase::Moderating) {
            return Err(ServiceError::InvalidState(
                "draft scores can only be edited while moderating".into(),
            ));
        }
        if self.repo.player(player).await?.is_none() {
            return Err(ServiceError::NotFound(format!("player `{player}` has not joined")));
        }

        let score = edit(&mut *self.draft.write().await);
        info!(player, score, "draft score edited");
        Ok(score)
    }

    async fn commit_and_advance(
        &self,
        gate: &MutexGuard<'_, ()>,
        current: Option<GameState>,
        quiz: &QuizContent,
    ) -> Result<MasterOutcome, ServiceError> {
        let next_step = current
            .as_ref()
            .and_then(GameState::position)
            .and_then(|(round, question)| quiz.next_after(round, question))
            .ok_or_else(|| unresolvable(current.as_ref()))?;

        let (event, clear_answers) = match next_step {
            NextStep::Question {
                round_id,
                question_id,
            } => (
                GameEvent::OpenQuestion {
                    round_id,
                    question_id,
                },
                true,
            ),
            NextStep::Round { round_id } => (GameEvent::OpenRound { round_id }, false),
            NextStep::End => (GameEvent::Finish(FinishReason::QuizCompleted), false),
        };

        let draft = self.draft().await;
        let repo = self.repo.clone();
        let (totals, state) = self
            .run_transition(gate, event, |next| async move {
                let players = repo.players().await?;
                let totals = draft.commit_totals(&players);
                let mut patch = LivePatch::new().game_state(&next)?;
                for (name, total) in &totals {
                    patch = patch.score(name, *total);
                    if clear_answers {
                        patch = patch.clear_answer(name);
                    }
                }
                repo.apply(patch).await?;
                Ok(totals)
            })
            .await?;

        self.draft.write().await.take();
        info!(players = totals.len(), phase = %state.phase, "scores committed");

        let mut outcome = MasterOutcome::new(Some(state), ModerationDraft::new());
        outcome.committed = Some(totals);
        Ok(outcome)
    }

    /// Open a question and clear every answer in one patch.
    async fn open_question(
        &self,
        gate: &MutexGuard<'_, ()>,
        event: GameEvent,
    ) -> Result<GameState, ServiceError> {
        let repo = self.repo.clone();
        self.run_transition(gate, event, |next| async move {
            let players = repo.players().await?;
            let mut patch = LivePatch::new().game_state(&next)?;
            for name in players.keys() {
                patch = patch.clear_answer(name);
            }
            repo.apply(patch).await?;
            Ok(())
        })
        .await
        .map(|((), state)| state)
    }

    /// Transition that only writes the game state.
    async fn write_state(
        &self,
        gate: &MutexGuard<'_, ()>,
        event: GameEvent,
    ) -> Result<GameState, ServiceError> {
        let repo = self.repo.clone();
        self.run_transition(gate, event, |next| async move {
            repo.apply(LivePatch::new().game_state(&next)?).await?;
            Ok(())
        })
        .await
        .map(|((), state)| state)
    }

    /// Read the authoritative game state and align the local machine with it.
    async fn sync(&self) -> Result<Option<GameState>, ServiceError> {
        let observed = self.repo.game_state().await?;
        let mut sm = self.machine.write().await;
        sm.sync(observed.clone());
        Ok(observed)
    }

    /// Plan a transition to the local state machine, returning the plan.
    async fn plan_transition(&self, event: GameEvent) -> Result<Plan, PlanError> {
        let mut sm = self.machine.write().await;
        sm.plan(event)
    }

    /// Apply the planned transition, returning the next state.
    async fn apply_planned_transition(&self, plan_id: PlanId) -> Result<GameState, ApplyError> {
        let mut sm = self.machine.write().await;
        sm.apply(plan_id)
    }

    /// Abort a planned transition.
    async fn abort_transition(&self, plan_id: PlanId) -> Result<(), AbortError> {
        let mut sm = self.machine.write().await;
        sm.abort(plan_id)
    }

    /// Plan `event`, run `work` with the planned state, then apply the plan on
    /// success or abort it on error or timeout. The caller holds the gate.
    async fn run_transition<F, Fut, T>(
        &self,
        _gate: &MutexGuard<'_, ()>,
        event: GameEvent,
        work: F,
    ) -> Result<(T, GameState), ServiceError>
    where
        F: FnOnce(GameState) -> Fut,
        Fut: std::future::Future<Output = Result<T, ServiceError>>,
    {
        let Plan {
            id: plan_id, to, ..
        } = self.plan_transition(event.clone()).await?;

        let work_future = work(to);
        let outcome = if let Some(limit) = self.transition_timeout {
            match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => {
                    if let Err(abort_err) = self.abort_transition(plan_id).await {
                        warn!(
                            event = ?event,
                            plan_id = %plan_id,
                            error = ?abort_err,
                            "failed to abort transition after timeout"
                        );
                    }
                    return Err(ServiceError::Timeout);
                }
            }
        } else {
            work_future.await
        };

        match outcome {
            Ok(value) => {
                let next = self.apply_planned_transition(plan_id).await?;
                info!(event = ?event, phase = %next.phase, "transition applied");
                Ok((value, next))
            }
            Err(err) => {
                if let Err(abort_err) = self.abort_transition(plan_id).await {
                    warn!(
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after work error"
                    );
                }
                Err(err)
            }
        }
    }
}

fn unresolvable(state: Option<&GameState>) -> ServiceError {
    let position = state
        .and_then(|state| {
            state
                .current_round_id
                .as_deref()
                .map(|round| match state.current_question_id.as_deref() {
                    Some(question) => format!("{round}/{question}"),
                    None => round.to_string(),
                })
        })
        .unwrap_or_else(|| "none".into());
    ServiceError::InvalidState(format!(
        "current position `{position}` is not part of the loaded quiz"
    ))
}
