use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::game::GameState;

/// High-level phases the live game can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Lobby: players join, nothing is selected.
    Waiting,
    /// A question is open and players may answer.
    Active,
    /// Answers are closed and the master reviews suggested scores.
    Moderating,
    /// Title card of the selected round.
    #[serde(alias = "round-interstitial")]
    RoundInterstitial,
    /// Game over; final standings are shown.
    Ended,
}

impl GamePhase {
    /// Wire name of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            GamePhase::Waiting => "waiting",
            GamePhase::Active => "active",
            GamePhase::Moderating => "moderating",
            GamePhase::RoundInterstitial => "round_interstitial",
            GamePhase::Ended => "ended",
        }
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown phase name found in the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown game phase `{0}`")]
pub struct UnknownPhase(pub String);

impl FromStr for GamePhase {
    type Err = UnknownPhase;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "waiting" => Ok(GamePhase::Waiting),
            "active" => Ok(GamePhase::Active),
            "moderating" => Ok(GamePhase::Moderating),
            "round_interstitial" | "round-interstitial" => Ok(GamePhase::RoundInterstitial),
            "ended" => Ok(GamePhase::Ended),
            other => Err(UnknownPhase(other.to_string())),
        }
    }
}

/// Indicates why gameplay transitioned to the ended phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The last question of the last round was committed.
    QuizCompleted,
    /// The master stopped the game early.
    ManualStop,
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// Reset to the lobby.
    Start,
    /// Show a round's title card.
    OpenRound {
        /// Round to select.
        round_id: String,
    },
    /// Open a question of the selected round for answers.
    OpenQuestion {
        /// Round that must already be selected.
        round_id: String,
        /// Question to open.
        question_id: String,
    },
    /// Close answers and move to moderation.
    Reveal,
    /// Move to the ended phase.
    Finish(FinishReason),
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {}", describe(.from))]
pub struct InvalidTransition {
    /// The phase the state machine was in; `None` before any game state exists.
    pub from: Option<GamePhase>,
    /// The event that cannot be applied from this phase.
    pub event: GameEvent,
}

fn describe(phase: &Option<GamePhase>) -> &'static str {
    phase.as_ref().map(GamePhase::as_str).unwrap_or("no game")
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// Game state changed since the plan was created.
    StateMismatch {
        /// State when plan was created.
        expected: Option<GameState>,
        /// Current state.
        actual: Option<GameState>,
    },
    /// State machine version changed since the plan was created.
    VersionMismatch {
        /// Version when plan was created.
        expected: usize,
        /// Current version.
        actual: usize,
    },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A planned state machine transition that has been validated but not yet applied.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// State the machine is currently in.
    pub from: Option<GameState>,
    /// State the machine will transition to; this is what gets written.
    pub to: GameState,
    /// Version number after applying this transition.
    pub version_next: usize,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Current game state, `None` before the first write.
    pub state: Option<GameState>,
    /// Version number of the state machine (increments on each change).
    pub version: usize,
    /// Pending target phase, if a transition is planned but not yet applied.
    pub pending: Option<GamePhase>,
}

/// Master-side view of the game position and the rules for moving it.
///
/// The store holds the authoritative state; [`GameStateMachine::sync`] replaces
/// the local copy with what was last read before planning.
#[derive(Debug, Clone, Default)]
pub struct GameStateMachine {
    state: Option<GameState>,
    version: usize,
    pending: Option<Plan>,
}

impl GameStateMachine {
    /// Create a state machine with no game state yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase, `None` before the first write.
    pub fn phase(&self) -> Option<GamePhase> {
        self.state.as_ref().map(|state| state.phase)
    }

    /// Current game state.
    pub fn state(&self) -> Option<&GameState> {
        self.state.as_ref()
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state.clone(),
            version: self.version,
            pending: self.pending.as_ref().map(|plan| plan.to.phase),
        }
    }

    /// Replace the local state with one observed in the store. Ignored while a
    /// plan is pending; returns whether the local state changed.
    pub fn sync(&mut self, observed: Option<GameState>) -> bool {
        if self.pending.is_some() || self.state == observed {
            return false;
        }
        self.state = observed;
        self.version += 1;
        true
    }

    /// Plan a transition by validating that the event can be applied from the current phase.
    /// Returns a Plan that can later be applied or aborted.
    pub fn plan(&mut self, event: GameEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.state.clone(),
            to: next,
            version_next: self.version + 1,
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition, returning the new state.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<GameState, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.state != plan.from {
            return Err(ApplyError::StateMismatch {
                expected: plan.from,
                actual: self.state.clone(),
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.state = Some(plan.to.clone());
        self.version = plan.version_next;

        Ok(plan.to)
    }

    /// Abort a planned transition without applying it.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: GameEvent) -> Result<GameState, InvalidTransition> {
        use GamePhase::*;

        let current = self.state.as_ref();
        let phase = self.phase();
        let selected_round = current.and_then(|state| state.current_round_id.as_deref());

        let next = match (phase, &event) {
            (None | Some(Waiting | Ended), GameEvent::Start) => GameState::waiting(),
            (None | Some(Waiting | Moderating | Ended), GameEvent::OpenRound { round_id }) => {
                GameState::round_interstitial(round_id)
            }
            (
                Some(RoundInterstitial | Moderating),
                GameEvent::OpenQuestion {
                    round_id,
                    question_id,
                },
            ) if selected_round == Some(round_id.as_str()) => {
                GameState::active(round_id, question_id)
            }
            (Some(Active), GameEvent::Reveal) => current
                .map(|state| state.clone().with_phase(Moderating))
                .ok_or_else(|| InvalidTransition {
                    from: phase,
                    event: event.clone(),
                })?,
            (Some(Moderating), GameEvent::Finish(FinishReason::QuizCompleted))
            | (Some(Active | Moderating), GameEvent::Finish(FinishReason::ManualStop)) => {
                GameState::ended()
            }
            _ => {
                return Err(InvalidTransition {
                    from: phase,
                    event: event.clone(),
                });
            }
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut GameStateMachine, event: GameEvent) -> GameState {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap()
    }

    fn open_round(id: &str) -> GameEvent {
        GameEvent::OpenRound {
            round_id: id.into(),
        }
    }

    fn open_question(round: &str, question: &str) -> GameEvent {
        GameEvent::OpenQuestion {
            round_id: round.into(),
            question_id: question.into(),
        }
    }

    #[test]
    fn initial_state_is_empty() {
        let sm = GameStateMachine::new();
        assert_eq!(sm.phase(), None);
        assert_eq!(sm.snapshot().version, 0);
    }

    #[test]
    fn full_happy_path_through_game() {
        let mut sm = GameStateMachine::new();

        assert_eq!(apply(&mut sm, GameEvent::Start), GameState::waiting());
        assert_eq!(
            apply(&mut sm, open_round("r1")),
            GameState::round_interstitial("r1")
        );
        assert_eq!(
            apply(&mut sm, open_question("r1", "q1")),
            GameState::active("r1", "q1")
        );
        let revealed = apply(&mut sm, GameEvent::Reveal);
        assert_eq!(revealed.phase, GamePhase::Moderating);
        assert_eq!(revealed.current_question_id.as_deref(), Some("q1"));

        assert_eq!(
            apply(&mut sm, open_question("r1", "q2")),
            GameState::active("r1", "q2")
        );
        apply(&mut sm, GameEvent::Reveal);
        assert_eq!(
            apply(&mut sm, open_round("r2")),
            GameState::round_interstitial("r2")
        );
        apply(&mut sm, open_question("r2", "q1"));
        apply(&mut sm, GameEvent::Reveal);

        let ended = apply(&mut sm, GameEvent::Finish(FinishReason::QuizCompleted));
        assert_eq!(ended, GameState::ended());
        assert_eq!(ended.current_round_id, None);
        assert_eq!(sm.snapshot().version, 10);

        assert_eq!(apply(&mut sm, GameEvent::Start), GameState::waiting());
    }

    #[test]
    fn advancing_without_revealing_is_rejected() {
        let mut sm = GameStateMachine::new();
        apply(&mut sm, GameEvent::Start);
        apply(&mut sm, open_round("r1"));
        apply(&mut sm, open_question("r1", "q1"));

        let err = sm.plan(open_question("r1", "q2")).unwrap_err();
        match err {
            PlanError::InvalidTransition(InvalidTransition { from, .. }) => {
                assert_eq!(from, Some(GamePhase::Active));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn question_must_belong_to_the_selected_round() {
        let mut sm = GameStateMachine::new();
        apply(&mut sm, open_round("r1"));
        assert!(sm.plan(open_question("r2", "q1")).is_err());
    }

    #[test]
    fn manual_stop_allowed_only_mid_question() {
        let mut sm = GameStateMachine::new();
        apply(&mut sm, GameEvent::Start);
        assert!(sm.plan(GameEvent::Finish(FinishReason::ManualStop)).is_err());

        apply(&mut sm, open_round("r1"));
        apply(&mut sm, open_question("r1", "q1"));
        assert_eq!(
            apply(&mut sm, GameEvent::Finish(FinishReason::ManualStop)),
            GameState::ended()
        );
    }

    #[test]
    fn quiz_completion_requires_moderation() {
        let mut sm = GameStateMachine::new();
        apply(&mut sm, open_round("r1"));
        apply(&mut sm, open_question("r1", "q1"));
        assert!(sm.plan(GameEvent::Finish(FinishReason::QuizCompleted)).is_err());
    }

    #[test]
    fn ended_game_reopens_the_first_round() {
        let mut sm = GameStateMachine::new();
        sm.sync(Some(GameState::ended()));
        assert!(sm.plan(GameEvent::Reveal).is_err());
        assert_eq!(
            apply(&mut sm, open_round("r1")),
            GameState::round_interstitial("r1")
        );
    }

    #[test]
    fn invalid_transition_returns_error() {
        let mut sm = GameStateMachine::new();
        let err = sm.plan(GameEvent::Reveal).unwrap_err();
        match err {
            PlanError::InvalidTransition(invalid) => {
                assert_eq!(invalid.from, None);
                assert_eq!(invalid.event, GameEvent::Reveal);
                assert!(invalid.to_string().contains("no game"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn sync_is_ignored_while_a_plan_is_pending() {
        let mut sm = GameStateMachine::new();
        let plan = sm.plan(GameEvent::Start).unwrap();
        assert!(!sm.sync(Some(GameState::ended())));
        assert_eq!(sm.snapshot().pending, Some(GamePhase::Waiting));
        sm.apply(plan.id).unwrap();
        assert!(sm.sync(Some(GameState::ended())));
        assert_eq!(sm.phase(), Some(GamePhase::Ended));
    }

    #[test]
    fn apply_detects_state_changed_underneath() {
        let mut sm = GameStateMachine::new();
        let plan = sm.plan(GameEvent::Start).unwrap();
        sm.state = Some(GameState::ended());
        let err = sm.apply(plan.id).unwrap_err();
        assert!(matches!(err, ApplyError::StateMismatch { .. }));
    }

    #[test]
    fn abort_clears_pending() {
        let mut sm = GameStateMachine::new();
        let plan = sm.plan(GameEvent::Start).unwrap();
        sm.abort(plan.id).unwrap();
        assert!(sm.pending.is_none());
        assert!(matches!(sm.abort(plan.id), Err(AbortError::NoPending)));
    }

    #[test]
    fn phase_names_round_trip_through_from_str() {
        for phase in [
            GamePhase::Waiting,
            GamePhase::Active,
            GamePhase::Moderating,
            GamePhase::RoundInterstitial,
            GamePhase::Ended,
        ] {
            assert_eq!(phase.as_str().parse::<GamePhase>(), Ok(phase));
        }
        assert_eq!(
            "round-interstitial".parse::<GamePhase>(),
            Ok(GamePhase::RoundInterstitial)
        );
        assert!("paused".parse::<GamePhase>().is_err());
    }
}
