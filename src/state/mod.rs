/// Game position and player records.
pub mod game;
/// Master controller.
pub mod master;
/// Draft scores during moderation.
pub mod moderation;
/// Player agent and views.
pub mod player;
/// Presenter observer.
pub mod presenter;
/// Validated quiz content.
pub mod quiz;
mod sse;
/// Phase transition rules.
pub mod state_machine;

use std::sync::Arc;

use dashmap::DashMap;

use crate::{config::AppConfig, dao::shared_store::SharedStore};

pub use self::sse::SseHub;
use self::{
    master::MasterController, player::PlayerAgent, presenter::PresenterProjection, sse::SseState,
};

/// Handle shared by every route and background task.
pub type SharedState = Arc<AppState>;

/// Central application state: the store handle plus one controller per role.
pub struct AppState {
    config: AppConfig,
    store: Arc<dyn SharedStore>,
    master: MasterController,
    players: DashMap<String, Arc<PlayerAgent>>,
    presenter: Arc<PresenterProjection>,
    sse: SseState,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig, store: Arc<dyn SharedStore>) -> SharedState {
        let master =
            MasterController::new(store.clone()).with_transition_timeout(config.transition_timeout);
        Arc::new(Self {
            sse: SseState::new(config.sse_capacity),
            presenter: Arc::new(PresenterProjection::new(store.clone())),
            players: DashMap::new(),
            master,
            store,
            config,
        })
    }

    /// Configuration the instance was started with.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Handle to the shared store.
    pub fn store(&self) -> Arc<dyn SharedStore> {
        self.store.clone()
    }

    /// The single master controller of this instance.
    pub fn master(&self) -> &MasterController {
        &self.master
    }

    /// Player agents created by this instance, keyed by trimmed name.
    pub fn players(&self) -> &DashMap<String, Arc<PlayerAgent>> {
        &self.players
    }

    /// Presenter observer.
    pub fn presenter(&self) -> &Arc<PresenterProjection> {
        &self.presenter
    }

    /// Broadcast hub used for the presenter SSE stream.
    pub fn presenter_sse(&self) -> &SseHub {
        self.sse.presenter()
    }

    /// Broadcast hub used for the master SSE stream.
    pub fn master_sse(&self) -> &SseHub {
        self.sse.master()
    }
}
