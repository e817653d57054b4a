//! Typed access to the `liveGame/*` and `quizzes/*` locations.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::warn;

use crate::{
    dao::{
        models::{GameStateEntity, PlayerEntity, QuizEntity},
        paths::{self, StorePath},
        shared_store::{SharedStore, Snapshot, Subscription},
        storage::{StorageError, StorageResult},
    },
    state::game::{GameState, PlayerRecord, StoredAnswer},
};

/// Repository over the shared store for one live game instance.
#[derive(Clone)]
pub struct LiveGameRepository {
    store: Arc<dyn SharedStore>,
}

impl LiveGameRepository {
    /// Wrap a store handle.
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    /// Underlying store handle.
    pub fn store(&self) -> &Arc<dyn SharedStore> {
        &self.store
    }

    /// Current game state. Malformed values are reported as codec errors.
    pub async fn game_state(&self) -> StorageResult<Option<GameState>> {
        let path = paths::game_state();
        let Some(entity) = self.read_as::<GameStateEntity>(&path).await? else {
            return Ok(None);
        };
        GameState::try_from(entity)
            .map(Some)
            .map_err(|err| StorageError::invalid(&path, err.to_string()))
    }

    /// Every joined player in join order. Records that fail to decode are skipped.
    pub async fn players(&self) -> StorageResult<IndexMap<String, PlayerRecord>> {
        let snapshot = self.store.read(&paths::players()).await?;
        Ok(decode_players(&snapshot))
    }

    /// One player's record.
    pub async fn player(&self, name: &str) -> StorageResult<Option<PlayerRecord>> {
        Ok(self
            .read_as::<PlayerEntity>(&paths::player(name))
            .await?
            .map(PlayerRecord::from))
    }

    /// Identifier of the quiz the live game plays.
    pub async fn active_quiz_id(&self) -> StorageResult<Option<String>> {
        self.read_as::<String>(&paths::active_quiz_id()).await
    }

    /// Raw quiz content stored under `quizzes/{id}`.
    pub async fn quiz(&self, id: &str) -> StorageResult<Option<QuizEntity>> {
        self.read_as::<QuizEntity>(&paths::quiz(id)).await
    }

    /// Store quiz content and select it for the live game in one patch.
    pub async fn publish_quiz(&self, id: &str, quiz: &QuizEntity) -> StorageResult<()> {
        let path = paths::quiz(id);
        let content = encode(&path, quiz)?;
        self.store
            .patch(vec![
                (path, content),
                (paths::active_quiz_id(), Value::String(id.to_string())),
            ])
            .await
    }

    /// Overwrite a player's whole record.
    pub async fn put_player(&self, name: &str, record: &PlayerRecord) -> StorageResult<()> {
        let path = paths::player(name);
        let value = encode(&path, &PlayerEntity::from(record))?;
        self.store.write(&path, value).await
    }

    /// Write only the answer field of a player's record.
    pub async fn write_answer(&self, name: &str, answer: &StoredAnswer) -> StorageResult<()> {
        self.store
            .write(&paths::player_answer(name), answer.to_value())
            .await
    }

    /// Apply a multi-path update atomically.
    pub async fn apply(&self, patch: LivePatch) -> StorageResult<()> {
        self.store.patch(patch.into_updates()).await
    }

    /// Watch the game state.
    pub async fn subscribe_game_state(&self) -> StorageResult<Subscription> {
        self.store.subscribe(&paths::game_state()).await
    }

    /// Watch the whole player set.
    pub async fn subscribe_players(&self) -> StorageResult<Subscription> {
        self.store.subscribe(&paths::players()).await
    }

    /// Watch the active quiz selector.
    pub async fn subscribe_active_quiz_id(&self) -> StorageResult<Subscription> {
        self.store.subscribe(&paths::active_quiz_id()).await
    }

    async fn read_as<T: DeserializeOwned>(&self, path: &StorePath) -> StorageResult<Option<T>> {
        match self.store.read(path).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|err| StorageError::codec(path, err)),
            None => Ok(None),
        }
    }
}

/// Builder for an atomic multi-path update of the live game.
#[derive(Debug, Default)]
pub struct LivePatch {
    updates: Vec<(StorePath, Value)>,
}

impl LivePatch {
    /// Empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the game state.
    pub fn game_state(mut self, state: &GameState) -> StorageResult<Self> {
        let path = paths::game_state();
        let value = encode(&path, &GameStateEntity::from(state))?;
        self.updates.push((path, value));
        Ok(self)
    }

    /// Remove every player record.
    pub fn reset_players(mut self) -> Self {
        self.updates.push((paths::players(), Value::Null));
        self
    }

    /// Set a player's committed total.
    pub fn score(mut self, name: &str, total: u32) -> Self {
        self.updates.push((paths::player_score(name), Value::from(total)));
        self
    }

    /// Clear a player's answer.
    pub fn clear_answer(mut self, name: &str) -> Self {
        self.updates
            .push((paths::player_answer(name), StoredAnswer::default().to_value()));
        self
    }

    /// True when no update has been queued.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Paths and values in insertion order.
    pub fn into_updates(self) -> Vec<(StorePath, Value)> {
        self.updates
    }
}

fn encode<T: Serialize>(path: &StorePath, value: &T) -> StorageResult<Value> {
    serde_json::to_value(value).map_err(|err| StorageError::codec(path, err))
}

/// Decode a game state snapshot for an observer. Malformed values are logged
/// and treated as absent.
pub fn decode_game_state(snapshot: &Snapshot) -> Option<GameState> {
    let value = snapshot.as_ref()?;
    let decoded = serde_json::from_value::<GameStateEntity>(value.clone())
        .map_err(|err| err.to_string())
        .and_then(|entity| GameState::try_from(entity).map_err(|err| err.to_string()));
    match decoded {
        Ok(state) => Some(state),
        Err(error) => {
            warn!(%error, "ignoring malformed game state");
            None
        }
    }
}

/// Decode a players snapshot, skipping records that do not decode.
pub fn decode_players(snapshot: &Snapshot) -> IndexMap<String, PlayerRecord> {
    let Some(Value::Object(entries)) = snapshot else {
        return IndexMap::new();
    };
    entries
        .iter()
        .filter_map(|(name, value)| {
            match serde_json::from_value::<PlayerEntity>(value.clone()) {
                Ok(entity) => Some((name.clone(), PlayerRecord::from(entity))),
                Err(error) => {
                    warn!(player = %name, %error, "skipping malformed player record");
                    None
                }
            }
        })
        .collect()
}

/// Decode the active quiz selector for an observer.
pub fn decode_quiz_id(snapshot: &Snapshot) -> Option<String> {
    match snapshot.as_ref()? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        _ => None,
    }
}
