/// Typed repository over the live game paths.
pub mod live_game;
/// In-memory shared store.
pub mod memory_store;
/// Stored shapes of quiz content, game state and player records.
pub mod models;
/// Store path model and the locations used by the live game.
pub mod paths;
/// Publish/subscribe store contract.
pub mod shared_store;
/// Storage error types.
pub mod storage;
