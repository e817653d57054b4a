//! Library crate for trivia-live-back, exposing modules for binaries and integration tests.

/// Runtime configuration and quiz file loading.
pub mod config;
/// Shared store contract, its in-memory implementation and typed access.
pub mod dao;
mod dto;
mod error;
/// HTTP routers.
pub mod routes;
/// Business logic behind the routes and background tasks.
pub mod services;
/// Application state and the per-role controllers.
pub mod state;
