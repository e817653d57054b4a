//! Application-level configuration loading and quiz content bootstrap.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::{dao::models::QuizEntity, state::quiz::QuizContent};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TRIVIA_LIVE_CONFIG_PATH";
const DEFAULT_QUIZ_PATH: &str = "config/quiz.json";
const DEFAULT_QUIZ_ID: &str = "default";
const DEFAULT_TRANSITION_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_SSE_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// File holding the quiz played by this instance.
    pub quiz_path: PathBuf,
    /// Identifier the quiz is published under (`quizzes/{id}`).
    pub quiz_id: String,
    /// Upper bound for a master command's store writes; `None` disables it.
    pub transition_timeout: Option<Duration>,
    /// Capacity of every SSE broadcast channel.
    pub sse_capacity: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        quiz = %app_config.quiz_path.display(),
                        quiz_id = %app_config.quiz_id,
                        "loaded config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Read and validate the quiz file. The raw entity is returned so it can
    /// be published as authored.
    pub fn load_quiz(&self) -> Result<Option<QuizEntity>, QuizFileError> {
        let contents = match fs::read_to_string(&self.quiz_path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(path = %self.quiz_path.display(), "quiz file not found; no content will be published");
                return Ok(None);
            }
            Err(source) => {
                return Err(QuizFileError::Read {
                    path: self.quiz_path.clone(),
                    source,
                });
            }
        };
        let entity: QuizEntity =
            serde_json::from_str(&contents).map_err(|source| QuizFileError::Parse {
                path: self.quiz_path.clone(),
                source,
            })?;
        let content = QuizContent::try_from(entity.clone())?;
        info!(
            path = %self.quiz_path.display(),
            rounds = content.rounds.len(),
            "loaded quiz content"
        );
        Ok(Some(entity))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

/// Quiz file that cannot be used.
#[derive(Debug, Error)]
pub enum QuizFileError {
    /// The file could not be read.
    #[error("failed to read quiz file {}", .path.display())]
    Read {
        /// Configured quiz file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid quiz JSON.
    #[error("failed to parse quiz file {}", .path.display())]
    Parse {
        /// Configured quiz file.
        path: PathBuf,
        /// Underlying decode failure.
        #[source]
        source: serde_json::Error,
    },
    /// The quiz parsed but cannot be played.
    #[error(transparent)]
    Invalid(#[from] crate::state::quiz::QuizError),
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    quiz_path: String,
    quiz_id: String,
    transition_timeout_ms: u64,
    sse_capacity: usize,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            quiz_path: DEFAULT_QUIZ_PATH.to_string(),
            quiz_id: DEFAULT_QUIZ_ID.to_string(),
            transition_timeout_ms: DEFAULT_TRANSITION_TIMEOUT_MS,
            sse_capacity: DEFAULT_SSE_CAPACITY,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            quiz_path: PathBuf::from(value.quiz_path),
            quiz_id: value.quiz_id,
            transition_timeout: (value.transition_timeout_ms > 0)
                .then(|| Duration::from_millis(value.transition_timeout_ms)),
            sse_capacity: value.sse_capacity.max(1),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults_for_missing_keys() {
        let raw: RawConfig = serde_json::from_str(r#"{ "quiz_id": "friday" }"#).unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.quiz_id, "friday");
        assert_eq!(config.quiz_path, PathBuf::from(DEFAULT_QUIZ_PATH));
        assert_eq!(config.transition_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.sse_capacity, DEFAULT_SSE_CAPACITY);
    }

    #[test]
    fn zero_timeout_disables_it() {
        let raw: RawConfig =
            serde_json::from_str(r#"{ "transition_timeout_ms": 0, "sse_capacity": 0 }"#).unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.transition_timeout, None);
        assert_eq!(config.sse_capacity, 1);
    }

    #[test]
    fn missing_quiz_file_is_not_an_error() {
        let config = AppConfig {
            quiz_path: PathBuf::from("does/not/exist.json"),
            ..AppConfig::default()
        };
        assert!(matches!(config.load_quiz(), Ok(None)));
    }
}
