use thiserror::Error;

use crate::dao::paths::StorePath;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by the shared state store regardless of the backend behind it.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store could not be reached or refused the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Backend failure description.
        message: String,
    },
    /// A stored value did not match the shape expected at its path.
    #[error("cannot decode value stored at `{path}`")]
    Codec {
        /// Path of the offending value.
        path: StorePath,
        /// Underlying decode failure.
        #[source]
        source: serde_json::Error,
    },
    /// A stored value decoded but breaks a rule of the live game.
    #[error("invalid value stored at `{path}`: {message}")]
    Invalid {
        /// Path of the offending value.
        path: StorePath,
        /// Broken rule.
        message: String,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure message.
    pub fn unavailable(message: impl Into<String>) -> Self {
        StorageError::Unavailable {
            message: message.into(),
        }
    }

    /// Construct a decoding error for the value found at `path`.
    pub fn codec(path: &StorePath, source: serde_json::Error) -> Self {
        StorageError::Codec {
            path: path.clone(),
            source,
        }
    }

    /// Construct an error for a decodable value that is not acceptable.
    pub fn invalid(path: &StorePath, message: impl Into<String>) -> Self {
        StorageError::Invalid {
            path: path.clone(),
            message: message.into(),
        }
    }
}
