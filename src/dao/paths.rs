//! Hierarchical store paths and the logical locations used by the live game.

use std::fmt;

const SEPARATOR: char = '/';

const LIVE_GAME: &str = "liveGame";
const GAME_STATE: &str = "gameState";
const PLAYERS: &str = "players";
const ACTIVE_QUIZ_ID: &str = "activeQuizId";
const QUIZZES: &str = "quizzes";
const ANSWER: &str = "answer";
const SCORE: &str = "score";

/// Slash-separated location inside the shared store (`liveGame/players/Alice`).
///
/// The empty path addresses the root of the tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    /// The root of the tree.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a slash separated path, ignoring empty segments.
    pub fn parse(raw: &str) -> Self {
        Self {
            segments: raw
                .split(SEPARATOR)
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Append one segment, returning the child path.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Borrow the individual segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True when `self` is `other` or one of its ancestors.
    pub fn contains(&self, other: &StorePath) -> bool {
        other.segments.len() >= self.segments.len()
            && self
                .segments
                .iter()
                .zip(other.segments.iter())
                .all(|(a, b)| a == b)
    }

    /// True when a change at one path can alter the value observed at the other.
    pub fn overlaps(&self, other: &StorePath) -> bool {
        self.contains(other) || other.contains(self)
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl From<&str> for StorePath {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

/// `liveGame/gameState`
pub fn game_state() -> StorePath {
    StorePath::root().child(LIVE_GAME).child(GAME_STATE)
}

/// `liveGame/players`
pub fn players() -> StorePath {
    StorePath::root().child(LIVE_GAME).child(PLAYERS)
}

/// `liveGame/players/{name}`
pub fn player(name: &str) -> StorePath {
    players().child(name)
}

/// `liveGame/players/{name}/answer`
pub fn player_answer(name: &str) -> StorePath {
    player(name).child(ANSWER)
}

/// `liveGame/players/{name}/score`
pub fn player_score(name: &str) -> StorePath {
    player(name).child(SCORE)
}

/// `liveGame/activeQuizId`
pub fn active_quiz_id() -> StorePath {
    StorePath::root().child(LIVE_GAME).child(ACTIVE_QUIZ_ID)
}

/// `quizzes/{id}`
pub fn quiz(id: &str) -> StorePath {
    StorePath::root().child(QUIZZES).child(id)
}
