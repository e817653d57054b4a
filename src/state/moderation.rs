use indexmap::IndexMap;
use serde::Serialize;

use crate::state::game::PlayerRecord;

/// Master-local suggested scores for the question under moderation.
///
/// Scores are clamped to `0..=u32::MAX`, so a committed total can never go
/// down.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ModerationDraft {
    scores: IndexMap<String, u32>,
}

impl ModerationDraft {
    /// Empty draft.
    pub fn new() -> Self {
        Self::default()
    }

    /// Draft seeded from auto-grading.
    pub fn from_suggestions(scores: IndexMap<String, u32>) -> Self {
        Self { scores }
    }

    /// Draft score of a player, if one was suggested or edited.
    pub fn get(&self, player: &str) -> Option<u32> {
        self.scores.get(player).copied()
    }

    /// Add `delta` to a player's draft score (0 when absent), flooring at 0.
    pub fn adjust(&mut self, player: &str, delta: i64) -> u32 {
        let current = i64::from(self.get(player).unwrap_or(0));
        self.set(player, current.saturating_add(delta))
    }

    /// Replace a player's draft score, flooring at 0.
    pub fn set(&mut self, player: &str, value: i64) -> u32 {
        let clamped = u32::try_from(value.max(0)).unwrap_or(u32::MAX);
        self.scores.insert(player.to_string(), clamped);
        clamped
    }

    /// True when no player has a draft score.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Drop every draft score, returning what was discarded.
    pub fn take(&mut self) -> ModerationDraft {
        std::mem::take(self)
    }

    /// Draft scores in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.scores.iter().map(|(name, score)| (name.as_str(), *score))
    }

    /// New totals for every known player: existing score plus the draft score
    /// (0 when absent). Players missing from `players` are ignored.
    pub fn commit_totals(&self, players: &IndexMap<String, PlayerRecord>) -> IndexMap<String, u32> {
        players
            .iter()
            .map(|(name, record)| {
                let bonus = self.get(name).unwrap_or(0);
                (name.clone(), record.score.saturating_add(bonus))
            })
            .collect()
    }
}
