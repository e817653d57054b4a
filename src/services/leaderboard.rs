//! Standings derived from the player records.

use indexmap::IndexMap;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{dao::live_game::LiveGameRepository, error::ServiceError, state::game::PlayerRecord};

/// Number of players shown on the podium.
pub const PODIUM_SIZE: usize = 3;

/// Message shown when nobody has joined.
pub const EMPTY_MESSAGE: &str = "No players have joined yet. Be the first!";

/// One player's place in the standings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Standing {
    /// 1-based position.
    pub rank: usize,
    /// Player name.
    pub name: String,
    /// Committed total.
    pub score: u32,
}

/// Standings split for the leaderboard screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Leaderboard {
    /// Top three players, best first.
    pub podium: Vec<Standing>,
    /// Everyone else, in rank order.
    pub rest: Vec<Standing>,
    /// Set when there are no players at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Rank players by score, ties broken by name.
pub fn standings(players: &IndexMap<String, PlayerRecord>) -> Vec<Standing> {
    let mut sorted: Vec<_> = players.iter().collect();
    sorted.sort_by(|(a_name, a), (b_name, b)| b.score.cmp(&a.score).then_with(|| a_name.cmp(b_name)));
    sorted
        .into_iter()
        .enumerate()
        .map(|(index, (name, record))| Standing {
            rank: index + 1,
            name: name.clone(),
            score: record.score,
        })
        .collect()
}

/// Split the standings into podium and the rest.
pub fn leaderboard(players: &IndexMap<String, PlayerRecord>) -> Leaderboard {
    let mut podium = standings(players);
    let rest = podium.split_off(podium.len().min(PODIUM_SIZE));
    Leaderboard {
        message: podium.is_empty().then(|| EMPTY_MESSAGE.to_string()),
        podium,
        rest,
    }
}

/// Read the current leaderboard from the store.
pub async fn current(repo: &LiveGameRepository) -> Result<Leaderboard, ServiceError> {
    let players = repo.players().await?;
    Ok(leaderboard(&players))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players(scores: &[(&str, u32)]) -> IndexMap<String, PlayerRecord> {
        scores
            .iter()
            .map(|(name, score)| {
                (
                    name.to_string(),
                    PlayerRecord {
                        score: *score,
                        ..PlayerRecord::default()
                    },
                )
            })
            .collect()
    }

    #[test]
    fn ranks_by_score_then_name() {
        let ranked = standings(&players(&[("zoe", 10), ("amy", 30), ("bob", 10)]));
        let names: Vec<_> = ranked.iter().map(|s| (s.rank, s.name.as_str())).collect();
        assert_eq!(names, vec![(1, "amy"), (2, "bob"), (3, "zoe")]);
    }

    #[test]
    fn podium_holds_top_three() {
        let board = leaderboard(&players(&[("a", 1), ("b", 2), ("c", 3), ("d", 4), ("e", 5)]));
        assert_eq!(board.podium.len(), 3);
        assert_eq!(board.podium[0].name, "e");
        assert_eq!(board.rest.iter().map(|s| s.rank).collect::<Vec<_>>(), vec![4, 5]);
        assert!(board.message.is_none());
    }

    #[test]
    fn empty_board_has_message() {
        let board = leaderboard(&IndexMap::new());
        assert!(board.podium.is_empty());
        assert_eq!(board.message.as_deref(), Some(EMPTY_MESSAGE));
    }
}
