//! Live standings view over participant scores.

use super::models::{PlayerId, Standing};

/// Always-sorted projection of participant scores.
///
/// Sorting is stable, so players on equal scores keep the order they held
/// before the update. Nothing here is persisted.
#[derive(Debug, Clone)]
pub struct Leaderboard {
    top_k: usize,
    entries: Vec<(PlayerId, u64)>,
}

impl Leaderboard {
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k,
            entries: Vec::new(),
        }
    }

    /// Build a board from `(player, score)` pairs in roster order.
    pub fn from_scores<I>(top_k: usize, scores: I) -> Self
    where
        I: IntoIterator<Item = (PlayerId, u64)>,
    {
        let mut board = Self {
            top_k,
            entries: scores.into_iter().collect(),
        };
        board.sort();
        board
    }

    /// Add a player with a zero score if not already present.
    pub fn insert(&mut self, player: PlayerId) {
        if !self.contains(&player) {
            self.entries.push((player, 0));
        }
    }

    pub fn contains(&self, player: &PlayerId) -> bool {
        self.entries.iter().any(|(p, _)| p == player)
    }

    /// Set `player`'s score, re-sort, and return the top-K slice.
    ///
    /// Unknown players are added rather than rejected so a mirror that missed
    /// a join still converges.
    pub fn update(&mut self, player: &PlayerId, new_score: u64) -> Vec<Standing> {
        match self.entries.iter_mut().find(|(p, _)| p == player) {
            Some(entry) => entry.1 = new_score,
            None => self.entries.push((player.clone(), new_score)),
        }
        self.sort();
        self.top()
    }

    /// Top-K rows, highest score first.
    pub fn top(&self) -> Vec<Standing> {
        self.standings().into_iter().take(self.top_k).collect()
    }

    /// Every row, highest score first.
    pub fn standings(&self) -> Vec<Standing> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, (player, score))| Standing {
                position: i + 1,
                player: player.clone(),
                score: *score,
            })
            .collect()
    }

    /// 1-indexed position of `player`.
    pub fn position_of(&self, player: &PlayerId) -> Option<usize> {
        self.entries
            .iter()
            .position(|(p, _)| p == player)
            .map(|i| i + 1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn sort(&mut self) {
        self.entries.sort_by(|a, b| b.1.cmp(&a.1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(name: &str) -> PlayerId {
        PlayerId::new(name)
    }

    #[test]
    fn test_update_returns_sorted_top_k() {
        let mut board = Leaderboard::new(2);
        for name in ["ann", "bob", "cy"] {
            board.insert(p(name));
        }

        board.update(&p("bob"), 12);
        let top = board.update(&p("cy"), 30);

        assert_eq!(top.len(), 2);
        assert_eq!(top[0].player, p("cy"));
        assert_eq!(top[0].position, 1);
        assert_eq!(top[1].player, p("bob"));
        assert_eq!(board.position_of(&p("ann")), Some(3));
    }

    #[test]
    fn test_ties_keep_prior_relative_order() {
        let mut board = Leaderboard::new(5);
        board.insert(p("ann"));
        board.insert(p("bob"));
        board.update(&p("bob"), 5);
        board.update(&p("ann"), 5);

        let rows = board.standings();
        assert_eq!(rows[0].player, p("bob"));
        assert_eq!(rows[1].player, p("ann"));
    }

    #[test]
    fn test_unknown_player_is_added() {
        let mut board = Leaderboard::new(5);
        let top = board.update(&p("ghost"), 9);
        assert_eq!(top.len(), 1);
        assert!(board.contains(&p("ghost")));
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut board = Leaderboard::new(5);
        board.insert(p("ann"));
        board.update(&p("ann"), 4);
        board.insert(p("ann"));
        assert_eq!(board.len(), 1);
        assert_eq!(board.standings()[0].score, 4);
    }
}
