//! Match resolution from round-local scoring events.

use super::{
    bracket::Match,
    models::PlayerId,
};
use rand::Rng;
use std::collections::HashMap;

/// A single scoring input: a correct answer or a landed catch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreEvent {
    pub player: PlayerId,
    pub points: u64,
    /// Milliseconds since the current time box opened
    pub elapsed_ms: u64,
}

/// How an outcome was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Single occupant advanced without contest
    Bye,
    /// Higher round score
    Score,
    /// Equal score, reached it first
    Speed,
    /// Exact tie broken by the RNG
    CoinFlip,
}

/// Outcome of one resolved match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    pub winner: PlayerId,
    pub loser: Option<PlayerId>,
    pub winner_score: u64,
    pub loser_score: u64,
    pub decision: Decision,
    /// Human-readable feed line
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    points: u64,
    reached_at_ms: u64,
}

/// Accumulates one time box's scoring events and decides matches from them.
///
/// Elimination matches compare round scores pairwise; cumulative tournaments
/// pick the highest total across the whole roster. Both break exact ties with
/// the caller's RNG.
#[derive(Debug, Clone, Default)]
pub struct MatchResolver {
    tallies: HashMap<PlayerId, Tally>,
}

impl MatchResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the previous time box.
    pub fn reset(&mut self) {
        self.tallies.clear();
    }

    /// Add an event to its player's tally.
    pub fn record(&mut self, event: &ScoreEvent) {
        let tally = self.tallies.entry(event.player.clone()).or_default();
        if event.points > 0 {
            tally.points = tally.points.saturating_add(event.points);
            tally.reached_at_ms = event.elapsed_ms;
        }
    }

    /// Points scored by `player` in the current time box.
    pub fn round_score(&self, player: &PlayerId) -> u64 {
        self.tallies.get(player).map_or(0, |t| t.points)
    }

    /// Decide `m` and mark it completed.
    ///
    /// Returns `None` for matches that are already complete or empty.
    pub fn resolve_match<R: Rng + ?Sized>(
        &self,
        m: &mut Match,
        round: usize,
        rng: &mut R,
    ) -> Option<MatchOutcome> {
        if m.completed {
            return None;
        }

        let (p1, p2) = match (m.player1.clone(), m.player2.clone()) {
            (Some(a), Some(b)) => (a, b),
            (Some(only), None) | (None, Some(only)) => {
                m.complete(only.clone());
                return Some(MatchOutcome {
                    message: format!("{only} advances from round {} with a bye", round + 1),
                    winner: only,
                    loser: None,
                    winner_score: 0,
                    loser_score: 0,
                    decision: Decision::Bye,
                });
            }
            (None, None) => return None,
        };

        let a = self.tallies.get(&p1).copied().unwrap_or_default();
        let b = self.tallies.get(&p2).copied().unwrap_or_default();

        let (p1_wins, decision) = if a.points != b.points {
            (a.points > b.points, Decision::Score)
        } else if a.points > 0 && a.reached_at_ms != b.reached_at_ms {
            (a.reached_at_ms < b.reached_at_ms, Decision::Speed)
        } else {
            (rng.random_bool(0.5), Decision::CoinFlip)
        };

        let (winner, loser, winner_tally, loser_tally) = if p1_wins {
            (p1, p2, a, b)
        } else {
            (p2, p1, b, a)
        };
        m.complete(winner.clone());

        let how = match decision {
            Decision::Speed => " (faster answer)",
            Decision::CoinFlip => " (coin flip)",
            Decision::Score | Decision::Bye => "",
        };
        let message = format!(
            "{winner} beats {loser} {}-{} in round {}{how}",
            winner_tally.points,
            loser_tally.points,
            round + 1
        );

        Some(MatchOutcome {
            winner,
            loser: Some(loser),
            winner_score: winner_tally.points,
            loser_score: loser_tally.points,
            decision,
            message,
        })
    }

    /// Winner of a cumulative window: highest total, coin flip among ties.
    pub fn pick_winner<R: Rng + ?Sized>(
        totals: &[(PlayerId, u64)],
        rng: &mut R,
    ) -> Option<(PlayerId, Decision)> {
        let best = totals.iter().map(|(_, score)| *score).max()?;
        let leaders: Vec<&PlayerId> = totals
            .iter()
            .filter(|(_, score)| *score == best)
            .map(|(player, _)| player)
            .collect();

        match leaders.as_slice() {
            [only] => Some(((*only).clone(), Decision::Score)),
            _ => {
                let pick = rng.random_range(0..leaders.len());
                Some((leaders[pick].clone(), Decision::CoinFlip))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn p(name: &str) -> PlayerId {
        PlayerId::new(name)
    }

    fn event(name: &str, points: u64, elapsed_ms: u64) -> ScoreEvent {
        ScoreEvent {
            player: p(name),
            points,
            elapsed_ms,
        }
    }

    #[test]
    fn test_higher_score_wins() {
        let mut resolver = MatchResolver::new();
        resolver.record(&event("ann", 1, 900));
        resolver.record(&event("bob", 1, 300));
        resolver.record(&event("ann", 1, 1500));

        let mut m = Match::new(Some(p("ann")), Some(p("bob")));
        let outcome = resolver
            .resolve_match(&mut m, 0, &mut StdRng::seed_from_u64(0))
            .unwrap();

        assert_eq!(outcome.winner, p("ann"));
        assert_eq!(outcome.decision, Decision::Score);
        assert_eq!(outcome.winner_score, 2);
        assert!(m.completed);
        assert_eq!(m.winner, Some(p("ann")));
        assert!(outcome.message.contains("ann beats bob 2-1"));
    }

    #[test]
    fn test_equal_score_fastest_wins() {
        let mut resolver = MatchResolver::new();
        resolver.record(&event("ann", 1, 2200));
        resolver.record(&event("bob", 1, 800));

        let mut m = Match::new(Some(p("ann")), Some(p("bob")));
        let outcome = resolver
            .resolve_match(&mut m, 1, &mut StdRng::seed_from_u64(0))
            .unwrap();

        assert_eq!(outcome.winner, p("bob"));
        assert_eq!(outcome.decision, Decision::Speed);
    }

    #[test]
    fn test_exact_tie_always_produces_a_winner() {
        let resolver = MatchResolver::new();
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..20 {
            let mut m = Match::new(Some(p("ann")), Some(p("bob")));
            let outcome = resolver.resolve_match(&mut m, 0, &mut rng).unwrap();
            assert_eq!(outcome.decision, Decision::CoinFlip);
            assert!(outcome.winner == p("ann") || outcome.winner == p("bob"));
            assert!(m.completed);
        }
    }

    #[test]
    fn test_seeded_coin_flip_is_deterministic() {
        let resolver = MatchResolver::new();
        let first = resolver
            .resolve_match(
                &mut Match::new(Some(p("ann")), Some(p("bob"))),
                0,
                &mut StdRng::seed_from_u64(5),
            )
            .unwrap();
        let second = resolver
            .resolve_match(
                &mut Match::new(Some(p("ann")), Some(p("bob"))),
                0,
                &mut StdRng::seed_from_u64(5),
            )
            .unwrap();
        assert_eq!(first.winner, second.winner);
    }

    #[test]
    fn test_bye_resolves_without_contest() {
        let resolver = MatchResolver::new();
        let mut m = Match::new(Some(p("cy")), None);
        let outcome = resolver
            .resolve_match(&mut m, 0, &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(outcome.decision, Decision::Bye);
        assert_eq!(outcome.loser, None);
        assert!(
            resolver
                .resolve_match(&mut m, 0, &mut StdRng::seed_from_u64(0))
                .is_none()
        );
    }

    #[test]
    fn test_reset_clears_round_scores() {
        let mut resolver = MatchResolver::new();
        resolver.record(&event("ann", 3, 10));
        assert_eq!(resolver.round_score(&p("ann")), 3);
        resolver.reset();
        assert_eq!(resolver.round_score(&p("ann")), 0);
    }

    #[test]
    fn test_huge_scores_saturate() {
        let mut resolver = MatchResolver::new();
        resolver.record(&event("ann", u64::MAX, 10));
        resolver.record(&event("ann", 1, 20));
        resolver.record(&event("bob", u64::MAX - 1, 5));
        assert_eq!(resolver.round_score(&p("ann")), u64::MAX);

        let mut m = Match::new(Some(p("ann")), Some(p("bob")));
        let outcome = resolver
            .resolve_match(&mut m, 0, &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(outcome.winner, p("ann"));
        assert_eq!(outcome.decision, Decision::Score);
    }

    #[test]
    fn test_pick_winner_for_cumulative_window() {
        let mut rng = StdRng::seed_from_u64(2);
        let totals = vec![(p("ann"), 40), (p("bob"), 55), (p("cy"), 12)];
        assert_eq!(
            MatchResolver::pick_winner(&totals, &mut rng),
            Some((p("bob"), Decision::Score))
        );

        let tied = vec![(p("ann"), 55), (p("bob"), 55)];
        let (winner, decision) = MatchResolver::pick_winner(&tied, &mut rng).unwrap();
        assert_eq!(decision, Decision::CoinFlip);
        assert!(winner == p("ann") || winner == p("bob"));

        assert_eq!(MatchResolver::pick_winner(&[], &mut rng), None);
    }
}
