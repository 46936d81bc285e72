//! Single-elimination bracket construction and advancement.
//!
//! Both operations are pure: the builder takes a frozen roster and an RNG,
//! the advancer takes a completed round and fills the next one. Structural
//! violations come back as [`BracketError`] and are treated as fatal by the
//! coordinator.

use super::models::{MAX_PARTICIPANTS, PlayerId};
use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bracket invariant violations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BracketError {
    #[error("{count} participants exceed the {max}-slot bracket")]
    TooManyParticipants { count: usize, max: usize },

    #[error("round {0} does not exist")]
    NoSuchRound(usize),

    #[error("round {0} is not complete")]
    RoundIncomplete(usize),

    #[error("match {match_index} of round {round} completed without a winner")]
    MissingWinner { round: usize, match_index: usize },

    #[error("round {round} produced {winners} winners for {slots} next-round slots")]
    SlotMismatch {
        round: usize,
        winners: usize,
        slots: usize,
    },

    #[error("match {match_index} of round {round} has no occupants")]
    EmptyMatch { round: usize, match_index: usize },
}

pub type BracketResult<T> = Result<T, BracketError>;

/// A single pairing. `player2 == None` before contest means a bye.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub player1: Option<PlayerId>,
    pub player2: Option<PlayerId>,
    pub winner: Option<PlayerId>,
    pub completed: bool,
}

impl Match {
    pub fn new(player1: Option<PlayerId>, player2: Option<PlayerId>) -> Self {
        Self {
            player1,
            player2,
            winner: None,
            completed: false,
        }
    }

    /// Number of filled slots.
    pub fn occupants(&self) -> usize {
        usize::from(self.player1.is_some()) + usize::from(self.player2.is_some())
    }

    pub fn is_bye(&self) -> bool {
        self.occupants() == 1
    }

    pub fn is_contested(&self) -> bool {
        self.occupants() == 2
    }

    pub fn involves(&self, player: &PlayerId) -> bool {
        self.player1.as_ref() == Some(player) || self.player2.as_ref() == Some(player)
    }

    /// Mark the match decided.
    pub fn complete(&mut self, winner: PlayerId) {
        debug_assert!(self.involves(&winner), "winner must occupy the match");
        self.winner = Some(winner);
        self.completed = true;
    }

    /// Put `player` in the first empty slot. Returns false when full.
    fn place(&mut self, player: PlayerId) -> bool {
        if self.player1.is_none() {
            self.player1 = Some(player);
            true
        } else if self.player2.is_none() {
            self.player2 = Some(player);
            true
        } else {
            false
        }
    }
}

/// One bracket round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub index: usize,
    pub matches: Vec<Match>,
}

impl Round {
    fn with_slots(index: usize, match_count: usize) -> Self {
        Self {
            index,
            matches: vec![Match::default(); match_count],
        }
    }

    pub fn is_complete(&self) -> bool {
        self.matches.iter().all(|m| m.completed)
    }
}

/// Ordered list of rounds; the last round holds exactly one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bracket {
    pub size: usize,
    pub rounds: Vec<Round>,
}

impl Bracket {
    /// Allocate empty rounds for a bracket of `size` slots.
    fn with_size(size: usize) -> Self {
        let round_total = size.trailing_zeros() as usize;
        let rounds = (0..round_total)
            .map(|r| Round::with_slots(r, size >> (r + 1)))
            .collect();
        Self { size, rounds }
    }

    pub fn round(&self, index: usize) -> Option<&Round> {
        self.rounds.get(index)
    }

    pub fn round_mut(&mut self, index: usize) -> Option<&mut Round> {
        self.rounds.get_mut(index)
    }

    pub fn final_round(&self) -> Option<&Round> {
        self.rounds.last()
    }

    /// Winner of the final match once it has been decided.
    pub fn champion(&self) -> Option<&PlayerId> {
        self.final_round()
            .and_then(|round| round.matches.first())
            .filter(|m| m.completed)
            .and_then(|m| m.winner.as_ref())
    }
}

/// Result of advancing past a completed round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advancement {
    /// Winners were seeded into this round index
    NextRound(usize),
    /// The final was completed
    Champion(PlayerId),
}

/// Bracket size for `participants` entrants: the smallest of 2, 4, 8, 16 that fits.
pub fn bracket_size(participants: usize) -> usize {
    participants.max(2).next_power_of_two().min(MAX_PARTICIPANTS)
}

/// Number of rounds needed for `participants` entrants.
pub fn round_count(participants: usize) -> usize {
    bracket_size(participants).trailing_zeros() as usize
}

/// Build a bracket from a frozen roster.
///
/// Entrants are shuffled, paired two at a time, and whoever is left over
/// takes a bye. Pairs are only formed while there are more entrants than
/// round-0 matches, so no round-0 match is ever empty. An empty roster gets
/// a single bye for `host`.
pub fn build_bracket<R: Rng + ?Sized>(
    participants: &[PlayerId],
    host: &PlayerId,
    rng: &mut R,
) -> BracketResult<Bracket> {
    if participants.len() > MAX_PARTICIPANTS {
        return Err(BracketError::TooManyParticipants {
            count: participants.len(),
            max: MAX_PARTICIPANTS,
        });
    }

    let mut order = if participants.is_empty() {
        vec![host.clone()]
    } else {
        participants.to_vec()
    };
    order.shuffle(rng);

    let size = bracket_size(order.len());
    let mut bracket = Bracket::with_size(size);
    let pairs = order.len() - size / 2;
    let mut entrants = order.into_iter();

    for (i, slot) in bracket.rounds[0].matches.iter_mut().enumerate() {
        slot.player1 = entrants.next();
        if i < pairs {
            slot.player2 = entrants.next();
        }
    }
    debug_assert!(entrants.next().is_none(), "every entrant must be seated");

    Ok(bracket)
}

/// Complete every bye in `round`, returning the players that advanced.
pub fn resolve_byes(round: &mut Round) -> Vec<PlayerId> {
    let mut advanced = Vec::new();
    for m in round.matches.iter_mut().filter(|m| !m.completed && m.is_bye()) {
        let occupant = m.player1.clone().or_else(|| m.player2.clone());
        if let Some(player) = occupant {
            m.complete(player.clone());
            advanced.push(player);
        }
    }
    advanced
}

/// Seed the winners of `completed_round` into the following round.
///
/// Winners fill the next round's empty slots in match order. Returns the
/// champion when `completed_round` was the final.
pub fn advance(bracket: &mut Bracket, completed_round: usize) -> BracketResult<Advancement> {
    let round = bracket
        .round(completed_round)
        .ok_or(BracketError::NoSuchRound(completed_round))?;

    if !round.is_complete() {
        return Err(BracketError::RoundIncomplete(completed_round));
    }

    let winners = round
        .matches
        .iter()
        .enumerate()
        .map(|(match_index, m)| {
            m.winner.clone().ok_or(BracketError::MissingWinner {
                round: completed_round,
                match_index,
            })
        })
        .collect::<BracketResult<Vec<_>>>()?;

    let next_index = completed_round + 1;
    let Some(next) = bracket.round_mut(next_index) else {
        return match winners.as_slice() {
            [champion] => Ok(Advancement::Champion(champion.clone())),
            _ => Err(BracketError::SlotMismatch {
                round: completed_round,
                winners: winners.len(),
                slots: 1,
            }),
        };
    };

    let slots = next.matches.iter().map(|m| 2 - m.occupants()).sum::<usize>();
    if winners.len() != slots {
        return Err(BracketError::SlotMismatch {
            round: completed_round,
            winners: winners.len(),
            slots,
        });
    }

    for winner in winners {
        let placed = next.matches.iter_mut().any(|m| m.place(winner.clone()));
        debug_assert!(placed, "slot count was checked above");
    }

    if let Some(match_index) = next.matches.iter().position(|m| m.occupants() == 0) {
        return Err(BracketError::EmptyMatch {
            round: next_index,
            match_index,
        });
    }

    Ok(Advancement::NextRound(next_index))
}
