//! Tournament data models shared by the coordinator, mirrors, and the wire protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};
use uuid::Uuid;

/// Hard cap on roster length and bracket size.
pub const MAX_PARTICIPANTS: usize = 16;

/// Join window used by both door games.
pub const DEFAULT_JOIN_PERIOD_SECS: u64 = 60;

/// Time box for a single elimination round.
pub const DEFAULT_ROUND_SECS: u64 = 30;

/// Shared scoring window for cumulative (fishing) tournaments.
pub const DEFAULT_SCORING_SECS: u64 = 300;

/// Longest join window or time box a tournament may be configured with.
pub const MAX_PERIOD_SECS: u64 = 24 * 60 * 60;

/// Default number of leaderboard rows shown to players.
pub const DEFAULT_TOP_K: usize = 5;

/// Opaque, time-derived tournament identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TournamentId(String);

impl TournamentId {
    /// Generate an id from the creation time.
    ///
    /// The random suffix keeps two hosts creating in the same millisecond
    /// from colliding.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("t{}-{}", now.timestamp_millis(), &suffix[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TournamentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TournamentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for TournamentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Player display name, unique within a tournament.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PlayerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tournament lifecycle phase.
///
/// Variants are declared in lifecycle order so `Ord` doubles as the
/// "never regress" check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentPhase {
    /// No tournament exists
    Idle,
    /// Join window is open
    Joining,
    /// Roster frozen, rounds in progress
    Active,
    /// Results published (terminal)
    Ended,
}

impl TournamentPhase {
    /// Whether moving to `next` keeps the phase sequence monotonic.
    pub fn can_advance_to(self, next: TournamentPhase) -> bool {
        next > self
    }
}

impl fmt::Display for TournamentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Idle => "idle",
            Self::Joining => "joining",
            Self::Active => "active",
            Self::Ended => "ended",
        };
        write!(f, "{repr}")
    }
}

/// How matches are decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentKind {
    /// Pairwise single-elimination bracket (trivia)
    Elimination,
    /// One shared scoring window, highest total wins (fishing)
    Cumulative,
}

impl fmt::Display for TournamentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Elimination => "elimination",
            Self::Cumulative => "cumulative",
        };
        write!(f, "{repr}")
    }
}

impl FromStr for TournamentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "elimination" | "trivia" | "bracket" => Ok(Self::Elimination),
            "cumulative" | "fishing" | "derby" => Ok(Self::Cumulative),
            other => Err(format!("unknown tournament kind '{other}'")),
        }
    }
}

/// What happens to the tournament when its host leaves after the join window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostDeparture {
    /// The authority keeps running; the host just stops scoring
    #[default]
    Continue,
    /// The authority halts and emits nothing further for the tournament
    Orphan,
}

impl FromStr for HostDeparture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "continue" => Ok(Self::Continue),
            "orphan" => Ok(Self::Orphan),
            other => Err(format!("unknown host departure policy '{other}'")),
        }
    }
}

/// Tournament configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentConfig {
    /// Tournament name shown in the lobby
    pub name: String,
    /// Match resolution strategy
    pub kind: TournamentKind,
    /// Length of the join window in seconds
    pub join_period_secs: u64,
    /// Time box for each elimination round in seconds
    pub round_secs: u64,
    /// Length of the cumulative scoring window in seconds
    pub scoring_secs: u64,
    /// Roster limit (at most [`MAX_PARTICIPANTS`])
    pub max_participants: usize,
    /// Leaderboard rows returned to players
    pub top_k: usize,
    /// Host departure policy once the tournament is active
    pub host_departure: HostDeparture,
}

impl TournamentConfig {
    /// Trivia-style elimination bracket with the observed defaults.
    pub fn trivia(name: String) -> Self {
        Self {
            name,
            kind: TournamentKind::Elimination,
            join_period_secs: DEFAULT_JOIN_PERIOD_SECS,
            round_secs: DEFAULT_ROUND_SECS,
            scoring_secs: DEFAULT_SCORING_SECS,
            max_participants: MAX_PARTICIPANTS,
            top_k: DEFAULT_TOP_K,
            host_departure: HostDeparture::default(),
        }
    }

    /// Fishing-style derby: one scoring window, total weight wins.
    pub fn fishing(name: String) -> Self {
        Self {
            kind: TournamentKind::Cumulative,
            top_k: 10,
            ..Self::trivia(name)
        }
    }

    /// Same settings with a different resolution strategy.
    pub fn with_kind(mut self, kind: TournamentKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn join_period(&self) -> Duration {
        Duration::from_secs(self.join_period_secs)
    }

    /// Length of one active time box: a round for elimination, the whole
    /// scoring window for cumulative tournaments.
    pub fn active_period(&self) -> Duration {
        Duration::from_secs(self.active_secs())
    }

    pub fn active_secs(&self) -> u64 {
        match self.kind {
            TournamentKind::Elimination => self.round_secs,
            TournamentKind::Cumulative => self.scoring_secs,
        }
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_participants == 0 || self.max_participants > MAX_PARTICIPANTS {
            return Err(format!(
                "max_participants must be between 1 and {MAX_PARTICIPANTS}, got {}",
                self.max_participants
            ));
        }
        if self.join_period_secs == 0 {
            return Err("join_period_secs must be greater than 0".to_string());
        }
        if self.active_secs() == 0 {
            return Err(format!("{} time box must be greater than 0", self.kind));
        }
        let longest = self
            .join_period_secs
            .max(self.round_secs)
            .max(self.scoring_secs);
        if longest > MAX_PERIOD_SECS {
            return Err(format!(
                "join window and time boxes must not exceed {MAX_PERIOD_SECS}s, got {longest}s"
            ));
        }
        if !matches!(self.top_k, 5 | 10) {
            return Err(format!("top_k must be 5 or 10, got {}", self.top_k));
        }
        Ok(())
    }
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self::trivia("Tournament".to_string())
    }
}

/// A tournament participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Display name
    pub player: PlayerId,
    /// Account id of the player
    pub user_id: i64,
    /// Cumulative score (correct answers or total weight)
    pub score: u64,
    /// Best single-round metric (best round score or biggest catch)
    pub round_best: u64,
    /// Contested matches won
    pub match_wins: u32,
    /// Contested matches lost
    pub match_losses: u32,
    /// Round index the participant was knocked out in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eliminated_in: Option<usize>,
}

impl Participant {
    pub fn new(player: PlayerId, user_id: i64) -> Self {
        Self {
            player,
            user_id,
            score: 0,
            round_best: 0,
            match_wins: 0,
            match_losses: 0,
            eliminated_in: None,
        }
    }
}

/// One ranked row in standings or final results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    /// 1-indexed position
    pub position: usize,
    pub player: PlayerId,
    pub score: u64,
}

/// Largest single result of a tournament.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiggestResult {
    pub player: PlayerId,
    pub metric: u64,
}

/// Per-player outcome inside a [`TournamentSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub player: PlayerId,
    pub user_id: i64,
    pub position: usize,
    pub score: u64,
    pub match_wins: u32,
    pub match_losses: u32,
    pub won: bool,
}

/// Summary stats handed to persistence when a tournament ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentSummary {
    pub tournament_id: TournamentId,
    pub name: String,
    pub kind: TournamentKind,
    pub host: PlayerId,
    pub participant_count: usize,
    pub winner: Option<PlayerId>,
    pub biggest_result: Option<BiggestResult>,
    pub records: Vec<PlayerRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Career aggregate for one player across saved tournaments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareerStats {
    pub tournaments_played: u32,
    pub tournaments_won: u32,
    pub matches_won: u32,
    pub matches_lost: u32,
    pub best_score: u64,
}

/// Point-in-time view of a running tournament, for lobby listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentInfo {
    pub id: TournamentId,
    pub name: String,
    pub kind: TournamentKind,
    pub host: PlayerId,
    pub phase: TournamentPhase,
    pub participant_count: usize,
    /// Seconds left in the join window (only while joining)
    pub join_remaining_secs: Option<u64>,
    /// Current round index (elimination only)
    pub current_round: Option<usize>,
    pub standings: Vec<Standing>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_ordering_is_monotonic() {
        assert!(TournamentPhase::Idle.can_advance_to(TournamentPhase::Joining));
        assert!(TournamentPhase::Joining.can_advance_to(TournamentPhase::Active));
        assert!(TournamentPhase::Active.can_advance_to(TournamentPhase::Ended));
        assert!(!TournamentPhase::Active.can_advance_to(TournamentPhase::Joining));
        assert!(!TournamentPhase::Ended.can_advance_to(TournamentPhase::Ended));
    }

    #[test]
    fn test_tournament_ids_are_unique_within_a_millisecond() {
        let now = Utc::now();
        let a = TournamentId::generate(now);
        let b = TournamentId::generate(now);
        assert_ne!(a, b);
        assert!(a.as_str().starts_with(&format!("t{}", now.timestamp_millis())));
    }

    #[test]
    fn test_trivia_config_defaults() {
        let config = TournamentConfig::trivia("Friday Trivia".to_string());
        assert_eq!(config.kind, TournamentKind::Elimination);
        assert_eq!(config.join_period_secs, 60);
        assert_eq!(config.max_participants, 16);
        assert_eq!(config.active_secs(), DEFAULT_ROUND_SECS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fishing_config_uses_scoring_window() {
        let config = TournamentConfig::fishing("Bass Derby".to_string());
        assert_eq!(config.kind, TournamentKind::Cumulative);
        assert_eq!(config.top_k, 10);
        assert_eq!(config.active_period(), Duration::from_secs(DEFAULT_SCORING_SECS));
    }

    #[test]
    fn test_config_validation_rejects_oversized_roster() {
        let mut config = TournamentConfig::default();
        config.max_participants = 17;
        assert!(config.validate().is_err());

        config.max_participants = 16;
        config.top_k = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bounds_periods() {
        let mut config = TournamentConfig::default();
        config.join_period_secs = u64::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.contains("must not exceed"));

        config.join_period_secs = MAX_PERIOD_SECS;
        assert!(config.validate().is_ok());
        config.scoring_secs = MAX_PERIOD_SECS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_kind_and_policy_parsing() {
        assert_eq!("trivia".parse::<TournamentKind>(), Ok(TournamentKind::Elimination));
        assert_eq!("Fishing".parse::<TournamentKind>(), Ok(TournamentKind::Cumulative));
        assert!("poker".parse::<TournamentKind>().is_err());
        assert_eq!("orphan".parse::<HostDeparture>(), Ok(HostDeparture::Orphan));
    }

    #[test]
    fn test_participant_serializes_camel_case() {
        let p = Participant::new(PlayerId::new("alice"), 7);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["player"], "alice");
        assert_eq!(json["userId"], 7);
        assert_eq!(json["matchWins"], 0);
        assert!(json.get("eliminatedIn").is_none());
    }
}
