//! Tournament coordination: brackets, timers, scoring, and the actors that
//! run them.
//!
//! A [`TournamentCoordinator`] is the pure state machine for one tournament.
//! A [`TournamentActor`] drives it from the bus and countdown timers, and the
//! [`TournamentManager`] keeps one actor per live tournament. Clients hold a
//! [`TournamentMirror`] instead and never decide anything.
//!
//! ## Example
//!
//! ```
//! use bbs_tourney::tournament::{TournamentConfig, TournamentCoordinator, PlayerId};
//! use chrono::Utc;
//!
//! let mut coordinator = TournamentCoordinator::new();
//! let now = Utc::now();
//! coordinator
//!     .create(TournamentConfig::trivia("Friday Trivia".to_string()), PlayerId::new("sysop"), 1, now)
//!     .unwrap();
//! assert!(coordinator.join(PlayerId::new("ann"), 2, now).is_success());
//! coordinator.close_join_window(now).unwrap();
//! ```

pub mod actor;
pub mod bracket;
pub mod coordinator;
pub mod leaderboard;
pub mod manager;
pub mod messages;
pub mod mirror;
pub mod models;
pub mod resolver;
pub mod timer;

pub use actor::{TournamentActor, TournamentHandle};
pub use bracket::{Advancement, Bracket, BracketError, Match, Round};
pub use coordinator::{
    RoundProgress, TournamentCoordinator, TournamentError, TournamentResult, TournamentState,
};
pub use leaderboard::Leaderboard;
pub use manager::TournamentManager;
pub use messages::{TournamentMessage, TournamentResponse};
pub use mirror::TournamentMirror;
pub use models::{
    CareerStats, HostDeparture, MAX_PARTICIPANTS, Participant, PlayerId, Standing,
    TournamentConfig, TournamentId, TournamentInfo, TournamentKind, TournamentPhase,
    TournamentSummary,
};
pub use resolver::{Decision, MatchOutcome, MatchResolver, ScoreEvent};
pub use timer::{Countdown, CountdownHandle, JoinWindow, TimerOutcome};
