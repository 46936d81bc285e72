//! # BBS Tourney
//!
//! Tournament coordination for retro BBS door games: trivia brackets and
//! fishing derbies that many concurrent sessions join through a shared
//! broadcast bus.
//!
//! A tournament moves through four phases:
//!
//! - **Idle**: nothing open
//! - **Joining**: a join window is counting down; players sign up
//! - **Active**: matches are played round by round, or one scoring window runs
//! - **Ended**: final results are broadcast and saved
//!
//! ## Core Modules
//!
//! - [`tournament`]: bracket, resolver, leaderboard, coordinator, actors
//! - [`net`]: wire messages, the bus, and the player-side client
//! - [`db`]: results persistence

/// Wire protocol, bus, and client.
pub mod net;
pub use net::{
    bus::{Bus, LocalBus},
    messages::WireMessage,
};

/// Tournament lifecycle.
pub mod tournament;
pub use tournament::{
    PlayerId, TournamentConfig, TournamentCoordinator, TournamentId, TournamentKind,
    TournamentManager, TournamentPhase,
};

/// Results persistence.
pub mod db;
