//! Websocket relay and tournament authority for BBS door games.
//!
//! The relay owns the shared bus: every door client connects over a
//! WebSocket, and the process also hosts the tournament actors that act
//! as the single authority for each tournament.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod monitor;
