//! Wire protocol and message bus.
//!
//! Tournament messages travel as JSON frames over a publish/subscribe bus
//! shared by the authority and every client.

/// Routing of bus requests to the coordinator.
pub mod adapter;

/// Publish/subscribe transport.
pub mod bus;

/// Player-side client driving a tournament mirror.
pub mod client;

/// Framing and delivery errors.
pub mod errors;

/// Wire message types.
pub mod messages;

/// JSON frame encoding and decoding.
pub mod utils;
