//! Tournament actor message types.

use super::models::{PlayerId, TournamentInfo};
use crate::net::messages::WireMessage;
use tokio::sync::oneshot;

/// Messages that can be sent to a TournamentActor
#[derive(Debug)]
pub enum TournamentMessage {
    /// Join request
    Join {
        player: PlayerId,
        user_id: i64,
        response: oneshot::Sender<TournamentResponse>,
    },

    /// Scoring event (correct answer, landed catch)
    Score {
        player: PlayerId,
        points: u64,
        response: oneshot::Sender<TournamentResponse>,
    },

    /// Host closes the join window early
    Lock {
        requester: PlayerId,
        response: oneshot::Sender<TournamentResponse>,
    },

    /// Participant leaves
    Quit {
        player: PlayerId,
        response: oneshot::Sender<TournamentResponse>,
    },

    /// Full participant snapshot (`tournament-sync`)
    Sync {
        response: oneshot::Sender<Option<WireMessage>>,
    },

    /// Lobby view of the tournament
    GetInfo {
        response: oneshot::Sender<Option<TournamentInfo>>,
    },

    /// Stop the actor
    Close,
}

/// User-facing outcome of a tournament operation.
///
/// Rejections are soft: the caller shows the message and carries on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TournamentResponse {
    /// Operation succeeded
    Success,

    /// Operation succeeded with message
    SuccessWithMessage(String),

    /// Join refused for the given reason
    CannotJoin(String),

    /// Roster is full
    TournamentFull,

    /// Join window already closed
    AlreadyStarted,

    /// Player is already on the roster
    AlreadyJoined,

    /// Player is not on the roster
    NotInTournament,

    /// Action needs a running tournament
    NotActive,

    /// Action needs the player to be in a live match
    NotInMatch,

    /// Only the host may do this
    NotHost,

    /// Operation failed
    Error(String),
}

impl TournamentResponse {
    /// Check if response is success
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            TournamentResponse::Success | TournamentResponse::SuccessWithMessage(_)
        )
    }

    /// Get error message if response is error
    pub fn error_message(&self) -> Option<String> {
        match self {
            TournamentResponse::CannotJoin(reason) => Some(format!("Cannot join: {}", reason)),
            TournamentResponse::TournamentFull => Some("Cannot join: tournament is full".to_string()),
            TournamentResponse::AlreadyStarted => Some("Tournament already started".to_string()),
            TournamentResponse::AlreadyJoined => Some("Already joined".to_string()),
            TournamentResponse::NotInTournament => Some("Not in this tournament".to_string()),
            TournamentResponse::NotActive => Some("Tournament is not running".to_string()),
            TournamentResponse::NotInMatch => Some("No live match to score in".to_string()),
            TournamentResponse::NotHost => Some("Only the host can do that".to_string()),
            TournamentResponse::Error(msg) => Some(msg.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_has_no_error_message() {
        assert!(TournamentResponse::Success.is_success());
        assert!(TournamentResponse::SuccessWithMessage("ok".to_string()).is_success());
        assert_eq!(TournamentResponse::Success.error_message(), None);
    }

    #[test]
    fn test_rejections_carry_user_facing_text() {
        let full = TournamentResponse::TournamentFull;
        assert!(!full.is_success());
        assert_eq!(
            full.error_message().as_deref(),
            Some("Cannot join: tournament is full")
        );
        assert_eq!(
            TournamentResponse::AlreadyStarted.error_message().as_deref(),
            Some("Tournament already started")
        );
    }
}
