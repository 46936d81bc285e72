//! Maps bus traffic onto coordinator requests.
//!
//! The authority subscribes to the same bus it publishes on, so it sees its
//! own frames and every client request. Only requests addressed to the
//! tournament it owns get through; authority-only kinds are dropped no
//! matter who sent them.

use super::messages::WireMessage;
use crate::tournament::models::{PlayerId, TournamentId};

/// A client request the authority has to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Join { player: PlayerId, user_id: i64 },
    Score { player: PlayerId, points: u64 },
    Lock { requester: PlayerId },
    Quit { player: PlayerId },
    SyncRequest { requester: PlayerId },
}

impl Request {
    /// Player the request came from.
    pub fn player(&self) -> &PlayerId {
        match self {
            Self::Join { player, .. } | Self::Score { player, .. } | Self::Quit { player } => player,
            Self::Lock { requester } | Self::SyncRequest { requester } => requester,
        }
    }
}

/// Extract the request carried by `message`, if it targets `tournament`.
///
/// `tournament-create` is not handled here; it has no tournament yet and is
/// picked up by the manager's dispatcher.
pub fn inbound_request(message: WireMessage, tournament: &TournamentId) -> Option<Request> {
    if message.tournament_id() != Some(tournament) {
        return None;
    }

    match message {
        WireMessage::TournamentJoin {
            player,
            user_id,
            seat: None,
            ..
        } => Some(Request::Join { player, user_id }),
        WireMessage::TournamentScore { player, points, .. } => {
            Some(Request::Score { player, points })
        }
        WireMessage::TournamentLock { requester, .. } => Some(Request::Lock { requester }),
        WireMessage::TournamentQuit { player, .. } => Some(Request::Quit { player }),
        WireMessage::TournamentSyncRequest { requester, .. } => {
            Some(Request::SyncRequest { requester })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_for_other_tournaments_are_ignored() {
        let ours = TournamentId::from("t1");
        let msg = WireMessage::TournamentScore {
            tournament_id: TournamentId::from("t2"),
            player: PlayerId::new("ann"),
            points: 1,
        };
        assert_eq!(inbound_request(msg, &ours), None);
    }

    #[test]
    fn test_authoritative_messages_are_not_requests() {
        let ours = TournamentId::from("t1");
        let msg = WireMessage::TournamentCancel {
            tournament_id: ours.clone(),
            reason: "spoofed".to_string(),
        };
        assert_eq!(inbound_request(msg, &ours), None);
    }

    #[test]
    fn test_accepted_join_echo_is_not_a_request() {
        let ours = TournamentId::from("t1");
        let echo = WireMessage::TournamentJoin {
            tournament_id: ours.clone(),
            player: PlayerId::new("ann"),
            user_id: 7,
            seat: Some(1),
        };
        assert_eq!(inbound_request(echo, &ours), None);
    }

    #[test]
    fn test_join_and_lock_are_routed() {
        let ours = TournamentId::from("t1");
        let join = WireMessage::TournamentJoin {
            tournament_id: ours.clone(),
            player: PlayerId::new("ann"),
            user_id: 7,
            seat: None,
        };
        assert_eq!(
            inbound_request(join, &ours),
            Some(Request::Join {
                player: PlayerId::new("ann"),
                user_id: 7
            })
        );

        let lock = WireMessage::TournamentLock {
            tournament_id: ours.clone(),
            requester: PlayerId::new("sysop"),
        };
        let request = inbound_request(lock, &ours).unwrap();
        assert_eq!(request.player(), &PlayerId::new("sysop"));
    }
}
