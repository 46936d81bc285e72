use serde::{Deserialize, Serialize};
use std::fmt;

use crate::tournament::{
    bracket::Match,
    models::{Participant, PlayerId, Standing, TournamentId, TournamentKind, TournamentPhase},
};

/// A message on the shared tournament bus.
///
/// Frames are JSON objects tagged by `type` (`tournament-start`, ...) with
/// camelCase fields. Authority-to-all messages describe state changes;
/// client-to-authority messages are requests the authority may reject.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(
    tag = "type",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum WireMessage {
    /// A tournament opened its join window.
    TournamentStart {
        tournament_id: TournamentId,
        host: PlayerId,
        kind: TournamentKind,
        /// Active time box in seconds (one round, or the whole scoring window)
        duration: u64,
        /// Join window in seconds
        join_period: u64,
    },
    /// A player asks to join, or (with `seat` set) the authority accepted
    /// them.
    TournamentJoin {
        tournament_id: TournamentId,
        player: PlayerId,
        user_id: i64,
        /// Roster slot assigned by the authority; absent on requests
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seat: Option<usize>,
    },
    /// Full participant snapshot for a resyncing client.
    TournamentSync {
        tournament_id: TournamentId,
        participants: Vec<Participant>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        phase: Option<TournamentPhase>,
    },
    /// A participant's standing changed.
    TournamentUpdate {
        tournament_id: TournamentId,
        player: PlayerId,
        #[serde(alias = "totalWeight")]
        total_score: u64,
        position: usize,
        message: String,
    },
    /// Final ranked results.
    TournamentEnd {
        tournament_id: TournamentId,
        results: Vec<Standing>,
    },
    /// Request a new tournament from the authority.
    TournamentCreate {
        host: PlayerId,
        user_id: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<TournamentKind>,
    },
    /// Ask the authority for a `tournament-sync`.
    TournamentSyncRequest {
        tournament_id: TournamentId,
        requester: PlayerId,
    },
    /// A scoring event from a participant.
    TournamentScore {
        tournament_id: TournamentId,
        player: PlayerId,
        points: u64,
    },
    /// Host asks to close the join window early.
    TournamentLock {
        tournament_id: TournamentId,
        requester: PlayerId,
    },
    /// A participant is leaving.
    TournamentQuit {
        tournament_id: TournamentId,
        player: PlayerId,
    },
    /// Matchups for a round that just opened.
    TournamentRound {
        tournament_id: TournamentId,
        round: usize,
        matches: Vec<Match>,
    },
    /// The tournament was discarded before it started.
    TournamentCancel {
        tournament_id: TournamentId,
        reason: String,
    },
    /// A request from `player` was refused; `message` is shown to them.
    TournamentNotice {
        tournament_id: TournamentId,
        player: PlayerId,
        message: String,
    },
}

impl WireMessage {
    /// Tournament the message belongs to (`None` for create requests).
    pub fn tournament_id(&self) -> Option<&TournamentId> {
        match self {
            Self::TournamentCreate { .. } => None,
            Self::TournamentStart { tournament_id, .. }
            | Self::TournamentJoin { tournament_id, .. }
            | Self::TournamentSync { tournament_id, .. }
            | Self::TournamentUpdate { tournament_id, .. }
            | Self::TournamentEnd { tournament_id, .. }
            | Self::TournamentSyncRequest { tournament_id, .. }
            | Self::TournamentScore { tournament_id, .. }
            | Self::TournamentLock { tournament_id, .. }
            | Self::TournamentQuit { tournament_id, .. }
            | Self::TournamentRound { tournament_id, .. }
            | Self::TournamentCancel { tournament_id, .. }
            | Self::TournamentNotice { tournament_id, .. } => Some(tournament_id),
        }
    }

    /// Wire name of the message kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TournamentStart { .. } => "tournament-start",
            Self::TournamentJoin { .. } => "tournament-join",
            Self::TournamentSync { .. } => "tournament-sync",
            Self::TournamentUpdate { .. } => "tournament-update",
            Self::TournamentEnd { .. } => "tournament-end",
            Self::TournamentCreate { .. } => "tournament-create",
            Self::TournamentSyncRequest { .. } => "tournament-sync-request",
            Self::TournamentScore { .. } => "tournament-score",
            Self::TournamentLock { .. } => "tournament-lock",
            Self::TournamentQuit { .. } => "tournament-quit",
            Self::TournamentRound { .. } => "tournament-round",
            Self::TournamentCancel { .. } => "tournament-cancel",
            Self::TournamentNotice { .. } => "tournament-notice",
        }
    }

    /// Whether only the authority should ever publish this message.
    pub fn is_authoritative(&self) -> bool {
        matches!(
            self,
            Self::TournamentStart { .. }
                | Self::TournamentJoin { seat: Some(_), .. }
                | Self::TournamentSync { .. }
                | Self::TournamentUpdate { .. }
                | Self::TournamentEnd { .. }
                | Self::TournamentRound { .. }
                | Self::TournamentCancel { .. }
                | Self::TournamentNotice { .. }
        )
    }
}

impl fmt::Display for WireMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TournamentStart {
                tournament_id,
                host,
                kind,
                ..
            } => write!(f, "{host} opened {kind} tournament {tournament_id}"),
            Self::TournamentJoin {
                player, seat: None, ..
            } => write!(f, "{player} asked to join"),
            Self::TournamentJoin { player, .. } => write!(f, "{player} joined"),
            Self::TournamentSync { participants, .. } => {
                write!(f, "sync of {} participants", participants.len())
            }
            Self::TournamentUpdate { message, .. } => write!(f, "{message}"),
            Self::TournamentEnd { results, .. } => match results.first() {
                Some(first) => write!(f, "{} won with {}", first.player, first.score),
                None => write!(f, "tournament ended"),
            },
            Self::TournamentCreate { host, .. } => write!(f, "{host} requested a tournament"),
            Self::TournamentSyncRequest { requester, .. } => {
                write!(f, "{requester} requested a sync")
            }
            Self::TournamentScore { player, points, .. } => write!(f, "{player} scored {points}"),
            Self::TournamentLock { requester, .. } => write!(f, "{requester} locked the roster"),
            Self::TournamentQuit { player, .. } => write!(f, "{player} quit"),
            Self::TournamentRound { round, matches, .. } => {
                write!(f, "round {} with {} matches", round + 1, matches.len())
            }
            Self::TournamentCancel { reason, .. } => write!(f, "cancelled: {reason}"),
            Self::TournamentNotice { player, message, .. } => write!(f, "{player}: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_start_uses_kebab_tag_and_camel_fields() {
        let msg = WireMessage::TournamentStart {
            tournament_id: TournamentId::from("t1"),
            host: PlayerId::new("sysop"),
            kind: TournamentKind::Elimination,
            duration: 30,
            join_period: 60,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "tournament-start",
                "tournamentId": "t1",
                "host": "sysop",
                "kind": "elimination",
                "duration": 30,
                "joinPeriod": 60
            })
        );
    }

    #[test]
    fn test_update_accepts_total_weight_alias() {
        let value = json!({
            "type": "tournament-update",
            "tournamentId": "t9",
            "player": "angler",
            "totalWeight": 143,
            "position": 2,
            "message": "angler landed a 12 lb bass"
        });
        let msg: WireMessage = serde_json::from_value(value).unwrap();
        match msg {
            WireMessage::TournamentUpdate { total_score, position, .. } => {
                assert_eq!(total_score, 143);
                assert_eq!(position, 2);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_sync_without_phase_field() {
        let value = json!({
            "type": "tournament-sync",
            "tournamentId": "t2",
            "participants": []
        });
        let msg: WireMessage = serde_json::from_value(value).unwrap();
        assert_eq!(
            msg,
            WireMessage::TournamentSync {
                tournament_id: TournamentId::from("t2"),
                participants: vec![],
                phase: None,
            }
        );
    }

    #[test]
    fn test_tournament_id_and_kind_accessors() {
        let create = WireMessage::TournamentCreate {
            host: PlayerId::new("sysop"),
            user_id: 1,
            kind: None,
        };
        assert_eq!(create.tournament_id(), None);
        assert_eq!(create.kind(), "tournament-create");
        assert!(!create.is_authoritative());

        let cancel = WireMessage::TournamentCancel {
            tournament_id: TournamentId::from("t3"),
            reason: "host left".to_string(),
        };
        assert_eq!(cancel.tournament_id(), Some(&TournamentId::from("t3")));
        assert!(cancel.is_authoritative());
        assert_eq!(cancel.to_string(), "cancelled: host left");
    }

    #[test]
    fn test_only_seated_joins_are_authoritative() {
        let request: WireMessage = serde_json::from_value(json!({
            "type": "tournament-join",
            "tournamentId": "t1",
            "player": "ann",
            "userId": 2
        }))
        .unwrap();
        assert!(!request.is_authoritative());
        assert_eq!(request.to_string(), "ann asked to join");

        let accepted = WireMessage::TournamentJoin {
            tournament_id: TournamentId::from("t1"),
            player: PlayerId::new("ann"),
            user_id: 2,
            seat: Some(1),
        };
        assert!(accepted.is_authoritative());
        assert_eq!(serde_json::to_value(&accepted).unwrap()["seat"], 1);
        assert_eq!(accepted.to_string(), "ann joined");
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let value = json!({ "type": "tournament-explode", "tournamentId": "t1" });
        assert!(serde_json::from_value::<WireMessage>(value).is_err());
    }
}
