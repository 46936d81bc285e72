//! Read-only replica of a tournament, rebuilt from bus messages.
//!
//! Every non-authority client keeps one. It never decides anything: it
//! applies whatever the authority broadcast, defaults players it has not
//! heard of, and only moves its phase forward.

use super::{
    bracket::Match,
    leaderboard::Leaderboard,
    models::{
        DEFAULT_TOP_K, MAX_PARTICIPANTS, Participant, PlayerId, Standing, TournamentId, TournamentKind,
        TournamentPhase,
    },
    timer::JoinWindow,
};
use crate::net::messages::WireMessage;
use chrono::{DateTime, Utc};
use std::{collections::VecDeque, time::Duration};

const FEED_CAPACITY: usize = 20;

#[derive(Debug, Clone)]
pub struct TournamentMirror {
    me: PlayerId,
    tournament_id: Option<TournamentId>,
    host: Option<PlayerId>,
    kind: Option<TournamentKind>,
    phase: TournamentPhase,
    participants: Vec<Participant>,
    leaderboard: Leaderboard,
    join_window: Option<JoinWindow>,
    round: Option<usize>,
    matches: Vec<Match>,
    results: Vec<Standing>,
    feed: VecDeque<String>,
    left: bool,
    stale: bool,
}

impl TournamentMirror {
    pub fn new(me: PlayerId) -> Self {
        Self {
            me,
            tournament_id: None,
            host: None,
            kind: None,
            phase: TournamentPhase::Idle,
            participants: Vec::new(),
            leaderboard: Leaderboard::new(DEFAULT_TOP_K),
            join_window: None,
            round: None,
            matches: Vec::new(),
            results: Vec::new(),
            feed: VecDeque::new(),
            left: false,
            stale: false,
        }
    }

    pub fn me(&self) -> &PlayerId {
        &self.me
    }

    pub fn tournament_id(&self) -> Option<&TournamentId> {
        self.tournament_id.as_ref()
    }

    pub fn host(&self) -> Option<&PlayerId> {
        self.host.as_ref()
    }

    pub fn kind(&self) -> Option<TournamentKind> {
        self.kind
    }

    pub fn phase(&self) -> TournamentPhase {
        self.phase
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, player: &PlayerId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.player == player)
    }

    pub fn has_joined(&self) -> bool {
        self.participant(&self.me).is_some()
    }

    pub fn is_host(&self) -> bool {
        self.host.as_ref() == Some(&self.me)
    }

    pub fn standings(&self) -> Vec<Standing> {
        self.leaderboard.top()
    }

    /// Current round index and its matchups (elimination only).
    pub fn round(&self) -> Option<(usize, &[Match])> {
        self.round.map(|r| (r, self.matches.as_slice()))
    }

    /// Final results once the tournament ended.
    pub fn results(&self) -> &[Standing] {
        &self.results
    }

    pub fn feed(&self) -> impl Iterator<Item = &str> {
        self.feed.iter().map(String::as_str)
    }

    /// Whole seconds left to join, rounded up; `None` outside the window.
    pub fn join_time_remaining(&self, now: DateTime<Utc>) -> Option<u64> {
        if self.phase != TournamentPhase::Joining {
            return None;
        }
        self.join_window.map(|w| w.remaining_secs(now))
    }

    /// The local player quit; the mirror keeps following but stops acting.
    pub fn mark_left(&mut self) {
        self.left = true;
    }

    pub fn has_left(&self) -> bool {
        self.left
    }

    /// Frames were lost; a `tournament-sync` is needed to trust the roster.
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Apply one broadcast message. Returns whether anything changed.
    pub fn apply(&mut self, message: &WireMessage, now: DateTime<Utc>) -> bool {
        if let WireMessage::TournamentStart {
            tournament_id,
            host,
            kind,
            join_period,
            ..
        } = message
        {
            return self.start(tournament_id, host, *kind, *join_period, now);
        }

        if self.tournament_id.is_none() || message.tournament_id() != self.tournament_id.as_ref() {
            return false;
        }

        match message {
            // Only the authority's echo counts; the raw request may still
            // be refused.
            WireMessage::TournamentJoin {
                player,
                user_id,
                seat: Some(_),
                ..
            } => {
                if self.phase != TournamentPhase::Joining
                    || self.participant(player).is_some()
                    || self.participants.len() >= MAX_PARTICIPANTS
                {
                    return false;
                }
                self.participants
                    .push(Participant::new(player.clone(), *user_id));
                self.leaderboard.insert(player.clone());
                self.push_feed(format!("{player} joined"));
            }

            WireMessage::TournamentSync {
                participants,
                phase,
                ..
            } => {
                self.participants = participants.clone();
                self.leaderboard = Leaderboard::from_scores(
                    DEFAULT_TOP_K,
                    participants.iter().map(|p| (p.player.clone(), p.score)),
                );
                if let Some(phase) = phase {
                    self.advance_phase(*phase);
                }
                self.stale = false;
            }

            WireMessage::TournamentUpdate {
                player,
                total_score,
                message,
                ..
            } => {
                self.advance_phase(TournamentPhase::Active);
                match self.participants.iter_mut().find(|p| &p.player == player) {
                    Some(participant) => participant.score = *total_score,
                    None => {
                        let mut participant = Participant::new(player.clone(), 0);
                        participant.score = *total_score;
                        self.participants.push(participant);
                    }
                }
                self.leaderboard.update(player, *total_score);
                self.push_feed(message.clone());
            }

            WireMessage::TournamentRound { round, matches, .. } => {
                self.advance_phase(TournamentPhase::Active);
                self.round = Some(*round);
                self.matches = matches.clone();
                self.push_feed(format!("Round {} begins", round + 1));
            }

            WireMessage::TournamentEnd { results, .. } => {
                self.advance_phase(TournamentPhase::Ended);
                for standing in results {
                    if let Some(p) = self
                        .participants
                        .iter_mut()
                        .find(|p| p.player == standing.player)
                    {
                        p.score = standing.score;
                    }
                }
                self.results = results.clone();
                if let Some(winner) = results.first() {
                    self.push_feed(format!("{} wins with {}", winner.player, winner.score));
                }
            }

            WireMessage::TournamentCancel { reason, .. } => {
                let line = format!("Tournament cancelled: {reason}");
                *self = Self::new(self.me.clone());
                self.push_feed(line);
            }

            WireMessage::TournamentNotice {
                player, message, ..
            } => {
                if player != &self.me {
                    return false;
                }
                self.push_feed(message.clone());
            }

            // Requests are for the authority.
            _ => return false,
        }
        true
    }

    fn start(
        &mut self,
        id: &TournamentId,
        host: &PlayerId,
        kind: TournamentKind,
        join_period: u64,
        now: DateTime<Utc>,
    ) -> bool {
        let busy = matches!(
            self.phase,
            TournamentPhase::Joining | TournamentPhase::Active
        );
        if busy || self.tournament_id.as_ref() == Some(id) {
            return false;
        }

        let feed = std::mem::take(&mut self.feed);
        *self = Self::new(self.me.clone());
        self.feed = feed;
        self.tournament_id = Some(id.clone());
        self.host = Some(host.clone());
        self.kind = Some(kind);
        self.phase = TournamentPhase::Joining;
        self.join_window = Some(JoinWindow::open(now, Duration::from_secs(join_period)));
        self.participants.push(Participant::new(host.clone(), 0));
        self.leaderboard.insert(host.clone());
        self.push_feed(format!("{host} opened a {kind} tournament, {join_period}s to join"));
        true
    }

    fn advance_phase(&mut self, next: TournamentPhase) {
        if self.phase.can_advance_to(next) {
            self.phase = next;
        }
    }

    fn push_feed(&mut self, line: String) {
        if self.feed.len() == FEED_CAPACITY {
            self.feed.pop_front();
        }
        self.feed.push_back(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn start(id: &str) -> WireMessage {
        WireMessage::TournamentStart {
            tournament_id: TournamentId::from(id),
            host: PlayerId::new("sysop"),
            kind: TournamentKind::Elimination,
            duration: 30,
            join_period: 60,
        }
    }

    fn mirror() -> TournamentMirror {
        TournamentMirror::new(PlayerId::new("ann"))
    }

    #[test]
    fn test_start_opens_joining_with_host() {
        let mut m = mirror();
        let now = Utc::now();
        assert!(m.apply(&start("t1"), now));
        assert_eq!(m.phase(), TournamentPhase::Joining);
        assert_eq!(m.participants().len(), 1);
        assert_eq!(m.join_time_remaining(now + TimeDelta::seconds(20)), Some(40));
        assert!(!m.is_host());
    }

    #[test]
    fn test_other_tournament_ids_are_ignored() {
        let mut m = mirror();
        let now = Utc::now();
        m.apply(&start("t1"), now);
        let stray = WireMessage::TournamentJoin {
            tournament_id: TournamentId::from("t2"),
            player: PlayerId::new("bob"),
            user_id: 2,
            seat: Some(1),
        };
        assert!(!m.apply(&stray, now));
        assert!(!m.apply(&start("t2"), now));
        assert_eq!(m.tournament_id(), Some(&TournamentId::from("t1")));
    }

    #[test]
    fn test_update_for_unknown_player_adds_default() {
        let mut m = mirror();
        let now = Utc::now();
        m.apply(&start("t1"), now);
        m.apply(
            &WireMessage::TournamentUpdate {
                tournament_id: TournamentId::from("t1"),
                player: PlayerId::new("carol"),
                total_score: 7,
                position: 1,
                message: "carol scores".to_string(),
            },
            now,
        );
        assert_eq!(m.phase(), TournamentPhase::Active);
        assert_eq!(m.participant(&PlayerId::new("carol")).unwrap().score, 7);
        assert_eq!(m.standings()[0].player, PlayerId::new("carol"));
    }

    #[test]
    fn test_phase_never_regresses() {
        let mut m = mirror();
        let now = Utc::now();
        m.apply(&start("t1"), now);
        m.apply(
            &WireMessage::TournamentEnd {
                tournament_id: TournamentId::from("t1"),
                results: vec![],
            },
            now,
        );
        m.apply(
            &WireMessage::TournamentSync {
                tournament_id: TournamentId::from("t1"),
                participants: vec![],
                phase: Some(TournamentPhase::Joining),
            },
            now,
        );
        assert_eq!(m.phase(), TournamentPhase::Ended);
    }

    #[test]
    fn test_cancel_resets_to_idle() {
        let mut m = mirror();
        let now = Utc::now();
        m.apply(&start("t1"), now);
        m.apply(
            &WireMessage::TournamentCancel {
                tournament_id: TournamentId::from("t1"),
                reason: "host left".to_string(),
            },
            now,
        );
        assert_eq!(m.phase(), TournamentPhase::Idle);
        assert_eq!(m.tournament_id(), None);
        assert_eq!(m.feed().last(), Some("Tournament cancelled: host left"));
        assert!(m.apply(&start("t2"), now));
    }

    #[test]
    fn test_notice_only_for_me() {
        let mut m = mirror();
        let now = Utc::now();
        m.apply(&start("t1"), now);
        let notice = |player: &str| WireMessage::TournamentNotice {
            tournament_id: TournamentId::from("t1"),
            player: PlayerId::new(player),
            message: "Tournament already started".to_string(),
        };
        assert!(!m.apply(&notice("bob"), now));
        assert!(m.apply(&notice("ann"), now));
        assert_eq!(m.feed().last(), Some("Tournament already started"));
    }
}
