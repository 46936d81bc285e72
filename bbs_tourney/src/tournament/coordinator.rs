//! Authoritative tournament state machine.
//!
//! The coordinator owns the single writable [`TournamentState`] and moves it
//! through `Idle → Joining → Active → Ended`. It never touches the bus or a
//! clock itself: callers pass `now` in and drain the queued [`WireMessage`]s
//! with [`TournamentCoordinator::drain_outbox`] after each call.

use super::{
    bracket::{self, Advancement, Bracket, BracketError, Round},
    leaderboard::Leaderboard,
    messages::TournamentResponse,
    models::{
        BiggestResult, HostDeparture, Participant, PlayerId, PlayerRecord, Standing,
        TournamentConfig, TournamentId, TournamentInfo, TournamentKind, TournamentPhase,
        TournamentSummary,
    },
    resolver::{Decision, MatchResolver, ScoreEvent},
    timer::JoinWindow,
};
use crate::net::messages::WireMessage;
use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::collections::VecDeque;
use thiserror::Error;

/// Display feed lines kept per tournament.
const FEED_CAPACITY: usize = 20;

/// Tournament errors
#[derive(Debug, Error)]
pub enum TournamentError {
    #[error("Tournament not found: {0}")]
    NotFound(TournamentId),

    #[error("No tournament is open")]
    NoTournament,

    #[error("A tournament is already {0}")]
    AlreadyRunning(TournamentPhase),

    #[error("Tournament not in correct phase: expected {expected}, got {actual}")]
    InvalidPhase {
        expected: TournamentPhase,
        actual: TournamentPhase,
    },

    #[error("Tournament is not ready to finalize")]
    NotReadyToFinalize,

    #[error("Tournament halted after the host left")]
    Halted,

    #[error("Invalid tournament configuration: {0}")]
    InvalidConfig(String),

    #[error("Bracket invariant violated: {0}")]
    Bracket(#[from] BracketError),

    #[error("Internal consistency error: {0}")]
    Internal(String),

    #[error("Tournament actor is closed")]
    ActorClosed,
}

pub type TournamentResult<T> = Result<T, TournamentError>;

/// What happened when a time box closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundProgress {
    /// Another round opened
    NextRound(usize),
    /// A winner is decided; `finalize` may run
    Finished(PlayerId),
    /// Host left under the orphan policy; nothing further happens
    Halted,
}

/// The one live tournament a coordinator owns.
#[derive(Debug, Clone)]
pub struct TournamentState {
    pub id: TournamentId,
    pub config: TournamentConfig,
    pub host: PlayerId,
    pub phase: TournamentPhase,
    pub created_at: DateTime<Utc>,
    pub join_window: JoinWindow,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Roster in join order; append-only while joining
    pub participants: Vec<Participant>,
    pub bracket: Option<Bracket>,
    pub current_round: usize,
    pub leaderboard: Leaderboard,
    pub winner: Option<PlayerId>,
    /// Recent display lines, newest last
    pub feed: VecDeque<String>,
    /// Set when the host left under [`HostDeparture::Orphan`]
    pub halted: bool,
    time_box_opened_at: Option<DateTime<Utc>>,
}

impl TournamentState {
    pub fn participant(&self, player: &PlayerId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.player == player)
    }

    fn participant_mut(&mut self, player: &PlayerId) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| &p.player == player)
    }

    pub fn roster(&self) -> Vec<PlayerId> {
        self.participants.iter().map(|p| p.player.clone()).collect()
    }

    pub fn current_round(&self) -> Option<&Round> {
        self.bracket
            .as_ref()
            .and_then(|b| b.round(self.current_round))
    }

    fn push_feed(&mut self, line: String) {
        if self.feed.len() == FEED_CAPACITY {
            self.feed.pop_front();
        }
        self.feed.push_back(line);
    }

    fn update_message(&self, player: &PlayerId, message: String) -> WireMessage {
        WireMessage::TournamentUpdate {
            tournament_id: self.id.clone(),
            player: player.clone(),
            total_score: self.participant(player).map_or(0, |p| p.score),
            position: self.leaderboard.position_of(player).unwrap_or(0),
            message,
        }
    }

    fn notice(&self, player: &PlayerId, response: &TournamentResponse) -> Option<WireMessage> {
        response
            .error_message()
            .map(|message| WireMessage::TournamentNotice {
                tournament_id: self.id.clone(),
                player: player.clone(),
                message,
            })
    }

    /// Ranked results: winner first, then by how long each player lasted
    /// (elimination) or by score (cumulative).
    fn final_results(&self) -> Vec<Standing> {
        let mut ranked: Vec<&Participant> = self.participants.iter().collect();
        match self.config.kind {
            TournamentKind::Elimination => ranked.sort_by(|a, b| {
                let lasted = |p: &Participant| p.eliminated_in.unwrap_or(usize::MAX);
                lasted(b)
                    .cmp(&lasted(a))
                    .then_with(|| b.score.cmp(&a.score))
            }),
            TournamentKind::Cumulative => ranked.sort_by(|a, b| b.score.cmp(&a.score)),
        }

        if let Some(winner) = &self.winner
            && let Some(index) = ranked.iter().position(|p| &p.player == winner)
        {
            let first = ranked.remove(index);
            ranked.insert(0, first);
        }

        ranked
            .into_iter()
            .enumerate()
            .map(|(i, p)| Standing {
                position: i + 1,
                player: p.player.clone(),
                score: p.score,
            })
            .collect()
    }

    fn summary(&self, results: &[Standing], finished_at: DateTime<Utc>) -> TournamentSummary {
        let records = results
            .iter()
            .filter_map(|standing| {
                self.participant(&standing.player).map(|p| PlayerRecord {
                    player: p.player.clone(),
                    user_id: p.user_id,
                    position: standing.position,
                    score: p.score,
                    match_wins: p.match_wins,
                    match_losses: p.match_losses,
                    won: self.winner.as_ref() == Some(&p.player),
                })
            })
            .collect();

        let biggest_result = self
            .participants
            .iter()
            .filter(|p| p.round_best > 0)
            .max_by_key(|p| p.round_best)
            .map(|p| BiggestResult {
                player: p.player.clone(),
                metric: p.round_best,
            });

        TournamentSummary {
            tournament_id: self.id.clone(),
            name: self.config.name.clone(),
            kind: self.config.kind,
            host: self.host.clone(),
            participant_count: self.participants.len(),
            winner: self.winner.clone(),
            biggest_result,
            records,
            started_at: self.started_at.unwrap_or(self.created_at),
            finished_at,
        }
    }
}

/// Drives one tournament through its lifecycle.
///
/// `R` is the tie-break and shuffle source; tests inject a seeded
/// [`StdRng`].
pub struct TournamentCoordinator<R = StdRng> {
    state: Option<TournamentState>,
    resolver: MatchResolver,
    rng: R,
    outbox: Vec<WireMessage>,
    phase_history: Vec<TournamentPhase>,
}

impl TournamentCoordinator<StdRng> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }
}

impl Default for TournamentCoordinator<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> TournamentCoordinator<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            state: None,
            resolver: MatchResolver::new(),
            rng,
            outbox: Vec::new(),
            phase_history: vec![TournamentPhase::Idle],
        }
    }

    pub fn phase(&self) -> TournamentPhase {
        self.state
            .as_ref()
            .map_or(TournamentPhase::Idle, |s| s.phase)
    }

    pub fn state(&self) -> Option<&TournamentState> {
        self.state.as_ref()
    }

    pub fn tournament_id(&self) -> Option<&TournamentId> {
        self.state.as_ref().map(|s| &s.id)
    }

    /// Phases the current tournament has passed through, starting at `Idle`.
    pub fn phase_history(&self) -> &[TournamentPhase] {
        &self.phase_history
    }

    pub fn is_halted(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.halted)
    }

    /// Take every message queued since the last drain.
    pub fn drain_outbox(&mut self) -> Vec<WireMessage> {
        std::mem::take(&mut self.outbox)
    }

    /// Open a new tournament with `host` as its first participant.
    ///
    /// Valid from `Idle`, or after `Ended`, which replaces the finished
    /// tournament with a fresh one.
    pub fn create(
        &mut self,
        config: TournamentConfig,
        host: PlayerId,
        host_user_id: i64,
        now: DateTime<Utc>,
    ) -> TournamentResult<TournamentId> {
        if let Some(state) = &self.state
            && state.phase != TournamentPhase::Ended
        {
            return Err(TournamentError::AlreadyRunning(state.phase));
        }
        config.validate().map_err(TournamentError::InvalidConfig)?;

        let id = TournamentId::generate(now);
        let mut leaderboard = Leaderboard::new(config.top_k);
        leaderboard.insert(host.clone());

        self.outbox.push(WireMessage::TournamentStart {
            tournament_id: id.clone(),
            host: host.clone(),
            kind: config.kind,
            duration: config.active_secs(),
            join_period: config.join_period_secs,
        });

        log::info!(
            "Tournament {} ({}) created by {}, join window {}s",
            id,
            config.kind,
            host,
            config.join_period_secs
        );

        let mut state = TournamentState {
            id: id.clone(),
            join_window: JoinWindow::open(now, config.join_period()),
            host: host.clone(),
            phase: TournamentPhase::Joining,
            created_at: now,
            started_at: None,
            finished_at: None,
            participants: vec![Participant::new(host.clone(), host_user_id)],
            bracket: None,
            current_round: 0,
            leaderboard,
            winner: None,
            feed: VecDeque::new(),
            halted: false,
            time_box_opened_at: None,
            config,
        };
        state.push_feed(format!("{host} opened {}", state.config.name));

        self.resolver = MatchResolver::new();
        self.state = Some(state);
        self.phase_history = vec![TournamentPhase::Idle, TournamentPhase::Joining];
        Ok(id)
    }

    /// Add a player to the roster. Only valid while the join window is open.
    pub fn join(&mut self, player: PlayerId, user_id: i64, now: DateTime<Utc>) -> TournamentResponse {
        let Some(state) = self.state.as_mut() else {
            return TournamentResponse::CannotJoin("no tournament is open".to_string());
        };

        let response = match state.phase {
            _ if state.participant(&player).is_some() => TournamentResponse::AlreadyJoined,
            TournamentPhase::Joining if !state.join_window.is_open(now) => {
                TournamentResponse::AlreadyStarted
            }
            TournamentPhase::Joining => {
                if state.participants.len() >= state.config.max_participants {
                    TournamentResponse::TournamentFull
                } else {
                    TournamentResponse::Success
                }
            }
            TournamentPhase::Active => TournamentResponse::AlreadyStarted,
            TournamentPhase::Ended => {
                TournamentResponse::CannotJoin("tournament has ended".to_string())
            }
            TournamentPhase::Idle => {
                TournamentResponse::CannotJoin("no tournament is open".to_string())
            }
        };

        if response != TournamentResponse::Success {
            log::debug!("Join by {} to {} rejected: {:?}", player, state.id, response);
            if response != TournamentResponse::AlreadyJoined {
                self.outbox.extend(state.notice(&player, &response));
            }
            return response;
        }

        state.participants.push(Participant::new(player.clone(), user_id));
        state.leaderboard.insert(player.clone());
        state.push_feed(format!("{player} joined"));
        self.outbox.push(WireMessage::TournamentJoin {
            tournament_id: state.id.clone(),
            player: player.clone(),
            user_id,
            seat: Some(state.participants.len() - 1),
        });
        log::info!(
            "{} joined tournament {} ({}/{})",
            player,
            state.id,
            state.participants.len(),
            state.config.max_participants
        );
        TournamentResponse::Success
    }

    /// Permission check for an early roster lock. Only the host may lock,
    /// and only while joining.
    pub fn check_lock(&self, requester: &PlayerId) -> TournamentResponse {
        match &self.state {
            None => TournamentResponse::NotActive,
            Some(state) if &state.host != requester => TournamentResponse::NotHost,
            Some(state) if state.phase != TournamentPhase::Joining => {
                TournamentResponse::AlreadyStarted
            }
            Some(_) => TournamentResponse::Success,
        }
    }

    /// Freeze the roster and start play (join window expired or host lock).
    pub fn close_join_window(&mut self, now: DateTime<Utc>) -> TournamentResult<()> {
        let state = self.state.as_mut().ok_or(TournamentError::NoTournament)?;
        if state.phase != TournamentPhase::Joining {
            return Err(TournamentError::InvalidPhase {
                expected: TournamentPhase::Joining,
                actual: state.phase,
            });
        }

        state.phase = TournamentPhase::Active;
        state.started_at = Some(now);
        self.phase_history.push(TournamentPhase::Active);
        state.push_feed(format!(
            "Roster locked with {} players",
            state.participants.len()
        ));

        if state.config.kind == TournamentKind::Elimination {
            let roster = state.roster();
            let bracket = bracket::build_bracket(&roster, &state.host, &mut self.rng)?;
            log::info!(
                "Tournament {} bracket built: {} players, size {}, {} rounds",
                state.id,
                roster.len(),
                bracket.size,
                bracket.rounds.len()
            );
            state.bracket = Some(bracket);
            state.current_round = 0;
        }

        self.open_time_box(now);
        Ok(())
    }

    /// Start the current round (or the scoring window): reset round tallies
    /// and advance any byes.
    fn open_time_box(&mut self, now: DateTime<Utc>) {
        self.resolver.reset();
        let Some(state) = self.state.as_mut() else {
            return;
        };
        state.time_box_opened_at = Some(now);

        let round_index = state.current_round;
        let Some(round) = state
            .bracket
            .as_mut()
            .and_then(|b| b.round_mut(round_index))
        else {
            let line = format!("Scoring window open for {}s", state.config.scoring_secs);
            state.push_feed(line);
            return;
        };

        let advanced = bracket::resolve_byes(round);
        let matches = round.matches.clone();

        self.outbox.push(WireMessage::TournamentRound {
            tournament_id: state.id.clone(),
            round: round_index,
            matches,
        });
        state.push_feed(format!("Round {} begins", round_index + 1));

        for player in advanced {
            let message = format!("{player} advances from round {} with a bye", round_index + 1);
            state.push_feed(message.clone());
            self.outbox.push(state.update_message(&player, message));
        }
    }

    /// Whether the current round needs no more play (all byes, or decided).
    pub fn is_round_complete(&self) -> bool {
        self.state
            .as_ref()
            .and_then(|s| s.current_round())
            .is_some_and(Round::is_complete)
    }

    /// Ingest a scoring event during `Active`.
    pub fn record_score(
        &mut self,
        player: &PlayerId,
        points: u64,
        now: DateTime<Utc>,
    ) -> TournamentResponse {
        let Some(state) = self.state.as_mut() else {
            return TournamentResponse::NotActive;
        };

        let rejection = if state.phase != TournamentPhase::Active || state.halted {
            Some(TournamentResponse::NotActive)
        } else if state.participant(player).is_none() {
            Some(TournamentResponse::NotInTournament)
        } else if state.config.kind == TournamentKind::Elimination
            && !state
                .current_round()
                .and_then(|r| r.matches.iter().find(|m| m.involves(player)))
                .is_some_and(|m| m.is_contested() && !m.completed)
        {
            Some(TournamentResponse::NotInMatch)
        } else {
            None
        };

        if let Some(response) = rejection {
            if !state.halted {
                self.outbox.extend(state.notice(player, &response));
            }
            return response;
        }

        let elapsed_ms = state
            .time_box_opened_at
            .map_or(0, |opened| (now - opened).num_milliseconds().max(0) as u64);
        self.resolver.record(&ScoreEvent {
            player: player.clone(),
            points,
            elapsed_ms,
        });

        let kind = state.config.kind;
        let round_score = self.resolver.round_score(player);
        let Some(participant) = state.participant_mut(player) else {
            return TournamentResponse::NotInTournament;
        };
        participant.score = participant.score.saturating_add(points);
        participant.round_best = participant.round_best.max(match kind {
            TournamentKind::Elimination => round_score,
            TournamentKind::Cumulative => points,
        });
        let total = participant.score;
        state.leaderboard.update(player, total);

        let message = match kind {
            TournamentKind::Elimination => {
                format!("{player} scores, {round_score} this round")
            }
            TournamentKind::Cumulative => format!("{player} landed {points} ({total} total)"),
        };
        state.push_feed(message.clone());
        self.outbox.push(state.update_message(player, message));
        TournamentResponse::Success
    }

    /// Close the current time box: decide every open match, then advance
    /// the bracket (elimination) or pick the derby winner (cumulative).
    pub fn resolve_round(&mut self, now: DateTime<Utc>) -> TournamentResult<RoundProgress> {
        let state = self.state.as_mut().ok_or(TournamentError::NoTournament)?;
        if state.phase != TournamentPhase::Active {
            return Err(TournamentError::InvalidPhase {
                expected: TournamentPhase::Active,
                actual: state.phase,
            });
        }
        if state.halted {
            return Ok(RoundProgress::Halted);
        }
        if let Some(winner) = &state.winner {
            return Ok(RoundProgress::Finished(winner.clone()));
        }

        if state.config.kind == TournamentKind::Cumulative {
            let totals: Vec<(PlayerId, u64)> = state
                .participants
                .iter()
                .map(|p| (p.player.clone(), p.score))
                .collect();
            let (winner, decision) = MatchResolver::pick_winner(&totals, &mut self.rng)
                .ok_or_else(|| TournamentError::Internal("cumulative roster is empty".to_string()))?;
            let message = match decision {
                Decision::CoinFlip => format!("{winner} wins {} on a coin flip", state.config.name),
                _ => format!("{winner} wins {}", state.config.name),
            };
            state.winner = Some(winner.clone());
            state.push_feed(message.clone());
            self.outbox.push(state.update_message(&winner, message));
            return Ok(RoundProgress::Finished(winner));
        }

        let round_index = state.current_round;
        let bracket = state.bracket.as_mut().ok_or_else(|| {
            TournamentError::Internal("active elimination tournament has no bracket".to_string())
        })?;
        let round = bracket
            .round_mut(round_index)
            .ok_or(BracketError::NoSuchRound(round_index))?;

        let mut outcomes = Vec::new();
        for m in round.matches.iter_mut() {
            if let Some(outcome) = self.resolver.resolve_match(m, round_index, &mut self.rng) {
                outcomes.push(outcome);
            }
        }
        let advancement = bracket::advance(bracket, round_index)?;

        for outcome in outcomes {
            if let Some(loser) = &outcome.loser {
                if let Some(p) = state.participant_mut(loser) {
                    p.match_losses += 1;
                    p.eliminated_in = Some(round_index);
                }
                if let Some(p) = state.participant_mut(&outcome.winner) {
                    p.match_wins += 1;
                }
            }
            state.push_feed(outcome.message.clone());
            self.outbox
                .push(state.update_message(&outcome.winner, outcome.message));
        }

        match advancement {
            Advancement::NextRound(next) => {
                state.current_round = next;
                self.open_time_box(now);
                Ok(RoundProgress::NextRound(next))
            }
            Advancement::Champion(winner) => {
                log::info!("Tournament {} champion: {}", state.id, winner);
                state.push_feed(format!("{winner} wins the tournament!"));
                state.winner = Some(winner.clone());
                Ok(RoundProgress::Finished(winner))
            }
        }
    }

    /// End the tournament and publish ranked results.
    ///
    /// Returns the summary for persistence; saving it is the caller's job.
    pub fn finalize(&mut self, now: DateTime<Utc>) -> TournamentResult<TournamentSummary> {
        let state = self.state.as_mut().ok_or(TournamentError::NoTournament)?;
        if state.phase != TournamentPhase::Active {
            return Err(TournamentError::InvalidPhase {
                expected: TournamentPhase::Active,
                actual: state.phase,
            });
        }
        if state.halted {
            return Err(TournamentError::Halted);
        }
        let Some(winner) = state.winner.clone() else {
            return Err(TournamentError::NotReadyToFinalize);
        };
        if let Some(bracket) = &state.bracket
            && bracket.champion() != Some(&winner)
        {
            return Err(TournamentError::Internal(format!(
                "recorded winner {winner} is not the bracket champion"
            )));
        }

        state.phase = TournamentPhase::Ended;
        state.finished_at = Some(now);
        self.phase_history.push(TournamentPhase::Ended);

        let results = state.final_results();
        let summary = state.summary(&results, now);
        self.outbox.push(WireMessage::TournamentEnd {
            tournament_id: state.id.clone(),
            results,
        });
        log::info!(
            "Tournament {} ended, {} wins among {} players",
            state.id,
            winner,
            state.participants.len()
        );
        Ok(summary)
    }

    /// A participant leaves.
    ///
    /// Non-hosts only stop playing; the tournament is untouched. A host
    /// leaving while joining cancels the tournament. A host leaving an
    /// active tournament follows the configured [`HostDeparture`].
    pub fn quit(&mut self, player: &PlayerId) -> TournamentResponse {
        let Some(state) = self.state.as_mut() else {
            return TournamentResponse::NotInTournament;
        };
        if state.participant(player).is_none() {
            return TournamentResponse::NotInTournament;
        }
        if &state.host != player {
            return TournamentResponse::SuccessWithMessage("You left the tournament".to_string());
        }

        match state.phase {
            TournamentPhase::Joining => {
                log::info!("Host {} left tournament {}, cancelling", player, state.id);
                self.outbox.push(WireMessage::TournamentCancel {
                    tournament_id: state.id.clone(),
                    reason: format!("host {player} left"),
                });
                self.state = None;
                self.phase_history = vec![TournamentPhase::Idle];
                TournamentResponse::SuccessWithMessage("Tournament cancelled".to_string())
            }
            TournamentPhase::Active => match state.config.host_departure {
                HostDeparture::Continue => TournamentResponse::SuccessWithMessage(
                    "You left; the tournament continues without you".to_string(),
                ),
                HostDeparture::Orphan => {
                    log::warn!("Host {} left tournament {}, halting", player, state.id);
                    state.halted = true;
                    TournamentResponse::SuccessWithMessage("Tournament halted".to_string())
                }
            },
            TournamentPhase::Idle | TournamentPhase::Ended => {
                TournamentResponse::SuccessWithMessage("You left the tournament".to_string())
            }
        }
    }

    /// Full participant snapshot for a resyncing client.
    pub fn sync_snapshot(&self) -> Option<WireMessage> {
        self.state.as_ref().map(|s| WireMessage::TournamentSync {
            tournament_id: s.id.clone(),
            participants: s.participants.clone(),
            phase: Some(s.phase),
        })
    }

    /// Top-K standings.
    pub fn standings(&self) -> Vec<Standing> {
        self.state
            .as_ref()
            .map(|s| s.leaderboard.top())
            .unwrap_or_default()
    }

    /// Lobby view of the tournament.
    pub fn info(&self, now: DateTime<Utc>) -> Option<TournamentInfo> {
        self.state.as_ref().map(|s| TournamentInfo {
            id: s.id.clone(),
            name: s.config.name.clone(),
            kind: s.config.kind,
            host: s.host.clone(),
            phase: s.phase,
            participant_count: s.participants.len(),
            join_remaining_secs: (s.phase == TournamentPhase::Joining)
                .then(|| s.join_window.remaining_secs(now)),
            current_round: s.bracket.as_ref().map(|_| s.current_round),
            standings: s.leaderboard.top(),
            created_at: s.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn coordinator(seed: u64) -> TournamentCoordinator<StdRng> {
        TournamentCoordinator::with_rng(StdRng::seed_from_u64(seed))
    }

    fn p(name: &str) -> PlayerId {
        PlayerId::new(name)
    }

    #[test]
    fn test_create_starts_joining_with_host() {
        let mut c = coordinator(1);
        let now = Utc::now();
        let id = c
            .create(TournamentConfig::default(), p("sysop"), 1, now)
            .unwrap();

        assert_eq!(c.phase(), TournamentPhase::Joining);
        assert_eq!(c.tournament_id(), Some(&id));
        assert_eq!(c.state().unwrap().roster(), vec![p("sysop")]);

        let out = c.drain_outbox();
        assert!(matches!(
            out.as_slice(),
            [WireMessage::TournamentStart { join_period: 60, .. }]
        ));
        assert!(c.drain_outbox().is_empty());
    }

    #[test]
    fn test_create_rejected_while_running() {
        let mut c = coordinator(1);
        let now = Utc::now();
        c.create(TournamentConfig::default(), p("sysop"), 1, now)
            .unwrap();
        let err = c
            .create(TournamentConfig::default(), p("other"), 2, now)
            .unwrap_err();
        assert!(matches!(
            err,
            TournamentError::AlreadyRunning(TournamentPhase::Joining)
        ));
    }

    #[test]
    fn test_create_rejects_invalid_config() {
        let mut c = coordinator(1);
        let mut config = TournamentConfig::default();
        config.max_participants = 40;
        assert!(matches!(
            c.create(config, p("sysop"), 1, Utc::now()),
            Err(TournamentError::InvalidConfig(_))
        ));
        assert_eq!(c.phase(), TournamentPhase::Idle);
    }

    #[test]
    fn test_join_rules() {
        let mut c = coordinator(1);
        let now = Utc::now();
        c.create(TournamentConfig::default(), p("sysop"), 1, now)
            .unwrap();
        c.drain_outbox();

        assert_eq!(c.join(p("ann"), 2, now), TournamentResponse::Success);
        assert_eq!(c.join(p("ann"), 2, now), TournamentResponse::AlreadyJoined);

        let late = now + TimeDelta::seconds(61);
        assert_eq!(c.join(p("bob"), 3, late), TournamentResponse::AlreadyStarted);

        let out = c.drain_outbox();
        assert!(matches!(
            out[0],
            WireMessage::TournamentJoin { seat: Some(1), .. }
        ));
        assert!(matches!(out[1], WireMessage::TournamentNotice { .. }));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_roster_capped_at_max_participants() {
        let mut c = coordinator(1);
        let now = Utc::now();
        c.create(TournamentConfig::default(), p("sysop"), 0, now)
            .unwrap();
        for i in 1..16 {
            assert!(c.join(p(&format!("p{i}")), i, now).is_success());
        }
        assert_eq!(c.join(p("p16"), 16, now), TournamentResponse::TournamentFull);
        assert_eq!(c.state().unwrap().participants.len(), 16);
    }

    #[test]
    fn test_host_quit_while_joining_cancels() {
        let mut c = coordinator(1);
        let now = Utc::now();
        c.create(TournamentConfig::default(), p("sysop"), 1, now)
            .unwrap();
        c.join(p("ann"), 2, now);
        c.drain_outbox();

        assert!(c.quit(&p("sysop")).is_success());
        assert_eq!(c.phase(), TournamentPhase::Idle);
        assert!(matches!(
            c.drain_outbox().as_slice(),
            [WireMessage::TournamentCancel { .. }]
        ));
    }

    #[test]
    fn test_non_host_quit_does_not_mutate() {
        let mut c = coordinator(1);
        let now = Utc::now();
        c.create(TournamentConfig::default(), p("sysop"), 1, now)
            .unwrap();
        c.join(p("ann"), 2, now);
        c.drain_outbox();

        assert!(c.quit(&p("ann")).is_success());
        assert_eq!(c.state().unwrap().participants.len(), 2);
        assert!(c.drain_outbox().is_empty());
        assert_eq!(c.quit(&p("stranger")), TournamentResponse::NotInTournament);
    }

    #[test]
    fn test_lock_is_host_only() {
        let mut c = coordinator(1);
        let now = Utc::now();
        assert_eq!(c.check_lock(&p("sysop")), TournamentResponse::NotActive);
        c.create(TournamentConfig::default(), p("sysop"), 1, now)
            .unwrap();
        assert_eq!(c.check_lock(&p("ann")), TournamentResponse::NotHost);
        assert_eq!(c.check_lock(&p("sysop")), TournamentResponse::Success);
        c.close_join_window(now).unwrap();
        assert_eq!(c.check_lock(&p("sysop")), TournamentResponse::AlreadyStarted);
    }

    #[test]
    fn test_score_rejected_outside_live_match() {
        let mut c = coordinator(4);
        let now = Utc::now();
        c.create(TournamentConfig::default(), p("sysop"), 1, now)
            .unwrap();
        assert_eq!(c.record_score(&p("sysop"), 1, now), TournamentResponse::NotActive);

        c.join(p("ann"), 2, now);
        c.join(p("bob"), 3, now);
        c.close_join_window(now).unwrap();

        let bye_player = c.state().unwrap().bracket.as_ref().unwrap().rounds[0]
            .matches
            .iter()
            .find(|m| m.is_bye())
            .and_then(|m| m.winner.clone())
            .unwrap();
        assert_eq!(
            c.record_score(&bye_player, 1, now),
            TournamentResponse::NotInMatch
        );
        assert_eq!(
            c.record_score(&p("ghost"), 1, now),
            TournamentResponse::NotInTournament
        );
    }

    #[test]
    fn test_score_updates_leaderboard_and_broadcasts() {
        let mut c = coordinator(4);
        let now = Utc::now();
        c.create(TournamentConfig::fishing("Derby".to_string()), p("sysop"), 1, now)
            .unwrap();
        c.join(p("ann"), 2, now);
        c.close_join_window(now).unwrap();
        c.drain_outbox();

        assert!(c.record_score(&p("ann"), 12, now).is_success());
        assert!(c.record_score(&p("sysop"), 5, now).is_success());
        assert!(c.record_score(&p("ann"), 3, now).is_success());

        let standings = c.standings();
        assert_eq!(standings[0].player, p("ann"));
        assert_eq!(standings[0].score, 15);

        let out = c.drain_outbox();
        assert_eq!(out.len(), 3);
        match &out[2] {
            WireMessage::TournamentUpdate {
                total_score,
                position,
                ..
            } => {
                assert_eq!(*total_score, 15);
                assert_eq!(*position, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(c.state().unwrap().participant(&p("ann")).unwrap().round_best, 12);
    }

    #[test]
    fn test_oversized_scores_saturate() {
        let mut c = coordinator(4);
        let now = Utc::now();
        c.create(TournamentConfig::fishing("Derby".to_string()), p("sysop"), 1, now)
            .unwrap();
        c.join(p("ann"), 2, now);
        c.close_join_window(now).unwrap();

        assert!(c.record_score(&p("ann"), u64::MAX, now).is_success());
        assert!(c.record_score(&p("ann"), 1, now).is_success());
        assert!(c.record_score(&p("sysop"), 7, now).is_success());

        let ann = c.state().unwrap().participant(&p("ann")).unwrap();
        assert_eq!(ann.score, u64::MAX);
        assert_eq!(c.standings()[0].player, p("ann"));
        assert_eq!(
            c.resolve_round(now).unwrap(),
            RoundProgress::Finished(p("ann"))
        );
    }

    #[test]
    fn test_finalize_requires_winner() {
        let mut c = coordinator(4);
        let now = Utc::now();
        c.create(TournamentConfig::default(), p("sysop"), 1, now)
            .unwrap();
        c.join(p("ann"), 2, now);
        assert!(matches!(
            c.finalize(now),
            Err(TournamentError::InvalidPhase { .. })
        ));
        c.close_join_window(now).unwrap();
        assert!(matches!(
            c.finalize(now),
            Err(TournamentError::NotReadyToFinalize)
        ));
    }

    #[test]
    fn test_info_reports_join_countdown() {
        let mut c = coordinator(4);
        let now = Utc::now();
        assert!(c.info(now).is_none());
        c.create(TournamentConfig::default(), p("sysop"), 1, now)
            .unwrap();
        let info = c.info(now + TimeDelta::seconds(15)).unwrap();
        assert_eq!(info.phase, TournamentPhase::Joining);
        assert_eq!(info.join_remaining_secs, Some(45));
        assert_eq!(info.current_round, None);
    }
}
