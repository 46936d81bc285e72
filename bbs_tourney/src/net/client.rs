//! Tournament client for BBS sessions.
//!
//! A client never decides tournament outcomes. It turns user input into
//! requests on the bus and keeps a [`TournamentMirror`] current from what the
//! authority broadcasts.

use async_trait::async_trait;
use chrono::Utc;
use std::{str::FromStr, sync::Arc, time::Duration};
use tokio::sync::mpsc;

use super::{
    bus::{Bus, BusSubscription},
    errors::BusError,
    messages::WireMessage,
};
use crate::tournament::{
    mirror::TournamentMirror,
    models::{PlayerId, TournamentKind, TournamentPhase},
};

/// How long one input poll waits before the client checks the bus again.
pub const INPUT_POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Where user input lines come from (a BBS session, a test script).
#[async_trait]
pub trait InputSource: Send {
    /// Next line, or `None` if nothing arrived within `timeout`.
    async fn poll_input(&mut self, timeout: Duration) -> Option<String>;
}

/// Input fed through a tokio channel.
pub struct ChannelInput {
    receiver: mpsc::Receiver<String>,
}

impl ChannelInput {
    pub fn new(receiver: mpsc::Receiver<String>) -> Self {
        Self { receiver }
    }

    /// A connected sender and input source.
    pub fn channel(capacity: usize) -> (mpsc::Sender<String>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl InputSource for ChannelInput {
    async fn poll_input(&mut self, timeout: Duration) -> Option<String> {
        tokio::time::timeout(timeout, self.receiver.recv())
            .await
            .ok()
            .flatten()
    }
}

/// A parsed user command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    /// `create [elimination|cumulative]`
    Create(Option<TournamentKind>),
    /// `join`
    Join,
    /// `score <points>`
    Score(u64),
    /// `lock` (host only)
    Lock,
    /// `resync`
    Resync,
    /// `quit`
    Quit,
}

impl FromStr for ClientCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let verb = words
            .next()
            .ok_or_else(|| "empty command".to_string())?
            .to_ascii_lowercase();
        let arg = words.next();

        match (verb.as_str(), arg) {
            ("create", None) => Ok(Self::Create(None)),
            ("create", Some(kind)) => kind.parse().map(|k| Self::Create(Some(k))),
            ("join", None) => Ok(Self::Join),
            ("score", Some(points)) => points
                .parse()
                .map(Self::Score)
                .map_err(|_| format!("invalid score '{points}'")),
            ("score", None) => Err("usage: score <points>".to_string()),
            ("lock", None) => Ok(Self::Lock),
            ("resync" | "sync", None) => Ok(Self::Resync),
            ("quit" | "leave", None) => Ok(Self::Quit),
            _ => Err(format!("unknown command '{}'", s.trim())),
        }
    }
}

/// A player's view of tournaments on the bus.
pub struct TournamentClient<I> {
    mirror: TournamentMirror,
    user_id: i64,
    bus: Arc<dyn Bus>,
    subscription: BusSubscription,
    input: I,
    quit: bool,
}

impl<I: InputSource> TournamentClient<I> {
    pub fn new(player: PlayerId, user_id: i64, bus: Arc<dyn Bus>, input: I) -> Self {
        let subscription = bus.subscribe();
        Self {
            mirror: TournamentMirror::new(player),
            user_id,
            bus,
            subscription,
            input,
            quit: false,
        }
    }

    pub fn mirror(&self) -> &TournamentMirror {
        &self.mirror
    }

    /// Publish the request for `command`.
    ///
    /// Errors are user-facing: the command made no sense in the current
    /// state, or nothing is listening on the bus.
    pub fn command(&mut self, command: ClientCommand) -> Result<(), String> {
        let me = self.mirror.me().clone();
        let phase = self.mirror.phase();

        let message = match command {
            ClientCommand::Create(kind) => {
                if matches!(phase, TournamentPhase::Joining | TournamentPhase::Active) {
                    return Err("A tournament is already running".to_string());
                }
                WireMessage::TournamentCreate {
                    host: me,
                    user_id: self.user_id,
                    kind,
                }
            }
            ClientCommand::Join => {
                if phase != TournamentPhase::Joining {
                    return Err("No tournament is open for joining".to_string());
                }
                if self.mirror.has_joined() {
                    return Err("Already joined".to_string());
                }
                WireMessage::TournamentJoin {
                    tournament_id: self.current_id()?,
                    player: me,
                    user_id: self.user_id,
                    seat: None,
                }
            }
            ClientCommand::Score(points) => {
                if phase != TournamentPhase::Active || self.mirror.has_left() {
                    return Err("Tournament is not running".to_string());
                }
                WireMessage::TournamentScore {
                    tournament_id: self.current_id()?,
                    player: me,
                    points,
                }
            }
            ClientCommand::Lock => {
                if !self.mirror.is_host() || phase != TournamentPhase::Joining {
                    return Err("Only the host can lock the roster".to_string());
                }
                WireMessage::TournamentLock {
                    tournament_id: self.current_id()?,
                    requester: me,
                }
            }
            ClientCommand::Resync => WireMessage::TournamentSyncRequest {
                tournament_id: self.current_id()?,
                requester: me,
            },
            ClientCommand::Quit => {
                self.quit = true;
                let Ok(tournament_id) = self.current_id() else {
                    return Ok(());
                };
                self.mirror.mark_left();
                WireMessage::TournamentQuit {
                    tournament_id,
                    player: me,
                }
            }
        };

        self.bus
            .publish(&message)
            .map(|_| ())
            .map_err(|e| match e {
                BusError::NoSubscribers => "Tournament service is unavailable".to_string(),
                other => other.to_string(),
            })
    }

    fn current_id(&self) -> Result<crate::tournament::models::TournamentId, String> {
        self.mirror
            .tournament_id()
            .cloned()
            .ok_or_else(|| "No tournament".to_string())
    }

    /// Apply everything already buffered on the bus. Returns how many
    /// messages changed the mirror.
    pub fn drain_bus(&mut self) -> usize {
        let mut applied = 0;
        loop {
            match self.subscription.try_recv() {
                Ok(Some(message)) => {
                    if self.mirror.apply(&message, Utc::now()) {
                        applied += 1;
                    }
                }
                Ok(None) => break,
                Err(BusError::Lagged(skipped)) => {
                    log::warn!(
                        "{} missed {} tournament frames, resyncing",
                        self.mirror.me(),
                        skipped
                    );
                    self.mirror.mark_stale();
                    if self.mirror.tournament_id().is_some()
                        && let Err(e) = self.command(ClientCommand::Resync)
                    {
                        log::warn!("Resync request failed: {}", e);
                    }
                }
                Err(e) => {
                    log::error!("Tournament bus failed: {}", e);
                    self.quit = true;
                    break;
                }
            }
        }
        applied
    }

    /// One poll cycle: wait up to [`INPUT_POLL_TIMEOUT`] for input, act on
    /// it, then catch up with the bus. Returns `false` once the client is
    /// done (the player quit, or the tournament ended).
    pub async fn step(&mut self) -> bool {
        if let Some(line) = self.input.poll_input(INPUT_POLL_TIMEOUT).await {
            let result = line
                .parse::<ClientCommand>()
                .and_then(|command| self.command(command));
            if let Err(message) = result {
                log::info!("{}: {}", self.mirror.me(), message);
            }
        }
        self.drain_bus();
        !self.quit && self.mirror.phase() != TournamentPhase::Ended
    }

    /// Run until the player quits or the tournament ends.
    pub async fn run(mut self) -> TournamentMirror {
        while self.step().await {}
        self.mirror
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{net::bus::LocalBus, tournament::models::TournamentId};

    #[test]
    fn test_parse_commands() {
        assert_eq!("join".parse(), Ok(ClientCommand::Join));
        assert_eq!("SCORE 12".parse(), Ok(ClientCommand::Score(12)));
        assert_eq!(
            "create cumulative".parse(),
            Ok(ClientCommand::Create(Some(TournamentKind::Cumulative)))
        );
        assert_eq!("sync".parse(), Ok(ClientCommand::Resync));
        assert!("score lots".parse::<ClientCommand>().is_err());
        assert!("dance".parse::<ClientCommand>().is_err());
    }

    #[tokio::test]
    async fn test_join_requires_open_tournament() {
        let bus = Arc::new(LocalBus::new(16));
        let (_tx, input) = ChannelInput::channel(4);
        let mut client = TournamentClient::new(PlayerId::new("ann"), 2, bus.clone(), input);

        assert!(client.command(ClientCommand::Join).is_err());

        bus.publish(&WireMessage::TournamentStart {
            tournament_id: TournamentId::from("t1"),
            host: PlayerId::new("sysop"),
            kind: TournamentKind::Elimination,
            duration: 30,
            join_period: 60,
        })
        .unwrap();
        assert_eq!(client.drain_bus(), 1);

        let mut watcher = bus.subscribe();
        client.command(ClientCommand::Join).unwrap();
        assert_eq!(
            watcher.try_recv().unwrap(),
            Some(WireMessage::TournamentJoin {
                tournament_id: TournamentId::from("t1"),
                player: PlayerId::new("ann"),
                user_id: 2,
                seat: None,
            })
        );
        assert!(client.command(ClientCommand::Lock).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_processes_input_and_quit() {
        let bus = Arc::new(LocalBus::new(16));
        let (tx, input) = ChannelInput::channel(4);
        let mut client = TournamentClient::new(PlayerId::new("ann"), 2, bus, input);

        tx.send("bogus".to_string()).await.unwrap();
        assert!(client.step().await);
        tx.send("quit".to_string()).await.unwrap();
        assert!(!client.step().await);
    }
}
