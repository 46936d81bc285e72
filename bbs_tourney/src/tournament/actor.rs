//! Tournament actor: owns one coordinator and feeds it from its inbox, the
//! bus, and its countdowns.

use super::{
    coordinator::{RoundProgress, TournamentCoordinator, TournamentError},
    messages::{TournamentMessage, TournamentResponse},
    models::{PlayerId, TournamentId, TournamentInfo, TournamentPhase},
    timer::{Countdown, CountdownHandle, TimerOutcome},
};
use crate::{
    db::TournamentRepository,
    net::{
        adapter::{Request, inbound_request},
        bus::{Bus, BusSubscription, publish_all},
        errors::{BusError, BusResult},
        messages::WireMessage,
    },
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Tournament actor handle for sending messages
#[derive(Clone)]
pub struct TournamentHandle {
    sender: mpsc::Sender<TournamentMessage>,
    tournament_id: TournamentId,
}

impl TournamentHandle {
    pub fn new(sender: mpsc::Sender<TournamentMessage>, tournament_id: TournamentId) -> Self {
        Self {
            sender,
            tournament_id,
        }
    }

    pub fn tournament_id(&self) -> &TournamentId {
        &self.tournament_id
    }

    /// Whether the actor has stopped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Send a message to the tournament
    pub async fn send(&self, message: TournamentMessage) -> Result<(), String> {
        self.sender
            .send(message)
            .await
            .map_err(|_| "Tournament is closed".to_string())
    }

    async fn request(
        &self,
        build: impl FnOnce(oneshot::Sender<TournamentResponse>) -> TournamentMessage,
    ) -> TournamentResponse {
        let (tx, rx) = oneshot::channel();
        if let Err(e) = self.send(build(tx)).await {
            return TournamentResponse::Error(e);
        }
        rx.await
            .unwrap_or_else(|_| TournamentResponse::Error("No response from tournament".to_string()))
    }

    pub async fn join(&self, player: PlayerId, user_id: i64) -> TournamentResponse {
        self.request(|response| TournamentMessage::Join {
            player,
            user_id,
            response,
        })
        .await
    }

    pub async fn score(&self, player: PlayerId, points: u64) -> TournamentResponse {
        self.request(|response| TournamentMessage::Score {
            player,
            points,
            response,
        })
        .await
    }

    pub async fn lock(&self, requester: PlayerId) -> TournamentResponse {
        self.request(|response| TournamentMessage::Lock {
            requester,
            response,
        })
        .await
    }

    pub async fn quit(&self, player: PlayerId) -> TournamentResponse {
        self.request(|response| TournamentMessage::Quit { player, response })
            .await
    }

    /// Current `tournament-sync` snapshot, `None` once the actor is gone.
    pub async fn sync(&self) -> Option<WireMessage> {
        let (tx, rx) = oneshot::channel();
        self.send(TournamentMessage::Sync { response: tx }).await.ok()?;
        rx.await.ok().flatten()
    }

    pub async fn info(&self) -> Option<TournamentInfo> {
        let (tx, rx) = oneshot::channel();
        self.send(TournamentMessage::GetInfo { response: tx })
            .await
            .ok()?;
        rx.await.ok().flatten()
    }

    pub async fn close(&self) {
        let _ = self.send(TournamentMessage::Close).await;
    }
}

/// Tournament actor driving a single [`TournamentCoordinator`]
///
/// Everything that mutates the tournament arrives through one
/// `tokio::select!` loop, so the coordinator never sees concurrent calls.
/// After every event the coordinator's outbox is published on the bus.
pub struct TournamentActor {
    id: TournamentId,
    coordinator: TournamentCoordinator,
    inbox: mpsc::Receiver<TournamentMessage>,
    bus: Arc<dyn Bus>,
    subscription: BusSubscription,
    repository: Arc<dyn TournamentRepository>,
    countdown: Option<Countdown>,
    countdown_handle: Option<CountdownHandle>,
    is_closed: bool,
}

impl TournamentActor {
    /// Wrap a coordinator that already holds a created tournament.
    ///
    /// Subscribes to the bus immediately so no request published after this
    /// call is missed.
    pub fn new(
        coordinator: TournamentCoordinator,
        bus: Arc<dyn Bus>,
        repository: Arc<dyn TournamentRepository>,
    ) -> Result<(Self, TournamentHandle), TournamentError> {
        let id = coordinator
            .tournament_id()
            .cloned()
            .ok_or(TournamentError::NoTournament)?;
        let (sender, inbox) = mpsc::channel(100);
        let subscription = bus.subscribe();

        let actor = Self {
            id: id.clone(),
            coordinator,
            inbox,
            bus,
            subscription,
            repository,
            countdown: None,
            countdown_handle: None,
            is_closed: false,
        };

        Ok((actor, TournamentHandle::new(sender, id)))
    }

    /// Run the tournament actor event loop
    pub async fn run(mut self) {
        log::info!("Tournament {} starting", self.id);

        if let Some(state) = self.coordinator.state() {
            let period = state.config.join_period();
            self.arm(period);
        }
        self.flush();

        while !self.is_closed {
            tokio::select! {
                Some(message) = self.inbox.recv() => {
                    self.handle_message(message);
                }

                received = self.subscription.recv() => {
                    self.handle_bus(received);
                }

                outcome = wait_for(&mut self.countdown) => {
                    self.handle_timer(outcome);
                }
            }
            self.flush();
        }

        self.disarm();
        log::info!("Tournament {} actor stopped", self.id);
    }

    fn handle_message(&mut self, message: TournamentMessage) {
        let now = Utc::now();
        match message {
            TournamentMessage::Join {
                player,
                user_id,
                response,
            } => {
                let result = self.coordinator.join(player, user_id, now);
                let _ = response.send(result);
            }

            TournamentMessage::Score {
                player,
                points,
                response,
            } => {
                let result = self.coordinator.record_score(&player, points, now);
                let _ = response.send(result);
            }

            TournamentMessage::Lock {
                requester,
                response,
            } => {
                let _ = response.send(self.lock(&requester));
            }

            TournamentMessage::Quit { player, response } => {
                let _ = response.send(self.quit(&player));
            }

            TournamentMessage::Sync { response } => {
                let _ = response.send(self.coordinator.sync_snapshot());
            }

            TournamentMessage::GetInfo { response } => {
                let _ = response.send(self.coordinator.info(now));
            }

            TournamentMessage::Close => {
                log::info!("Tournament {} closing on request", self.id);
                self.is_closed = true;
            }
        }
    }

    fn handle_bus(&mut self, received: BusResult<WireMessage>) {
        let message = match received {
            Ok(message) => message,
            Err(BusError::Lagged(skipped)) => {
                log::warn!("Tournament {} missed {} bus frames", self.id, skipped);
                return;
            }
            Err(e) => {
                log::error!("Tournament {} bus failure: {}", self.id, e);
                self.is_closed = true;
                return;
            }
        };

        let Some(request) = inbound_request(message, &self.id) else {
            return;
        };
        let player = request.player().clone();
        let now = Utc::now();

        let response = match request {
            Request::Join { player, user_id } => self.coordinator.join(player, user_id, now),
            Request::Score { player, points } => {
                self.coordinator.record_score(&player, points, now)
            }
            Request::Lock { requester } => self.lock(&requester),
            Request::Quit { player } => self.quit(&player),
            Request::SyncRequest { requester } => {
                log::debug!("Tournament {} sync requested by {}", self.id, requester);
                let snapshot = self.coordinator.sync_snapshot().into_iter().collect();
                publish_all(self.bus.as_ref(), snapshot);
                TournamentResponse::Success
            }
        };

        if let Some(reason) = response.error_message() {
            log::debug!("Tournament {}: request from {} refused: {}", self.id, player, reason);
        }
    }

    fn handle_timer(&mut self, outcome: TimerOutcome) {
        self.countdown = None;
        self.countdown_handle = None;
        if outcome == TimerOutcome::Cancelled {
            return;
        }

        let now = Utc::now();
        match self.coordinator.phase() {
            TournamentPhase::Joining => {
                log::info!("Tournament {} join window closed ({:?})", self.id, outcome);
                match self.coordinator.close_join_window(now) {
                    Ok(()) => self.advance_until_playable(now),
                    Err(e) => self.fail(e),
                }
            }
            TournamentPhase::Active => self.close_time_box(now),
            TournamentPhase::Idle | TournamentPhase::Ended => {}
        }
    }

    fn close_time_box(&mut self, now: DateTime<Utc>) {
        match self.coordinator.resolve_round(now) {
            Ok(RoundProgress::NextRound(round)) => {
                log::debug!("Tournament {} opening round {}", self.id, round + 1);
                self.advance_until_playable(now);
            }
            Ok(RoundProgress::Finished(_)) => self.finish(now),
            Ok(RoundProgress::Halted) => self.halt(),
            Err(e) => self.fail(e),
        }
    }

    /// Resolve rounds that need no play (byes only) until one does, then arm
    /// its countdown. Ends the tournament if a champion falls out.
    fn advance_until_playable(&mut self, now: DateTime<Utc>) {
        loop {
            if self.coordinator.is_halted() {
                self.halt();
                return;
            }
            if !self.coordinator.is_round_complete() {
                if let Some(state) = self.coordinator.state() {
                    let period = state.config.active_period();
                    self.arm(period);
                }
                return;
            }

            match self.coordinator.resolve_round(now) {
                Ok(RoundProgress::NextRound(_)) => continue,
                Ok(RoundProgress::Finished(_)) => {
                    self.finish(now);
                    return;
                }
                Ok(RoundProgress::Halted) => {
                    self.halt();
                    return;
                }
                Err(e) => {
                    self.fail(e);
                    return;
                }
            }
        }
    }

    fn finish(&mut self, now: DateTime<Utc>) {
        self.disarm();
        match self.coordinator.finalize(now) {
            Ok(summary) => {
                let repository = Arc::clone(&self.repository);
                let id = self.id.clone();
                tokio::spawn(async move {
                    match repository.save(&summary).await {
                        Ok(()) => log::info!("Tournament {} results saved", id),
                        Err(e) => log::error!("Failed to save tournament {}: {}", id, e),
                    }
                });
            }
            Err(e) => self.fail(e),
        }
    }

    fn lock(&mut self, requester: &PlayerId) -> TournamentResponse {
        let response = self.coordinator.check_lock(requester);
        if response.is_success() {
            match &self.countdown_handle {
                Some(handle) => {
                    log::info!("Tournament {} roster locked by {}", self.id, requester);
                    handle.lock();
                }
                None => return TournamentResponse::NotActive,
            }
        }
        response
    }

    fn quit(&mut self, player: &PlayerId) -> TournamentResponse {
        let response = self.coordinator.quit(player);
        if self.coordinator.phase() == TournamentPhase::Idle {
            // Host left before the start; the tournament no longer exists.
            self.disarm();
            self.is_closed = true;
        } else if self.coordinator.is_halted() {
            self.halt();
        }
        response
    }

    /// Host left under the orphan policy: stop without broadcasting, so
    /// mirrors stay where they were.
    fn halt(&mut self) {
        log::warn!("Tournament {} halted, stopping actor", self.id);
        self.disarm();
        self.is_closed = true;
    }

    fn fail(&mut self, error: TournamentError) {
        log::error!("Tournament {} aborted: {}", self.id, error);
        self.disarm();
        self.is_closed = true;
    }

    fn arm(&mut self, period: std::time::Duration) {
        self.disarm();
        let (countdown, handle) = Countdown::start(period);
        self.countdown = Some(countdown);
        self.countdown_handle = Some(handle);
    }

    fn disarm(&mut self) {
        if let Some(handle) = self.countdown_handle.take() {
            handle.cancel();
        }
        self.countdown = None;
    }

    fn flush(&mut self) {
        let outbox = self.coordinator.drain_outbox();
        if !outbox.is_empty() {
            publish_all(self.bus.as_ref(), outbox);
        }
    }
}

async fn wait_for(countdown: &mut Option<Countdown>) -> TimerOutcome {
    match countdown {
        Some(countdown) => countdown.wait().await,
        None => std::future::pending().await,
    }
}
