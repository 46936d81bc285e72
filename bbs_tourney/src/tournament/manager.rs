//! Tournament manager for spawning and tracking tournament actors.

use super::{
    actor::{TournamentActor, TournamentHandle},
    coordinator::{TournamentCoordinator, TournamentError, TournamentResult},
    models::{
        CareerStats, PlayerId, TournamentConfig, TournamentId, TournamentInfo, TournamentKind,
        TournamentPhase,
    },
};
use crate::{
    db::{RepositoryResult, TournamentRepository},
    net::{
        bus::Bus,
        errors::BusError,
        messages::WireMessage,
    },
};
use chrono::Utc;
use std::{collections::HashMap, sync::Arc};
use tokio::{sync::RwLock, task::JoinHandle};

/// Tournament manager holding one actor per live tournament
pub struct TournamentManager {
    /// Shared broadcast bus
    bus: Arc<dyn Bus>,

    /// Where finished tournaments are saved
    repository: Arc<dyn TournamentRepository>,

    /// Settings for tournaments created without explicit config
    defaults: TournamentConfig,

    /// Active tournament handles
    tournaments: Arc<RwLock<HashMap<TournamentId, TournamentHandle>>>,
}

impl TournamentManager {
    pub fn new(
        bus: Arc<dyn Bus>,
        repository: Arc<dyn TournamentRepository>,
        defaults: TournamentConfig,
    ) -> Self {
        Self {
            bus,
            repository,
            defaults,
            tournaments: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn defaults(&self) -> &TournamentConfig {
        &self.defaults
    }

    /// Create a tournament hosted by `host` using the default settings,
    /// optionally switching the resolution strategy.
    ///
    /// A host may only run one unfinished tournament at a time.
    pub async fn create_tournament(
        &self,
        host: PlayerId,
        host_user_id: i64,
        kind: Option<TournamentKind>,
    ) -> TournamentResult<TournamentHandle> {
        let config = match kind {
            Some(kind) => self.defaults.clone().with_kind(kind),
            None => self.defaults.clone(),
        };
        self.create_with_config(config, host, host_user_id).await
    }

    pub async fn create_with_config(
        &self,
        config: TournamentConfig,
        host: PlayerId,
        host_user_id: i64,
    ) -> TournamentResult<TournamentHandle> {
        if let Some(phase) = self.running_phase_for_host(&host).await {
            return Err(TournamentError::AlreadyRunning(phase));
        }

        let mut coordinator = TournamentCoordinator::new();
        coordinator.create(config, host, host_user_id, Utc::now())?;
        self.spawn(coordinator).await
    }

    /// Spawn an actor for a coordinator that already holds a created
    /// tournament. Tests use this to inject a seeded RNG.
    pub async fn spawn(
        &self,
        coordinator: TournamentCoordinator,
    ) -> TournamentResult<TournamentHandle> {
        let (actor, handle) = TournamentActor::new(
            coordinator,
            Arc::clone(&self.bus),
            Arc::clone(&self.repository),
        )?;

        tokio::spawn(actor.run());

        let id = handle.tournament_id().clone();
        self.tournaments
            .write()
            .await
            .insert(id.clone(), handle.clone());
        log::info!("Spawned tournament actor {}", id);

        Ok(handle)
    }

    async fn running_phase_for_host(&self, host: &PlayerId) -> Option<TournamentPhase> {
        self.running_for_host(host).await.map(|info| info.phase)
    }

    /// The unfinished tournament `host` is running, if any.
    pub async fn running_for_host(&self, host: &PlayerId) -> Option<TournamentInfo> {
        self.list_tournaments()
            .await
            .into_iter()
            .find(|info| &info.host == host && info.phase != TournamentPhase::Ended)
    }

    /// Get tournament handle by ID
    pub async fn get_tournament(&self, id: &TournamentId) -> TournamentResult<TournamentHandle> {
        self.tournaments
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| TournamentError::NotFound(id.clone()))
    }

    /// Lobby view of every live tournament, oldest first
    pub async fn list_tournaments(&self) -> Vec<TournamentInfo> {
        let handles: Vec<TournamentHandle> =
            self.tournaments.read().await.values().cloned().collect();

        let mut infos = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Some(info) = handle.info().await {
                infos.push(info);
            }
        }
        infos.sort_by_key(|info| info.created_at);
        infos
    }

    /// Number of tournaments whose actor is still running
    pub async fn active_tournament_count(&self) -> usize {
        self.tournaments
            .read()
            .await
            .values()
            .filter(|h| !h.is_closed())
            .count()
    }

    /// Drop tournaments that ended or whose actor stopped.
    ///
    /// Returns how many were removed.
    pub async fn remove_finished(&self) -> usize {
        let handles: Vec<TournamentHandle> =
            self.tournaments.read().await.values().cloned().collect();

        let mut finished = Vec::new();
        for handle in handles {
            let ended = match handle.info().await {
                Some(info) => info.phase == TournamentPhase::Ended,
                None => true,
            };
            if ended {
                handle.close().await;
                finished.push(handle.tournament_id().clone());
            }
        }

        let mut tournaments = self.tournaments.write().await;
        for id in &finished {
            tournaments.remove(id);
            log::debug!("Removed finished tournament {}", id);
        }
        finished.len()
    }

    /// Career record for `player` from the results store
    pub async fn career_stats(&self, player: &PlayerId) -> RepositoryResult<CareerStats> {
        self.repository.load_career_stats(player).await
    }

    /// Tell `host` why their create request was refused.
    ///
    /// Notices are addressed within a tournament, so this needs the one the
    /// host is already running; other refusals are only logged.
    async fn notify_refused_create(&self, host: PlayerId, error: &TournamentError) {
        let Some(running) = self.running_for_host(&host).await else {
            return;
        };
        let notice = WireMessage::TournamentNotice {
            tournament_id: running.id,
            player: host,
            message: error.to_string(),
        };
        if let Err(e) = self.bus.publish(&notice) {
            log::warn!("Could not publish create refusal: {}", e);
        }
    }

    /// Listen on the bus for `tournament-create` requests and spawn
    /// tournaments for them.
    ///
    /// The subscription is taken before this returns, so creates published
    /// afterwards are never missed.
    pub fn spawn_dispatcher(self: &Arc<Self>) -> JoinHandle<()> {
        let mut subscription = self.bus.subscribe();
        let manager = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                let message = match subscription.recv().await {
                    Ok(message) => message,
                    Err(BusError::Lagged(skipped)) => {
                        log::warn!("Tournament dispatcher missed {} bus frames", skipped);
                        continue;
                    }
                    Err(e) => {
                        log::info!("Tournament dispatcher stopping: {}", e);
                        break;
                    }
                };

                if let WireMessage::TournamentCreate {
                    host,
                    user_id,
                    kind,
                } = message
                {
                    manager.remove_finished().await;
                    match manager.create_tournament(host.clone(), user_id, kind).await {
                        Ok(handle) => log::info!(
                            "{} created tournament {} over the bus",
                            host,
                            handle.tournament_id()
                        ),
                        Err(e) => {
                            log::warn!("Create request from {} refused: {}", host, e);
                            manager.notify_refused_create(host, &e).await;
                        }
                    }
                }
            }
        })
    }
}
