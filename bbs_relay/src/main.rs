//! Tournament relay for BBS door games.
//!
//! Bridges door clients onto one shared bus over WebSockets and runs a
//! tournament actor per live tournament, spawned on `tournament-create`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Error;
use bbs_relay::{api, config::RelayConfig, logging, metrics, monitor};
use bbs_tourney::{
    Bus, LocalBus, TournamentManager,
    db::{Database, InMemoryTournamentRepository, TournamentRepository},
};
use pico_args::Arguments;
use tracing::info;

const HELP: &str = "\
Run the BBS tournament relay

USAGE:
  bbs_relay [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Relay socket bind address  [default: env RELAY_BIND or 127.0.0.1:6969]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  RELAY_BIND                     Relay bind address (e.g., 0.0.0.0:6969)
  METRICS_BIND                   Prometheus scrape address, unset or 'off' to disable
  DATABASE_URL                   PostgreSQL connection string; results stay in memory when unset
  TOURNAMENT_KIND                elimination or cumulative [default: elimination]
  TOURNAMENT_JOIN_PERIOD_SECS    Join window length [default: 60]
  TOURNAMENT_ROUND_SECS          Elimination round time box [default: 30]
  TOURNAMENT_SCORING_SECS        Cumulative scoring window [default: 300]
  TOURNAMENT_MAX_PARTICIPANTS    Roster limit, at most 16 [default: 16]
  TOURNAMENT_TOP_K               Leaderboard rows, 5 or 10
  TOURNAMENT_HOST_DEPARTURE      continue or orphan [default: continue]
  BUS_CAPACITY                   Frames buffered per subscriber [default: 256]
  (See .env.example for all configuration options)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let bind: Option<SocketAddr> = pargs.opt_value_from_str("--bind")?;

    logging::init();

    let config = RelayConfig::from_env(bind)?;
    info!("Starting tournament relay at {}", config.bind);

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(anyhow::Error::msg)?;
        info!("Prometheus metrics exposed on {}", addr);
    }

    let database = match &config.database {
        Some(db_config) => {
            info!("Connecting to database");
            let db = Database::new(db_config)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
            db.migrate()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
            info!("Database connected successfully");
            Some(db)
        }
        None => {
            info!("DATABASE_URL not set, tournament results kept in memory");
            None
        }
    };

    let repository: Arc<dyn TournamentRepository> = match &database {
        Some(db) => Arc::new(db.results_repository()),
        None => Arc::new(InMemoryTournamentRepository::new()),
    };

    let bus = Arc::new(LocalBus::new(config.bus_capacity));
    let shared_bus: Arc<dyn Bus> = bus.clone();

    let manager = Arc::new(TournamentManager::new(
        Arc::clone(&shared_bus),
        repository,
        config.tournament_defaults.clone(),
    ));
    let dispatcher = manager.spawn_dispatcher();
    let monitor = monitor::spawn_bus_monitor(shared_bus, Arc::clone(&manager));

    info!(
        "Default tournament: {} ({}), {}s join window, up to {} players",
        config.tournament_defaults.name,
        config.tournament_defaults.kind,
        config.tournament_defaults.join_period_secs,
        config.tournament_defaults.max_participants
    );

    let state = api::AppState::new(manager, bus).with_database(database.clone());
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", config.bind, e))?;

    info!(
        "Relay is running at ws://{}/ws. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Shutting down relay...");
    dispatcher.abort();
    monitor.abort();
    if let Some(db) = database {
        db.close().await;
    }

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
