//! HTTP/WebSocket API for the tournament relay.
//!
//! # Endpoints
//!
//! - `GET /ws` - WebSocket bridged onto the tournament bus
//! - `GET /health` - Relay health status
//! - `GET /api/v1/tournaments` - Live tournaments
//! - `GET /api/v1/tournaments/{id}` - One tournament
//! - `GET /api/v1/players/{player}/stats` - Career record
//!
//! CORS is permissive; the relay serves BBS door clients, not browsers
//! holding credentials.

pub mod tournaments;
pub mod websocket;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
};
use bbs_tourney::{LocalBus, TournamentManager, db::Database};
use serde_json::json;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tower_http::cors::CorsLayer;

/// State shared by every handler and WebSocket connection.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<TournamentManager>,
    pub bus: Arc<LocalBus>,
    /// Results database, when one is configured
    pub database: Option<Database>,
    connections: Arc<ConnectionCounter>,
}

impl AppState {
    pub fn new(manager: Arc<TournamentManager>, bus: Arc<LocalBus>) -> Self {
        Self {
            manager,
            bus,
            database: None,
            connections: Arc::new(ConnectionCounter::default()),
        }
    }

    pub fn with_database(mut self, database: Option<Database>) -> Self {
        self.database = database;
        self
    }

    /// WebSocket connections currently open.
    pub fn active_connections(&self) -> u64 {
        self.connections.active.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct ConnectionCounter {
    next_id: AtomicU64,
    active: AtomicU64,
}

impl ConnectionCounter {
    /// Register a connection, returning its id and the new open count.
    fn open(&self) -> (u64, u64) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let active = self.active.fetch_add(1, Ordering::Relaxed) + 1;
        (id, active)
    }

    fn close(&self) -> u64 {
        self.active.fetch_sub(1, Ordering::Relaxed).saturating_sub(1)
    }
}

/// Build the router with every endpoint and CORS applied.
pub fn create_router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/tournaments", get(tournaments::list_tournaments))
        .route("/tournaments/{tournament_id}", get(tournaments::get_tournament))
        .route("/players/{player}/stats", get(tournaments::player_stats));

    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(websocket::websocket_handler))
        .nest("/api/v1", v1_routes)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check for monitoring and load balancers.
///
/// The relay is healthy while the bus has at least one subscriber (the
/// tournament dispatcher holds one for the life of the process) and the
/// results database, if configured, answers.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let subscribers = state.bus.subscriber_count();
    let tournaments = state.manager.active_tournament_count().await;
    let database = match &state.database {
        Some(db) => Some(db.health_check().await.is_ok()),
        None => None,
    };
    let healthy = subscribers > 0 && database != Some(false);

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "bus_subscribers": subscribers,
        "database": database,
        "connections": state.active_connections(),
        "tournaments": tournaments,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
