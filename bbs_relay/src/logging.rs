//! Structured logging for the relay.
//!
//! The tournament library logs through the `log` facade; the subscriber
//! installed here forwards those records alongside the relay's own
//! `tracing` events.

use bbs_tourney::WireMessage;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels come from `RUST_LOG`, defaulting to `info` with sqlx and
/// hyper quieted.
///
/// # Example
///
/// ```no_run
/// use bbs_relay::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Relay starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log a tournament lifecycle frame seen on the bus
pub fn log_tournament_event(message: &WireMessage) {
    let tournament_id = message.tournament_id().map(ToString::to_string);
    match message {
        WireMessage::TournamentStart { .. }
        | WireMessage::TournamentEnd { .. }
        | WireMessage::TournamentCancel { .. } => tracing::info!(
            kind = message.kind(),
            tournament_id = tournament_id.as_deref(),
            "TOURNAMENT: {}",
            message
        ),
        _ => tracing::debug!(
            kind = message.kind(),
            tournament_id = tournament_id.as_deref(),
            "Tournament frame: {}",
            message
        ),
    }
}

/// Log a frame a connection sent that the relay refused to forward
pub fn log_frame_rejected(connection: u64, reason: &str) {
    tracing::warn!(
        connection = connection,
        reason = reason,
        "Rejected inbound frame"
    );
}

/// Log frames a slow connection lost
pub fn log_frames_dropped(connection: u64, skipped: u64) {
    if skipped > 100 {
        tracing::warn!(
            connection = connection,
            skipped = skipped,
            "Connection far behind the bus"
        );
    } else {
        tracing::debug!(
            connection = connection,
            skipped = skipped,
            "Connection lagged"
        );
    }
}
