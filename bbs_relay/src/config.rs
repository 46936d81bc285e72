//! Relay configuration loaded from environment variables.

use bbs_tourney::{
    TournamentConfig,
    db::DatabaseConfig,
    net::bus::DEFAULT_BUS_CAPACITY,
    tournament::models::{HostDeparture, MAX_PARTICIPANTS, TournamentKind},
};
use std::net::SocketAddr;

/// Complete relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// HTTP/WebSocket bind address
    pub bind: SocketAddr,

    /// Prometheus scrape address (`None` disables the exporter)
    pub metrics_bind: Option<SocketAddr>,

    /// Results database (`None` keeps results in memory)
    pub database: Option<DatabaseConfig>,

    /// Settings for tournaments created over the bus
    pub tournament_defaults: TournamentConfig,

    /// Frames buffered per bus subscriber before it lags
    pub bus_capacity: usize,
}

impl RelayConfig {
    /// Load configuration from environment variables
    ///
    /// `bind` overrides `RELAY_BIND` when given on the command line.
    pub fn from_env(bind: Option<SocketAddr>) -> Result<Self, ConfigError> {
        let bind = match bind {
            Some(addr) => addr,
            None => parse_addr("RELAY_BIND", "127.0.0.1:6969")?,
        };

        let metrics_bind = match std::env::var("METRICS_BIND") {
            Ok(value) if value.eq_ignore_ascii_case("off") => None,
            Ok(value) => Some(value.parse().map_err(|_| ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: format!("'{value}' is not an IP:PORT address"),
            })?),
            Err(_) => None,
        };

        let kind: TournamentKind = parse_enum("TOURNAMENT_KIND", TournamentKind::Elimination)?;
        let base = match kind {
            TournamentKind::Elimination => TournamentConfig::trivia(parse_env_or(
                "TOURNAMENT_NAME",
                "Trivia Tournament".to_string(),
            )),
            TournamentKind::Cumulative => TournamentConfig::fishing(parse_env_or(
                "TOURNAMENT_NAME",
                "Fishing Derby".to_string(),
            )),
        };

        let tournament_defaults = TournamentConfig {
            join_period_secs: parse_env_or("TOURNAMENT_JOIN_PERIOD_SECS", base.join_period_secs),
            round_secs: parse_env_or("TOURNAMENT_ROUND_SECS", base.round_secs),
            scoring_secs: parse_env_or("TOURNAMENT_SCORING_SECS", base.scoring_secs),
            max_participants: parse_env_or(
                "TOURNAMENT_MAX_PARTICIPANTS",
                base.max_participants,
            ),
            top_k: parse_env_or("TOURNAMENT_TOP_K", base.top_k),
            host_departure: parse_enum("TOURNAMENT_HOST_DEPARTURE", base.host_departure)?,
            ..base
        };

        let config = Self {
            bind,
            metrics_bind,
            database: DatabaseConfig::from_env(),
            tournament_defaults,
            bus_capacity: parse_env_or("BUS_CAPACITY", DEFAULT_BUS_CAPACITY),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let defaults = &self.tournament_defaults;

        if defaults.max_participants == 0 || defaults.max_participants > MAX_PARTICIPANTS {
            return Err(ConfigError::Invalid {
                var: "TOURNAMENT_MAX_PARTICIPANTS".to_string(),
                reason: format!("Must be between 1 and {MAX_PARTICIPANTS}"),
            });
        }

        if defaults.join_period_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "TOURNAMENT_JOIN_PERIOD_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if defaults.round_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "TOURNAMENT_ROUND_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if defaults.scoring_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "TOURNAMENT_SCORING_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.bus_capacity == 0 {
            return Err(ConfigError::Invalid {
                var: "BUS_CAPACITY".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if let Some(database) = &self.database
            && database.min_connections > database.max_connections
        {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed DB_MAX_CONNECTIONS ({})",
                    database.max_connections
                ),
            });
        }

        defaults.validate().map_err(|reason| ConfigError::Invalid {
            var: "TOURNAMENT_*".to_string(),
            reason,
        })
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Like [`parse_env_or`], but a present and unparseable value is an error.
fn parse_enum<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr<Err = String>,
{
    match std::env::var(key) {
        Ok(value) => value.parse().map_err(|reason| ConfigError::Invalid {
            var: key.to_string(),
            reason,
        }),
        Err(_) => Ok(default),
    }
}

fn parse_addr(key: &str, default: &str) -> Result<SocketAddr, ConfigError> {
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|_| ConfigError::MissingRequired {
        var: key.to_string(),
        hint: format!("Set an IP:PORT address such as {default}, got '{value}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RelayConfig {
        RelayConfig {
            bind: "127.0.0.1:6969".parse().unwrap(),
            metrics_bind: None,
            database: None,
            tournament_defaults: TournamentConfig::default(),
            bus_capacity: 64,
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Invalid {
            var: "BUS_CAPACITY".to_string(),
            reason: "Must be greater than 0".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("BUS_CAPACITY"));
        assert!(msg.contains("greater than 0"));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_roster_over_bracket_limit_rejected() {
        let mut config = config();
        config.tournament_defaults.max_participants = MAX_PARTICIPANTS + 1;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { ref var, .. } if var == "TOURNAMENT_MAX_PARTICIPANTS"
        ));
    }

    #[test]
    fn test_zero_join_period_rejected() {
        let mut config = config();
        config.tournament_defaults.join_period_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_top_k_must_be_five_or_ten() {
        let mut config = config();
        config.tournament_defaults.top_k = 7;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("top_k"));
    }

    #[test]
    fn test_zero_bus_capacity_rejected() {
        let mut config = config();
        config.bus_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pool_bounds_checked() {
        let mut config = config();
        let mut database = DatabaseConfig::development();
        database.min_connections = database.max_connections + 1;
        config.database = Some(database);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_host_departure_parses() {
        let parsed: Result<HostDeparture, ConfigError> =
            parse_enum("BBS_RELAY_UNSET_VAR", HostDeparture::Orphan);
        assert_eq!(parsed.unwrap(), HostDeparture::Orphan);
    }
}
