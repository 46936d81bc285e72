//! Results database settings.

use sqlx::postgres::PgPoolOptions;
use std::{env, time::Duration};

/// Connection settings for the results database
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub database_url: String,

    /// Pool ceiling. Tournament saves are rare, so this stays small.
    pub max_connections: u32,

    pub min_connections: u32,

    /// Seconds to wait for a pooled connection
    pub connection_timeout_secs: u64,

    pub idle_timeout_secs: u64,

    pub max_lifetime_secs: u64,
}

impl DatabaseConfig {
    /// Settings for `database_url` with the default pool sizing
    pub fn from_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 5,
            min_connections: 1,
            connection_timeout_secs: 10,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
        }
    }

    /// Read `DATABASE_URL`, `DB_MAX_CONNECTIONS`, `DB_MIN_CONNECTIONS` and
    /// `DB_CONNECTION_TIMEOUT`.
    ///
    /// Returns `None` when `DATABASE_URL` is unset; tournament results are
    /// then kept in memory only. Unparseable numbers fall back to defaults.
    pub fn from_env() -> Option<Self> {
        let mut config = Self::from_url(env::var("DATABASE_URL").ok()?);
        config.max_connections = parse_or("DB_MAX_CONNECTIONS", config.max_connections);
        config.min_connections = parse_or("DB_MIN_CONNECTIONS", config.min_connections);
        config.connection_timeout_secs =
            parse_or("DB_CONNECTION_TIMEOUT", config.connection_timeout_secs);
        Some(config)
    }

    /// Local development database
    pub fn development() -> Self {
        Self::from_url("postgres://postgres@localhost/bbs_tourney")
    }

    /// Pool options carrying these limits
    pub fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(Duration::from_secs(self.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(self.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(self.max_lifetime_secs))
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::development()
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_defaults() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_connections, 5);
        assert!(config.min_connections <= config.max_connections);
        assert!(config.database_url.starts_with("postgres://"));
    }

    #[test]
    fn test_from_url_keeps_pool_sizing() {
        let config = DatabaseConfig::from_url("postgres://bbs@db/results");
        assert_eq!(config.database_url, "postgres://bbs@db/results");
        assert_eq!(config.connection_timeout_secs, 10);
    }
}
