//! Results persistence.
//!
//! Persistence sits outside the coordinator: a finished tournament hands its
//! [`TournamentSummary`](crate::tournament::TournamentSummary) to a
//! [`TournamentRepository`], and nothing in the live lifecycle waits on it.

use sqlx::{migrate::MigrateError, postgres::PgPool};

pub mod config;
pub mod repository;

pub use config::DatabaseConfig;
pub use repository::{
    InMemoryTournamentRepository, PgTournamentRepository, RepositoryError, RepositoryResult,
    TournamentRepository,
};

/// Pooled connection to the results database
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Open the pool described by `config`.
    ///
    /// ```no_run
    /// use bbs_tourney::db::{Database, DatabaseConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let db = Database::new(&DatabaseConfig::development()).await?;
    ///     db.migrate().await?;
    ///     let repository = db.results_repository();
    ///     # let _ = repository;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = config
            .pool_options()
            .connect(&config.database_url)
            .await?;
        log::info!(
            "Results database pool open ({}..={} connections)",
            config.min_connections,
            config.max_connections
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled schema migrations.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Repository saving finished tournaments through this pool.
    pub fn results_repository(&self) -> PgTournamentRepository {
        PgTournamentRepository::new(self.pool.clone())
    }

    /// Round-trip a trivial query.
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
