//! Tournament results repository.
//!
//! Trait-based so the authority can run against PostgreSQL in production and
//! an in-memory store in tests or when no database is configured.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::time::Duration;
use thiserror::Error;
use tokio::{sync::RwLock, time::timeout};

use crate::tournament::models::{CareerStats, PlayerId, TournamentSummary};

/// Default timeout for repository queries
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for the multi-statement save transaction
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Repository errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Tournament {0} was already saved")]
    Duplicate(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Run `future`, failing with [`RepositoryError::Timeout`] after `duration`.
async fn with_timeout<F, T>(duration: Duration, future: F) -> RepositoryResult<T>
where
    F: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    match timeout(duration, future).await {
        Ok(result) => result.map_err(RepositoryError::from),
        Err(_) => Err(RepositoryError::Timeout(duration)),
    }
}

/// Storage for finished tournaments.
#[async_trait]
pub trait TournamentRepository: Send + Sync {
    /// Persist a finished tournament and its per-player records
    async fn save(&self, summary: &TournamentSummary) -> RepositoryResult<()>;

    /// Aggregate a player's record across every saved tournament
    async fn load_career_stats(&self, player: &PlayerId) -> RepositoryResult<CareerStats>;
}

/// In-process store. Used when `DATABASE_URL` is unset and in tests.
#[derive(Debug, Default)]
pub struct InMemoryTournamentRepository {
    saved: RwLock<Vec<TournamentSummary>>,
}

impl InMemoryTournamentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every summary saved so far, oldest first.
    pub async fn saved(&self) -> Vec<TournamentSummary> {
        self.saved.read().await.clone()
    }
}

#[async_trait]
impl TournamentRepository for InMemoryTournamentRepository {
    async fn save(&self, summary: &TournamentSummary) -> RepositoryResult<()> {
        let mut saved = self.saved.write().await;
        if saved
            .iter()
            .any(|s| s.tournament_id == summary.tournament_id)
        {
            return Err(RepositoryError::Duplicate(summary.tournament_id.to_string()));
        }
        saved.push(summary.clone());
        Ok(())
    }

    async fn load_career_stats(&self, player: &PlayerId) -> RepositoryResult<CareerStats> {
        let saved = self.saved.read().await;
        let stats = saved
            .iter()
            .flat_map(|s| s.records.iter())
            .filter(|r| &r.player == player)
            .fold(CareerStats::default(), |mut acc, r| {
                acc.tournaments_played += 1;
                acc.tournaments_won += u32::from(r.won);
                acc.matches_won += r.match_wins;
                acc.matches_lost += r.match_losses;
                acc.best_score = acc.best_score.max(r.score);
                acc
            });
        Ok(stats)
    }
}

/// Scores saturate at `u64::MAX`; clamp them into a `BIGINT` column.
fn to_bigint(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// PostgreSQL implementation of [`TournamentRepository`]
///
/// Expects the tables from `migrations/001_tournament_stats.sql`.
pub struct PgTournamentRepository {
    pool: PgPool,
}

impl PgTournamentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn save_in_transaction(&self, summary: &TournamentSummary) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO tournament_results
                (tournament_id, name, kind, host, participant_count, winner,
                 biggest_player, biggest_metric, started_at, finished_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(summary.tournament_id.as_str())
        .bind(&summary.name)
        .bind(summary.kind.to_string())
        .bind(summary.host.as_str())
        .bind(summary.participant_count as i32)
        .bind(summary.winner.as_ref().map(PlayerId::as_str))
        .bind(summary.biggest_result.as_ref().map(|b| b.player.as_str()))
        .bind(summary.biggest_result.as_ref().map(|b| to_bigint(b.metric)))
        .bind(summary.started_at)
        .bind(summary.finished_at)
        .execute(&mut *tx)
        .await?;

        for record in &summary.records {
            sqlx::query(
                "INSERT INTO tournament_player_records
                    (tournament_id, player, user_id, position, score,
                     match_wins, match_losses, won)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(summary.tournament_id.as_str())
            .bind(record.player.as_str())
            .bind(record.user_id)
            .bind(record.position as i32)
            .bind(to_bigint(record.score))
            .bind(record.match_wins as i32)
            .bind(record.match_losses as i32)
            .bind(record.won)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }
}

#[async_trait]
impl TournamentRepository for PgTournamentRepository {
    async fn save(&self, summary: &TournamentSummary) -> RepositoryResult<()> {
        match with_timeout(DEFAULT_TRANSACTION_TIMEOUT, self.save_in_transaction(summary)).await {
            Err(RepositoryError::Database(sqlx::Error::Database(e))) if e.is_unique_violation() => {
                Err(RepositoryError::Duplicate(summary.tournament_id.to_string()))
            }
            other => other,
        }
    }

    async fn load_career_stats(&self, player: &PlayerId) -> RepositoryResult<CareerStats> {
        let row = with_timeout(
            DEFAULT_QUERY_TIMEOUT,
            sqlx::query(
                "SELECT COUNT(*) AS played,
                        COUNT(*) FILTER (WHERE won) AS won,
                        COALESCE(SUM(match_wins), 0)::BIGINT AS matches_won,
                        COALESCE(SUM(match_losses), 0)::BIGINT AS matches_lost,
                        COALESCE(MAX(score), 0)::BIGINT AS best_score
                 FROM tournament_player_records WHERE player = $1",
            )
            .bind(player.as_str())
            .fetch_one(&self.pool),
        )
        .await?;

        Ok(CareerStats {
            tournaments_played: row.get::<i64, _>("played") as u32,
            tournaments_won: row.get::<i64, _>("won") as u32,
            matches_won: row.get::<i64, _>("matches_won") as u32,
            matches_lost: row.get::<i64, _>("matches_lost") as u32,
            best_score: row.get::<i64, _>("best_score").max(0) as u64,
        })
    }
}
