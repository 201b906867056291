//! PostgreSQL-backed job store.
//!
//! ## Error mapping
//!
//! sqlx errors are mapped to [`StoreError`] as follows:
//!
//! | sqlx error | PostgreSQL code | StoreError | Scenario |
//! |---|---|---|---|
//! | `RowNotFound` | N/A | `NotFound` | lookup/next against a missing row |
//! | zero rows affected | N/A | `NotFound` | update/delete against a missing row |
//! | `Database` (unique violation) | `23505` | `Conflict` | duplicate id on create |
//! | anything else | any | `Storage` | passed through with its original cause |
//!
//! ## Concurrency
//!
//! The store holds no in-process locks; the database's transactional
//! isolation is the only coordination, except for `claim_next`, which runs
//! selection and transition as one statement with `FOR UPDATE SKIP LOCKED`
//! so concurrent claimants from any number of processes never take the same
//! job.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Row};
use tracing::{debug, info, instrument};

use jobvault_core::{
    Job, JobId, JobState, JobStore, ListRequest, ListResponse, Stats, StoreError, args, now_ns,
};

use crate::config::StoreConfig;
use crate::row::JobRow;
use crate::schema;

/// Persistent [`JobStore`] over a PostgreSQL table.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    /// Connect with default options and bootstrap the schema.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        Self::connect_with(StoreConfig::new(url)).await
    }

    /// Connect with explicit options.
    pub async fn connect_with(config: StoreConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(StoreError::storage)?;
        if config.create_schema {
            schema::ensure_schema(&pool)
                .await
                .map_err(StoreError::storage)?;
        }
        Ok(Self { pool })
    }

    /// Wrap a pool the caller already manages. The schema is assumed to
    /// exist.
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn count_state(&self, state: JobState) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM jobvault_jobs WHERE state = $1")
            .bind(state.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        let total: i64 = row.try_get("total").map_err(map_sqlx_error)?;
        Ok(total as u64)
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    #[instrument(skip(self, job), fields(job_id = %job.id, topic = %job.topic), err)]
    async fn create(&self, job: &Job) -> Result<(), StoreError> {
        let encoded = args::encode(job.args.as_deref())?;
        sqlx::query(
            r#"
            INSERT INTO jobvault_jobs (
                id, topic, state, args, priority, retry, max_retry,
                correlation_id, created, started, completed, last_mod
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(&job.topic)
        .bind(job.state.as_str())
        .bind(encoded.as_deref())
        .bind(job.priority)
        .bind(job.retry)
        .bind(job.max_retry)
        .bind(job.correlation_id.as_deref())
        .bind(job.created)
        .bind(job.started)
        .bind(job.completed)
        .bind(job.created) // last_mod = created on insert
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict(job.id)
            } else {
                map_sqlx_error(e)
            }
        })?;
        Ok(())
    }

    #[instrument(skip(self, job), fields(job_id = %job.id, state = %job.state), err)]
    async fn update(&self, job: &Job) -> Result<(), StoreError> {
        let encoded = args::encode(job.args.as_deref())?;
        let result = sqlx::query(
            r#"
            UPDATE jobvault_jobs SET
                topic = $2,
                state = $3,
                args = $4,
                priority = $5,
                retry = $6,
                max_retry = $7,
                correlation_id = $8,
                created = $9,
                started = $10,
                completed = $11,
                last_mod = $12
            WHERE id = $1
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(&job.topic)
        .bind(job.state.as_str())
        .bind(encoded.as_deref())
        .bind(job.priority)
        .bind(job.retry)
        .bind(job.max_retry)
        .bind(job.correlation_id.as_deref())
        .bind(job.created)
        .bind(job.started)
        .bind(job.completed)
        .bind(now_ns())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %id), err)]
    async fn delete(&self, id: JobId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM jobvault_jobs WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %id), err)]
    async fn lookup(&self, id: JobId) -> Result<Job, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, topic, state, args, priority, retry, max_retry,
                   correlation_id, created, started, completed, last_mod
            FROM jobvault_jobs
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(StoreError::NotFound)?;

        JobRow::from_row(&row).map_err(map_sqlx_error)?.into_job()
    }

    #[instrument(skip(self), err)]
    async fn next(&self) -> Result<Job, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, topic, state, args, priority, retry, max_retry,
                   correlation_id, created, started, completed, last_mod
            FROM jobvault_jobs
            WHERE state = $1
            ORDER BY priority DESC, created ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(JobState::Waiting.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(StoreError::NotFound)?;

        JobRow::from_row(&row).map_err(map_sqlx_error)?.into_job()
    }

    #[instrument(skip(self), err)]
    async fn claim_next(&self) -> Result<Option<Job>, StoreError> {
        // Selection and transition in one statement. SKIP LOCKED makes
        // concurrent claimants pass over a row another transaction is
        // already taking instead of blocking on it.
        let row = sqlx::query(
            r#"
            WITH candidate AS (
                SELECT id FROM jobvault_jobs
                WHERE state = $1
                ORDER BY priority DESC, created ASC, id ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobvault_jobs SET
                state = $2,
                started = $3,
                last_mod = $3
            WHERE id = (SELECT id FROM candidate)
            RETURNING id, topic, state, args, priority, retry, max_retry,
                      correlation_id, created, started, completed, last_mod
            "#,
        )
        .bind(JobState::Waiting.as_str())
        .bind(JobState::Working.as_str())
        .bind(now_ns())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => {
                let job = JobRow::from_row(&row).map_err(map_sqlx_error)?.into_job()?;
                debug!(job_id = %job.id, topic = %job.topic, "claimed job");
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, request), fields(state = ?request.state, offset = request.offset, limit = request.limit), err)]
    async fn list(&self, request: &ListRequest) -> Result<ListResponse, StoreError> {
        let state = request.state.map(|s| s.as_str());

        // The total reflects the filter only, independent of the page
        // window, so callers can compute page counts.
        let count_row =
            sqlx::query("SELECT COUNT(*) AS total FROM jobvault_jobs WHERE ($1::text IS NULL OR state = $1)")
                .bind(state)
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        let total: i64 = count_row.try_get("total").map_err(map_sqlx_error)?;

        let rows = sqlx::query(
            r#"
            SELECT id, topic, state, args, priority, retry, max_retry,
                   correlation_id, created, started, completed, last_mod
            FROM jobvault_jobs
            WHERE ($1::text IS NULL OR state = $1)
            ORDER BY last_mod DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(state)
        .bind(request.limit as i64)
        .bind(request.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            jobs.push(JobRow::from_row(&row).map_err(map_sqlx_error)?.into_job()?);
        }
        Ok(ListResponse {
            total: total as u64,
            jobs,
        })
    }

    #[instrument(skip(self), err)]
    async fn stats(&self) -> Result<Stats, StoreError> {
        // Four independent counts; no snapshot isolation across them.
        Ok(Stats {
            waiting: self.count_state(JobState::Waiting).await?,
            working: self.count_state(JobState::Working).await?,
            succeeded: self.count_state(JobState::Succeeded).await?,
            failed: self.count_state(JobState::Failed).await?,
        })
    }

    #[instrument(skip(self), err)]
    async fn recover(&self) -> Result<u64, StoreError> {
        // Assumes a single manager instance: a second instance sweeping
        // while this one's workers hold jobs would fail them mid-flight.
        let now = now_ns();
        let result = sqlx::query(
            r#"
            UPDATE jobvault_jobs SET
                state = $1,
                completed = $2,
                last_mod = $2
            WHERE state = $3
            "#,
        )
        .bind(JobState::Failed.as_str())
        .bind(now)
        .bind(JobState::Working.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let swept = result.rows_affected();
        if swept > 0 {
            info!(swept, "reclaimed stranded jobs");
        }
        Ok(swept)
    }
}

/// Map sqlx errors to [`StoreError`].
///
/// Only the driver's "no rows" signal is translated; everything else is
/// passed through so callers can inspect the original cause.
fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        other => StoreError::storage(other),
    }
}

/// Check if an error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}
