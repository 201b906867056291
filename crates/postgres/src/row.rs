//! Row-level representation of a job record.

use jobvault_core::{Job, JobId, JobState, StoreError, args};
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

/// One row of `jobvault_jobs`, column types as stored.
#[derive(Debug)]
pub(crate) struct JobRow {
    pub(crate) id: Uuid,
    pub(crate) topic: String,
    pub(crate) state: String,
    pub(crate) args: Option<String>,
    pub(crate) priority: i64,
    pub(crate) retry: i32,
    pub(crate) max_retry: i32,
    pub(crate) correlation_id: Option<String>,
    pub(crate) created: i64,
    pub(crate) started: i64,
    pub(crate) completed: i64,
    pub(crate) last_mod: i64,
}

impl<'r> sqlx::FromRow<'r, PgRow> for JobRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(JobRow {
            id: row.try_get("id")?,
            topic: row.try_get("topic")?,
            state: row.try_get("state")?,
            args: row.try_get("args")?,
            priority: row.try_get("priority")?,
            retry: row.try_get("retry")?,
            max_retry: row.try_get("max_retry")?,
            correlation_id: row.try_get("correlation_id")?,
            created: row.try_get("created")?,
            started: row.try_get("started")?,
            completed: row.try_get("completed")?,
            last_mod: row.try_get("last_mod")?,
        })
    }
}

impl JobRow {
    /// Decode into the domain record.
    ///
    /// Argument decoding failures surface as [`StoreError::Encoding`]; a
    /// `state` column no variant matches means the table was written past
    /// this store and surfaces as [`StoreError::Storage`].
    pub(crate) fn into_job(self) -> Result<Job, StoreError> {
        let state: JobState = self.state.parse().map_err(StoreError::storage)?;
        let args = args::decode(self.args.as_deref())?;
        Ok(Job {
            id: JobId::from_uuid(self.id),
            topic: self.topic,
            state,
            args,
            priority: self.priority,
            retry: self.retry,
            max_retry: self.max_retry,
            correlation_id: self.correlation_id,
            created: self.created,
            started: self.started,
            completed: self.completed,
            last_mod: self.last_mod,
        })
    }
}
