//! Schema bootstrap.

use sqlx::PgPool;

/// Idempotent schema for the job table.
///
/// `next`, `list`, and `stats` lean on the state/priority/last_mod indexes;
/// the rest keep external tooling queries (by topic, correlation id, or
/// timestamp) efficient at scale.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS jobvault_jobs (
    id              uuid PRIMARY KEY,
    topic           text NOT NULL,
    state           text NOT NULL,
    args            text,
    priority        bigint NOT NULL,
    retry           integer NOT NULL,
    max_retry       integer NOT NULL,
    correlation_id  text,
    created         bigint NOT NULL,
    started         bigint NOT NULL,
    completed       bigint NOT NULL,
    last_mod        bigint NOT NULL
);
CREATE INDEX IF NOT EXISTS ix_jobs_topic ON jobvault_jobs (topic);
CREATE INDEX IF NOT EXISTS ix_jobs_state ON jobvault_jobs (state);
CREATE INDEX IF NOT EXISTS ix_jobs_priority ON jobvault_jobs (priority);
CREATE INDEX IF NOT EXISTS ix_jobs_correlation_id ON jobvault_jobs (correlation_id);
CREATE INDEX IF NOT EXISTS ix_jobs_created ON jobvault_jobs (created);
CREATE INDEX IF NOT EXISTS ix_jobs_started ON jobvault_jobs (started);
CREATE INDEX IF NOT EXISTS ix_jobs_completed ON jobvault_jobs (completed);
CREATE INDEX IF NOT EXISTS ix_jobs_last_mod ON jobvault_jobs (last_mod);
"#;

pub(crate) async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}
