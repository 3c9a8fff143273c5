use chrono::{DateTime, Utc};
use models::{Id, Job, JobLog, JobStatus, JobType};

/// Maximum number of delivery attempts before a job is dead-lettered.
pub const MAX_ATTEMPTS: i32 = 3;

const JOB_COLUMNS: &str = "id, job_type, status, params, progress, status_message, error, \
     task_id, attempts, input_path, output_path, created_at, started_at, completed_at, updated_at";

/// Insert a new `pending` job. Committing the row is what makes the job
/// visible to workers; the jobs table is the queue.
pub async fn create<'c, E>(
    executor: E,
    id: Id,
    job_type: JobType,
    params: &serde_json::Value,
    input_path: &str,
) -> sqlx::Result<Job>
where
    E: sqlx::PgExecutor<'c>,
{
    sqlx::query_as::<_, Job>(&format!(
        "INSERT INTO jobs (id, job_type, status, params, input_path)
         VALUES ($1, $2, 'pending', $3, $4)
         RETURNING {JOB_COLUMNS}"
    ))
    .bind(id)
    .bind(job_type.as_str())
    .bind(params)
    .bind(input_path)
    .fetch_one(executor)
    .await
}

/// Claim the oldest eligible pending job, flipping it to `processing` and
/// stamping `task_id`, `started_at`, and the delivery attempt. Uses
/// SKIP LOCKED so concurrent workers never double-claim.
pub async fn dequeue(
    pool: &sqlx::PgPool,
    job_types: &[JobType],
    task_id: uuid::Uuid,
) -> sqlx::Result<Option<Job>> {
    let types: Vec<String> = job_types.iter().map(|t| t.as_str().to_string()).collect();

    sqlx::query_as::<_, Job>(&format!(
        "WITH picked AS (
            SELECT id
            FROM jobs
            WHERE status = 'pending' AND job_type = ANY($1) AND attempts < $2
            ORDER BY created_at ASC
            FOR UPDATE SKIP LOCKED
            LIMIT 1
        )
        UPDATE jobs SET
            status = 'processing',
            task_id = $3,
            attempts = attempts + 1,
            started_at = now(),
            updated_at = now()
        WHERE id IN (SELECT id FROM picked)
        RETURNING {JOB_COLUMNS}"
    ))
    .bind(&types)
    .bind(MAX_ATTEMPTS)
    .bind(task_id)
    .fetch_optional(pool)
    .await
}

pub async fn fetch(pool: &sqlx::PgPool, id: Id) -> sqlx::Result<Option<Job>> {
    sqlx::query_as::<_, Job>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list(
    pool: &sqlx::PgPool,
    status: Option<JobStatus>,
    job_type: Option<JobType>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<(Vec<Job>, i64)> {
    let mut builder = sqlx::QueryBuilder::new(format!("SELECT {JOB_COLUMNS} FROM jobs"));
    let mut count = sqlx::QueryBuilder::new("SELECT COUNT(*) FROM jobs");

    push_list_filters(&mut builder, status, job_type);
    push_list_filters(&mut count, status, job_type);

    builder
        .push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let jobs = builder.build_query_as::<Job>().fetch_all(pool).await?;
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;
    Ok((jobs, total))
}

fn push_list_filters(
    builder: &mut sqlx::QueryBuilder<sqlx::Postgres>,
    status: Option<JobStatus>,
    job_type: Option<JobType>,
) {
    let mut prefix = " WHERE ";
    if let Some(status) = status {
        builder
            .push(prefix)
            .push("status = ")
            .push_bind(status.as_str());
        prefix = " AND ";
    }
    if let Some(job_type) = job_type {
        builder
            .push(prefix)
            .push("job_type = ")
            .push_bind(job_type.as_str());
    }
}

/// Durable progress write. Guarded on `processing` so a job cancelled or
/// reaped underneath the worker is never resurrected. Returns the number of
/// rows written (0 when the guard filtered the write).
pub async fn update_progress(
    pool: &sqlx::PgPool,
    id: Id,
    progress: i32,
    message: &str,
) -> sqlx::Result<u64> {
    let done = sqlx::query(
        "UPDATE jobs SET progress = $2, status_message = $3, updated_at = now()
         WHERE id = $1 AND status = 'processing'",
    )
    .bind(id)
    .bind(progress)
    .bind(message)
    .execute(pool)
    .await?;
    Ok(done.rows_affected())
}

/// Terminal transition. Also guarded on `processing`: a cancel that raced
/// ahead of the worker wins.
pub async fn finish(
    pool: &sqlx::PgPool,
    id: Id,
    status: JobStatus,
    progress: i32,
    message: &str,
    error: Option<&str>,
    output_path: Option<&str>,
) -> sqlx::Result<u64> {
    debug_assert!(status.is_terminal());
    let done = sqlx::query(
        "UPDATE jobs SET
            status = $2,
            progress = $3,
            status_message = $4,
            error = COALESCE($5, error),
            output_path = COALESCE($6, output_path),
            completed_at = now(),
            updated_at = now()
         WHERE id = $1 AND status = 'processing'",
    )
    .bind(id)
    .bind(status.as_str())
    .bind(progress)
    .bind(message)
    .bind(error)
    .bind(output_path)
    .execute(pool)
    .await?;
    Ok(done.rows_affected())
}

/// Cancel a pending or processing job. Returns the updated row, or None when
/// the job does not exist or is already terminal.
pub async fn cancel(pool: &sqlx::PgPool, id: Id) -> sqlx::Result<Option<Job>> {
    sqlx::query_as::<_, Job>(&format!(
        "UPDATE jobs SET
            status = 'cancelled',
            status_message = 'Cancelled by request',
            progress = 0,
            completed_at = now(),
            updated_at = now()
         WHERE id = $1 AND status IN ('pending', 'processing')
         RETURNING {JOB_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Remove a job row, returning it so the caller can clean up its files.
pub async fn delete(pool: &sqlx::PgPool, id: Id) -> sqlx::Result<Option<Job>> {
    sqlx::query_as::<_, Job>(&format!(
        "DELETE FROM jobs WHERE id = $1 RETURNING {JOB_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_many(pool: &sqlx::PgPool, ids: &[Id]) -> sqlx::Result<Vec<Job>> {
    let ids: Vec<uuid::Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
    sqlx::query_as::<_, Job>(&format!(
        "DELETE FROM jobs WHERE id = ANY($1) RETURNING {JOB_COLUMNS}"
    ))
    .bind(&ids)
    .fetch_all(pool)
    .await
}

/// Update only the human-readable status line, regardless of job state.
pub async fn set_status_message(pool: &sqlx::PgPool, id: Id, message: &str) -> sqlx::Result<u64> {
    let done = sqlx::query(
        "UPDATE jobs SET status_message = $2, updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .bind(message)
    .execute(pool)
    .await?;
    Ok(done.rows_affected())
}

pub const STALE_MESSAGE: &str = "Job timed out — worker may have crashed";

/// Processing jobs idle past this are reaped as failed.
pub const STALE_PROCESSING_MINUTES: i64 = 30;
/// Pending jobs never claimed within this are reaped as failed.
pub const STALE_PENDING_MINUTES: i64 = 60;

/// Sweep stale jobs using the standard thresholds.
pub async fn reap_stale_now(pool: &sqlx::PgPool) -> sqlx::Result<u64> {
    let now = Utc::now();
    reap_stale(
        pool,
        now - chrono::Duration::minutes(STALE_PROCESSING_MINUTES),
        now - chrono::Duration::minutes(STALE_PENDING_MINUTES),
    )
    .await
}

/// Mark `processing` jobs with no activity since `processing_cutoff` and
/// orphaned `pending` jobs (never claimed, older than `pending_cutoff`) as
/// failed. Returns the number of reaped rows.
pub async fn reap_stale(
    pool: &sqlx::PgPool,
    processing_cutoff: DateTime<Utc>,
    pending_cutoff: DateTime<Utc>,
) -> sqlx::Result<u64> {
    let processing = sqlx::query(
        "UPDATE jobs SET
            status = 'failed',
            status_message = $2,
            error = $2,
            progress = 0,
            completed_at = now(),
            updated_at = now()
         WHERE status = 'processing'
           AND COALESCE(updated_at, started_at, created_at) <= $1",
    )
    .bind(processing_cutoff)
    .bind(STALE_MESSAGE)
    .execute(pool)
    .await?;

    let pending = sqlx::query(
        "UPDATE jobs SET
            status = 'failed',
            status_message = $2,
            error = $2,
            completed_at = now(),
            updated_at = now()
         WHERE status = 'pending' AND task_id IS NULL AND created_at <= $1",
    )
    .bind(pending_cutoff)
    .bind(STALE_MESSAGE)
    .execute(pool)
    .await?;

    Ok(processing.rows_affected() + pending.rows_affected())
}

pub async fn append_log<'c, E>(executor: E, job_id: Id, level: &str, message: &str) -> sqlx::Result<()>
where
    E: sqlx::PgExecutor<'c>,
{
    sqlx::query("INSERT INTO job_logs (job_id, level, message) VALUES ($1, $2, $3)")
        .bind(job_id)
        .bind(level)
        .bind(message)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn logs(pool: &sqlx::PgPool, job_id: Id) -> sqlx::Result<Vec<JobLog>> {
    sqlx::query_as::<_, JobLog>(
        "SELECT id, job_id, level, message, timestamp
         FROM job_logs WHERE job_id = $1 ORDER BY timestamp ASC, id ASC",
    )
    .bind(job_id)
    .fetch_all(pool)
    .await
}

/// Pending and processing counts, used by the detailed health check.
pub async fn queue_depth(pool: &sqlx::PgPool) -> sqlx::Result<(i64, i64)> {
    let row: (i64, i64) = sqlx::query_as(
        "SELECT
            COUNT(*) FILTER (WHERE status = 'pending'),
            COUNT(*) FILTER (WHERE status = 'processing')
         FROM jobs",
    )
    .fetch_one(pool)
    .await?;
    Ok(row)
}
