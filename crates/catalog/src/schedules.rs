use chrono::{DateTime, Duration, Utc};
use models::{FetchSchedule, Id};

const SCHEDULE_COLUMNS: &str = "id, name, preset_id, interval_minutes, is_active, \
     last_run_at, next_run_at, created_at, updated_at";

/// An active schedule's `next_run_at` is always set; inactive schedules carry
/// null so the beat never considers them.
pub async fn create(
    pool: &sqlx::PgPool,
    name: &str,
    preset_id: Id,
    interval_minutes: i32,
    is_active: bool,
) -> sqlx::Result<FetchSchedule> {
    let next_run_at =
        is_active.then(|| Utc::now() + Duration::minutes(i64::from(interval_minutes)));
    sqlx::query_as::<_, FetchSchedule>(&format!(
        "INSERT INTO fetch_schedules (id, name, preset_id, interval_minutes, is_active, next_run_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {SCHEDULE_COLUMNS}"
    ))
    .bind(Id::new())
    .bind(name)
    .bind(preset_id)
    .bind(interval_minutes)
    .bind(is_active)
    .bind(next_run_at)
    .fetch_one(pool)
    .await
}

pub async fn list(pool: &sqlx::PgPool) -> sqlx::Result<Vec<FetchSchedule>> {
    sqlx::query_as::<_, FetchSchedule>(&format!(
        "SELECT {SCHEDULE_COLUMNS} FROM fetch_schedules ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await
}

pub async fn fetch(pool: &sqlx::PgPool, id: Id) -> sqlx::Result<Option<FetchSchedule>> {
    sqlx::query_as::<_, FetchSchedule>(&format!(
        "SELECT {SCHEDULE_COLUMNS} FROM fetch_schedules WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn update(
    pool: &sqlx::PgPool,
    id: Id,
    name: Option<&str>,
    preset_id: Option<Id>,
    interval_minutes: Option<i32>,
    is_active: Option<bool>,
) -> sqlx::Result<Option<FetchSchedule>> {
    // Apply field updates, then reconcile next_run_at with the activity flag.
    let schedule = sqlx::query_as::<_, FetchSchedule>(&format!(
        "UPDATE fetch_schedules SET
            name = COALESCE($2, name),
            preset_id = COALESCE($3, preset_id),
            interval_minutes = COALESCE($4, interval_minutes),
            is_active = COALESCE($5, is_active),
            updated_at = now()
         WHERE id = $1
         RETURNING {SCHEDULE_COLUMNS}"
    ))
    .bind(id)
    .bind(name)
    .bind(preset_id)
    .bind(interval_minutes)
    .bind(is_active)
    .fetch_optional(pool)
    .await?;

    let Some(schedule) = schedule else {
        return Ok(None);
    };
    reconcile_next_run(pool, &schedule).await.map(Some)
}

/// Flip `is_active`, computing or clearing `next_run_at`.
pub async fn toggle(pool: &sqlx::PgPool, id: Id) -> sqlx::Result<Option<FetchSchedule>> {
    let schedule = sqlx::query_as::<_, FetchSchedule>(&format!(
        "UPDATE fetch_schedules SET is_active = NOT is_active, updated_at = now()
         WHERE id = $1
         RETURNING {SCHEDULE_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some(schedule) = schedule else {
        return Ok(None);
    };
    reconcile_next_run(pool, &schedule).await.map(Some)
}

async fn reconcile_next_run(
    pool: &sqlx::PgPool,
    schedule: &FetchSchedule,
) -> sqlx::Result<FetchSchedule> {
    let next_run_at = if schedule.is_active {
        Some(
            schedule.next_run_at.unwrap_or_else(|| {
                Utc::now() + Duration::minutes(i64::from(schedule.interval_minutes))
            }),
        )
    } else {
        None
    };
    sqlx::query_as::<_, FetchSchedule>(&format!(
        "UPDATE fetch_schedules SET next_run_at = $2 WHERE id = $1
         RETURNING {SCHEDULE_COLUMNS}"
    ))
    .bind(schedule.id)
    .bind(next_run_at)
    .fetch_one(pool)
    .await
}

pub async fn delete(pool: &sqlx::PgPool, id: Id) -> sqlx::Result<bool> {
    let done = sqlx::query("DELETE FROM fetch_schedules WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(done.rows_affected() > 0)
}

/// Active schedules whose `next_run_at` has passed, claimed inside the beat
/// transaction.
pub async fn due(
    txn: &mut sqlx::PgConnection,
    now: DateTime<Utc>,
) -> sqlx::Result<Vec<FetchSchedule>> {
    sqlx::query_as::<_, FetchSchedule>(&format!(
        "SELECT {SCHEDULE_COLUMNS} FROM fetch_schedules
         WHERE is_active AND next_run_at <= $1
         ORDER BY next_run_at ASC
         FOR UPDATE SKIP LOCKED"
    ))
    .bind(now)
    .fetch_all(txn)
    .await
}

/// Advance a schedule after materializing its job. Missed intervals are not
/// coalesced: the next run is exactly one interval from now.
pub async fn mark_ran(
    txn: &mut sqlx::PgConnection,
    id: Id,
    now: DateTime<Utc>,
    interval_minutes: i32,
) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE fetch_schedules SET
            last_run_at = $2,
            next_run_at = $3,
            updated_at = now()
         WHERE id = $1",
    )
    .bind(id)
    .bind(now)
    .bind(now + Duration::minutes(i64::from(interval_minutes)))
    .execute(txn)
    .await?;
    Ok(())
}
