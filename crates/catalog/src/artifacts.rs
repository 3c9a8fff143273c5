use chrono::{DateTime, Utc};
use models::{Animation, AnimationOptions, Composite, Id, Satellite, Sector};

const ANIMATION_COLUMNS: &str = "id, name, status, frame_count, fps, format, quality, resolution, \
     loop_style, scale, crop_preset_id, output_path, file_size, duration_seconds, error, job_id, \
     created_at, completed_at";

pub async fn create_animation<'c, E>(
    executor: E,
    id: Id,
    name: &str,
    frame_count: i32,
    options: &AnimationOptions,
    job_id: Id,
) -> sqlx::Result<Animation>
where
    E: sqlx::PgExecutor<'c>,
{
    sqlx::query_as::<_, Animation>(&format!(
        "INSERT INTO animations
            (id, name, status, frame_count, fps, format, quality, resolution,
             loop_style, scale, crop_preset_id, job_id)
         VALUES ($1, $2, 'pending', $3, $4, $5, $6, $7, $8, $9, $10, $11)
         RETURNING {ANIMATION_COLUMNS}"
    ))
    .bind(id)
    .bind(name)
    .bind(frame_count)
    .bind(options.fps)
    .bind(&options.format)
    .bind(&options.quality)
    .bind(&options.resolution)
    .bind(&options.loop_style)
    .bind(&options.scale)
    .bind(options.crop_preset_id)
    .bind(job_id)
    .fetch_one(executor)
    .await
}

pub async fn fetch_animation(pool: &sqlx::PgPool, id: Id) -> sqlx::Result<Option<Animation>> {
    sqlx::query_as::<_, Animation>(&format!(
        "SELECT {ANIMATION_COLUMNS} FROM animations WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn list_animations(
    pool: &sqlx::PgPool,
    limit: i64,
    offset: i64,
) -> sqlx::Result<(Vec<Animation>, i64)> {
    let animations = sqlx::query_as::<_, Animation>(&format!(
        "SELECT {ANIMATION_COLUMNS} FROM animations
         ORDER BY created_at DESC LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM animations")
        .fetch_one(pool)
        .await?;
    Ok((animations, total))
}

pub async fn mark_animation_processing(pool: &sqlx::PgPool, id: Id) -> sqlx::Result<()> {
    sqlx::query("UPDATE animations SET status = 'processing' WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn complete_animation(
    pool: &sqlx::PgPool,
    id: Id,
    output_path: &str,
    file_size: i64,
    frame_count: i32,
    duration_seconds: i32,
) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE animations SET
            status = 'completed',
            output_path = $2,
            file_size = $3,
            frame_count = $4,
            duration_seconds = $5,
            completed_at = now()
         WHERE id = $1",
    )
    .bind(id)
    .bind(output_path)
    .bind(file_size)
    .bind(frame_count)
    .bind(duration_seconds)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fail_animation(pool: &sqlx::PgPool, id: Id, error: &str) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE animations SET status = 'failed', error = $2, completed_at = now() WHERE id = $1",
    )
    .bind(id)
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_animation(pool: &sqlx::PgPool, id: Id) -> sqlx::Result<Option<Animation>> {
    sqlx::query_as::<_, Animation>(&format!(
        "DELETE FROM animations WHERE id = $1 RETURNING {ANIMATION_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

// ── Composites ──────────────────────────────────────────────────────

const COMPOSITE_COLUMNS: &str = "id, name, recipe, satellite, sector, capture_time, status, \
     file_path, file_size, error, job_id, created_at";

#[allow(clippy::too_many_arguments)]
pub async fn create_composite<'c, E>(
    executor: E,
    id: Id,
    name: &str,
    recipe: &str,
    satellite: Satellite,
    sector: Sector,
    capture_time: DateTime<Utc>,
    job_id: Id,
) -> sqlx::Result<Composite>
where
    E: sqlx::PgExecutor<'c>,
{
    sqlx::query_as::<_, Composite>(&format!(
        "INSERT INTO composites
            (id, name, recipe, satellite, sector, capture_time, status, job_id)
         VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7)
         RETURNING {COMPOSITE_COLUMNS}"
    ))
    .bind(id)
    .bind(name)
    .bind(recipe)
    .bind(satellite.as_str())
    .bind(sector.as_str())
    .bind(capture_time)
    .bind(job_id)
    .fetch_one(executor)
    .await
}

pub async fn fetch_composite(pool: &sqlx::PgPool, id: Id) -> sqlx::Result<Option<Composite>> {
    sqlx::query_as::<_, Composite>(&format!(
        "SELECT {COMPOSITE_COLUMNS} FROM composites WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn list_composites(
    pool: &sqlx::PgPool,
    limit: i64,
    offset: i64,
) -> sqlx::Result<(Vec<Composite>, i64)> {
    let composites = sqlx::query_as::<_, Composite>(&format!(
        "SELECT {COMPOSITE_COLUMNS} FROM composites
         ORDER BY created_at DESC LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM composites")
        .fetch_one(pool)
        .await?;
    Ok((composites, total))
}

pub async fn complete_composite(
    pool: &sqlx::PgPool,
    id: Id,
    file_path: &str,
    file_size: i64,
) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE composites SET status = 'completed', file_path = $2, file_size = $3 WHERE id = $1",
    )
    .bind(id)
    .bind(file_path)
    .bind(file_size)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fail_composite(pool: &sqlx::PgPool, id: Id, error: &str) -> sqlx::Result<()> {
    sqlx::query("UPDATE composites SET status = 'failed', error = $2 WHERE id = $1")
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;
    Ok(())
}
