use chrono::{DateTime, Utc};
use models::{Band, FrameListQuery, GoesFrame, Id, Satellite, Sector};

const FRAME_COLUMNS: &str = "id, satellite, sector, band, capture_time, file_path, file_size, \
     width, height, thumbnail_path, source_job_id, created_at";

/// Everything known about a frame at insert time.
#[derive(Debug, Clone)]
pub struct NewFrame {
    pub satellite: Satellite,
    pub sector: Sector,
    pub band: Band,
    pub capture_time: DateTime<Utc>,
    pub file_path: String,
    pub file_size: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub thumbnail_path: Option<String>,
    pub source_job_id: Option<Id>,
}

/// Upsert on the logical key (satellite, sector, band, capture_time):
/// re-fetching a window overwrites file metadata in place, so duplicate
/// deliveries of the same fetch are safe.
pub async fn upsert<'c, E>(executor: E, frame: &NewFrame) -> sqlx::Result<GoesFrame>
where
    E: sqlx::PgExecutor<'c>,
{
    sqlx::query_as::<_, GoesFrame>(&format!(
        "INSERT INTO goes_frames
            (id, satellite, sector, band, capture_time, file_path, file_size,
             width, height, thumbnail_path, source_job_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
         ON CONFLICT (satellite, sector, band, capture_time) DO UPDATE SET
            file_path = EXCLUDED.file_path,
            file_size = EXCLUDED.file_size,
            width = EXCLUDED.width,
            height = EXCLUDED.height,
            thumbnail_path = EXCLUDED.thumbnail_path,
            source_job_id = EXCLUDED.source_job_id
         RETURNING {FRAME_COLUMNS}"
    ))
    .bind(Id::new())
    .bind(frame.satellite.as_str())
    .bind(frame.sector.as_str())
    .bind(frame.band.to_string())
    .bind(frame.capture_time)
    .bind(&frame.file_path)
    .bind(frame.file_size)
    .bind(frame.width)
    .bind(frame.height)
    .bind(&frame.thumbnail_path)
    .bind(frame.source_job_id)
    .fetch_one(executor)
    .await
}

/// Legacy catalogue row kept in step with each GoesFrame insert.
pub async fn insert_legacy_image<'c, E>(executor: E, frame: &GoesFrame) -> sqlx::Result<()>
where
    E: sqlx::PgExecutor<'c>,
{
    let filename = std::path::Path::new(&frame.file_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| frame.file_path.clone());

    sqlx::query(
        "INSERT INTO images
            (id, filename, original_name, file_path, file_size, width, height,
             satellite, channel, captured_at, source)
         VALUES ($1, $2, $2, $3, $4, $5, $6, $7, $8, $9, 'goes_fetch')
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(Id::new())
    .bind(&filename)
    .bind(&frame.file_path)
    .bind(frame.file_size)
    .bind(frame.width)
    .bind(frame.height)
    .bind(frame.satellite.as_str())
    .bind(frame.band.to_string())
    .bind(frame.capture_time)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn fetch(pool: &sqlx::PgPool, id: Id) -> sqlx::Result<Option<GoesFrame>> {
    sqlx::query_as::<_, GoesFrame>(&format!(
        "SELECT {FRAME_COLUMNS} FROM goes_frames WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

fn push_list_filters<'a>(
    builder: &mut sqlx::QueryBuilder<'a, sqlx::Postgres>,
    query: &'a FrameListQuery,
) {
    let mut prefix = " WHERE ";

    if let Some(satellite) = query.satellite {
        builder
            .push(prefix)
            .push("f.satellite = ")
            .push_bind(satellite.as_str());
        prefix = " AND ";
    }
    if let Some(band) = query.band {
        builder
            .push(prefix)
            .push("f.band = ")
            .push_bind(band.to_string());
        prefix = " AND ";
    }
    if let Some(sector) = query.sector {
        builder
            .push(prefix)
            .push("f.sector = ")
            .push_bind(sector.as_str());
        prefix = " AND ";
    }
    if let Some(start) = query.start_date {
        builder.push(prefix).push("f.capture_time >= ").push_bind(start);
        prefix = " AND ";
    }
    if let Some(end) = query.end_date {
        builder.push(prefix).push("f.capture_time <= ").push_bind(end);
        prefix = " AND ";
    }
    if let Some(collection_id) = query.collection_id {
        builder
            .push(prefix)
            .push(
                "EXISTS (SELECT 1 FROM collection_frames cf \
                 WHERE cf.frame_id = f.id AND cf.collection_id = ",
            )
            .push_bind(collection_id)
            .push(")");
        prefix = " AND ";
    }
    if let Some(ref tag) = query.tag {
        builder
            .push(prefix)
            .push(
                "EXISTS (SELECT 1 FROM frame_tags ft \
                 JOIN tags t ON t.id = ft.tag_id \
                 WHERE ft.frame_id = f.id AND t.name = ",
            )
            .push_bind(tag.as_str())
            .push(")");
    }
}

/// Filtered, paginated listing. Sort keys come from a closed whitelist
/// (`FrameSort::as_column`), never from raw input.
pub async fn list(
    pool: &sqlx::PgPool,
    query: &FrameListQuery,
) -> sqlx::Result<(Vec<GoesFrame>, i64)> {
    let mut builder = sqlx::QueryBuilder::new(format!(
        "SELECT {} FROM goes_frames f",
        FRAME_COLUMNS
            .split(", ")
            .map(|c| format!("f.{c}"))
            .collect::<Vec<_>>()
            .join(", ")
    ));
    push_list_filters(&mut builder, query);
    builder.push(format!(
        " ORDER BY f.{} {}",
        query.sort.as_column(),
        query.order.as_sql()
    ));
    builder
        .push(" LIMIT ")
        .push_bind(query.limit as i64)
        .push(" OFFSET ")
        .push_bind(query.offset());

    let frames = builder.build_query_as::<GoesFrame>().fetch_all(pool).await?;

    let mut count = sqlx::QueryBuilder::new("SELECT COUNT(*) FROM goes_frames f");
    push_list_filters(&mut count, query);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    Ok((frames, total))
}

/// Most recent frame for a (satellite, sector, band) triple.
pub async fn latest(
    pool: &sqlx::PgPool,
    satellite: Satellite,
    sector: Sector,
    band: Band,
) -> sqlx::Result<Option<GoesFrame>> {
    sqlx::query_as::<_, GoesFrame>(&format!(
        "SELECT {FRAME_COLUMNS} FROM goes_frames
         WHERE satellite = $1 AND sector = $2 AND band = $3
         ORDER BY capture_time DESC LIMIT 1"
    ))
    .bind(satellite.as_str())
    .bind(sector.as_str())
    .bind(band.to_string())
    .fetch_optional(pool)
    .await
}

/// Frame nearest in time to `target` for one band, used by compositing.
pub async fn nearest(
    pool: &sqlx::PgPool,
    satellite: Satellite,
    sector: Sector,
    band: Band,
    target: DateTime<Utc>,
) -> sqlx::Result<Option<GoesFrame>> {
    sqlx::query_as::<_, GoesFrame>(&format!(
        "SELECT {FRAME_COLUMNS} FROM goes_frames
         WHERE satellite = $1 AND sector = $2 AND band = $3
         ORDER BY ABS(EXTRACT(EPOCH FROM capture_time - $4::timestamptz)) ASC
         LIMIT 1"
    ))
    .bind(satellite.as_str())
    .bind(sector.as_str())
    .bind(band.to_string())
    .bind(target)
    .fetch_optional(pool)
    .await
}

/// Delete the given frames, returning their disk paths for file cleanup.
pub async fn delete_many(
    pool: &sqlx::PgPool,
    ids: &[Id],
) -> sqlx::Result<Vec<(Id, String, Option<String>)>> {
    let ids: Vec<uuid::Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
    sqlx::query_as(
        "DELETE FROM goes_frames WHERE id = ANY($1)
         RETURNING id, file_path, thumbnail_path",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await
}

/// Delete every frame produced by a job, returning paths for file cleanup.
pub async fn delete_by_source_job(
    pool: &sqlx::PgPool,
    job_id: Id,
) -> sqlx::Result<Vec<(Id, String, Option<String>)>> {
    sqlx::query_as(
        "DELETE FROM goes_frames WHERE source_job_id = $1
         RETURNING id, file_path, thumbnail_path",
    )
    .bind(job_id)
    .fetch_all(pool)
    .await
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct FrameStatsRow {
    pub satellite: String,
    pub band: String,
    pub count: i64,
    pub size: i64,
}

/// Per-(satellite, band) frame counts and byte totals.
pub async fn stats(pool: &sqlx::PgPool) -> sqlx::Result<Vec<FrameStatsRow>> {
    sqlx::query_as::<_, FrameStatsRow>(
        "SELECT satellite, band, COUNT(*) AS count,
                COALESCE(SUM(file_size), 0)::BIGINT AS size
         FROM goes_frames
         GROUP BY satellite, band
         ORDER BY satellite, band",
    )
    .fetch_all(pool)
    .await
}

/// Ordered capture times matching the optional filters; input to the gap
/// detector.
pub async fn capture_times(
    pool: &sqlx::PgPool,
    satellite: Option<Satellite>,
    band: Option<Band>,
    sector: Option<Sector>,
) -> sqlx::Result<Vec<DateTime<Utc>>> {
    let mut builder = sqlx::QueryBuilder::new("SELECT capture_time FROM goes_frames");
    let mut prefix = " WHERE ";
    if let Some(satellite) = satellite {
        builder
            .push(prefix)
            .push("satellite = ")
            .push_bind(satellite.as_str());
        prefix = " AND ";
    }
    if let Some(band) = band {
        builder.push(prefix).push("band = ").push_bind(band.to_string());
        prefix = " AND ";
    }
    if let Some(sector) = sector {
        builder
            .push(prefix)
            .push("sector = ")
            .push_bind(sector.as_str());
    }
    builder.push(" ORDER BY capture_time ASC");

    builder.build_query_scalar().fetch_all(pool).await
}

/// Capture times of frames a job produced for one band, oldest first.
/// Used to queue composite generation after a multi-band fetch.
pub async fn capture_times_for_job(
    pool: &sqlx::PgPool,
    source_job_id: Id,
    satellite: Satellite,
    sector: Sector,
    band: Band,
    limit: i64,
) -> sqlx::Result<Vec<DateTime<Utc>>> {
    sqlx::query_scalar(
        "SELECT capture_time FROM goes_frames
         WHERE source_job_id = $1 AND satellite = $2 AND sector = $3 AND band = $4
         ORDER BY capture_time ASC LIMIT $5",
    )
    .bind(source_job_id)
    .bind(satellite.as_str())
    .bind(sector.as_str())
    .bind(band.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Resolve frame ids for an animation selection: explicit filters over
/// satellite/sector/band and a time range, ordered by capture time.
pub async fn ids_in_range(
    pool: &sqlx::PgPool,
    satellite: Satellite,
    sector: Sector,
    band: Band,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> sqlx::Result<Vec<Id>> {
    sqlx::query_scalar(
        "SELECT id FROM goes_frames
         WHERE satellite = $1 AND sector = $2 AND band = $3
           AND capture_time >= $4 AND capture_time <= $5
         ORDER BY capture_time ASC",
    )
    .bind(satellite.as_str())
    .bind(sector.as_str())
    .bind(band.to_string())
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
}

/// Fetch frames by id, ordered by capture time (animation rendering order).
pub async fn fetch_ordered(pool: &sqlx::PgPool, ids: &[Id]) -> sqlx::Result<Vec<GoesFrame>> {
    let ids: Vec<uuid::Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
    sqlx::query_as::<_, GoesFrame>(&format!(
        "SELECT {FRAME_COLUMNS} FROM goes_frames
         WHERE id = ANY($1) ORDER BY capture_time ASC"
    ))
    .bind(&ids)
    .fetch_all(pool)
    .await
}

pub async fn paths_for(pool: &sqlx::PgPool, ids: &[Id]) -> sqlx::Result<Vec<String>> {
    let ids: Vec<uuid::Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
    sqlx::query_scalar(
        "SELECT file_path FROM goes_frames WHERE id = ANY($1) ORDER BY capture_time ASC",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await
}
