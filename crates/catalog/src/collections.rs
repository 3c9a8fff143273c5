use models::{Collection, Id};

const COLLECTION_COLUMNS: &str = "id, name, description, created_at, updated_at";

pub async fn create(
    pool: &sqlx::PgPool,
    name: &str,
    description: &str,
) -> sqlx::Result<Collection> {
    sqlx::query_as::<_, Collection>(&format!(
        "INSERT INTO collections (id, name, description)
         VALUES ($1, $2, $3)
         RETURNING {COLLECTION_COLUMNS}"
    ))
    .bind(Id::new())
    .bind(name)
    .bind(description)
    .fetch_one(pool)
    .await
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct CollectionWithCount {
    pub id: Id,
    pub name: String,
    pub description: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub frame_count: i64,
}

pub async fn list(pool: &sqlx::PgPool) -> sqlx::Result<Vec<CollectionWithCount>> {
    sqlx::query_as::<_, CollectionWithCount>(
        "SELECT c.id, c.name, c.description, c.created_at, c.updated_at,
                COUNT(cf.frame_id) AS frame_count
         FROM collections c
         LEFT JOIN collection_frames cf ON cf.collection_id = c.id
         GROUP BY c.id
         ORDER BY c.created_at DESC",
    )
    .fetch_all(pool)
    .await
}

pub async fn fetch(pool: &sqlx::PgPool, id: Id) -> sqlx::Result<Option<Collection>> {
    sqlx::query_as::<_, Collection>(&format!(
        "SELECT {COLLECTION_COLUMNS} FROM collections WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn update(
    pool: &sqlx::PgPool,
    id: Id,
    name: Option<&str>,
    description: Option<&str>,
) -> sqlx::Result<Option<Collection>> {
    sqlx::query_as::<_, Collection>(&format!(
        "UPDATE collections SET
            name = COALESCE($2, name),
            description = COALESCE($3, description),
            updated_at = now()
         WHERE id = $1
         RETURNING {COLLECTION_COLUMNS}"
    ))
    .bind(id)
    .bind(name)
    .bind(description)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &sqlx::PgPool, id: Id) -> sqlx::Result<bool> {
    let done = sqlx::query("DELETE FROM collections WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(done.rows_affected() > 0)
}

/// Lookup-or-create by name; used for the per-fetch auto-collection so
/// repeated fetches reuse one collection instead of creating duplicates.
pub async fn find_or_create(
    txn: &mut sqlx::PgConnection,
    name: &str,
    description: &str,
) -> sqlx::Result<Id> {
    let existing: Option<Id> = sqlx::query_scalar("SELECT id FROM collections WHERE name = $1")
        .bind(name)
        .fetch_optional(&mut *txn)
        .await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let id = Id::new();
    sqlx::query("INSERT INTO collections (id, name, description) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(name)
        .bind(description)
        .execute(&mut *txn)
        .await?;
    Ok(id)
}

/// Idempotent membership insert. Returns the number of frames newly added.
pub async fn add_frames<'c, E>(executor: E, collection_id: Id, frame_ids: &[Id]) -> sqlx::Result<u64>
where
    E: sqlx::PgExecutor<'c>,
{
    let frame_ids: Vec<uuid::Uuid> = frame_ids.iter().map(|id| id.as_uuid()).collect();
    let done = sqlx::query(
        "INSERT INTO collection_frames (collection_id, frame_id)
         SELECT $1, f.id FROM goes_frames f WHERE f.id = ANY($2)
         ON CONFLICT DO NOTHING",
    )
    .bind(collection_id)
    .bind(&frame_ids)
    .execute(executor)
    .await?;
    Ok(done.rows_affected())
}

pub async fn remove_frames(
    pool: &sqlx::PgPool,
    collection_id: Id,
    frame_ids: &[Id],
) -> sqlx::Result<u64> {
    let frame_ids: Vec<uuid::Uuid> = frame_ids.iter().map(|id| id.as_uuid()).collect();
    let done = sqlx::query(
        "DELETE FROM collection_frames WHERE collection_id = $1 AND frame_id = ANY($2)",
    )
    .bind(collection_id)
    .bind(&frame_ids)
    .execute(pool)
    .await?;
    Ok(done.rows_affected())
}

pub async fn frame_count(pool: &sqlx::PgPool, collection_id: Id) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM collection_frames WHERE collection_id = $1")
        .bind(collection_id)
        .fetch_one(pool)
        .await
}
