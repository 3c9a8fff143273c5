use models::{Id, Tag};

pub async fn create(pool: &sqlx::PgPool, name: &str, color: &str) -> sqlx::Result<Tag> {
    sqlx::query_as::<_, Tag>(
        "INSERT INTO tags (id, name, color) VALUES ($1, $2, $3)
         RETURNING id, name, color",
    )
    .bind(Id::new())
    .bind(name)
    .bind(color)
    .fetch_one(pool)
    .await
}

pub async fn list(pool: &sqlx::PgPool) -> sqlx::Result<Vec<Tag>> {
    sqlx::query_as::<_, Tag>("SELECT id, name, color FROM tags ORDER BY name")
        .fetch_all(pool)
        .await
}

pub async fn delete(pool: &sqlx::PgPool, id: Id) -> sqlx::Result<bool> {
    let done = sqlx::query("DELETE FROM tags WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(done.rows_affected() > 0)
}

/// Apply every tag to every frame; existing pairs are left alone.
pub async fn tag_frames(pool: &sqlx::PgPool, frame_ids: &[Id], tag_ids: &[Id]) -> sqlx::Result<u64> {
    let frame_ids: Vec<uuid::Uuid> = frame_ids.iter().map(|id| id.as_uuid()).collect();
    let tag_ids: Vec<uuid::Uuid> = tag_ids.iter().map(|id| id.as_uuid()).collect();
    let done = sqlx::query(
        "INSERT INTO frame_tags (frame_id, tag_id)
         SELECT f.id, t.id
         FROM goes_frames f CROSS JOIN tags t
         WHERE f.id = ANY($1) AND t.id = ANY($2)
         ON CONFLICT DO NOTHING",
    )
    .bind(&frame_ids)
    .bind(&tag_ids)
    .execute(pool)
    .await?;
    Ok(done.rows_affected())
}

/// Tags attached to any of the given frames, for response assembly.
pub async fn for_frames(pool: &sqlx::PgPool, frame_ids: &[Id]) -> sqlx::Result<Vec<(Id, Tag)>> {
    let frame_ids: Vec<uuid::Uuid> = frame_ids.iter().map(|id| id.as_uuid()).collect();
    let rows: Vec<(Id, Id, String, String)> = sqlx::query_as(
        "SELECT ft.frame_id, t.id, t.name, t.color
         FROM frame_tags ft JOIN tags t ON t.id = ft.tag_id
         WHERE ft.frame_id = ANY($1)",
    )
    .bind(&frame_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(frame_id, id, name, color)| (frame_id, Tag { id, name, color }))
        .collect())
}
