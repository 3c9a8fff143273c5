use models::{Id, Notification, NotificationType};

pub async fn insert(
    pool: &sqlx::PgPool,
    kind: NotificationType,
    message: &str,
) -> sqlx::Result<Notification> {
    sqlx::query_as::<_, Notification>(
        "INSERT INTO notifications (id, type, message) VALUES ($1, $2, $3)
         RETURNING id, type, message, read, created_at",
    )
    .bind(Id::new())
    .bind(kind.as_str())
    .bind(message)
    .fetch_one(pool)
    .await
}

/// Latest 50 notifications, newest first.
pub async fn list(pool: &sqlx::PgPool) -> sqlx::Result<Vec<Notification>> {
    sqlx::query_as::<_, Notification>(
        "SELECT id, type, message, read, created_at
         FROM notifications ORDER BY created_at DESC LIMIT 50",
    )
    .fetch_all(pool)
    .await
}

pub async fn mark_read(pool: &sqlx::PgPool, id: Id) -> sqlx::Result<bool> {
    let done = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(done.rows_affected() > 0)
}
