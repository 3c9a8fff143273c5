pub mod artifacts;
pub mod cleanup;
pub mod collections;
pub mod frames;
pub mod gaps;
pub mod jobs;
pub mod notifications;
pub mod presets;
pub mod schedules;
mod schema;
pub mod settings;
pub mod share;
pub mod tags;

pub use schema::ensure_schema;

/// Postgres unique-violation, surfaced to HTTP as a 409 conflict.
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}

/// Connection pool for API handlers and workers. Sized to at least twice the
/// worker concurrency so progress writes never starve behind long queries.
pub async fn connect(database_url: &str, max_connections: u32) -> sqlx::Result<sqlx::PgPool> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .connect(database_url)
        .await
}
