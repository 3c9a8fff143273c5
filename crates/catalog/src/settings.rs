use models::AppSettings;
use sqlx::types::Json;

/// Load the singleton settings document, falling back to defaults when the
/// row is absent or unreadable.
pub async fn load(pool: &sqlx::PgPool) -> AppSettings {
    let row: Result<Option<Json<AppSettings>>, _> =
        sqlx::query_scalar("SELECT data FROM app_settings WHERE id = 1")
            .fetch_optional(pool)
            .await;
    match row {
        Ok(Some(Json(settings))) => settings,
        Ok(None) => AppSettings::default(),
        Err(error) => {
            tracing::debug!(?error, "could not read app settings, using defaults");
            AppSettings::default()
        }
    }
}

pub async fn store(pool: &sqlx::PgPool, settings: &AppSettings) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO app_settings (id, data) VALUES (1, $1)
         ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data",
    )
    .bind(Json(settings))
    .execute(pool)
    .await?;
    Ok(())
}
