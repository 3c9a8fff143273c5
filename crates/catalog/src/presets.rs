use models::{AnimationPreset, CropPreset, FetchPreset, Id, Preset};

pub async fn create_preset(
    pool: &sqlx::PgPool,
    name: &str,
    params: &serde_json::Value,
) -> sqlx::Result<Preset> {
    sqlx::query_as::<_, Preset>(
        "INSERT INTO presets (id, name, params) VALUES ($1, $2, $3)
         RETURNING id, name, params, created_at",
    )
    .bind(Id::new())
    .bind(name)
    .bind(params)
    .fetch_one(pool)
    .await
}

pub async fn list_presets(pool: &sqlx::PgPool) -> sqlx::Result<Vec<Preset>> {
    sqlx::query_as::<_, Preset>(
        "SELECT id, name, params, created_at FROM presets ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await
}

pub async fn delete_preset(pool: &sqlx::PgPool, id: Id) -> sqlx::Result<bool> {
    let done = sqlx::query("DELETE FROM presets WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(done.rows_affected() > 0)
}

// ── Crop presets ────────────────────────────────────────────────────

const CROP_COLUMNS: &str = "id, name, x, y, width, height, created_at";

pub async fn create_crop_preset(
    pool: &sqlx::PgPool,
    name: &str,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
) -> sqlx::Result<CropPreset> {
    sqlx::query_as::<_, CropPreset>(&format!(
        "INSERT INTO crop_presets (id, name, x, y, width, height)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {CROP_COLUMNS}"
    ))
    .bind(Id::new())
    .bind(name)
    .bind(x)
    .bind(y)
    .bind(width)
    .bind(height)
    .fetch_one(pool)
    .await
}

pub async fn list_crop_presets(pool: &sqlx::PgPool) -> sqlx::Result<Vec<CropPreset>> {
    sqlx::query_as::<_, CropPreset>(&format!(
        "SELECT {CROP_COLUMNS} FROM crop_presets ORDER BY name"
    ))
    .fetch_all(pool)
    .await
}

pub async fn fetch_crop_preset(pool: &sqlx::PgPool, id: Id) -> sqlx::Result<Option<CropPreset>> {
    sqlx::query_as::<_, CropPreset>(&format!(
        "SELECT {CROP_COLUMNS} FROM crop_presets WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn update_crop_preset(
    pool: &sqlx::PgPool,
    id: Id,
    name: Option<&str>,
    x: Option<i32>,
    y: Option<i32>,
    width: Option<i32>,
    height: Option<i32>,
) -> sqlx::Result<Option<CropPreset>> {
    sqlx::query_as::<_, CropPreset>(&format!(
        "UPDATE crop_presets SET
            name = COALESCE($2, name),
            x = COALESCE($3, x),
            y = COALESCE($4, y),
            width = COALESCE($5, width),
            height = COALESCE($6, height)
         WHERE id = $1
         RETURNING {CROP_COLUMNS}"
    ))
    .bind(id)
    .bind(name)
    .bind(x)
    .bind(y)
    .bind(width)
    .bind(height)
    .fetch_optional(pool)
    .await
}

pub async fn delete_crop_preset(pool: &sqlx::PgPool, id: Id) -> sqlx::Result<bool> {
    let done = sqlx::query("DELETE FROM crop_presets WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(done.rows_affected() > 0)
}

// ── Fetch presets ───────────────────────────────────────────────────

const FETCH_PRESET_COLUMNS: &str = "id, name, satellite, sector, band, description, created_at";

pub async fn create_fetch_preset(
    pool: &sqlx::PgPool,
    name: &str,
    satellite: models::Satellite,
    sector: models::Sector,
    band: models::Band,
    description: &str,
) -> sqlx::Result<FetchPreset> {
    sqlx::query_as::<_, FetchPreset>(&format!(
        "INSERT INTO fetch_presets (id, name, satellite, sector, band, description)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {FETCH_PRESET_COLUMNS}"
    ))
    .bind(Id::new())
    .bind(name)
    .bind(satellite.as_str())
    .bind(sector.as_str())
    .bind(band.to_string())
    .bind(description)
    .fetch_one(pool)
    .await
}

pub async fn list_fetch_presets(pool: &sqlx::PgPool) -> sqlx::Result<Vec<FetchPreset>> {
    sqlx::query_as::<_, FetchPreset>(&format!(
        "SELECT {FETCH_PRESET_COLUMNS} FROM fetch_presets ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await
}

pub async fn fetch_fetch_preset(pool: &sqlx::PgPool, id: Id) -> sqlx::Result<Option<FetchPreset>> {
    sqlx::query_as::<_, FetchPreset>(&format!(
        "SELECT {FETCH_PRESET_COLUMNS} FROM fetch_presets WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn update_fetch_preset(
    pool: &sqlx::PgPool,
    id: Id,
    name: Option<&str>,
    satellite: Option<models::Satellite>,
    sector: Option<models::Sector>,
    band: Option<models::Band>,
    description: Option<&str>,
) -> sqlx::Result<Option<FetchPreset>> {
    sqlx::query_as::<_, FetchPreset>(&format!(
        "UPDATE fetch_presets SET
            name = COALESCE($2, name),
            satellite = COALESCE($3, satellite),
            sector = COALESCE($4, sector),
            band = COALESCE($5, band),
            description = COALESCE($6, description)
         WHERE id = $1
         RETURNING {FETCH_PRESET_COLUMNS}"
    ))
    .bind(id)
    .bind(name)
    .bind(satellite.map(|s| s.as_str()))
    .bind(sector.map(|s| s.as_str()))
    .bind(band.map(|b| b.to_string()))
    .bind(description)
    .fetch_optional(pool)
    .await
}

pub async fn delete_fetch_preset(pool: &sqlx::PgPool, id: Id) -> sqlx::Result<bool> {
    let done = sqlx::query("DELETE FROM fetch_presets WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(done.rows_affected() > 0)
}

// ── Animation presets ───────────────────────────────────────────────

const ANIM_PRESET_COLUMNS: &str =
    "id, name, fps, format, quality, loop_style, scale, crop_preset_id, created_at";

pub async fn create_animation_preset(
    pool: &sqlx::PgPool,
    name: &str,
    options: &models::AnimationOptions,
) -> sqlx::Result<AnimationPreset> {
    sqlx::query_as::<_, AnimationPreset>(&format!(
        "INSERT INTO animation_presets
            (id, name, fps, format, quality, loop_style, scale, crop_preset_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {ANIM_PRESET_COLUMNS}"
    ))
    .bind(Id::new())
    .bind(name)
    .bind(options.fps)
    .bind(&options.format)
    .bind(&options.quality)
    .bind(&options.loop_style)
    .bind(&options.scale)
    .bind(options.crop_preset_id)
    .fetch_one(pool)
    .await
}

pub async fn list_animation_presets(pool: &sqlx::PgPool) -> sqlx::Result<Vec<AnimationPreset>> {
    sqlx::query_as::<_, AnimationPreset>(&format!(
        "SELECT {ANIM_PRESET_COLUMNS} FROM animation_presets ORDER BY name"
    ))
    .fetch_all(pool)
    .await
}

pub async fn delete_animation_preset(pool: &sqlx::PgPool, id: Id) -> sqlx::Result<bool> {
    let done = sqlx::query("DELETE FROM animation_presets WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(done.rows_affected() > 0)
}
