/// Schema migrations are applied out-of-band; this DDL exists only as a
/// warning-level fallback that creates missing tables on startup so a fresh
/// environment comes up without manual steps.
const SCHEMA_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id              UUID PRIMARY KEY,
    job_type        TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'pending',
    params          JSONB NOT NULL DEFAULT '{}',
    progress        INTEGER NOT NULL DEFAULT 0,
    status_message  TEXT NOT NULL DEFAULT '',
    error           TEXT NOT NULL DEFAULT '',
    task_id         UUID,
    attempts        INTEGER NOT NULL DEFAULT 0,
    input_path      TEXT NOT NULL DEFAULT '',
    output_path     TEXT NOT NULL DEFAULT '',
    created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
    started_at      TIMESTAMPTZ,
    completed_at    TIMESTAMPTZ,
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS ix_jobs_status ON jobs (status);
CREATE INDEX IF NOT EXISTS ix_jobs_status_created_at ON jobs (status, created_at);

CREATE TABLE IF NOT EXISTS job_logs (
    id          BIGSERIAL PRIMARY KEY,
    job_id      UUID NOT NULL REFERENCES jobs (id) ON DELETE CASCADE,
    level       TEXT NOT NULL DEFAULT 'info',
    message     TEXT NOT NULL,
    timestamp   TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS ix_job_logs_job_id ON job_logs (job_id, timestamp);

CREATE TABLE IF NOT EXISTS goes_frames (
    id              UUID PRIMARY KEY,
    satellite       TEXT NOT NULL,
    sector          TEXT NOT NULL,
    band            TEXT NOT NULL,
    capture_time    TIMESTAMPTZ NOT NULL,
    file_path       TEXT NOT NULL,
    file_size       BIGINT NOT NULL DEFAULT 0,
    width           INTEGER,
    height          INTEGER,
    thumbnail_path  TEXT,
    source_job_id   UUID REFERENCES jobs (id) ON DELETE SET NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (satellite, sector, band, capture_time)
);
CREATE INDEX IF NOT EXISTS ix_goes_frames_sat_band ON goes_frames (satellite, band);
CREATE INDEX IF NOT EXISTS ix_goes_frames_capture ON goes_frames (capture_time);

CREATE TABLE IF NOT EXISTS images (
    id              UUID PRIMARY KEY,
    filename        TEXT NOT NULL,
    original_name   TEXT NOT NULL,
    file_path       TEXT NOT NULL,
    file_size       BIGINT NOT NULL DEFAULT 0,
    width           INTEGER,
    height          INTEGER,
    satellite       TEXT,
    channel         TEXT,
    captured_at     TIMESTAMPTZ,
    source          TEXT NOT NULL DEFAULT 'local',
    uploaded_at     TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS collections (
    id          UUID PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS collection_frames (
    collection_id UUID NOT NULL REFERENCES collections (id) ON DELETE CASCADE,
    frame_id      UUID NOT NULL REFERENCES goes_frames (id) ON DELETE CASCADE,
    PRIMARY KEY (collection_id, frame_id)
);

CREATE TABLE IF NOT EXISTS tags (
    id    UUID PRIMARY KEY,
    name  TEXT NOT NULL UNIQUE,
    color TEXT NOT NULL DEFAULT '#3b82f6'
);

CREATE TABLE IF NOT EXISTS frame_tags (
    frame_id UUID NOT NULL REFERENCES goes_frames (id) ON DELETE CASCADE,
    tag_id   UUID NOT NULL REFERENCES tags (id) ON DELETE CASCADE,
    PRIMARY KEY (frame_id, tag_id)
);

CREATE TABLE IF NOT EXISTS presets (
    id         UUID PRIMARY KEY,
    name       TEXT NOT NULL UNIQUE,
    params     JSONB NOT NULL DEFAULT '{}',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS crop_presets (
    id         UUID PRIMARY KEY,
    name       TEXT NOT NULL UNIQUE,
    x          INTEGER NOT NULL,
    y          INTEGER NOT NULL,
    width      INTEGER NOT NULL,
    height     INTEGER NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS fetch_presets (
    id          UUID PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE,
    satellite   TEXT NOT NULL,
    sector      TEXT NOT NULL,
    band        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS animation_presets (
    id             UUID PRIMARY KEY,
    name           TEXT NOT NULL UNIQUE,
    fps            INTEGER NOT NULL DEFAULT 10,
    format         TEXT NOT NULL DEFAULT 'mp4',
    quality        TEXT NOT NULL DEFAULT 'medium',
    loop_style     TEXT NOT NULL DEFAULT 'forward',
    scale          TEXT NOT NULL DEFAULT '100%',
    crop_preset_id UUID REFERENCES crop_presets (id) ON DELETE SET NULL,
    created_at     TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS fetch_schedules (
    id               UUID PRIMARY KEY,
    name             TEXT NOT NULL,
    preset_id        UUID NOT NULL REFERENCES fetch_presets (id) ON DELETE CASCADE,
    interval_minutes INTEGER NOT NULL,
    is_active        BOOLEAN NOT NULL DEFAULT FALSE,
    last_run_at      TIMESTAMPTZ,
    next_run_at      TIMESTAMPTZ,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at       TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS cleanup_rules (
    id                  UUID PRIMARY KEY,
    name                TEXT NOT NULL,
    rule_type           TEXT NOT NULL,
    value               DOUBLE PRECISION NOT NULL,
    protect_collections BOOLEAN NOT NULL DEFAULT TRUE,
    is_active           BOOLEAN NOT NULL DEFAULT TRUE,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS animations (
    id               UUID PRIMARY KEY,
    name             TEXT NOT NULL,
    status           TEXT NOT NULL DEFAULT 'pending',
    frame_count      INTEGER NOT NULL DEFAULT 0,
    fps              INTEGER NOT NULL DEFAULT 10,
    format           TEXT NOT NULL DEFAULT 'mp4',
    quality          TEXT NOT NULL DEFAULT 'medium',
    resolution       TEXT NOT NULL DEFAULT 'full',
    loop_style       TEXT NOT NULL DEFAULT 'forward',
    scale            TEXT NOT NULL DEFAULT '100%',
    crop_preset_id   UUID REFERENCES crop_presets (id) ON DELETE SET NULL,
    output_path      TEXT,
    file_size        BIGINT NOT NULL DEFAULT 0,
    duration_seconds INTEGER NOT NULL DEFAULT 0,
    error            TEXT NOT NULL DEFAULT '',
    job_id           UUID REFERENCES jobs (id) ON DELETE CASCADE,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT now(),
    completed_at     TIMESTAMPTZ
);

CREATE TABLE IF NOT EXISTS composites (
    id           UUID PRIMARY KEY,
    name         TEXT NOT NULL,
    recipe       TEXT NOT NULL,
    satellite    TEXT NOT NULL,
    sector       TEXT NOT NULL,
    capture_time TIMESTAMPTZ NOT NULL,
    status       TEXT NOT NULL DEFAULT 'pending',
    file_path    TEXT,
    file_size    BIGINT NOT NULL DEFAULT 0,
    error        TEXT NOT NULL DEFAULT '',
    job_id       UUID REFERENCES jobs (id) ON DELETE CASCADE,
    created_at   TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS share_links (
    token      TEXT PRIMARY KEY,
    frame_id   UUID NOT NULL REFERENCES goes_frames (id) ON DELETE CASCADE,
    expires_at TIMESTAMPTZ NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS notifications (
    id         UUID PRIMARY KEY,
    type       TEXT NOT NULL,
    message    TEXT NOT NULL,
    read       BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS app_settings (
    id   INTEGER PRIMARY KEY CHECK (id = 1),
    data JSONB NOT NULL DEFAULT '{}'
);
"#;

/// Create any missing tables. The runtime otherwise assumes the schema
/// matches the current model.
pub async fn ensure_schema(pool: &sqlx::PgPool) -> sqlx::Result<()> {
    tracing::warn!(
        "ensuring catalog schema exists; production deployments should apply \
         migrations out-of-band"
    );
    sqlx::raw_sql(SCHEMA_DDL).execute(pool).await?;
    Ok(())
}
