use chrono::{Duration, Utc};
use futures::TryStreamExt;
use models::{CleanupRule, CleanupRuleType, Id};
use std::collections::BTreeMap;

const RULE_COLUMNS: &str = "id, name, rule_type, value, protect_collections, is_active, created_at";

pub async fn create_rule(
    pool: &sqlx::PgPool,
    name: &str,
    rule_type: CleanupRuleType,
    value: f64,
    protect_collections: bool,
    is_active: bool,
) -> sqlx::Result<CleanupRule> {
    sqlx::query_as::<_, CleanupRule>(&format!(
        "INSERT INTO cleanup_rules (id, name, rule_type, value, protect_collections, is_active)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {RULE_COLUMNS}"
    ))
    .bind(Id::new())
    .bind(name)
    .bind(rule_type.as_str())
    .bind(value)
    .bind(protect_collections)
    .bind(is_active)
    .fetch_one(pool)
    .await
}

pub async fn list_rules(pool: &sqlx::PgPool) -> sqlx::Result<Vec<CleanupRule>> {
    sqlx::query_as::<_, CleanupRule>(&format!(
        "SELECT {RULE_COLUMNS} FROM cleanup_rules ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await
}

pub async fn update_rule(
    pool: &sqlx::PgPool,
    id: Id,
    name: Option<&str>,
    rule_type: Option<CleanupRuleType>,
    value: Option<f64>,
    protect_collections: Option<bool>,
    is_active: Option<bool>,
) -> sqlx::Result<Option<CleanupRule>> {
    sqlx::query_as::<_, CleanupRule>(&format!(
        "UPDATE cleanup_rules SET
            name = COALESCE($2, name),
            rule_type = COALESCE($3, rule_type),
            value = COALESCE($4, value),
            protect_collections = COALESCE($5, protect_collections),
            is_active = COALESCE($6, is_active)
         WHERE id = $1
         RETURNING {RULE_COLUMNS}"
    ))
    .bind(id)
    .bind(name)
    .bind(rule_type.map(|t| t.as_str()))
    .bind(value)
    .bind(protect_collections)
    .bind(is_active)
    .fetch_optional(pool)
    .await
}

pub async fn delete_rule(pool: &sqlx::PgPool, id: Id) -> sqlx::Result<bool> {
    let done = sqlx::query("DELETE FROM cleanup_rules WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(done.rows_affected() > 0)
}

async fn active_rules(pool: &sqlx::PgPool) -> sqlx::Result<Vec<CleanupRule>> {
    sqlx::query_as::<_, CleanupRule>(&format!(
        "SELECT {RULE_COLUMNS} FROM cleanup_rules WHERE is_active"
    ))
    .fetch_all(pool)
    .await
}

/// A frame selected for deletion. Only ids, sizes, and paths are carried;
/// full rows never accumulate in memory.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct Candidate {
    pub id: Id,
    pub file_size: i64,
    pub file_path: String,
    pub thumbnail_path: Option<String>,
    pub capture_time: chrono::DateTime<chrono::Utc>,
}

const PROTECTED_FILTER: &str =
    "NOT EXISTS (SELECT 1 FROM collection_frames cf WHERE cf.frame_id = goes_frames.id)";

/// Union of per-rule selections across every active rule. Keyed by frame id
/// so overlapping rules never double-count a frame.
async fn select_candidates(pool: &sqlx::PgPool) -> sqlx::Result<BTreeMap<uuid::Uuid, Candidate>> {
    let mut selected: BTreeMap<uuid::Uuid, Candidate> = BTreeMap::new();

    for rule in active_rules(pool).await? {
        match rule.rule_type {
            CleanupRuleType::MaxAgeDays => {
                let cutoff = Utc::now() - Duration::seconds((rule.value * 86_400.0) as i64);
                let protection = if rule.protect_collections {
                    format!(" AND {PROTECTED_FILTER}")
                } else {
                    String::new()
                };
                let sql = format!(
                    "SELECT id, file_size, file_path, thumbnail_path, capture_time
                     FROM goes_frames
                     WHERE created_at < $1{protection}"
                );
                let mut rows = sqlx::query_as::<_, Candidate>(&sql).bind(cutoff).fetch(pool);

                while let Some(candidate) = rows.try_next().await? {
                    selected.insert(candidate.id.as_uuid(), candidate);
                }
            }
            CleanupRuleType::MaxStorageGb => {
                let total: i64 = sqlx::query_scalar(
                    "SELECT COALESCE(SUM(file_size), 0)::BIGINT FROM goes_frames",
                )
                .fetch_one(pool)
                .await?;
                let budget = (rule.value * (1u64 << 30) as f64) as i64;
                if total <= budget {
                    continue;
                }
                let excess = total - budget;

                let protection = if rule.protect_collections {
                    format!(" WHERE {PROTECTED_FILTER}")
                } else {
                    String::new()
                };
                // Oldest-first until the cumulative freed bytes cover the excess.
                let sql = format!(
                    "SELECT id, file_size, file_path, thumbnail_path, capture_time
                     FROM goes_frames{protection}
                     ORDER BY created_at ASC"
                );
                let mut rows = sqlx::query_as::<_, Candidate>(&sql).fetch(pool);

                let mut freed: i64 = 0;
                while let Some(candidate) = rows.try_next().await? {
                    if freed >= excess {
                        break;
                    }
                    freed += candidate.file_size;
                    selected.insert(candidate.id.as_uuid(), candidate);
                }
            }
        }
    }

    Ok(selected)
}

#[derive(Debug, serde::Serialize)]
pub struct Preview {
    pub frame_count: usize,
    pub total_size_bytes: i64,
    pub frames: Vec<Candidate>,
}

/// Number of sample frames included in a preview response.
const PREVIEW_SAMPLE_LIMIT: usize = 100;

/// Dry run: what the active rules would delete, without mutating anything.
pub async fn preview(pool: &sqlx::PgPool) -> sqlx::Result<Preview> {
    let selected = select_candidates(pool).await?;
    let total_size_bytes = selected.values().map(|c| c.file_size).sum();
    let frame_count = selected.len();
    let frames = selected
        .into_values()
        .take(PREVIEW_SAMPLE_LIMIT)
        .collect();
    Ok(Preview {
        frame_count,
        total_size_bytes,
        frames,
    })
}

#[derive(Debug, serde::Serialize)]
pub struct RunOutcome {
    pub deleted_frames: u64,
    pub freed_bytes: i64,
}

/// Destructive run: remove files (best-effort; missing files are ignored)
/// and rows for every selected frame.
pub async fn run(pool: &sqlx::PgPool) -> sqlx::Result<RunOutcome> {
    let selected = select_candidates(pool).await?;

    let mut deleted_frames = 0u64;
    let mut freed_bytes = 0i64;

    for candidate in selected.values() {
        let _ = tokio::fs::remove_file(&candidate.file_path).await;
        if let Some(thumb) = &candidate.thumbnail_path {
            let _ = tokio::fs::remove_file(thumb).await;
        }
        let done = sqlx::query("DELETE FROM goes_frames WHERE id = $1")
            .bind(candidate.id)
            .execute(pool)
            .await?;
        if done.rows_affected() > 0 {
            deleted_frames += 1;
            freed_bytes += candidate.file_size;
        }
    }

    tracing::info!(deleted_frames, freed_bytes, "retention run complete");
    Ok(RunOutcome {
        deleted_frames,
        freed_bytes,
    })
}
