use crate::{Band, Id, Satellite, Sector};
use chrono::{DateTime, Utc};

/// Decode error for entity enums stored as text.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ParseEntityEnumError(String);

/// A catalogued satellite image on disk. The tuple
/// (satellite, sector, band, capture_time) is logically unique; `id` is a
/// surrogate used for references.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct GoesFrame {
    pub id: Id,
    #[sqlx(try_from = "String")]
    pub satellite: Satellite,
    #[sqlx(try_from = "String")]
    pub sector: Sector,
    #[sqlx(try_from = "String")]
    pub band: Band,
    pub capture_time: DateTime<Utc>,
    pub file_path: String,
    pub file_size: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub thumbnail_path: Option<String>,
    pub source_job_id: Option<Id>,
    pub created_at: DateTime<Utc>,
}

/// A named mutable group of frames; membership also acts as a retention
/// protection marker.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct Collection {
    pub id: Id,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct Tag {
    pub id: Id,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct CropPreset {
    pub id: Id,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct FetchPreset {
    pub id: Id,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub satellite: Satellite,
    #[sqlx(try_from = "String")]
    pub sector: Sector,
    #[sqlx(try_from = "String")]
    pub band: Band,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Reusable parameter block for image-processing jobs.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct Preset {
    pub id: Id,
    pub name: String,
    pub params: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct AnimationPreset {
    pub id: Id,
    pub name: String,
    pub fps: i32,
    pub format: String,
    pub quality: String,
    pub loop_style: String,
    pub scale: String,
    pub crop_preset_id: Option<Id>,
    pub created_at: DateTime<Utc>,
}

/// An active preset plus cadence. When active, `next_run_at` must be set;
/// when inactive it must be null.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct FetchSchedule {
    pub id: Id,
    pub name: String,
    pub preset_id: Id,
    pub interval_minutes: i32,
    pub is_active: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupRuleType {
    MaxAgeDays,
    MaxStorageGb,
}

impl CleanupRuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleanupRuleType::MaxAgeDays => "max_age_days",
            CleanupRuleType::MaxStorageGb => "max_storage_gb",
        }
    }
}

impl std::str::FromStr for CleanupRuleType {
    type Err = ParseEntityEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "max_age_days" => Ok(CleanupRuleType::MaxAgeDays),
            "max_storage_gb" => Ok(CleanupRuleType::MaxStorageGb),
            other => Err(ParseEntityEnumError(format!("unknown cleanup rule type {other:?}"))),
        }
    }
}

impl TryFrom<String> for CleanupRuleType {
    type Error = ParseEntityEnumError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct CleanupRule {
    pub id: Id,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub rule_type: CleanupRuleType,
    pub value: f64,
    pub protect_collections: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Derived artifact record for a rendered animation, mirroring its job.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct Animation {
    pub id: Id,
    pub name: String,
    pub status: String,
    pub frame_count: i32,
    pub fps: i32,
    pub format: String,
    pub quality: String,
    pub resolution: String,
    pub loop_style: String,
    pub scale: String,
    pub crop_preset_id: Option<Id>,
    pub output_path: Option<String>,
    pub file_size: i64,
    pub duration_seconds: i32,
    pub error: String,
    pub job_id: Option<Id>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Derived artifact record for a multi-band composite image.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct Composite {
    pub id: Id,
    pub name: String,
    pub recipe: String,
    #[sqlx(try_from = "String")]
    pub satellite: Satellite,
    #[sqlx(try_from = "String")]
    pub sector: Sector,
    pub capture_time: DateTime<Utc>,
    pub status: String,
    pub file_path: Option<String>,
    pub file_size: i64,
    pub error: String,
    pub job_id: Option<Id>,
    pub created_at: DateTime<Utc>,
}

/// Expiring public link to a single frame. The token is URL-safe random.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct ShareLink {
    pub token: String,
    pub frame_id: Id,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    FetchComplete,
    FetchFailed,
    ScheduleRun,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::FetchComplete => "fetch_complete",
            NotificationType::FetchFailed => "fetch_failed",
            NotificationType::ScheduleRun => "schedule_run",
        }
    }
}

impl std::str::FromStr for NotificationType {
    type Err = ParseEntityEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fetch_complete" => Ok(NotificationType::FetchComplete),
            "fetch_failed" => Ok(NotificationType::FetchFailed),
            "schedule_run" => Ok(NotificationType::ScheduleRun),
            other => Err(ParseEntityEnumError(format!("unknown notification type {other:?}"))),
        }
    }
}

impl TryFrom<String> for NotificationType {
    type Error = ParseEntityEnumError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Id,
    #[sqlx(try_from = "String")]
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Application tunables, persisted as a single JSON document row.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AppSettings {
    #[serde(default = "AppSettings::default_max_frames")]
    pub max_frames_per_fetch: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

impl AppSettings {
    pub const MAX_FRAMES_FLOOR: u32 = 1;
    pub const MAX_FRAMES_CEILING: u32 = 1000;

    fn default_max_frames() -> u32 {
        200
    }

    /// The frame cap actually applied to a fetch run, clamped to 1..=1000.
    pub fn clamped_max_frames(&self) -> u32 {
        self.max_frames_per_fetch
            .clamp(Self::MAX_FRAMES_FLOOR, Self::MAX_FRAMES_CEILING)
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            max_frames_per_fetch: Self::default_max_frames(),
            webhook_url: None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn settings_clamp_max_frames() {
        let mut settings = AppSettings::default();
        assert_eq!(settings.clamped_max_frames(), 200);

        settings.max_frames_per_fetch = 0;
        assert_eq!(settings.clamped_max_frames(), 1);

        settings.max_frames_per_fetch = 5000;
        assert_eq!(settings.clamped_max_frames(), 1000);
    }

    #[test]
    fn settings_json_defaults() {
        let settings: AppSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn notification_type_round_trips() {
        for kind in [
            NotificationType::FetchComplete,
            NotificationType::FetchFailed,
            NotificationType::ScheduleRun,
        ] {
            assert_eq!(kind.as_str().parse::<NotificationType>().unwrap(), kind);
        }
    }
}
