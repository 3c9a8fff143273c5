use crate::{Band, Id, Satellite, Sector};
use chrono::{DateTime, Utc};
use validator::{Validate, ValidationError};

/// Longest window a single fetch may cover.
pub const MAX_FETCH_WINDOW_HOURS: i64 = 24;

fn window_error(message: &'static str) -> ValidationError {
    let mut err = ValidationError::new("time_window");
    err.message = Some(message.into());
    err
}

fn validate_time_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), ValidationError> {
    if end <= start {
        return Err(window_error("end_time must be after start_time"));
    }
    if end - start > chrono::Duration::hours(MAX_FETCH_WINDOW_HOURS) {
        return Err(window_error("time range must not exceed 24 hours"));
    }
    Ok(())
}

fn validate_fetch_window(req: &FetchRequest) -> Result<(), ValidationError> {
    validate_time_window(req.start_time, req.end_time)
}

fn validate_composite_window(req: &FetchCompositeRequest) -> Result<(), ValidationError> {
    validate_time_window(req.start_time, req.end_time)
}

fn validate_range_window(req: &AnimationFromRange) -> Result<(), ValidationError> {
    validate_time_window(req.start_time, req.end_time)
}

fn choice_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

fn validate_format(format: &str) -> Result<(), ValidationError> {
    match format {
        "mp4" | "gif" => Ok(()),
        _ => Err(choice_error("format", "format must be mp4 or gif")),
    }
}

fn validate_quality(quality: &str) -> Result<(), ValidationError> {
    match quality {
        "low" | "medium" | "high" => Ok(()),
        _ => Err(choice_error("quality", "quality must be low, medium or high")),
    }
}

fn validate_resolution(resolution: &str) -> Result<(), ValidationError> {
    match resolution {
        "full" | "preview" => Ok(()),
        _ => Err(choice_error("resolution", "resolution must be full or preview")),
    }
}

fn validate_loop_style(style: &str) -> Result<(), ValidationError> {
    match style {
        "forward" | "pingpong" | "hold" => Ok(()),
        _ => Err(choice_error(
            "loop_style",
            "loop_style must be forward, pingpong or hold",
        )),
    }
}

/// Scale strings are percentages between 25% and 200%.
fn validate_scale(scale: &str) -> Result<(), ValidationError> {
    let pct: Option<u32> = scale.strip_suffix('%').and_then(|v| v.parse().ok());
    match pct {
        Some(p) if (25..=200).contains(&p) => Ok(()),
        _ => Err(choice_error(
            "scale",
            "scale must be a percentage between 25% and 200%",
        )),
    }
}

fn default_fps() -> i32 {
    10
}
fn default_format() -> String {
    "mp4".to_string()
}
fn default_quality() -> String {
    "medium".to_string()
}
fn default_resolution() -> String {
    "full".to_string()
}
fn default_loop_style() -> String {
    "forward".to_string()
}
fn default_scale() -> String {
    "100%".to_string()
}
fn default_expected_interval() -> f64 {
    10.0
}

/// Schedule a `goes_fetch` job over a bounded time window.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize, Validate)]
#[validate(schema(function = "validate_fetch_window"))]
pub struct FetchRequest {
    pub satellite: Satellite,
    pub sector: Sector,
    pub band: Band,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize, Validate)]
pub struct BackfillRequest {
    pub satellite: Option<Satellite>,
    pub band: Option<Band>,
    #[serde(default = "BackfillRequest::default_sector")]
    pub sector: Sector,
    #[serde(default = "default_expected_interval")]
    #[validate(range(min = 0.5, max = 60.0))]
    pub expected_interval: f64,
}

impl BackfillRequest {
    fn default_sector() -> Sector {
        Sector::FullDisk
    }
}

/// Fetch every band of a composite recipe, then queue composite generation.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize, Validate)]
#[validate(schema(function = "validate_composite_window"))]
pub struct FetchCompositeRequest {
    pub satellite: Satellite,
    pub sector: Sector,
    #[validate(length(min = 1, max = 64))]
    pub recipe: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Generate one composite image from already-catalogued band frames.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize, Validate)]
pub struct CompositeCreateRequest {
    #[validate(length(min = 1, max = 64))]
    pub recipe: String,
    pub satellite: Satellite,
    pub sector: Sector,
    pub capture_time: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize, Validate)]
pub struct AnimationCreate {
    #[serde(default = "AnimationCreate::default_name")]
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    /// Explicit frame selection; when empty, the filter fields below apply.
    #[serde(default)]
    pub frame_ids: Vec<Id>,
    pub satellite: Option<Satellite>,
    pub sector: Option<Sector>,
    pub band: Option<Band>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub collection_id: Option<Id>,
    #[serde(flatten)]
    #[validate(nested)]
    pub options: AnimationOptions,
}

impl AnimationCreate {
    fn default_name() -> String {
        "Untitled Animation".to_string()
    }
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize, Validate)]
pub struct AnimationOptions {
    #[serde(default = "default_fps")]
    #[validate(range(min = 1, max = 60))]
    pub fps: i32,
    #[serde(default = "default_format")]
    #[validate(custom(function = "validate_format"))]
    pub format: String,
    #[serde(default = "default_quality")]
    #[validate(custom(function = "validate_quality"))]
    pub quality: String,
    #[serde(default = "default_resolution")]
    #[validate(custom(function = "validate_resolution"))]
    pub resolution: String,
    #[serde(default = "default_loop_style")]
    #[validate(custom(function = "validate_loop_style"))]
    pub loop_style: String,
    #[serde(default = "default_scale")]
    #[validate(custom(function = "validate_scale"))]
    pub scale: String,
    pub crop_preset_id: Option<Id>,
}

impl Default for AnimationOptions {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            format: default_format(),
            quality: default_quality(),
            resolution: default_resolution(),
            loop_style: default_loop_style(),
            scale: default_scale(),
            crop_preset_id: None,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize, Validate)]
#[validate(schema(function = "validate_range_window"))]
pub struct AnimationFromRange {
    #[serde(default = "AnimationCreate::default_name")]
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub satellite: Satellite,
    pub sector: Sector,
    pub band: Band,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(flatten)]
    #[validate(nested)]
    pub options: AnimationOptions,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize, Validate)]
pub struct AnimationRecent {
    #[serde(default = "AnimationCreate::default_name")]
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub satellite: Satellite,
    pub sector: Sector,
    pub band: Band,
    #[validate(range(min = 1, max = 168))]
    pub hours: i64,
    #[serde(flatten)]
    #[validate(nested)]
    pub options: AnimationOptions,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize, Validate)]
pub struct AnimationBatch {
    #[validate(length(min = 1, max = 20), nested)]
    pub items: Vec<AnimationFromRange>,
}

#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct ProcessFramesRequest {
    #[validate(length(min = 1))]
    pub frame_ids: Vec<Id>,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct BulkDeleteRequest {
    #[validate(length(min = 1))]
    pub ids: Vec<Id>,
}

#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct CollectionCreate {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct CollectionUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct CollectionFramesRequest {
    #[validate(length(min = 1))]
    pub frame_ids: Vec<Id>,
}

fn default_tag_color() -> String {
    "#3b82f6".to_string()
}

#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct TagCreate {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default = "default_tag_color")]
    #[validate(length(min = 4, max = 7))]
    pub color: String,
}

#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct PresetCreate {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct CropPresetCreate {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(range(min = 0))]
    pub x: i32,
    #[validate(range(min = 0))]
    pub y: i32,
    #[validate(range(min = 1))]
    pub width: i32,
    #[validate(range(min = 1))]
    pub height: i32,
}

#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct CropPresetUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(range(min = 0))]
    pub x: Option<i32>,
    #[validate(range(min = 0))]
    pub y: Option<i32>,
    #[validate(range(min = 1))]
    pub width: Option<i32>,
    #[validate(range(min = 1))]
    pub height: Option<i32>,
}

#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct AnimationPresetCreate {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(flatten)]
    #[validate(nested)]
    pub options: AnimationOptions,
}

#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct FetchPresetCreate {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub satellite: Satellite,
    pub sector: Sector,
    pub band: Band,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct FetchPresetUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub satellite: Option<Satellite>,
    pub sector: Option<Sector>,
    pub band: Option<Band>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct ScheduleCreate {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub preset_id: Id,
    #[validate(range(min = 1, max = 1440))]
    pub interval_minutes: i32,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct ScheduleUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub preset_id: Option<Id>,
    #[validate(range(min = 1, max = 1440))]
    pub interval_minutes: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct CleanupRuleCreate {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub rule_type: crate::CleanupRuleType,
    #[validate(range(exclusive_min = 0.0))]
    pub value: f64,
    #[serde(default = "CleanupRuleCreate::default_protect")]
    pub protect_collections: bool,
    #[serde(default = "CleanupRuleCreate::default_active")]
    pub is_active: bool,
}

impl CleanupRuleCreate {
    fn default_protect() -> bool {
        true
    }
    fn default_active() -> bool {
        true
    }
}

#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct CleanupRuleUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub rule_type: Option<crate::CleanupRuleType>,
    #[validate(range(exclusive_min = 0.0))]
    pub value: Option<f64>,
    pub protect_collections: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct SettingsUpdate {
    #[validate(range(min = 1, max = 1000))]
    pub max_frames_per_fetch: Option<u32>,
    #[validate(url)]
    pub webhook_url: Option<String>,
}

// ── Listing parameters ──────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameSort {
    CaptureTime,
    FileSize,
    Satellite,
    CreatedAt,
}

impl FrameSort {
    /// Whitelisted column name used verbatim in ORDER BY.
    pub fn as_column(&self) -> &'static str {
        match self {
            FrameSort::CaptureTime => "capture_time",
            FrameSort::FileSize => "file_size",
            FrameSort::Satellite => "satellite",
            FrameSort::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

fn default_page() -> u32 {
    1
}
fn default_limit() -> u32 {
    50
}
fn default_frame_sort() -> FrameSort {
    FrameSort::CaptureTime
}
fn default_sort_order() -> SortOrder {
    SortOrder::Desc
}

#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct FrameListQuery {
    #[serde(default = "default_page")]
    #[validate(range(min = 1))]
    pub page: u32,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 200))]
    pub limit: u32,
    pub satellite: Option<Satellite>,
    pub band: Option<Band>,
    pub sector: Option<Sector>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub collection_id: Option<Id>,
    pub tag: Option<String>,
    #[serde(default = "default_frame_sort")]
    pub sort: FrameSort,
    #[serde(default = "default_sort_order")]
    pub order: SortOrder,
}

impl FrameListQuery {
    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.limit)
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub pages: u32,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, page: u32, limit: u32) -> Self {
        let pages = if total == 0 {
            0
        } else {
            ((total as u64).div_ceil(limit.max(1) as u64)) as u32
        };
        Self {
            items,
            total,
            page,
            limit,
            pages,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    fn fetch_request(hours: i64, seconds: i64) -> FetchRequest {
        let start = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        FetchRequest {
            satellite: Satellite::Goes19,
            sector: Sector::Conus,
            band: "C02".parse().unwrap(),
            start_time: start,
            end_time: start + chrono::Duration::hours(hours) + chrono::Duration::seconds(seconds),
        }
    }

    #[test]
    fn fetch_window_boundaries() {
        // Exactly 24h is accepted; one second more is rejected.
        assert!(fetch_request(24, 0).validate().is_ok());
        assert!(fetch_request(24, 1).validate().is_err());
        // Inverted and empty windows are rejected.
        assert!(fetch_request(0, 0).validate().is_err());
        assert!(fetch_request(-1, 0).validate().is_err());
    }

    #[test]
    fn geocolor_band_rejected_at_deserialization() {
        let err = serde_json::from_value::<FetchRequest>(serde_json::json!({
            "satellite": "GOES-19",
            "sector": "CONUS",
            "band": "GEOCOLOR",
            "start_time": "2024-06-15T12:00:00Z",
            "end_time": "2024-06-15T12:30:00Z",
        }))
        .unwrap_err();
        assert!(err.to_string().contains("CDN"));
    }

    #[test]
    fn animation_options_validation() {
        let mut options = AnimationOptions::default();
        assert!(options.validate().is_ok());

        options.scale = "300%".to_string();
        assert!(options.validate().is_err());
        options.scale = "25%".to_string();
        assert!(options.validate().is_ok());

        options.loop_style = "bounce".to_string();
        assert!(options.validate().is_err());
    }

    #[test]
    fn paginated_page_count() {
        let page = Paginated::new(vec![1, 2, 3], 101, 1, 50);
        assert_eq!(page.pages, 3);
        let empty: Paginated<i32> = Paginated::new(vec![], 0, 1, 50);
        assert_eq!(empty.pages, 0);
    }

    #[test]
    fn frame_list_query_defaults() {
        let query: FrameListQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 50);
        assert_eq!(query.sort, FrameSort::CaptureTime);
        assert_eq!(query.order, SortOrder::Desc);
        assert!(query.validate().is_ok());
    }
}
