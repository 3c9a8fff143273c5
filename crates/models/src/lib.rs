mod entities;
mod goes;
mod id;
mod jobs;
mod requests;

pub use entities::{
    Animation, AnimationPreset, AppSettings, CleanupRule, CleanupRuleType, Collection, Composite,
    CropPreset, FetchPreset, FetchSchedule, GoesFrame, Notification, NotificationType, Preset,
    ShareLink, Tag,
};
pub use goes::{Band, ParseError, Satellite, Sector};
pub use id::Id;
pub use jobs::{Job, JobLog, JobStatus, JobType, ProgressEvent};
pub use requests::{
    AnimationBatch, AnimationCreate, AnimationFromRange, AnimationOptions, AnimationPresetCreate,
    AnimationRecent, BackfillRequest, BulkDeleteRequest, CleanupRuleCreate, CleanupRuleUpdate,
    CollectionCreate, CollectionFramesRequest, CollectionUpdate, CompositeCreateRequest,
    CropPresetCreate, CropPresetUpdate, FetchCompositeRequest, FetchPresetCreate, FetchPresetUpdate,
    FetchRequest, FrameListQuery, FrameSort, Paginated, PresetCreate, ProcessFramesRequest,
    ScheduleCreate, ScheduleUpdate, SettingsUpdate, SortOrder, TagCreate, MAX_FETCH_WINDOW_HOURS,
};
