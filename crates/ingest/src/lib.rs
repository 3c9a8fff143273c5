pub mod convert;
pub mod goes;
pub mod pipeline;
pub mod storage;
pub mod thumbs;

pub use pipeline::{
    build_report, fetch_preview, list_available, persist_frames, run_backfill, run_fetch,
    FetchCounts, FetchDeps, FetchObserver, FetchReport, FetchRun, FetchWindow, NoopObserver,
    PipelineError, MIN_FREE_DISK_BYTES,
};
pub use storage::{PathError, StorageLayout};
