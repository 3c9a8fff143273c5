//! The fetch pipeline: enumerate → cap → stream-download → convert →
//! persist → report.

use crate::{convert, goes, storage::StorageLayout, thumbs};
use chrono::{DateTime, Utc};
use models::{Band, Id, JobStatus, Satellite, Sector};
use object_client::ObjectClient;
use std::path::{Path, PathBuf};

/// Ingestion aborts when the storage volume has less free space than this.
pub const MIN_FREE_DISK_BYTES: u64 = 1 << 30;

#[derive(Debug, Clone, Copy)]
pub struct FetchWindow {
    pub satellite: Satellite,
    pub sector: Sector,
    pub band: Band,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("object store circuit breaker is open")]
    CircuitOpen,
    #[error("insufficient disk space: {free} bytes free, {required} required")]
    DiskSpace { free: u64, required: u64 },
    #[error("database error")]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Progress/log sink plus the cooperative cancellation checkpoint, observed
/// between frames.
#[async_trait::async_trait]
pub trait FetchObserver: Send + Sync {
    async fn progress(&self, percent: i32, message: &str);
    async fn log(&self, level: &str, message: &str);
    fn cancelled(&self) -> bool;
}

/// Observer for contexts with nothing to report to (previews, tests).
pub struct NoopObserver;

#[async_trait::async_trait]
impl FetchObserver for NoopObserver {
    async fn progress(&self, _percent: i32, _message: &str) {}
    async fn log(&self, _level: &str, _message: &str) {}
    fn cancelled(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListedObject {
    pub key: String,
    pub scan_time: DateTime<Utc>,
    pub size: i64,
}

/// Enumerate matching objects for the window, ascending by scan time.
///
/// Individual hour listings that fail transiently are logged and treated as
/// empty; an open circuit aborts the whole enumeration immediately.
pub async fn list_available(
    client: &ObjectClient,
    window: &FetchWindow,
) -> Result<Vec<ListedObject>, PipelineError> {
    let bucket = goes::bucket(window.satellite);
    let mut results = Vec::new();

    for prefix in goes::hour_prefixes(window.sector, window.start, window.end) {
        tracing::info!(%bucket, %prefix, "searching object store");
        let objects = match client.list(bucket, &prefix).await {
            Ok(objects) => objects,
            Err(object_client::Error::CircuitOpen(_)) => return Err(PipelineError::CircuitOpen),
            Err(error) => {
                tracing::warn!(%bucket, %prefix, %error, "listing failed, skipping hour");
                continue;
            }
        };
        for object in objects {
            if !goes::matches_sector_and_band(&object.key, window.sector, window.band) {
                continue;
            }
            let Some(scan_time) = goes::parse_scan_time(&object.key) else {
                continue;
            };
            if scan_time >= window.start && scan_time <= window.end {
                results.push(ListedObject {
                    key: object.key,
                    scan_time,
                    size: object.size,
                });
            }
        }
    }

    results.sort_by_key(|o| o.scan_time);
    Ok(results)
}

#[derive(Debug)]
pub struct FetchedFrame {
    pub path: PathBuf,
    pub scan_time: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct FetchCounts {
    pub fetched: usize,
    pub total_available: usize,
    pub capped: bool,
    pub failed_downloads: usize,
    pub frame_limit: usize,
}

/// Download and convert every retained object. One bad frame increments
/// `failed_downloads` and never aborts the run; disk exhaustion and an open
/// circuit do.
async fn download_frames(
    client: &ObjectClient,
    storage: &StorageLayout,
    window: &FetchWindow,
    available: &[ListedObject],
    output_dir: &Path,
    observer: &dyn FetchObserver,
) -> Result<(Vec<FetchedFrame>, usize), PipelineError> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| PipelineError::Other(e.into()))?;

    let bucket = goes::bucket(window.satellite);
    let mut frames = Vec::new();
    let mut failed_downloads = 0usize;

    for (index, object) in available.iter().enumerate() {
        if observer.cancelled() {
            tracing::info!("cancellation observed between frames");
            break;
        }

        let free = storage.free_space().unwrap_or(u64::MAX);
        if free < MIN_FREE_DISK_BYTES {
            return Err(PipelineError::DiskSpace {
                free,
                required: MIN_FREE_DISK_BYTES,
            });
        }

        match download_one(client, storage, window, bucket, object, output_dir).await {
            Ok(frame) => frames.push(frame),
            Err(PipelineError::CircuitOpen) => return Err(PipelineError::CircuitOpen),
            Err(error) => {
                failed_downloads += 1;
                tracing::warn!(key = %object.key, %error, "frame download failed");
                observer
                    .log("warning", &format!("Failed to fetch {}", object.key))
                    .await;
            }
        }

        let current = index + 1;
        let percent = (current * 100 / available.len()) as i32;
        let message = format!("Downloading frame {current}/{}", available.len());
        observer.progress(percent, &message).await;
    }

    Ok((frames, failed_downloads))
}

async fn download_one(
    client: &ObjectClient,
    storage: &StorageLayout,
    window: &FetchWindow,
    bucket: &str,
    object: &ListedObject,
    output_dir: &Path,
) -> Result<FetchedFrame, PipelineError> {
    // Stream to a unique temp file; FullDisk payloads can exceed 100 MB and
    // must never be buffered in memory.
    let temp = tempfile::Builder::new()
        .prefix("goes_")
        .suffix(".nc")
        .tempfile_in(storage.temp())
        .map_err(|e| PipelineError::Other(e.into()))?;

    match client.get_to_file(bucket, &object.key, temp.path()).await {
        Ok(_) => {}
        Err(object_client::Error::CircuitOpen(_)) => return Err(PipelineError::CircuitOpen),
        Err(error) => return Err(PipelineError::Other(error.into())),
    }

    let png_name = format!(
        "{}_{}_{}_{}.png",
        window.satellite,
        window.sector,
        window.band,
        object.scan_time.format("%Y%m%dT%H%M%S"),
    );
    let png_path = output_dir.join(png_name);

    // Image conversion is the memory peak of the whole pipeline; run it off
    // the async executor.
    let nc_path = temp.path().to_path_buf();
    let png_for_convert = png_path.clone();
    tokio::task::spawn_blocking(move || convert::netcdf_to_png(&nc_path, &png_for_convert))
        .await
        .map_err(|e| PipelineError::Other(e.into()))?
        .map_err(|e| PipelineError::Other(e.into()))?;

    Ok(FetchedFrame {
        path: png_path,
        scan_time: object.scan_time,
    })
}

/// Commit a batch of converted frames: GoesFrame rows (upserted on the
/// logical key), legacy image rows, thumbnails, and membership in the
/// per-fetch auto-collection, all in one transaction.
pub async fn persist_frames(
    pool: &sqlx::PgPool,
    storage: &StorageLayout,
    window: &FetchWindow,
    frames: &[FetchedFrame],
    source_job_id: Option<Id>,
    auto_collection: bool,
) -> Result<Vec<Id>, PipelineError> {
    if frames.is_empty() {
        return Ok(Vec::new());
    }

    // Thumbnails and dimension probing are image work; keep them off the
    // executor and outside the transaction.
    let thumbnails_dir = storage.thumbnails();
    let probe_inputs: Vec<PathBuf> = frames.iter().map(|f| f.path.clone()).collect();
    let probed: Vec<(i64, Option<(u32, u32)>, Option<PathBuf>)> =
        tokio::task::spawn_blocking(move || {
            probe_inputs
                .iter()
                .map(|path| {
                    let size = std::fs::metadata(path).map(|m| m.len() as i64).unwrap_or(0);
                    let dims = thumbs::image_dimensions(path);
                    let thumb = thumbs::generate_thumbnail(path, &thumbnails_dir);
                    (size, dims, thumb)
                })
                .collect()
        })
        .await
        .map_err(|e| PipelineError::Other(e.into()))?;

    let mut txn = pool.begin().await?;
    let mut frame_ids = Vec::with_capacity(frames.len());

    for (frame, (file_size, dims, thumb)) in frames.iter().zip(probed) {
        let new_frame = catalog::frames::NewFrame {
            satellite: window.satellite,
            sector: window.sector,
            band: window.band,
            capture_time: frame.scan_time,
            file_path: frame.path.to_string_lossy().into_owned(),
            file_size,
            width: dims.map(|d| d.0 as i32),
            height: dims.map(|d| d.1 as i32),
            thumbnail_path: thumb.map(|p| p.to_string_lossy().into_owned()),
            source_job_id,
        };
        let row = catalog::frames::upsert(&mut *txn, &new_frame).await?;
        catalog::frames::insert_legacy_image(&mut *txn, &row).await?;
        frame_ids.push(row.id);
    }

    if auto_collection {
        let name = format!(
            "GOES Fetch {} {} {}",
            window.satellite, window.band, window.sector
        );
        let description = match source_job_id {
            Some(job_id) => format!("Auto-created from fetch job {job_id}"),
            None => "Auto-created from fetch".to_string(),
        };
        let collection_id = catalog::collections::find_or_create(&mut txn, &name, &description).await?;
        catalog::collections::add_frames(&mut *txn, collection_id, &frame_ids).await?;
    }

    txn.commit().await?;
    Ok(frame_ids)
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchReport {
    pub status: JobStatus,
    pub message: String,
}

/// Derive the final status and human-readable message from the run's four
/// counters.
pub fn build_report(window: &FetchWindow, counts: &FetchCounts) -> FetchReport {
    if counts.fetched == 0 {
        if counts.total_available > 0 {
            return FetchReport {
                status: JobStatus::Failed,
                message: format!(
                    "All {} frames failed to download",
                    counts.total_available
                ),
            };
        }

        let avail = goes::availability(window.satellite);
        let hint = match avail.available_to {
            Some(to) => format!(
                " {} data is only available from {} through {}.",
                window.satellite, avail.available_from, to
            ),
            None => String::new(),
        };
        return FetchReport {
            status: JobStatus::Failed,
            message: format!(
                "No frames found on S3 for {} {} {} between {} and {}.{hint}",
                window.satellite,
                window.sector,
                window.band,
                window.start.format("%Y-%m-%d %H:%M"),
                window.end.format("%Y-%m-%d %H:%M"),
            ),
        };
    }

    if counts.failed_downloads == 0 && !counts.capped {
        return FetchReport {
            status: JobStatus::Completed,
            message: format!("Fetched {} frames", counts.fetched),
        };
    }

    if counts.failed_downloads == 0 && counts.capped {
        let beyond = counts.total_available - counts.frame_limit;
        return FetchReport {
            status: JobStatus::CompletedPartial,
            message: format!(
                "Fetched {} of {} available frames (frame limit: {}, {beyond} beyond limit). \
                 Adjust limit in settings or narrow time range.",
                counts.fetched, counts.total_available, counts.frame_limit,
            ),
        };
    }

    let mut parts = Vec::new();
    if counts.failed_downloads > 0 {
        parts.push(format!("{} failed to download", counts.failed_downloads));
    }
    if counts.capped {
        let beyond = counts.total_available - counts.frame_limit;
        parts.push(format!(
            "{beyond} beyond frame limit of {}",
            counts.frame_limit
        ));
    }
    FetchReport {
        status: JobStatus::CompletedPartial,
        message: format!("Fetched {} frames ({})", counts.fetched, parts.join(", ")),
    }
}

#[derive(Debug)]
pub struct FetchRun {
    pub report: FetchReport,
    pub frame_ids: Vec<Id>,
    pub counts: FetchCounts,
    pub output_dir: PathBuf,
}

pub struct FetchDeps<'a> {
    pub pool: &'a sqlx::PgPool,
    pub client: &'a ObjectClient,
    pub storage: &'a StorageLayout,
}

/// The full forward pipeline for one window. The frame cap is read from
/// settings per run and clamped to 1..=1000.
pub async fn run_fetch(
    deps: &FetchDeps<'_>,
    source_job_id: Option<Id>,
    window: &FetchWindow,
    output_dir: &Path,
    observer: &dyn FetchObserver,
) -> Result<FetchRun, PipelineError> {
    let available = list_available(deps.client, window).await?;
    observer
        .log(
            "info",
            &format!("Found {} available frames on S3", available.len()),
        )
        .await;
    tracing::info!(
        total = available.len(),
        satellite = %window.satellite,
        sector = %window.sector,
        band = %window.band,
        "enumerated available frames"
    );

    let frame_limit = catalog::settings::load(deps.pool).await.clamped_max_frames() as usize;
    let total_available = available.len();
    let capped = total_available > frame_limit;
    let retained = &available[..total_available.min(frame_limit)];

    let (frames, failed_downloads) = download_frames(
        deps.client,
        deps.storage,
        window,
        retained,
        output_dir,
        observer,
    )
    .await?;

    let frame_ids = persist_frames(
        deps.pool,
        deps.storage,
        window,
        &frames,
        source_job_id,
        true,
    )
    .await?;

    let counts = FetchCounts {
        fetched: frames.len(),
        total_available,
        capped,
        failed_downloads,
        frame_limit,
    };
    let report = build_report(window, &counts);

    Ok(FetchRun {
        report,
        frame_ids,
        counts,
        output_dir: output_dir.to_path_buf(),
    })
}

#[derive(Debug)]
pub struct BackfillRun {
    pub report: FetchReport,
    pub gaps: usize,
    pub fetched: usize,
}

/// Detect coverage gaps and run the forward pipeline over each one.
/// Failures in one gap never abort the others.
pub async fn run_backfill(
    deps: &FetchDeps<'_>,
    job_id: Id,
    satellite: Satellite,
    sector: Sector,
    band: Band,
    expected_interval: f64,
    observer: &dyn FetchObserver,
) -> Result<BackfillRun, PipelineError> {
    let stats = catalog::gaps::detect(
        deps.pool,
        Some(satellite),
        Some(band),
        Some(sector),
        expected_interval,
        catalog::gaps::DEFAULT_TOLERANCE,
    )
    .await?;

    if stats.gaps.is_empty() {
        return Ok(BackfillRun {
            report: FetchReport {
                status: JobStatus::Completed,
                message: "No gaps found".to_string(),
            },
            gaps: 0,
            fetched: 0,
        });
    }

    observer
        .progress(10, &format!("Found {} gaps, fetching...", stats.gaps.len()))
        .await;

    let output_dir = deps.storage.backfill_job_dir(job_id);
    let mut fetched = 0usize;

    for (index, gap) in stats.gaps.iter().enumerate() {
        if observer.cancelled() {
            break;
        }
        let window = FetchWindow {
            satellite,
            sector,
            band,
            start: gap.start,
            end: gap.end,
        };
        match run_gap(deps, &window, &output_dir).await {
            Ok(count) => fetched += count,
            Err(PipelineError::CircuitOpen) => return Err(PipelineError::CircuitOpen),
            Err(error) => {
                tracing::warn!(gap = index + 1, %error, "backfill gap failed");
                observer
                    .log("warning", &format!("Gap {} failed: {error}", index + 1))
                    .await;
            }
        }

        let percent = 10 + ((index + 1) * 90 / stats.gaps.len()) as i32;
        observer
            .progress(
                percent,
                &format!("Filled gap {}/{}", index + 1, stats.gaps.len()),
            )
            .await;
    }

    Ok(BackfillRun {
        report: FetchReport {
            status: JobStatus::Completed,
            message: format!(
                "Backfilled {fetched} frames across {} gaps",
                stats.gaps.len()
            ),
        },
        gaps: stats.gaps.len(),
        fetched,
    })
}

async fn run_gap(
    deps: &FetchDeps<'_>,
    window: &FetchWindow,
    output_dir: &Path,
) -> Result<usize, PipelineError> {
    let available = list_available(deps.client, window).await?;
    let (frames, failed) = download_frames(
        deps.client,
        deps.storage,
        window,
        &available,
        output_dir,
        &NoopObserver,
    )
    .await?;
    if failed > 0 {
        tracing::warn!(failed, "some frames in gap failed to download");
    }
    // Backfilled frames are catalogued without the auto-collection.
    let ids = persist_frames(deps.pool, deps.storage, window, &frames, None, false).await?;
    Ok(ids.len())
}

/// Fetch the single frame nearest to `time` and return its PNG bytes,
/// without touching the catalog.
pub async fn fetch_preview(
    client: &ObjectClient,
    storage: &StorageLayout,
    satellite: Satellite,
    sector: Sector,
    band: Band,
    time: DateTime<Utc>,
) -> Result<Option<Vec<u8>>, PipelineError> {
    let slack = chrono::Duration::minutes(i64::from(sector.cadence_minutes()) * 2);
    let window = FetchWindow {
        satellite,
        sector,
        band,
        start: time - slack,
        end: time + slack,
    };

    let available = list_available(client, &window).await?;
    let Some(closest) = available
        .into_iter()
        .min_by_key(|o| (o.scan_time - time).num_seconds().abs())
    else {
        return Ok(None);
    };

    let temp_dir = tempfile::tempdir_in(storage.temp()).map_err(|e| PipelineError::Other(e.into()))?;
    let frame = download_one(
        client,
        storage,
        &window,
        goes::bucket(satellite),
        &closest,
        temp_dir.path(),
    )
    .await?;

    let bytes = tokio::fs::read(&frame.path)
        .await
        .map_err(|e| PipelineError::Other(e.into()))?;
    Ok(Some(bytes))
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    fn window(satellite: Satellite) -> FetchWindow {
        FetchWindow {
            satellite,
            sector: Sector::Conus,
            band: "C02".parse().unwrap(),
            start: Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 0).unwrap(),
        }
    }

    fn counts(
        fetched: usize,
        total_available: usize,
        capped: bool,
        failed_downloads: usize,
        frame_limit: usize,
    ) -> FetchCounts {
        FetchCounts {
            fetched,
            total_available,
            capped,
            failed_downloads,
            frame_limit,
        }
    }

    #[test]
    fn clean_fetch_is_completed() {
        let report = build_report(&window(Satellite::Goes19), &counts(5, 5, false, 0, 200));
        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.message, "Fetched 5 frames");
    }

    #[test]
    fn capped_fetch_is_partial_and_explains_the_limit() {
        let report = build_report(&window(Satellite::Goes19), &counts(200, 300, true, 0, 200));
        assert_eq!(report.status, JobStatus::CompletedPartial);
        assert!(report.message.contains("frame limit: 200"));
        assert!(report.message.contains("100 beyond limit"));
    }

    #[test]
    fn mixed_failures_and_cap_are_both_reported() {
        let report = build_report(&window(Satellite::Goes19), &counts(190, 300, true, 10, 200));
        assert_eq!(report.status, JobStatus::CompletedPartial);
        assert!(report.message.contains("10 failed to download"));
        assert!(report.message.contains("100 beyond frame limit of 200"));
    }

    #[test]
    fn all_failed_is_a_failure() {
        let report = build_report(&window(Satellite::Goes19), &counts(0, 7, false, 7, 200));
        assert_eq!(report.status, JobStatus::Failed);
        assert_eq!(report.message, "All 7 frames failed to download");
    }

    #[test]
    fn empty_listing_mentions_availability_for_historical_satellites() {
        let report = build_report(&window(Satellite::Goes16), &counts(0, 0, false, 0, 200));
        assert_eq!(report.status, JobStatus::Failed);
        assert!(report.message.starts_with("No frames found on S3"));
        assert!(report.message.contains("2025-04-07"));

        // Active satellites carry no availability hint.
        let report = build_report(&window(Satellite::Goes19), &counts(0, 0, false, 0, 200));
        assert!(!report.message.contains("only available"));
    }

    #[test]
    fn failures_with_zero_fetched_beat_the_cap_message() {
        let report = build_report(&window(Satellite::Goes19), &counts(0, 300, true, 200, 200));
        assert_eq!(report.status, JobStatus::Failed);
        assert_eq!(report.message, "All 300 frames failed to download");
    }
}
