use crate::runtime::{Executor, JobContext, Outcome};
use crate::webhook;
use chrono::{DateTime, Utc};
use ingest::{FetchDeps, FetchWindow, PipelineError};
use models::{Band, JobStatus, JobType, NotificationType, Satellite, Sector};

#[derive(Debug, serde::Deserialize)]
struct FetchParams {
    satellite: Satellite,
    sector: Sector,
    band: Band,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

/// Map pipeline aborts into terminal job outcomes; real errors bubble so
/// the runtime records the failure.
fn abort_outcome(error: PipelineError) -> Result<Outcome, anyhow::Error> {
    match error {
        PipelineError::CircuitOpen => Ok(Outcome::failed(
            "CircuitOpen: object store requests are failing, not attempted",
        )),
        PipelineError::DiskSpace { free, required } => Ok(Outcome::failed(format!(
            "Insufficient disk space: {free} bytes free, {required} required"
        ))),
        other => Err(other.into()),
    }
}

async fn notify_fetch_outcome(ctx: &JobContext, status: JobStatus, message: &str) {
    let kind = match status {
        JobStatus::Completed | JobStatus::CompletedPartial => NotificationType::FetchComplete,
        _ => NotificationType::FetchFailed,
    };
    if let Err(error) = catalog::notifications::insert(ctx.pool(), kind, message).await {
        tracing::debug!(%error, "fetch notification insert failed");
    }
    webhook::send(ctx.pool(), message).await;
}

/// Download GOES frames for a time range and catalogue them.
pub struct GoesFetchExecutor;

#[async_trait::async_trait]
impl Executor for GoesFetchExecutor {
    fn job_type(&self) -> JobType {
        JobType::GoesFetch
    }

    async fn execute(&self, ctx: &JobContext) -> anyhow::Result<Outcome> {
        let params: FetchParams = ctx.params()?;
        ctx.progress(0, "Fetching GOES data...").await;
        ctx.log(
            "info",
            &format!(
                "GOES fetch started — {} {} {}",
                params.satellite, params.sector, params.band
            ),
        )
        .await;

        let window = FetchWindow {
            satellite: params.satellite,
            sector: params.sector,
            band: params.band,
            start: params.start_time,
            end: params.end_time,
        };
        let deps = FetchDeps {
            pool: ctx.pool(),
            client: &ctx.deps.client,
            storage: &ctx.deps.storage,
        };
        let output_dir = ctx.deps.storage.goes_job_dir(ctx.job_id());

        let run = match ingest::run_fetch(&deps, Some(ctx.job_id()), &window, &output_dir, ctx).await
        {
            Ok(run) => run,
            Err(error) => return abort_outcome(error),
        };

        if ctx.cancelled() {
            return Ok(Outcome::cancelled());
        }

        let level = if run.report.status == JobStatus::Completed {
            "info"
        } else {
            "warning"
        };
        ctx.log(level, &run.report.message).await;
        notify_fetch_outcome(ctx, run.report.status, &run.report.message).await;

        // Partial results still surface their explanation in the error
        // column so clients rendering `error` see why.
        let error = match run.report.status {
            JobStatus::Completed => None,
            _ => Some(run.report.message.clone()),
        };
        Ok(Outcome {
            status: run.report.status,
            message: run.report.message,
            error,
            output_path: Some(output_dir.to_string_lossy().into_owned()),
        })
    }
}

#[derive(Debug, serde::Deserialize)]
struct BackfillParams {
    satellite: Option<Satellite>,
    band: Option<Band>,
    sector: Option<Sector>,
    #[serde(default = "BackfillParams::default_interval")]
    expected_interval: f64,
}

impl BackfillParams {
    fn default_interval() -> f64 {
        10.0
    }
}

/// Run gap detection, then fill each gap with a forward fetch.
pub struct GoesBackfillExecutor;

#[async_trait::async_trait]
impl Executor for GoesBackfillExecutor {
    fn job_type(&self) -> JobType {
        JobType::GoesBackfill
    }

    async fn execute(&self, ctx: &JobContext) -> anyhow::Result<Outcome> {
        let params: BackfillParams = ctx.params()?;
        let satellite = params.satellite.unwrap_or(Satellite::Goes16);
        let band = params.band.unwrap_or_else(|| "C02".parse().unwrap());
        let sector = params.sector.unwrap_or(Sector::FullDisk);

        ctx.progress(0, "Detecting gaps...").await;

        let deps = FetchDeps {
            pool: ctx.pool(),
            client: &ctx.deps.client,
            storage: &ctx.deps.storage,
        };
        let run = match ingest::run_backfill(
            &deps,
            ctx.job_id(),
            satellite,
            sector,
            band,
            params.expected_interval,
            ctx,
        )
        .await
        {
            Ok(run) => run,
            Err(error) => return abort_outcome(error),
        };

        if ctx.cancelled() {
            return Ok(Outcome::cancelled());
        }

        let mut outcome = Outcome {
            status: run.report.status,
            message: run.report.message,
            error: None,
            output_path: None,
        };
        if run.gaps > 0 {
            let dir = ctx.deps.storage.backfill_job_dir(ctx.job_id());
            outcome = outcome.with_output(dir.to_string_lossy().into_owned());
        }
        Ok(outcome)
    }
}
