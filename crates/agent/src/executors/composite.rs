use crate::runtime::{Executor, JobContext, Outcome};
use chrono::{DateTime, Utc};
use image::GrayImage;
use ingest::{FetchDeps, FetchWindow};
use models::{Id, JobType, Satellite, Sector};
use std::path::PathBuf;

/// Composite generation queued per capture after a multi-band fetch is
/// bounded to this many captures.
const MAX_QUEUED_COMPOSITES: i64 = 50;

#[derive(Debug, serde::Deserialize)]
struct CompositeFetchParams {
    satellite: Satellite,
    sector: Sector,
    recipe: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

/// Fetch every band of a recipe sequentially, then queue one
/// composite-generation job per fetched capture.
pub struct CompositeFetchExecutor;

#[async_trait::async_trait]
impl Executor for CompositeFetchExecutor {
    fn job_type(&self) -> JobType {
        JobType::CompositeFetch
    }

    async fn execute(&self, ctx: &JobContext) -> anyhow::Result<Outcome> {
        let params: CompositeFetchParams = ctx.params()?;
        let recipe = media::recipe(&params.recipe)
            .ok_or_else(|| anyhow::anyhow!("unknown composite recipe {:?}", params.recipe))?;
        let bands = recipe.band_list();

        ctx.progress(0, "Starting composite fetch").await;
        ctx.log("info", &format!("Starting composite fetch: {}", recipe.name))
            .await;

        let deps = FetchDeps {
            pool: ctx.pool(),
            client: &ctx.deps.client,
            storage: &ctx.deps.storage,
        };
        let output_dir = ctx.deps.storage.goes_job_dir(ctx.job_id());

        for (index, band) in bands.iter().enumerate() {
            if ctx.cancelled() {
                return Ok(Outcome::cancelled());
            }
            let percent = ((index + 1) * 80 / bands.len()) as i32;
            ctx.progress(
                percent,
                &format!("Fetching band {band} ({}/{})", index + 1, bands.len()),
            )
            .await;

            let window = FetchWindow {
                satellite: params.satellite,
                sector: params.sector,
                band: *band,
                start: params.start_time,
                end: params.end_time,
            };
            match ingest::run_fetch(&deps, Some(ctx.job_id()), &window, &output_dir, ctx).await {
                Ok(run) => ctx.log("info", &run.report.message).await,
                Err(ingest::PipelineError::CircuitOpen) => {
                    return Ok(Outcome::failed(
                        "CircuitOpen: object store requests are failing, not attempted",
                    ))
                }
                Err(error) => {
                    // One band failing degrades the composite but the
                    // remaining bands are still worth having.
                    ctx.log("warning", &format!("Band {band} fetch failed: {error}"))
                        .await;
                }
            }
        }

        ctx.progress(90, "All bands fetched, queuing composites").await;

        let captures = catalog::frames::capture_times_for_job(
            ctx.pool(),
            ctx.job_id(),
            params.satellite,
            params.sector,
            bands[0],
            MAX_QUEUED_COMPOSITES,
        )
        .await?;

        let mut txn = ctx.pool().begin().await?;
        for capture_time in &captures {
            let comp_job_id = Id::new();
            let composite_id = Id::new();
            let params_json = serde_json::json!({
                "composite_id": composite_id,
                "recipe": recipe.name,
                "satellite": params.satellite,
                "sector": params.sector,
                "capture_time": capture_time,
            });
            catalog::jobs::create(
                &mut *txn,
                comp_job_id,
                JobType::CompositeGenerate,
                &params_json,
                "",
            )
            .await?;
            catalog::artifacts::create_composite(
                &mut *txn,
                composite_id,
                recipe.display_name,
                recipe.name,
                params.satellite,
                params.sector,
                *capture_time,
                comp_job_id,
            )
            .await?;
        }
        txn.commit().await?;

        Ok(Outcome::completed(format!(
            "Composite fetch completed, queued {} composites",
            captures.len()
        ))
        .with_output(output_dir.to_string_lossy().into_owned()))
    }
}

#[derive(Debug, serde::Deserialize)]
struct CompositeGenerateParams {
    composite_id: Id,
    recipe: String,
    satellite: Satellite,
    sector: Sector,
    capture_time: DateTime<Utc>,
}

/// Blend the nearest-in-time frame of each recipe band into an RGB PNG.
pub struct CompositeGenerateExecutor;

#[async_trait::async_trait]
impl Executor for CompositeGenerateExecutor {
    fn job_type(&self) -> JobType {
        JobType::CompositeGenerate
    }

    async fn execute(&self, ctx: &JobContext) -> anyhow::Result<Outcome> {
        let params: CompositeGenerateParams = ctx.params()?;
        ctx.progress(0, "Generating composite...").await;

        match generate(ctx, &params).await {
            Ok(output_path) => Ok(Outcome::completed("Composite generated")
                .with_output(output_path.to_string_lossy().into_owned())),
            Err(error) => {
                let message = format!("{error:#}");
                if let Err(db_error) =
                    catalog::artifacts::fail_composite(ctx.pool(), params.composite_id, &message)
                        .await
                {
                    tracing::debug!(%db_error, "could not mark composite failed");
                }
                Ok(Outcome::failed(format!("Error: {message}")))
            }
        }
    }
}

async fn generate(ctx: &JobContext, params: &CompositeGenerateParams) -> anyhow::Result<PathBuf> {
    let recipe = media::recipe(&params.recipe)
        .ok_or_else(|| anyhow::anyhow!("unknown composite recipe {:?}", params.recipe))?;

    // Nearest catalogued frame per channel; a missing band becomes a zero
    // channel downstream.
    let mut paths: Vec<Option<String>> = Vec::with_capacity(3);
    for band in recipe.band_list() {
        let frame = catalog::frames::nearest(
            ctx.pool(),
            params.satellite,
            params.sector,
            band,
            params.capture_time,
        )
        .await?;
        paths.push(frame.map(|f| f.file_path));
    }

    let output_dir = ctx.deps.storage.output().join("composites");
    tokio::fs::create_dir_all(&output_dir).await?;
    let output_path = output_dir.join(format!("{}.png", params.composite_id));

    let output_for_blend = output_path.clone();
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let bands: Vec<Option<GrayImage>> = paths
            .iter()
            .map(|path| {
                path.as_deref()
                    .and_then(|p| image::open(p).ok())
                    .map(|img| img.to_luma8())
            })
            .collect();
        let bands: [Option<GrayImage>; 3] = bands
            .try_into()
            .expect("recipes always carry three channels");

        let rgb = media::compose_rgb(bands)?;
        rgb.save(&output_for_blend)?;
        Ok(())
    })
    .await??;

    let file_size = tokio::fs::metadata(&output_path)
        .await
        .map(|m| m.len() as i64)
        .unwrap_or(0);
    catalog::artifacts::complete_composite(
        ctx.pool(),
        params.composite_id,
        &output_path.to_string_lossy(),
        file_size,
    )
    .await?;

    Ok(output_path)
}
