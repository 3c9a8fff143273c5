use crate::runtime::{Executor, JobContext, Outcome};
use models::JobType;
use std::path::{Path, PathBuf};

#[derive(Debug, serde::Deserialize)]
struct ProcessParams {
    #[serde(default)]
    image_paths: Vec<String>,
    #[serde(default)]
    input_path: String,
    #[serde(default)]
    crop: Option<CropParams>,
    #[serde(default = "ProcessParams::default_scale")]
    scale: String,
}

#[derive(Debug, serde::Deserialize)]
struct CropParams {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl ProcessParams {
    fn default_scale() -> String {
        "100%".to_string()
    }
}

/// Batch still-image processing over catalogued frames: stage inputs, apply
/// optional crop/scale, write PNG outputs into the job directory.
pub struct ImageProcessExecutor;

#[async_trait::async_trait]
impl Executor for ImageProcessExecutor {
    fn job_type(&self) -> JobType {
        JobType::ImageProcess
    }

    async fn execute(&self, ctx: &JobContext) -> anyhow::Result<Outcome> {
        let params: ProcessParams = ctx.params()?;
        ctx.progress(0, "Initializing processor...").await;
        ctx.log("info", "Image processing started").await;

        let staging = if params.input_path.is_empty() {
            ctx.deps
                .storage
                .output()
                .join(format!("job_staging_{}", ctx.job_id()))
        } else {
            PathBuf::from(&params.input_path)
        };
        stage_inputs(&staging, &params.image_paths).await?;

        let output_dir = ctx.deps.storage.job_dir(ctx.job_id());
        tokio::fs::create_dir_all(&output_dir).await?;

        let crop = params.crop.map(|c| media::CropRect {
            x: c.x,
            y: c.y,
            width: c.width,
            height: c.height,
        });
        let scale = media::parse_scale(&params.scale)?;

        let mut inputs: Vec<PathBuf> = Vec::new();
        let mut entries = tokio::fs::read_dir(&staging).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"));
            if is_image {
                inputs.push(path);
            }
        }
        inputs.sort();

        let total = inputs.len();
        let mut processed = 0usize;
        for (index, input) in inputs.into_iter().enumerate() {
            if ctx.cancelled() {
                cleanup_staging(&staging).await;
                return Ok(Outcome::cancelled());
            }

            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("frame{index}"));
            let dest = output_dir.join(format!("{stem}.png"));

            let result = tokio::task::spawn_blocking({
                let input = input.clone();
                move || media::process_still(&input, &dest, crop, scale)
            })
            .await?;
            match result {
                Ok(()) => processed += 1,
                Err(error) => {
                    ctx.log("warning", &format!("Skipped {input:?}: {error}")).await;
                }
            }

            let percent = ((index + 1) * 100 / total.max(1)) as i32;
            ctx.progress(percent, &format!("Processing: {percent}%")).await;
        }

        cleanup_staging(&staging).await;

        if processed == 0 {
            ctx.log("error", "Processing failed").await;
            return Ok(Outcome::failed("Processing failed"));
        }
        ctx.log("info", "Processing complete").await;
        Ok(Outcome::completed("Processing complete")
            .with_output(output_dir.to_string_lossy().into_owned()))
    }
}

/// Stage resolved image paths into the working directory; symlink where
/// possible, copy otherwise.
async fn stage_inputs(staging: &Path, image_paths: &[String]) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(staging).await?;
    for source in image_paths {
        let source = PathBuf::from(source);
        if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
            continue;
        }
        let Some(name) = source.file_name() else {
            continue;
        };
        let dest = staging.join(name);
        if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            continue;
        }
        if tokio::fs::symlink(&source, &dest).await.is_err() {
            tokio::fs::copy(&source, &dest).await?;
        }
    }
    Ok(())
}

async fn cleanup_staging(staging: &Path) {
    if staging
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("job_staging_"))
    {
        let _ = tokio::fs::remove_dir_all(staging).await;
    }
}
