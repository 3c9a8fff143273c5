use crate::runtime::{Executor, JobContext, Outcome};
use models::{Id, JobType};

#[derive(Debug, serde::Deserialize)]
struct AnimationParams {
    animation_id: Id,
    frame_ids: Vec<Id>,
    #[serde(default = "AnimationParams::default_fps")]
    fps: u32,
    #[serde(default = "AnimationParams::default_format")]
    format: String,
    #[serde(default = "AnimationParams::default_quality")]
    quality: String,
    #[serde(default = "AnimationParams::default_resolution")]
    resolution: String,
    #[serde(default = "AnimationParams::default_loop_style")]
    loop_style: String,
    #[serde(default = "AnimationParams::default_scale")]
    scale: String,
    crop_preset_id: Option<Id>,
}

impl AnimationParams {
    fn default_fps() -> u32 {
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
}

/// Render selected frames into an MP4 or GIF via the external encoder.
pub struct AnimationExecutor;

#[async_trait::async_trait]
impl Executor for AnimationExecutor {
    fn job_type(&self) -> JobType {
        JobType::Animation
    }

    async fn execute(&self, ctx: &JobContext) -> anyhow::Result<Outcome> {
        let params: AnimationParams = ctx.params()?;
        ctx.progress(0, "Preparing animation...").await;

        match render(ctx, &params).await {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                let message = format!("{error:#}");
                if let Err(db_error) =
                    catalog::artifacts::fail_animation(ctx.pool(), params.animation_id, &message)
                        .await
                {
                    tracing::debug!(%db_error, "could not mark animation failed");
                }
                Ok(Outcome::failed(format!("Error: {message}")))
            }
        }
    }
}

async fn render(ctx: &JobContext, params: &AnimationParams) -> anyhow::Result<Outcome> {
    catalog::artifacts::mark_animation_processing(ctx.pool(), params.animation_id).await?;

    let frames = catalog::frames::fetch_ordered(ctx.pool(), &params.frame_ids).await?;
    anyhow::ensure!(!frames.is_empty(), "No frames found");

    let crop = match params.crop_preset_id {
        Some(preset_id) => catalog::presets::fetch_crop_preset(ctx.pool(), preset_id)
            .await?
            .map(|p| media::CropRect {
                x: p.x.max(0) as u32,
                y: p.y.max(0) as u32,
                width: p.width.max(1) as u32,
                height: p.height.max(1) as u32,
            }),
        None => None,
    };

    let options = media::RenderOptions {
        crop,
        scale: media::parse_scale(&params.scale)?,
        preview: params.resolution == "preview",
        loop_style: params.loop_style.parse()?,
        fps: params.fps,
    };
    let format: media::Format = params.format.parse()?;

    let work_dir = ctx
        .deps
        .storage
        .output()
        .join(format!("anim_{}", params.animation_id));
    let sources: Vec<std::path::PathBuf> = frames
        .iter()
        .map(|f| std::path::PathBuf::from(&f.file_path))
        .collect();

    ctx.progress(10, "Processing frames...").await;

    let render_work_dir = work_dir.clone();
    let render_options = options.clone();
    let rendered = tokio::task::spawn_blocking(move || {
        media::render_frames(&sources, &render_options, &render_work_dir)
    })
    .await??;

    // Cancellation checkpoint before the expensive encode.
    if ctx.cancelled() {
        let _ = tokio::fs::remove_dir_all(&work_dir).await;
        return Ok(Outcome::cancelled());
    }

    ctx.progress(75, "Encoding video...").await;

    let output_path = ctx
        .deps
        .storage
        .output()
        .join(format!("animation_{}.{}", params.animation_id, format.extension()));
    media::encode(&work_dir, &output_path, format, params.fps, &params.quality).await?;

    let file_size = tokio::fs::metadata(&output_path)
        .await
        .map(|m| m.len() as i64)
        .unwrap_or(0);
    let duration_seconds = if params.fps > 0 {
        rendered.output_count as f64 / params.fps as f64
    } else {
        0.0
    };

    catalog::artifacts::complete_animation(
        ctx.pool(),
        params.animation_id,
        &output_path.to_string_lossy(),
        file_size,
        rendered.source_count as i32,
        duration_seconds as i32,
    )
    .await?;

    let _ = tokio::fs::remove_dir_all(&work_dir).await;

    Ok(Outcome::completed(format!(
        "Animation complete: {} frames, {duration_seconds:.1}s",
        rendered.source_count
    ))
    .with_output(output_path.to_string_lossy().into_owned()))
}
