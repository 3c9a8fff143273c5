use crate::runtime::{Executor, JobContext, Outcome};
use models::JobType;

/// Periodic retention run over the active cleanup rules.
pub struct CleanupExecutor;

#[async_trait::async_trait]
impl Executor for CleanupExecutor {
    fn job_type(&self) -> JobType {
        JobType::Cleanup
    }

    async fn execute(&self, ctx: &JobContext) -> anyhow::Result<Outcome> {
        ctx.progress(0, "Running retention rules...").await;
        let outcome = catalog::cleanup::run(ctx.pool()).await?;
        Ok(Outcome::completed(format!(
            "Cleaned up {} frames, freed {} bytes",
            outcome.deleted_frames, outcome.freed_bytes
        )))
    }
}
