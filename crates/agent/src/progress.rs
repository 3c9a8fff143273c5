use events::EventBus;
use models::{Id, JobStatus, ProgressEvent};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Durable progress-only writes are skipped while the delta to the last
/// saved value stays under this and progress is below 100.
pub const THROTTLE_DELTA: i32 = 5;

/// Decide whether a progress-only update is written durably, updating the
/// per-job throttle state when it is.
fn should_write(last_saved: &mut HashMap<Id, i32>, job_id: Id, progress: i32) -> bool {
    let last = last_saved.get(&job_id).copied().unwrap_or(0);
    if progress < 100 && progress - last < THROTTLE_DELTA {
        return false;
    }
    last_saved.insert(job_id, progress);
    true
}

/// Reports job progress on both channels: throttled durable writes to the
/// job row, and ephemeral pub/sub messages on `job:{id}`. Terminal updates
/// are never throttled and clear the throttle state.
#[derive(Clone)]
pub struct ProgressReporter {
    pool: sqlx::PgPool,
    bus: EventBus,
    last_saved: Arc<Mutex<HashMap<Id, i32>>>,
}

impl ProgressReporter {
    pub fn new(pool: sqlx::PgPool, bus: EventBus) -> Self {
        Self {
            pool,
            bus,
            last_saved: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn progress(&self, job_id: Id, progress: i32, message: &str) {
        // Ephemeral publish happens for every update; ordering matches the
        // durable write order because one worker drives one job.
        self.bus
            .publish_progress(&ProgressEvent {
                job_id,
                progress,
                message: message.to_string(),
                status: JobStatus::Processing,
            })
            .await;

        let write = {
            let mut last_saved = self.last_saved.lock().unwrap();
            should_write(&mut last_saved, job_id, progress)
        };
        if !write {
            return;
        }
        if let Err(error) = catalog::jobs::update_progress(&self.pool, job_id, progress, message).await
        {
            tracing::debug!(%job_id, %error, "durable progress write failed");
        }
    }

    /// Terminal transition: always written, clears throttle state, and fans
    /// out the terminal event (including the global topic).
    pub async fn finish(
        &self,
        job_id: Id,
        status: JobStatus,
        message: &str,
        error: Option<&str>,
        output_path: Option<&str>,
    ) {
        let progress = match status {
            JobStatus::Completed | JobStatus::CompletedPartial => 100,
            _ => 0,
        };
        self.last_saved.lock().unwrap().remove(&job_id);

        if let Err(err) =
            catalog::jobs::finish(&self.pool, job_id, status, progress, message, error, output_path)
                .await
        {
            tracing::error!(%job_id, %err, "terminal job update failed");
        }

        self.bus
            .publish_progress(&ProgressEvent {
                job_id,
                progress,
                message: message.to_string(),
                status,
            })
            .await;
    }

    /// Append a job-log line durably and broadcast it to live listeners.
    pub async fn log(&self, job_id: Id, level: &str, message: &str) {
        if let Err(error) = catalog::jobs::append_log(&self.pool, job_id, level, message).await {
            tracing::debug!(%job_id, %error, "job log write failed");
        }
        self.bus.publish_log(job_id, level, message).await;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn small_deltas_are_throttled() {
        let mut state = HashMap::new();
        let job = Id::new();

        assert!(should_write(&mut state, job, 5));
        assert!(!should_write(&mut state, job, 6));
        assert!(!should_write(&mut state, job, 9));
        assert!(should_write(&mut state, job, 10));
        assert!(!should_write(&mut state, job, 14));
    }

    #[test]
    fn hundred_percent_is_never_throttled() {
        let mut state = HashMap::new();
        let job = Id::new();
        assert!(should_write(&mut state, job, 98));
        assert!(should_write(&mut state, job, 100));
    }

    #[test]
    fn first_update_below_threshold_is_skipped() {
        // With no saved state the baseline is zero.
        let mut state = HashMap::new();
        let job = Id::new();
        assert!(!should_write(&mut state, job, 4));
        assert!(should_write(&mut state, job, 5));
    }

    #[test]
    fn throttle_state_is_per_job() {
        let mut state = HashMap::new();
        let a = Id::new();
        let b = Id::new();
        assert!(should_write(&mut state, a, 50));
        assert!(should_write(&mut state, b, 52));
        assert!(!should_write(&mut state, a, 52));
    }
}
