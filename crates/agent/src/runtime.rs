use crate::progress::ProgressReporter;
use events::EventBus;
use ingest::StorageLayout;
use models::{Id, Job, JobStatus, JobType};
use object_client::ObjectClient;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Cooperative cancellation fires at the soft limit; the hard limit aborts.
pub const SOFT_TIME_LIMIT: Duration = Duration::from_secs(30 * 60);
pub const HARD_TIME_LIMIT: Duration = Duration::from_secs(60 * 60);

/// The worker recycles itself once resident memory crosses this bound.
pub const MEMORY_LIMIT_BYTES: u64 = 512 * 1024 * 1024;

const DEQUEUE_INTERVAL: Duration = Duration::from_secs(2);

/// Shared dependencies handed to every executor.
pub struct Deps {
    pub pool: sqlx::PgPool,
    pub bus: EventBus,
    pub client: ObjectClient,
    pub storage: StorageLayout,
    pub reporter: ProgressReporter,
}

/// Per-execution context: the claimed job plus its cancellation token.
pub struct JobContext {
    pub deps: Arc<Deps>,
    pub job: Job,
    pub cancel: CancellationToken,
}

impl JobContext {
    pub fn job_id(&self) -> Id {
        self.job.id
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.deps.pool
    }

    pub async fn progress(&self, percent: i32, message: &str) {
        self.deps
            .reporter
            .progress(self.job.id, percent, message)
            .await;
    }

    pub async fn log(&self, level: &str, message: &str) {
        self.deps.reporter.log(self.job.id, level, message).await;
    }

    pub fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn params<T: serde::de::DeserializeOwned>(&self) -> anyhow::Result<T> {
        serde_json::from_value(self.job.params.clone())
            .map_err(|err| anyhow::anyhow!("invalid job params: {err}"))
    }
}

#[async_trait::async_trait]
impl ingest::FetchObserver for JobContext {
    async fn progress(&self, percent: i32, message: &str) {
        JobContext::progress(self, percent, message).await;
    }

    async fn log(&self, level: &str, message: &str) {
        JobContext::log(self, level, message).await;
    }

    fn cancelled(&self) -> bool {
        JobContext::cancelled(self)
    }
}

/// What an executor resolved to. `error` lands in the job row's error
/// column; `output_path` replaces the row's output path when set.
#[derive(Debug)]
pub struct Outcome {
    pub status: JobStatus,
    pub message: String,
    pub error: Option<String>,
    pub output_path: Option<String>,
}

impl Outcome {
    pub fn completed(message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Completed,
            message: message.into(),
            error: None,
            output_path: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status: JobStatus::Failed,
            error: Some(message.clone()),
            message,
            output_path: None,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            status: JobStatus::Cancelled,
            message: "Cancelled by request".to_string(),
            error: None,
            output_path: None,
        }
    }

    pub fn with_output(mut self, output_path: impl Into<String>) -> Self {
        self.output_path = Some(output_path.into());
        self
    }
}

/// Executor is the trait implemented by the task-specific job bodies the
/// runtime serves.
#[async_trait::async_trait]
pub trait Executor: Send + Sync + 'static {
    fn job_type(&self) -> JobType;

    async fn execute(&self, ctx: &JobContext) -> anyhow::Result<Outcome>;
}

/// Runtime holds registered Executors and serves them over the jobs queue.
pub struct Runtime {
    deps: Arc<Deps>,
    executors: BTreeMap<&'static str, Arc<dyn Executor>>,
    concurrency: usize,
    tokens: Arc<Mutex<HashMap<uuid::Uuid, CancellationToken>>>,
}

impl Runtime {
    pub fn new(deps: Arc<Deps>, concurrency: usize) -> Self {
        Self {
            deps,
            executors: BTreeMap::new(),
            concurrency: concurrency.max(1),
            tokens: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register an Executor to be served by this Runtime.
    pub fn register<E: Executor>(mut self, executor: E) -> Self {
        let key = executor.job_type().as_str();
        if self.executors.insert(key, Arc::new(executor)).is_some() {
            panic!("an Executor for {key:?} is already registered");
        }
        self
    }

    /// Serve jobs until signaled to stop, then drain in-flight work. Returns
    /// Err when the worker recycled itself over the memory bound so the
    /// supervisor restarts the process.
    pub async fn serve(self, shutdown: impl std::future::Future<Output = ()>) -> anyhow::Result<()> {
        let job_types: Vec<JobType> = self
            .executors
            .values()
            .map(|e| e.job_type())
            .collect();
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.concurrency));
        let memory_exceeded = Arc::new(AtomicBool::new(false));

        let control = tokio::spawn(control_listener(self.deps.bus.clone(), self.tokens.clone()));
        tokio::pin!(shutdown);

        loop {
            if memory_exceeded.load(Ordering::Relaxed) {
                tracing::warn!(
                    limit = MEMORY_LIMIT_BYTES,
                    "memory bound exceeded, recycling worker"
                );
                break;
            }

            // Hold a permit before claiming, so each worker slot prefetches
            // at most one task.
            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => permit.expect("semaphore never closes"),
                () = &mut shutdown => break,
            };

            let task_id = uuid::Uuid::new_v4();
            let claimed = match catalog::jobs::dequeue(&self.deps.pool, &job_types, task_id).await {
                Ok(claimed) => claimed,
                Err(error) => {
                    tracing::error!(%error, "job dequeue failed (will retry)");
                    None
                }
            };

            let Some(job) = claimed else {
                drop(permit);
                // Jitter the idle poll so multiple workers don't thundering-
                // herd the queue.
                let jitter = 0.9 + rand::random::<f64>() * 0.2;
                tokio::select! {
                    () = tokio::time::sleep(DEQUEUE_INTERVAL.mul_f64(jitter)) => continue,
                    () = &mut shutdown => break,
                }
            };

            let Some(executor) = self.executors.get(job.job_type.as_str()).cloned() else {
                // Cannot happen: dequeue filters on registered types.
                tracing::error!(job_type = %job.job_type, "claimed job with no executor");
                drop(permit);
                continue;
            };

            let cancel = CancellationToken::new();
            self.tokens.lock().unwrap().insert(task_id, cancel.clone());

            let deps = self.deps.clone();
            let tokens = self.tokens.clone();
            let memory_exceeded = memory_exceeded.clone();
            tokio::spawn(async move {
                let _permit = permit;
                execute_job(deps, executor, job, cancel).await;
                tokens.lock().unwrap().remove(&task_id);

                if let Some(rss) = rss_bytes() {
                    if rss > MEMORY_LIMIT_BYTES {
                        memory_exceeded.store(true, Ordering::Relaxed);
                    }
                }
            });
        }

        tracing::info!("worker loop stopping, draining in-flight jobs");
        let _ = semaphore.acquire_many(self.concurrency as u32).await;
        control.abort();

        if memory_exceeded.load(Ordering::Relaxed) {
            anyhow::bail!("worker exceeded memory bound and must be restarted");
        }
        Ok(())
    }
}

/// Drive one claimed job through its executor with soft/hard time limits.
#[tracing::instrument(skip_all, fields(job_id = %job.id, job_type = %job.job_type))]
async fn execute_job(deps: Arc<Deps>, executor: Arc<dyn Executor>, job: Job, cancel: CancellationToken) {
    let job_id = job.id;
    let reporter = deps.reporter.clone();

    let ctx = JobContext {
        deps,
        job,
        cancel: cancel.clone(),
    };

    // Fire the cooperative signal at the soft limit; the body observes it at
    // its checkpoints.
    let soft_timer = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(SOFT_TIME_LIMIT).await;
            tracing::warn!("soft time limit reached, requesting cooperative cancel");
            cancel.cancel();
        })
    };

    let result = tokio::time::timeout(HARD_TIME_LIMIT, executor.execute(&ctx)).await;
    soft_timer.abort();

    let outcome = match result {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(error)) => {
            tracing::error!(?error, "job body failed");
            reporter
                .log(job_id, "error", &format!("Job failed: {error:#}"))
                .await;
            Outcome::failed(format!("Error: {error:#}"))
        }
        Err(_elapsed) => {
            tracing::error!("hard time limit reached, job aborted");
            Outcome::failed("Job exceeded the hard time limit and was aborted")
        }
    };

    // If the API cancelled the row while we ran, the guarded terminal write
    // below is a no-op and the cancelled status stands.
    reporter
        .finish(
            job_id,
            outcome.status,
            &outcome.message,
            outcome.error.as_deref(),
            outcome.output_path.as_deref(),
        )
        .await;
}

/// Listen for revoke signals and cancel the matching in-flight task.
async fn control_listener(bus: EventBus, tokens: Arc<Mutex<HashMap<uuid::Uuid, CancellationToken>>>) {
    #[derive(serde::Deserialize)]
    struct Revoke {
        revoke: uuid::Uuid,
    }

    loop {
        let mut subscription = match bus.subscribe(events::CONTROL_TOPIC).await {
            Ok(subscription) => subscription,
            Err(error) => {
                tracing::debug!(%error, "control topic unavailable, retrying");
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        };

        while let Some(payload) = subscription.recv().await {
            let Ok(Revoke { revoke }) = serde_json::from_str(&payload) else {
                continue;
            };
            if let Some(token) = tokens.lock().unwrap().get(&revoke) {
                tracing::info!(task_id = %revoke, "revoke received, cancelling task");
                token.cancel();
            }
        }
        tracing::debug!("control subscription lost, resubscribing");
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

/// Resident set size of this process, if the platform exposes it.
fn rss_bytes() -> Option<u64> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut system = sysinfo::System::new();
    system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).map(|p| p.memory())
}

#[cfg(test)]
mod test {
    use super::*;

    struct Dummy(JobType);

    #[async_trait::async_trait]
    impl Executor for Dummy {
        fn job_type(&self) -> JobType {
            self.0
        }
        async fn execute(&self, _ctx: &JobContext) -> anyhow::Result<Outcome> {
            Ok(Outcome::completed("done"))
        }
    }

    #[test]
    fn outcome_constructors() {
        let done = Outcome::completed("Fetched 5 frames").with_output("/data/output/x");
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.output_path.as_deref(), Some("/data/output/x"));

        let failed = Outcome::failed("boom");
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }

    #[test]
    fn rss_probe_reports_something_on_linux() {
        // Smoke check: the probe should find our own process.
        assert!(rss_bytes().unwrap_or(0) > 0);
    }

    #[test]
    fn executor_registry_rejects_duplicates() {
        let mut executors: BTreeMap<&'static str, Arc<dyn Executor>> = BTreeMap::new();
        assert!(executors
            .insert(JobType::Cleanup.as_str(), Arc::new(Dummy(JobType::Cleanup)))
            .is_none());
        assert!(executors
            .insert(JobType::Cleanup.as_str(), Arc::new(Dummy(JobType::Cleanup)))
            .is_some());
    }
}
