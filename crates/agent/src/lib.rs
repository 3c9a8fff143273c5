pub mod beat;
pub mod executors;
mod progress;
mod runtime;
mod webhook;

pub use progress::ProgressReporter;
pub use runtime::{
    Deps, Executor, JobContext, Outcome, Runtime, HARD_TIME_LIMIT, MEMORY_LIMIT_BYTES,
    SOFT_TIME_LIMIT,
};

/// Register the full executor set on a runtime.
pub fn register_all(runtime: Runtime) -> Runtime {
    runtime
        .register(executors::GoesFetchExecutor)
        .register(executors::GoesBackfillExecutor)
        .register(executors::CompositeFetchExecutor)
        .register(executors::CompositeGenerateExecutor)
        .register(executors::AnimationExecutor)
        .register(executors::ImageProcessExecutor)
        .register(executors::CleanupExecutor)
}
