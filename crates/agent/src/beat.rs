//! The beat: a single periodic task that materializes due schedules into
//! jobs, enqueues the hourly retention job, and sweeps stale jobs.

use crate::runtime::Deps;
use chrono::{Duration as ChronoDuration, Utc};
use models::{Id, JobType, NotificationType};
use std::sync::Arc;
use std::time::Duration;

pub const SCHEDULE_TICK: Duration = Duration::from_secs(60);
pub const CLEANUP_TICK: Duration = Duration::from_secs(3600);
pub const STALE_TICK: Duration = Duration::from_secs(300);

/// Run the beat until `shutdown` resolves. A single instance runs per
/// deployment; ticks of one kind never overlap because each arm awaits its
/// own handler.
pub async fn serve(deps: Arc<Deps>, shutdown: impl std::future::Future<Output = ()>) {
    let mut schedules = tokio::time::interval(SCHEDULE_TICK);
    let mut cleanup = tokio::time::interval(CLEANUP_TICK);
    let mut stale = tokio::time::interval(STALE_TICK);
    for interval in [&mut schedules, &mut cleanup, &mut stale] {
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    }

    tokio::pin!(shutdown);
    tracing::info!("beat started");

    loop {
        tokio::select! {
            _ = schedules.tick() => {
                if let Err(error) = tick_schedules(&deps).await {
                    tracing::error!(%error, "schedule tick failed");
                }
            }
            _ = cleanup.tick() => {
                if let Err(error) = tick_cleanup(&deps).await {
                    tracing::error!(%error, "cleanup tick failed");
                }
            }
            _ = stale.tick() => {
                if let Err(error) = reap_stale(&deps.pool).await {
                    tracing::error!(%error, "stale sweep failed");
                }
            }
            () = &mut shutdown => {
                tracing::info!("beat stopping");
                return;
            }
        }
    }
}

/// Select active schedules with `next_run_at <= now`, enqueue one
/// `goes_fetch` job per schedule for the window `[now − interval, now]`, and
/// advance the schedule, all in one transaction, so the job row is visible
/// before any worker can observe the schedule as ran.
pub async fn tick_schedules(deps: &Deps) -> anyhow::Result<usize> {
    let now = Utc::now();
    let mut txn = deps.pool.begin().await?;
    let due = catalog::schedules::due(&mut txn, now).await?;
    let mut launched = 0usize;

    for schedule in &due {
        let Some(preset) = catalog::presets::fetch_fetch_preset(&deps.pool, schedule.preset_id).await?
        else {
            tracing::warn!(
                schedule_id = %schedule.id,
                preset_id = %schedule.preset_id,
                "schedule references missing preset"
            );
            continue;
        };

        let start = now - ChronoDuration::minutes(i64::from(schedule.interval_minutes));
        let job_id = Id::new();
        let params = serde_json::json!({
            "satellite": preset.satellite,
            "sector": preset.sector,
            "band": preset.band,
            "start_time": start,
            "end_time": now,
            "preset_id": preset.id,
            "schedule_id": schedule.id,
        });
        catalog::jobs::create(&mut *txn, job_id, JobType::GoesFetch, &params, "").await?;
        catalog::schedules::mark_ran(&mut txn, schedule.id, now, schedule.interval_minutes).await?;
        launched += 1;

        tracing::info!(
            %job_id,
            preset = %preset.name,
            schedule = %schedule.name,
            "scheduled fetch enqueued"
        );
    }

    txn.commit().await?;

    // Post-commit fanout; best-effort.
    for schedule in &due {
        let message = format!("Schedule {:?} ran", schedule.name);
        if let Err(error) =
            catalog::notifications::insert(&deps.pool, NotificationType::ScheduleRun, &message).await
        {
            tracing::debug!(%error, "schedule notification insert failed");
        }
        deps.bus
            .publish_global(serde_json::json!({
                "type": "schedule_run",
                "schedule_id": schedule.id,
                "message": message,
            }))
            .await;
    }

    if launched > 0 {
        tracing::info!(launched, "schedule check complete");
    }
    Ok(launched)
}

/// Enqueue the periodic retention job.
pub async fn tick_cleanup(deps: &Deps) -> anyhow::Result<()> {
    let job_id = Id::new();
    catalog::jobs::create(
        &deps.pool,
        job_id,
        JobType::Cleanup,
        &serde_json::json!({}),
        "",
    )
    .await?;
    tracing::debug!(%job_id, "cleanup job enqueued");
    Ok(())
}

/// Sweep stale jobs. Runs from the beat, at process start, and on demand
/// through the API.
pub async fn reap_stale(pool: &sqlx::PgPool) -> anyhow::Result<u64> {
    let reaped = catalog::jobs::reap_stale_now(pool).await?;
    if reaped > 0 {
        tracing::warn!(reaped, "stale jobs marked failed");
    }
    Ok(reaped)
}
