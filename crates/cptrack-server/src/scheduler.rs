//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring snapshot sweep.

use std::sync::Arc;

use cptrack_db::PlatformHandleRow;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::adapter::PlatformAdapters;
use crate::snapshot;

/// Builds and starts the background job scheduler.
///
/// Registers the snapshot sweep and starts the scheduler. Returns the
/// running [`JobScheduler`] handle, which must be kept alive for the
/// lifetime of the process — dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// the job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    adapters: Arc<PlatformAdapters>,
    snapshot_cron: &str,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_snapshot_sweep_job(&scheduler, pool, adapters, snapshot_cron).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the recurring snapshot sweep.
///
/// The default schedule (`0 0 3 * * *`, daily at 03:00 UTC) captures one
/// snapshot per linked handle so rating series keep moving without anyone
/// pressing refresh. The sweep ignores the manual-refresh cooldown; a
/// scheduled capture pushes the next allowed manual refresh out instead.
async fn register_snapshot_sweep_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    adapters: Arc<PlatformAdapters>,
    snapshot_cron: &str,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);

    let job = Job::new_async(snapshot_cron, move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let adapters = Arc::clone(&adapters);

        Box::pin(async move {
            tracing::info!("scheduler: starting snapshot sweep");
            run_snapshot_sweep(&pool, &adapters).await;
            tracing::info!("scheduler: snapshot sweep complete");
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Drive one sweep over every linked handle.
async fn run_snapshot_sweep(pool: &PgPool, adapters: &PlatformAdapters) {
    let handles = match cptrack_db::list_all_handles(pool).await {
        Ok(h) => h,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to load linked handles");
            return;
        }
    };

    if handles.is_empty() {
        tracing::info!("scheduler: no linked handles; skipping sweep");
        return;
    }

    tracing::info!(count = handles.len(), "scheduler: sweeping linked handles");

    for row in &handles {
        refresh_handle_snapshot(pool, adapters, row).await;
    }
}

/// Capture one snapshot for a single handle, absorbing per-handle failures
/// so one bad handle cannot stall the sweep.
async fn refresh_handle_snapshot(
    pool: &PgPool,
    adapters: &PlatformAdapters,
    row: &PlatformHandleRow,
) {
    let platform = match row.platform.parse::<cptrack_core::Platform>() {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(user_id = row.user_id, error = %e, "scheduler: stored platform is unknown; skipping");
            return;
        }
    };

    let profile = match adapters.fetch_profile(platform, &row.handle).await {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            tracing::warn!(
                user_id = row.user_id,
                platform = platform.as_str(),
                handle = %row.handle,
                "scheduler: handle no longer resolves; skipping"
            );
            return;
        }
        Err(e) => {
            tracing::error!(
                user_id = row.user_id,
                platform = platform.as_str(),
                handle = %row.handle,
                error = %e,
                "scheduler: profile fetch failed"
            );
            return;
        }
    };

    let topics = snapshot::resolve_topics(adapters, &profile).await;
    match snapshot::create_from_profile(pool, row.user_id, &profile, &topics).await {
        Ok(snap) => {
            tracing::info!(
                user_id = row.user_id,
                platform = platform.as_str(),
                rating = snap.rating,
                "scheduler: snapshot captured"
            );
        }
        Err(e) => {
            tracing::error!(
                user_id = row.user_id,
                platform = platform.as_str(),
                error = %e,
                "scheduler: snapshot insert failed"
            );
        }
    }
}
