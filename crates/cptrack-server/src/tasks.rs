//! Detached background work spawned from request handlers.

use std::sync::Arc;

use cptrack_core::PlatformProfile;
use sqlx::PgPool;

use crate::adapter::PlatformAdapters;
use crate::snapshot;

/// Spawns the post-link capture: an immediate snapshot of the profile the
/// link check already fetched, then a history backfill. The linking request
/// does not wait on either; failures land in the log, not the response.
pub fn spawn_backfill(
    pool: PgPool,
    adapters: Arc<PlatformAdapters>,
    user_id: i64,
    profile: PlatformProfile,
) {
    tokio::spawn(run_backfill(pool, adapters, user_id, profile));
}

async fn run_backfill(
    pool: PgPool,
    adapters: Arc<PlatformAdapters>,
    user_id: i64,
    profile: PlatformProfile,
) {
    tracing::info!(
        user_id,
        platform = profile.platform.as_str(),
        handle = %profile.handle,
        "backfill: starting for newly linked handle"
    );

    let topics = snapshot::resolve_topics(&adapters, &profile).await;
    if let Err(error) = snapshot::create_from_profile(&pool, user_id, &profile, &topics).await {
        tracing::error!(
            user_id,
            platform = profile.platform.as_str(),
            %error,
            "backfill: initial snapshot insert failed"
        );
    }

    match snapshot::backfill_history(&pool, &adapters, user_id, &profile).await {
        Ok(inserted) => {
            tracing::info!(
                user_id,
                platform = profile.platform.as_str(),
                inserted,
                "backfill: complete"
            );
        }
        Err(error) => {
            tracing::error!(
                user_id,
                platform = profile.platform.as_str(),
                %error,
                "backfill: history import failed"
            );
        }
    }
}
