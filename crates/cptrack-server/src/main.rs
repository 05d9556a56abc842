mod adapter;
mod api;
mod middleware;
mod scheduler;
mod snapshot;
mod tasks;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::api::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = cptrack_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = cptrack_db::PoolConfig::from_app_config(&config);
    let pool = cptrack_db::connect_pool(&config.database_url, pool_config).await?;
    cptrack_db::run_migrations(&pool).await?;

    let adapters = Arc::new(adapter::PlatformAdapters::from_config(&config)?);

    let _scheduler =
        scheduler::build_scheduler(pool.clone(), Arc::clone(&adapters), &config.snapshot_cron)
            .await?;

    let expose_errors = matches!(config.env, cptrack_core::Environment::Development);
    let app = build_app(AppState {
        pool,
        adapters,
        expose_errors,
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
