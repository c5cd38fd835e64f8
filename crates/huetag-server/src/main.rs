mod api;
mod middleware;

use std::sync::Arc;

use huetag_pipeline::{PgStore, PipelineSettings, TaggingService};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = huetag_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = huetag_db::PoolConfig::from_app_config(&config);
    let pool = huetag_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = huetag_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations up to date");

    let service = TaggingService::new(
        PgStore::new(pool.clone()),
        huetag_providers::build_tag_providers(&config)?,
        Arc::new(huetag_providers::build_refiner(&config)?),
        Arc::new(huetag_providers::build_batch_client(&config)?),
        PipelineSettings::from_app_config(&config),
    );
    tracing::info!(
        env = %config.env,
        providers = config.providers.len(),
        tagging_version = %service.tagging_version(),
        refinement_version = %service.refinement_version(),
        "tagging service ready"
    );

    let auth = AuthState::from_env(matches!(config.env, huetag_core::Environment::Development))?;
    let app = build_app(
        AppState {
            pool,
            service: Arc::new(service),
        },
        auth,
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
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
