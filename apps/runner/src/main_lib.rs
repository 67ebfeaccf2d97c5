use std::sync::Arc;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use dailybar_core::{PipelineComponents, RunCoordinator};
use dailybar_feed::{EnvCredentialProvider, PolygonFetcher};
use dailybar_storage_sqlite::{
    create_pool, init, spawn_writer, MarketDataRepository, RunRepository,
    SqliteSchemaInitializer,
};

use crate::config::Config;

pub fn init_tracing() {
    let log_format = std::env::var("DAILYBAR_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    // `init` also routes the library crates' `log` records into tracing.
    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// Open the database and wire the pipeline's collaborators together.
pub async fn build_coordinator(config: &Config) -> anyhow::Result<Arc<RunCoordinator>> {
    let db_path = init(&config.db_path)?;
    tracing::info!("Database path in use: {}", db_path);

    let pool = create_pool(&db_path)?;
    let writer = spawn_writer((*pool).clone());

    let fetcher = PolygonFetcher::new(Arc::new(EnvCredentialProvider::polygon()))
        .with_base_url(config.feed_base_url.clone());

    let components = PipelineComponents {
        fetcher: Arc::new(fetcher),
        schema: Arc::new(SqliteSchemaInitializer::new(pool.clone())),
        records: Arc::new(MarketDataRepository::new(pool.clone(), writer.clone())),
        runs: Arc::new(RunRepository::new(pool.clone(), writer)),
    };

    let coordinator = RunCoordinator::new(config.pipeline.clone(), components)?;
    let status = coordinator.initialize_store().await?;
    tracing::info!("Store ready ({:?})", status);
    Ok(coordinator)
}
