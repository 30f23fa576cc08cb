mod auth;
mod browse;
mod cache;
mod combine;
mod config;
mod db;
mod entities;
mod error;
mod models;
mod omdb;
mod ratings;
mod refresh;
mod routes;
#[cfg(test)]
mod test_support;

use std::{sync::Arc, time::Duration};

use sea_orm::DatabaseConnection;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    cache::CacheManager,
    config::Config,
    omdb::{MetadataProvider, OmdbClient},
    ratings::RatingStore,
    refresh::RefreshPipeline,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub ratings: RatingStore,
    pub cache: CacheManager,
    pub provider: Arc<dyn MetadataProvider>,
    pub refresh: Arc<RefreshPipeline>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        db: DatabaseConnection,
        provider: Arc<dyn MetadataProvider>,
    ) -> Self {
        let ratings = RatingStore::new(db.clone());
        let cache = CacheManager::new(db, config.refresh.stale_after_secs);
        let refresh = Arc::new(RefreshPipeline::new(
            ratings.clone(),
            cache.clone(),
            provider.clone(),
            config.refresh.clone(),
        ));
        Self { config, ratings, cache, provider, refresh }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,beers_per_film=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    let http = reqwest::Client::builder()
        .user_agent("beers-per-film/0.1")
        .timeout(Duration::from_secs(30))
        .build()?;

    let db = db::connect_and_migrate(config.database_url.as_str()).await?;

    let omdb = OmdbClient::new(
        http,
        config.omdb_api_key.clone(),
        config.omdb_base_url.clone(),
        config.omdb_rps,
    );

    if config.admin_token.trim().is_empty() {
        tracing::warn!("ADMIN_TOKEN is empty, rating writes are disabled");
    }

    let state = Arc::new(AppState::new(config.clone(), db, Arc::new(omdb)));

    if let Some(period) = config.refresh_interval {
        tracing::info!(period = ?period, "scheduling periodic cache refresh");
        tokio::spawn(refresh::run_periodically(state.refresh.clone(), period));
    }

    let app = routes::router(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
