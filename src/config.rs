use std::{net::SocketAddr, time::Duration};

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub omdb_api_key: String,
    pub omdb_base_url: String,
    pub omdb_rps: u32,
    pub admin_token: String,
    pub refresh_secret: Option<String>,
    pub refresh: RefreshConfig,
    /// Period of the background refresh timer; `None` leaves refresh to the HTTP trigger.
    pub refresh_interval: Option<Duration>,
}

#[derive(Clone, Debug)]
pub struct RefreshConfig {
    pub stale_after_secs: i64,
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub deadline: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: 24 * 3_600,
            batch_size: 10,
            batch_delay: Duration::from_millis(1_000),
            deadline: Duration::from_secs(300),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = get("PORT").unwrap_or_else(|| "3000".to_string()).parse().context("PORT")?;

        let database_url =
            get("DATABASE_URL").unwrap_or_else(|| "sqlite://beers.db?mode=rwc".to_string());

        let omdb_api_key = get("OMDB_API_KEY").unwrap_or_default();
        let omdb_base_url =
            get("OMDB_BASE_URL").unwrap_or_else(|| "https://www.omdbapi.com".to_string());
        let omdb_rps: u32 = get("OMDB_RPS").and_then(|s| s.parse().ok()).unwrap_or(10);

        let admin_token = get("ADMIN_TOKEN").unwrap_or_default();
        let refresh_secret = get("CACHE_REFRESH_SECRET").filter(|s| !s.trim().is_empty());

        let defaults = RefreshConfig::default();
        let stale_hours: i64 = get("CACHE_STALE_HOURS").and_then(|s| s.parse().ok()).unwrap_or(24);
        let batch_size: usize = get("REFRESH_BATCH_SIZE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.batch_size);
        let batch_delay_ms: u64 =
            get("REFRESH_BATCH_DELAY_MS").and_then(|s| s.parse().ok()).unwrap_or(1_000);
        let deadline_secs: u64 =
            get("REFRESH_DEADLINE_SECS").and_then(|s| s.parse().ok()).unwrap_or(300);
        let interval_secs: u64 =
            get("REFRESH_INTERVAL_SECS").and_then(|s| s.parse().ok()).unwrap_or(0);

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            omdb_api_key,
            omdb_base_url,
            omdb_rps,
            admin_token,
            refresh_secret,
            refresh: RefreshConfig {
                stale_after_secs: stale_hours.max(0).saturating_mul(3_600),
                batch_size: batch_size.max(1),
                batch_delay: Duration::from_millis(batch_delay_ms),
                deadline: Duration::from_secs(deadline_secs.max(1)),
            },
            refresh_interval: (interval_secs > 0).then(|| Duration::from_secs(interval_secs)),
        })
    }
}
