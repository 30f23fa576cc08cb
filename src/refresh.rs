use std::{collections::HashMap, sync::Arc, time::Duration};

use futures::{StreamExt, stream};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    cache::{CacheManager, now_sec},
    config::RefreshConfig,
    error::{AppError, AppResult},
    omdb::MetadataProvider,
    ratings::RatingStore,
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub message: String,
    /// Distinct movies referenced by ratings.
    pub total: usize,
    /// Movies whose cache entry was missing or stale.
    pub refreshed: usize,
    pub cached: usize,
    pub errors: usize,
    pub skipped: usize,
}

/// Keeps `movie_cache` within the staleness window of the provider's data.
pub struct RefreshPipeline {
    ratings: RatingStore,
    cache: CacheManager,
    provider: Arc<dyn MetadataProvider>,
    config: RefreshConfig,
    running: Mutex<()>,
}

impl RefreshPipeline {
    pub fn new(
        ratings: RatingStore,
        cache: CacheManager,
        provider: Arc<dyn MetadataProvider>,
        config: RefreshConfig,
    ) -> Self {
        Self { ratings, cache, provider, config, running: Mutex::new(()) }
    }

    /// One refresh run. Only one run executes at a time; overlapping triggers are refused.
    pub async fn run(&self) -> AppResult<RefreshSummary> {
        let Ok(_guard) = self.running.try_lock() else {
            return Err(AppError::Conflict("Cache refresh already in progress".to_string()));
        };

        match tokio::time::timeout(self.config.deadline, self.refresh()).await {
            Ok(summary) => summary,
            Err(_) => {
                warn!(deadline = ?self.config.deadline, "cache refresh exceeded its deadline");
                Err(AppError::Timeout(format!(
                    "Cache refresh did not finish within {}s",
                    self.config.deadline.as_secs_f64()
                )))
            },
        }
    }

    async fn refresh(&self) -> AppResult<RefreshSummary> {
        let mut ids = self.ratings.external_ids().await?;
        ids.sort();
        ids.dedup();

        if ids.is_empty() {
            return Ok(RefreshSummary {
                message: "No movies to cache".to_string(),
                ..Default::default()
            });
        }

        let cached_at = self.cache.cached_at(&ids).await?;
        let total = ids.len();
        let stale = self.stale_ids(ids, &cached_at, now_sec());

        debug!(total = total, stale = stale.len(), "partitioned cache entries");

        let (cached, errors) = in_batches(
            &stale,
            self.config.batch_size,
            self.config.batch_delay,
            |id| self.refresh_one(id),
        )
        .await;

        let summary = RefreshSummary {
            message: "Cache refresh complete".to_string(),
            total,
            refreshed: stale.len(),
            cached,
            errors,
            skipped: total - stale.len(),
        };
        info!(
            total = summary.total,
            refreshed = summary.refreshed,
            cached = summary.cached,
            errors = summary.errors,
            skipped = summary.skipped,
            "cache refresh complete"
        );
        Ok(summary)
    }

    fn stale_ids(&self, ids: Vec<String>, cached_at: &HashMap<String, i64>, now: i64) -> Vec<String> {
        ids.into_iter()
            .filter(|id| match cached_at.get(id) {
                Some(at) => !self.cache.is_fresh(*at, now),
                None => true,
            })
            .collect()
    }

    async fn refresh_one(&self, external_id: &str) -> bool {
        let Some(details) = self.provider.fetch_by_id(external_id).await else {
            warn!(external_id = %external_id, "no metadata available, keeping previous cache entry");
            return false;
        };

        match self.cache.upsert(external_id, &details, now_sec()).await {
            Ok(()) => true,
            Err(err) => {
                warn!(external_id = %external_id, error = %err, "failed to write cache entry");
                false
            },
        }
    }
}

/// Runs `refresh` over `ids` in chunks of `batch_size`, all of a chunk at once,
/// sleeping `delay` between chunks. Returns `(succeeded, failed)`.
async fn in_batches<'a, F, Fut>(
    ids: &'a [String],
    batch_size: usize,
    delay: Duration,
    refresh: F,
) -> (usize, usize)
where
    F: Fn(&'a str) -> Fut,
    Fut: Future<Output = bool>,
{
    let mut cached = 0;
    let mut errors = 0;

    for (idx, batch) in ids.chunks(batch_size.max(1)).enumerate() {
        if idx > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let futures: Vec<Fut> = batch.iter().map(|id| refresh(id.as_str())).collect();
        let outcomes: Vec<bool> = stream::iter(futures)
            .buffer_unordered(batch.len())
            .collect()
            .await;

        let ok = outcomes.iter().filter(|ok| **ok).count();
        cached += ok;
        errors += outcomes.len() - ok;
        debug!(batch = idx, size = batch.len(), cached = ok, "refreshed batch");
    }

    (cached, errors)
}

/// Runs the pipeline every `period` until the process exits.
pub async fn run_periodically(pipeline: Arc<RefreshPipeline>, period: Duration) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match pipeline.run().await {
            Ok(summary) => {
                debug!(cached = summary.cached, errors = summary.errors, "scheduled refresh finished")
            },
            Err(err) => warn!(error = %err, "scheduled refresh failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db,
        models::MovieDetails,
        ratings::{CreateRatingRequest, NewRating},
        test_support::FakeProvider,
    };

    fn config() -> RefreshConfig {
        RefreshConfig { batch_delay: Duration::ZERO, ..Default::default() }
    }

    fn rating(external_id: &str, c: i64, e: i64) -> NewRating {
        CreateRatingRequest {
            external_id: Some(external_id.to_string()),
            confusion_beers: Some(c),
            enhancement_beers: Some(e),
            blurb: None,
            tags: None,
        }
        .validate()
        .unwrap()
    }

    async fn setup(
        ids: &[&str],
        provider: FakeProvider,
        config: RefreshConfig,
    ) -> (RefreshPipeline, CacheManager, Arc<FakeProvider>) {
        let db = db::memory().await;
        let ratings = RatingStore::new(db.clone());
        for id in ids {
            ratings.create(rating(id, 5, 5)).await.unwrap();
        }
        let cache = CacheManager::new(db, config.stale_after_secs);
        let provider = Arc::new(provider);
        let pipeline = RefreshPipeline::new(ratings, cache.clone(), provider.clone(), config);
        (pipeline, cache, provider)
    }

    #[tokio::test]
    async fn caches_metadata_for_rated_movies() {
        let provider = FakeProvider::default().with_movie("tt0390384", "Primer", "2004");
        let (pipeline, cache, _) = setup(&["tt0390384"], provider, config()).await;

        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary, RefreshSummary {
            message: "Cache refresh complete".to_string(),
            total: 1,
            refreshed: 1,
            cached: 1,
            errors: 0,
            skipped: 0,
        });

        let entry = cache.get("tt0390384").await.unwrap().unwrap();
        assert_eq!(entry.title.as_deref(), Some("Primer"));
        assert_eq!(entry.year.as_deref(), Some("2004"));
        let stamps = cache.cached_at(&["tt0390384".to_string()]).await.unwrap();
        assert!(now_sec() - stamps["tt0390384"] < 60);
    }

    #[tokio::test]
    async fn second_run_makes_no_provider_calls() {
        let provider = FakeProvider::default()
            .with_movie("tt0390384", "Primer", "2004")
            .with_movie("tt2084989", "Upstream Color", "2013");
        let (pipeline, _, provider) = setup(&["tt0390384", "tt2084989"], provider, config()).await;

        pipeline.run().await.unwrap();
        assert_eq!(provider.calls(), 2);

        let summary = pipeline.run().await.unwrap();
        assert_eq!(provider.calls(), 2);
        assert_eq!(summary.refreshed, 0);
        assert_eq!(summary.skipped, 2);
    }

    #[tokio::test]
    async fn only_entries_older_than_window_are_refreshed() {
        let provider = FakeProvider::default()
            .with_movie("tt-old", "Old", "1999")
            .with_movie("tt-recent", "Recent", "2020");
        let (pipeline, cache, provider) = setup(&["tt-old", "tt-recent"], provider, config()).await;

        let now = now_sec();
        let stub = MovieDetails { title: Some("stub".into()), ..Default::default() };
        cache.upsert("tt-old", &stub, now - 25 * 3_600).await.unwrap();
        cache.upsert("tt-recent", &stub, now - 23 * 3_600).await.unwrap();

        let summary = pipeline.run().await.unwrap();
        assert_eq!(provider.calls(), 1);
        assert_eq!(summary.refreshed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(cache.get("tt-old").await.unwrap().unwrap().title.as_deref(), Some("Old"));
        assert_eq!(cache.get("tt-recent").await.unwrap().unwrap().title.as_deref(), Some("stub"));
    }

    #[tokio::test]
    async fn one_failure_does_not_spoil_the_batch() {
        let provider = FakeProvider::default()
            .with_movie("tt1", "One", "2001")
            .with_movie("tt3", "Three", "2003");
        let (pipeline, cache, _) = setup(&["tt1", "tt2", "tt3"], provider, config()).await;

        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary.cached, 2);
        assert_eq!(summary.errors, 1);
        assert!(cache.get("tt1").await.unwrap().is_some());
        assert!(cache.get("tt2").await.unwrap().is_none());
        assert!(cache.get("tt3").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn batches_bound_concurrency() {
        let ids = ["tt1", "tt2", "tt3", "tt4", "tt5"];
        let provider = ids
            .iter()
            .fold(FakeProvider::default(), |p, id| p.with_movie(id, id, "2000"))
            .with_delay(Duration::from_millis(20));
        let config = RefreshConfig { batch_size: 2, ..config() };
        let (pipeline, _, provider) = setup(&ids, provider, config).await;

        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary.cached, 5);
        assert_eq!(provider.calls(), 5);
        assert_eq!(provider.max_in_flight(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_between_batches_only() {
        let ids: Vec<String> = (1..=5).map(|i| format!("tt{i}")).collect();
        let started = std::sync::Mutex::new(HashMap::new());
        let begin = tokio::time::Instant::now();

        let (cached, errors) = in_batches(&ids, 2, Duration::from_secs(1), |id| {
            let started = &started;
            async move {
                started.lock().unwrap().insert(id.to_string(), begin.elapsed());
                id != "tt3"
            }
        })
        .await;

        assert_eq!((cached, errors), (4, 1));
        assert_eq!(begin.elapsed(), Duration::from_secs(2));
        let started = started.into_inner().unwrap();
        assert_eq!(started["tt1"], Duration::ZERO);
        assert_eq!(started["tt2"], Duration::ZERO);
        assert_eq!(started["tt3"], Duration::from_secs(1));
        assert_eq!(started["tt4"], Duration::from_secs(1));
        assert_eq!(started["tt5"], Duration::from_secs(2));
    }

    #[tokio::test]
    async fn no_ratings_means_nothing_to_do() {
        let (pipeline, _, provider) = setup(&[], FakeProvider::default(), config()).await;
        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary.message, "No movies to cache");
        assert_eq!(summary.total, 0);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn overlapping_runs_are_refused() {
        let (pipeline, _, _) = setup(&["tt1"], FakeProvider::default(), config()).await;
        let _held = pipeline.running.try_lock().unwrap();
        assert!(matches!(pipeline.run().await, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn deadline_bounds_the_run() {
        let provider = FakeProvider::default()
            .with_movie("tt1", "One", "2001")
            .with_delay(Duration::from_secs(5));
        let config = RefreshConfig { deadline: Duration::from_millis(100), ..config() };
        let (pipeline, cache, _) = setup(&["tt1"], provider, config).await;

        assert!(matches!(pipeline.run().await, Err(AppError::Timeout(_))));
        assert!(cache.get("tt1").await.unwrap().is_none());
    }
}
