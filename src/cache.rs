use std::collections::HashMap;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set};

use crate::{entities::movie_cache, error::AppResult, models::MovieDetails};

#[derive(Clone)]
pub struct CacheManager {
    db: DatabaseConnection,
    stale_after_secs: i64,
}

impl CacheManager {
    pub fn new(db: DatabaseConnection, stale_after_secs: i64) -> Self {
        Self { db, stale_after_secs }
    }

    /// Cached metadata regardless of age; readers tolerate stale entries.
    pub async fn get(&self, external_id: &str) -> AppResult<Option<MovieDetails>> {
        let row = movie_cache::Entity::find_by_id(external_id.to_string()).one(&self.db).await?;
        Ok(row.map(MovieDetails::from))
    }

    pub async fn get_many(&self, external_ids: &[String]) -> AppResult<HashMap<String, MovieDetails>> {
        if external_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = movie_cache::Entity::find()
            .filter(movie_cache::Column::ImdbId.is_in(external_ids.iter().cloned()))
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(|row| (row.imdb_id.clone(), MovieDetails::from(row))).collect())
    }

    pub async fn cached_at(&self, external_ids: &[String]) -> AppResult<HashMap<String, i64>> {
        if external_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(String, i64)> = movie_cache::Entity::find()
            .select_only()
            .column(movie_cache::Column::ImdbId)
            .column(movie_cache::Column::CachedAt)
            .filter(movie_cache::Column::ImdbId.is_in(external_ids.iter().cloned()))
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn upsert(&self, external_id: &str, details: &MovieDetails, now: i64) -> AppResult<()> {
        let model = movie_cache::ActiveModel {
            imdb_id: Set(external_id.to_string()),
            title: Set(details.title.clone()),
            year: Set(details.year.clone()),
            poster: Set(details.poster.clone()),
            plot: Set(details.plot.clone()),
            director: Set(details.director.clone()),
            actors: Set(details.actors.clone()),
            genre: Set(details.genre.clone()),
            runtime: Set(details.runtime.clone()),
            imdb_rating: Set(details.imdb_rating.clone()),
            rated: Set(details.rated.clone()),
            cached_at: Set(now),
        };

        movie_cache::Entity::insert(model)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(movie_cache::Column::ImdbId)
                    .update_columns([
                        movie_cache::Column::Title,
                        movie_cache::Column::Year,
                        movie_cache::Column::Poster,
                        movie_cache::Column::Plot,
                        movie_cache::Column::Director,
                        movie_cache::Column::Actors,
                        movie_cache::Column::Genre,
                        movie_cache::Column::Runtime,
                        movie_cache::Column::ImdbRating,
                        movie_cache::Column::Rated,
                        movie_cache::Column::CachedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;

        Ok(())
    }

    pub fn is_fresh(&self, cached_at: i64, now: i64) -> bool {
        now.saturating_sub(cached_at) <= self.stale_after_secs
    }
}

pub fn now_sec() -> i64 {
    jiff::Timestamp::now().as_second()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn primer() -> MovieDetails {
        MovieDetails {
            title: Some("Primer".into()),
            year: Some("2004".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn upsert_overwrites_single_entry() {
        let cache = CacheManager::new(db::memory().await, 86_400);

        cache.upsert("tt0390384", &primer(), 100).await.unwrap();
        let updated = MovieDetails { director: Some("Shane Carruth".into()), ..primer() };
        cache.upsert("tt0390384", &updated, 200).await.unwrap();

        let ids = vec!["tt0390384".to_string(), "tt9999999".to_string()];
        let stamps = cache.cached_at(&ids).await.unwrap();
        assert_eq!(stamps.len(), 1);
        assert_eq!(stamps["tt0390384"], 200);

        let got = cache.get("tt0390384").await.unwrap().unwrap();
        assert_eq!(got.director.as_deref(), Some("Shane Carruth"));
        assert_eq!(cache.get_many(&ids).await.unwrap().len(), 1);
        assert!(cache.get("tt9999999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn freshness_window_is_inclusive() {
        let cache = CacheManager::new(db::memory().await, 24 * 3_600);
        let now = 1_000_000;
        assert!(cache.is_fresh(now - 23 * 3_600, now));
        assert!(cache.is_fresh(now - 24 * 3_600, now));
        assert!(!cache.is_fresh(now - 25 * 3_600, now));
    }
}
