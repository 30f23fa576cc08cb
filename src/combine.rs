use serde::Serialize;
use tracing::debug;

use crate::{
    cache::CacheManager,
    error::AppResult,
    models::{DisplayRecord, SearchItem},
    omdb::MetadataProvider,
    ratings::RatingStore,
};

/// Every rating joined with its cache entry. Never calls the provider.
pub async fn list(ratings: &RatingStore, cache: &CacheManager) -> AppResult<Vec<DisplayRecord>> {
    let ratings = ratings.list().await?;
    let ids: Vec<String> = ratings.iter().map(|r| r.external_id.clone()).collect();
    let mut details = cache.get_many(&ids).await?;

    Ok(ratings
        .into_iter()
        .map(|rating| {
            let meta = details.remove(&rating.external_id);
            DisplayRecord::new(rating, meta)
        })
        .collect())
}

/// Single movie view. Falls back to a live provider lookup when nothing is cached yet.
pub async fn detail(
    ratings: &RatingStore,
    cache: &CacheManager,
    provider: &dyn MetadataProvider,
    external_id: &str,
) -> AppResult<Option<DisplayRecord>> {
    let Some(rating) = ratings.get_by_external_id(external_id).await? else {
        return Ok(None);
    };

    let details = match cache.get(external_id).await? {
        Some(details) => Some(details),
        None => {
            debug!(external_id = %external_id, "cache miss, asking provider");
            provider.fetch_by_id(external_id).await
        },
    };

    Ok(Some(DisplayRecord::new(rating, details)))
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub confusion_beers: i32,
    pub enhancement_beers: i32,
    pub blurb: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    #[serde(flatten)]
    pub item: SearchItem,
    pub has_rating: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<RatingSummary>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct SearchResults {
    pub results: Vec<SearchHit>,
    pub total: u32,
}

/// Provider search annotated with local ratings; rated movies first, provider order otherwise.
pub async fn search(
    ratings: &RatingStore,
    provider: &dyn MetadataProvider,
    query: &str,
    page: u32,
) -> AppResult<SearchResults> {
    let Some(found) = provider.search(query, page).await else {
        return Ok(SearchResults::default());
    };

    let ids: Vec<String> = found.items.iter().map(|i| i.external_id.clone()).collect();
    let mut rated = ratings.rated_among(&ids).await?;

    let mut results: Vec<SearchHit> = found
        .items
        .into_iter()
        .map(|item| {
            let rating = rated.remove(&item.external_id).map(|r| RatingSummary {
                confusion_beers: r.confusion_beers,
                enhancement_beers: r.enhancement_beers,
                blurb: r.blurb,
            });
            SearchHit { has_rating: rating.is_some(), rating, item }
        })
        .collect();
    results.sort_by_key(|hit| !hit.has_rating);

    Ok(SearchResults { results, total: found.total })
}
