use std::{num::NonZeroU32, sync::Arc};

use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::models::{MovieDetails, SearchItem, SearchPage};

/// Source of movie metadata. Failures surface as `None`; callers decide whether to retry.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn fetch_by_id(&self, external_id: &str) -> Option<MovieDetails>;

    async fn search(&self, query: &str, page: u32) -> Option<SearchPage>;
}

pub struct OmdbClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl OmdbClient {
    pub fn new(client: reqwest::Client, api_key: String, base_url: String, rps: u32) -> Self {
        if api_key.trim().is_empty() {
            warn!("no OMDB_API_KEY provided, movie metadata lookups are disabled");
        }

        let rps = NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN);
        let limiter = Arc::new(RateLimiter::direct(Quota::per_second(rps)));
        Self { client, api_key, base_url, limiter }
    }

    fn offline(&self) -> bool {
        self.api_key.trim().is_empty()
    }

    async fn get_json<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> reqwest::Result<T> {
        self.limiter.until_ready().await;

        let url = format!("{}/", self.base_url.trim_end_matches('/'));
        self.client
            .get(url)
            .query(&[("apikey", self.api_key.as_str())])
            .query(params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl MetadataProvider for OmdbClient {
    async fn fetch_by_id(&self, external_id: &str) -> Option<MovieDetails> {
        let external_id = external_id.trim();
        if external_id.is_empty() || self.offline() {
            return None;
        }

        match self.get_json::<OmdbMovie>(&[("i", external_id), ("plot", "full")]).await {
            Ok(body) => {
                let details = body.into_details();
                if details.is_none() {
                    debug!(external_id = %external_id, "movie not found");
                }
                details
            },
            Err(err) => {
                warn!(external_id = %external_id, error = %err, "failed to fetch movie");
                None
            },
        }
    }

    async fn search(&self, query: &str, page: u32) -> Option<SearchPage> {
        let query = query.trim();
        if query.is_empty() || page == 0 || self.offline() {
            return None;
        }

        let page = page.to_string();
        match self.get_json::<OmdbSearch>(&[("s", query), ("page", page.as_str()), ("type", "movie")]).await
        {
            Ok(body) => body.into_page(),
            Err(err) => {
                warn!(query = %query, error = %err, "failed to search movies");
                None
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OmdbMovie {
    response: Option<String>,
    error: Option<String>,
    title: Option<String>,
    year: Option<String>,
    rated: Option<String>,
    runtime: Option<String>,
    genre: Option<String>,
    director: Option<String>,
    actors: Option<String>,
    plot: Option<String>,
    poster: Option<String>,
    #[serde(rename = "imdbRating")]
    imdb_rating: Option<String>,
}

impl OmdbMovie {
    fn into_details(self) -> Option<MovieDetails> {
        if is_false(self.response.as_deref()) {
            debug!(error = ?self.error, "omdb returned no movie");
            return None;
        }
        Some(MovieDetails {
            title: present(self.title),
            year: present(self.year),
            poster: present(self.poster),
            plot: present(self.plot),
            director: present(self.director),
            actors: present(self.actors),
            genre: present(self.genre),
            runtime: present(self.runtime),
            imdb_rating: present(self.imdb_rating),
            rated: present(self.rated),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OmdbSearch {
    response: Option<String>,
    search: Option<Vec<OmdbSearchResult>>,
    #[serde(rename = "totalResults")]
    total_results: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OmdbSearchResult {
    title: String,
    year: Option<String>,
    #[serde(rename = "imdbID")]
    imdb_id: String,
    poster: Option<String>,
}

impl OmdbSearch {
    fn into_page(self) -> Option<SearchPage> {
        if is_false(self.response.as_deref()) {
            return None;
        }
        let results = self.search?;
        let total = self.total_results.and_then(|t| t.trim().parse().ok()).unwrap_or(0);
        let items = results
            .into_iter()
            .map(|r| SearchItem {
                external_id: r.imdb_id,
                title: r.title,
                year: present(r.year),
                poster: present(r.poster),
            })
            .collect();
        Some(SearchPage { items, total })
    }
}

fn is_false(response: Option<&str>) -> bool {
    response.is_some_and(|r| r.eq_ignore_ascii_case("false"))
}

fn present(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let v = v.trim();
        (!v.is_empty() && v != "N/A").then(|| v.to_string())
    })
}
