use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    models::{MovieDetails, SearchPage},
    omdb::MetadataProvider,
};

/// In-memory provider that records how it was called.
#[derive(Default)]
pub struct FakeProvider {
    movies: HashMap<String, MovieDetails>,
    search: Option<SearchPage>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeProvider {
    pub fn with_movie(mut self, external_id: &str, title: &str, year: &str) -> Self {
        let details = MovieDetails {
            title: Some(title.to_string()),
            year: Some(year.to_string()),
            ..Default::default()
        };
        self.movies.insert(external_id.to_string(), details);
        self
    }

    pub fn with_search(mut self, page: SearchPage) -> Self {
        self.search = Some(page);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataProvider for FakeProvider {
    async fn fetch_by_id(&self, external_id: &str) -> Option<MovieDetails> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.movies.get(external_id).cloned()
    }

    async fn search(&self, query: &str, page: u32) -> Option<SearchPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if query.trim().is_empty() || page == 0 {
            return None;
        }
        self.search.clone()
    }
}
