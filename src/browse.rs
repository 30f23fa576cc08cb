//! In-memory filtering and ordering of display records for the browse views.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::{DisplayRecord, Tag},
};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[default]
    All,
    /// Confusion 8+.
    BrainMelters,
    /// Enhancement 8+.
    PartyPicks,
    /// Low confusion, low enhancement.
    SoberFriendly,
}

impl Category {
    pub fn matches(self, record: &DisplayRecord) -> bool {
        let (c, e) = (record.rating.confusion_beers, record.rating.enhancement_beers);
        match self {
            Category::All => true,
            Category::BrainMelters => c >= 8,
            Category::PartyPicks => e >= 8,
            Category::SoberFriendly => c <= 3 && e <= 4,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    Confusion,
    Enhancement,
    Total,
    Title,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BrowseFilter {
    pub category: Category,
    /// Records must carry every listed tag.
    pub tags: Vec<Tag>,
    pub confusion: (i32, i32),
    pub enhancement: (i32, i32),
    pub title: Option<String>,
    pub sort: SortOrder,
}

impl Default for BrowseFilter {
    fn default() -> Self {
        Self {
            category: Category::All,
            tags: Vec::new(),
            confusion: (1, 10),
            enhancement: (1, 10),
            title: None,
            sort: SortOrder::Newest,
        }
    }
}

/// Query-string form of [`BrowseFilter`].
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseQuery {
    pub category: Option<Category>,
    pub tags: Option<String>,
    pub min_confusion: Option<i32>,
    pub max_confusion: Option<i32>,
    pub min_enhancement: Option<i32>,
    pub max_enhancement: Option<i32>,
    pub q: Option<String>,
    pub sort: Option<SortOrder>,
}

impl TryFrom<BrowseQuery> for BrowseFilter {
    type Error = AppError;

    fn try_from(query: BrowseQuery) -> AppResult<Self> {
        let tags = query
            .tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| Tag::from_key(t).ok_or_else(|| AppError::Validation(format!("Unknown tag: {t}"))))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Self {
            category: query.category.unwrap_or_default(),
            tags,
            confusion: (query.min_confusion.unwrap_or(1), query.max_confusion.unwrap_or(10)),
            enhancement: (query.min_enhancement.unwrap_or(1), query.max_enhancement.unwrap_or(10)),
            title: query.q.map(|q| q.trim().to_lowercase()).filter(|q| !q.is_empty()),
            sort: query.sort.unwrap_or_default(),
        })
    }
}

impl BrowseFilter {
    pub fn matches(&self, record: &DisplayRecord) -> bool {
        let rating = &record.rating;
        let in_range = |(lo, hi): (i32, i32), v: i32| lo <= v && v <= hi;

        self.category.matches(record)
            && in_range(self.confusion, rating.confusion_beers)
            && in_range(self.enhancement, rating.enhancement_beers)
            && self.tags.iter().all(|t| rating.tags.contains(t))
            && self.title.as_ref().is_none_or(|q| {
                record.details.title.as_ref().is_some_and(|t| t.to_lowercase().contains(q))
            })
    }
}

/// Filters then sorts. Ties keep their input order.
pub fn apply(records: Vec<DisplayRecord>, filter: &BrowseFilter) -> Vec<DisplayRecord> {
    let mut out: Vec<DisplayRecord> = records.into_iter().filter(|r| filter.matches(r)).collect();
    out.sort_by(|a, b| compare(filter.sort, a, b));
    out
}

fn compare(sort: SortOrder, a: &DisplayRecord, b: &DisplayRecord) -> Ordering {
    match sort {
        SortOrder::Newest => b.rating.created_at.cmp(&a.rating.created_at),
        SortOrder::Oldest => a.rating.created_at.cmp(&b.rating.created_at),
        SortOrder::Confusion => b.rating.confusion_beers.cmp(&a.rating.confusion_beers),
        SortOrder::Enhancement => b.rating.enhancement_beers.cmp(&a.rating.enhancement_beers),
        SortOrder::Total => b.total_beers().cmp(&a.total_beers()),
        SortOrder::Title => match (&a.details.title, &b.details.title) {
            (Some(x), Some(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    }
}

const HIGHLIGHT_LIMIT: usize = 5;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlights {
    pub count: usize,
    pub average_beers: i32,
    pub brain_melters: Vec<DisplayRecord>,
    pub party_picks: Vec<DisplayRecord>,
    pub sober_friendly: Vec<DisplayRecord>,
}

pub fn highlights(records: &[DisplayRecord]) -> Highlights {
    let bucket = |category: Category| -> Vec<DisplayRecord> {
        records.iter().filter(|r| category.matches(r)).take(HIGHLIGHT_LIMIT).cloned().collect()
    };

    let average = if records.is_empty() {
        0
    } else {
        let beers: i32 = records.iter().map(DisplayRecord::total_beers).sum();
        (beers as f64 / records.len() as f64 / 2.0).round() as i32
    };

    Highlights {
        count: records.len(),
        average_beers: average,
        brain_melters: bucket(Category::BrainMelters),
        party_picks: bucket(Category::PartyPicks),
        sober_friendly: bucket(Category::SoberFriendly),
    }
}
