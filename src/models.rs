use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::entities::{beer_rating, movie_cache};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    CultClassic,
    Blockbuster,
    Horror,
    Comedy,
    SciFi,
    Action,
    Drama,
    Documentary,
    Animated,
    Foreign,
}

impl Tag {
    pub const ALL: [Tag; 10] = [
        Tag::CultClassic,
        Tag::Blockbuster,
        Tag::Horror,
        Tag::Comedy,
        Tag::SciFi,
        Tag::Action,
        Tag::Drama,
        Tag::Documentary,
        Tag::Animated,
        Tag::Foreign,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Tag::CultClassic => "cult_classic",
            Tag::Blockbuster => "blockbuster",
            Tag::Horror => "horror",
            Tag::Comedy => "comedy",
            Tag::SciFi => "sci_fi",
            Tag::Action => "action",
            Tag::Drama => "drama",
            Tag::Documentary => "documentary",
            Tag::Animated => "animated",
            Tag::Foreign => "foreign",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tag::CultClassic => "Cult Classic",
            Tag::Blockbuster => "Blockbuster",
            Tag::Horror => "Horror",
            Tag::Comedy => "Comedy",
            Tag::SciFi => "Sci-Fi",
            Tag::Action => "Action",
            Tag::Drama => "Drama",
            Tag::Documentary => "Documentary",
            Tag::Animated => "Animated",
            Tag::Foreign => "Foreign",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim();
        Tag::ALL.into_iter().find(|t| t.key() == key)
    }
}

/// A beer count in the closed range 1..=10.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct BeerScore(i32);

impl BeerScore {
    pub const MIN: i64 = 1;
    pub const MAX: i64 = 10;

    pub fn new(value: i64) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value as i32))
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

const CONFUSION_LABELS: [&str; 10] = [
    "Crystal Clear",
    "Easy Follow",
    "Pay Attention",
    "Some Head-Scratching",
    "Getting Weird",
    "Take Notes",
    "Rewatch Required",
    "Brain Hurts",
    "WTF Is Happening",
    "Pure Chaos",
];

const ENHANCEMENT_LABELS: [&str; 10] = [
    "Stone Sober",
    "Optional Sip",
    "Light Buzz OK",
    "Casual Drink",
    "Better With Beer",
    "Highly Recommended",
    "Essential Viewing",
    "Peak Experience",
    "Mandatory Drinking",
    "Drunk Only",
];

fn label_for(labels: &'static [&'static str; 10], beers: i32) -> &'static str {
    let idx = (beers.clamp(1, 10) - 1) as usize;
    labels[idx]
}

pub fn confusion_label(beers: i32) -> &'static str {
    label_for(&CONFUSION_LABELS, beers)
}

pub fn enhancement_label(beers: i32) -> &'static str {
    label_for(&ENHANCEMENT_LABELS, beers)
}

pub fn recommendation(confusion: i32, enhancement: i32) -> &'static str {
    match confusion + enhancement {
        ..=4 => "Perfect for sober viewing",
        5..=8 => "Light buzz optional",
        9..=12 => "A few beers recommended",
        13..=16 => "Drinking highly encouraged",
        _ => "Mandatory intoxication",
    }
}

pub fn average_beers(confusion: i32, enhancement: i32) -> i32 {
    ((confusion + enhancement) as f64 / 2.0).round() as i32
}

/// A stored rating with its tags decoded.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: String,
    pub external_id: String,
    pub confusion_beers: i32,
    pub enhancement_beers: i32,
    pub blurb: String,
    pub tags: Vec<Tag>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<beer_rating::Model> for Rating {
    fn from(row: beer_rating::Model) -> Self {
        Self {
            tags: decode_tags(&row.tags),
            id: row.id,
            external_id: row.imdb_id,
            confusion_beers: row.confusion_beers,
            enhancement_beers: row.enhancement_beers,
            blurb: row.rating_blurb,
            created_at: timestamp(row.created_at),
            updated_at: timestamp(row.updated_at),
        }
    }
}

pub fn encode_tags(tags: &[Tag]) -> String {
    let keys: Vec<&str> = tags.iter().map(|t| t.key()).collect();
    serde_json::Value::from(keys).to_string()
}

fn decode_tags(raw: &str) -> Vec<Tag> {
    let keys: Vec<String> = serde_json::from_str(raw).unwrap_or_default();
    let mut tags: Vec<Tag> = keys.iter().filter_map(|k| Tag::from_key(k)).collect();
    tags.sort();
    tags.dedup();
    tags
}

fn timestamp(secs: i64) -> Timestamp {
    Timestamp::from_second(secs).unwrap_or(Timestamp::UNIX_EPOCH)
}

/// Provider metadata for one movie, with "N/A" values already dropped.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub director: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actors: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imdb_rating: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rated: Option<String>,
}

impl From<movie_cache::Model> for MovieDetails {
    fn from(row: movie_cache::Model) -> Self {
        Self {
            title: row.title,
            year: row.year,
            poster: row.poster,
            plot: row.plot,
            director: row.director,
            actors: row.actors,
            genre: row.genre,
            runtime: row.runtime,
            imdb_rating: row.imdb_rating,
            rated: row.rated,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchItem {
    pub external_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchPage {
    pub items: Vec<SearchItem>,
    pub total: u32,
}

/// Rating joined with whatever metadata is known for it.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayRecord {
    #[serde(flatten)]
    pub rating: Rating,
    #[serde(flatten)]
    pub details: MovieDetails,
    pub confusion_label: &'static str,
    pub enhancement_label: &'static str,
    pub recommendation: &'static str,
    pub average_beers: i32,
}

impl DisplayRecord {
    pub fn new(rating: Rating, details: Option<MovieDetails>) -> Self {
        let (c, e) = (rating.confusion_beers, rating.enhancement_beers);
        Self {
            rating,
            details: details.unwrap_or_default(),
            confusion_label: confusion_label(c),
            enhancement_label: enhancement_label(e),
            recommendation: recommendation(c, e),
            average_beers: average_beers(c, e),
        }
    }

    pub fn total_beers(&self) -> i32 {
        self.rating.confusion_beers + self.rating.enhancement_beers
    }
}
