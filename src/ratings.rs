use std::collections::HashMap;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr,
};
use serde::Deserialize;
use tracing::info;

use crate::{
    cache::now_sec,
    entities::beer_rating,
    error::{AppError, AppResult},
    models::{BeerScore, Rating, Tag, encode_tags},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRatingRequest {
    #[serde(alias = "imdb_id")]
    pub external_id: Option<String>,
    #[serde(alias = "confusion_beers")]
    pub confusion_beers: Option<i64>,
    #[serde(alias = "enhancement_beers")]
    pub enhancement_beers: Option<i64>,
    #[serde(alias = "rating_blurb")]
    pub blurb: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRatingRequest {
    pub id: Option<String>,
    #[serde(alias = "confusion_beers")]
    pub confusion_beers: Option<i64>,
    #[serde(alias = "enhancement_beers")]
    pub enhancement_beers: Option<i64>,
    #[serde(alias = "rating_blurb")]
    pub blurb: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewRating {
    pub external_id: String,
    pub confusion: BeerScore,
    pub enhancement: BeerScore,
    pub blurb: String,
    pub tags: Vec<Tag>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RatingChanges {
    pub confusion: BeerScore,
    pub enhancement: BeerScore,
    pub blurb: Option<String>,
    pub tags: Option<Vec<Tag>>,
}

impl CreateRatingRequest {
    pub fn validate(self) -> AppResult<NewRating> {
        let external_id = self.external_id.map(|s| s.trim().to_string()).unwrap_or_default();
        let (Some(confusion), Some(enhancement)) = (self.confusion_beers, self.enhancement_beers)
        else {
            return Err(missing_fields());
        };
        if external_id.is_empty() {
            return Err(missing_fields());
        }

        Ok(NewRating {
            external_id,
            confusion: score("confusionBeers", confusion)?,
            enhancement: score("enhancementBeers", enhancement)?,
            blurb: self.blurb.unwrap_or_default(),
            tags: parse_tags(self.tags.unwrap_or_default())?,
        })
    }
}

impl UpdateRatingRequest {
    pub fn validate(self) -> AppResult<(String, RatingChanges)> {
        let id = self.id.map(|s| s.trim().to_string()).unwrap_or_default();
        if id.is_empty() {
            return Err(AppError::Validation("Missing id".to_string()));
        }
        let (Some(confusion), Some(enhancement)) = (self.confusion_beers, self.enhancement_beers)
        else {
            return Err(missing_fields());
        };

        let changes = RatingChanges {
            confusion: score("confusionBeers", confusion)?,
            enhancement: score("enhancementBeers", enhancement)?,
            blurb: self.blurb,
            tags: self.tags.map(parse_tags).transpose()?,
        };
        Ok((id, changes))
    }
}

fn missing_fields() -> AppError {
    AppError::Validation("Missing required fields".to_string())
}

fn score(field: &str, value: i64) -> AppResult<BeerScore> {
    BeerScore::new(value).ok_or_else(|| {
        AppError::Validation(format!(
            "{field} must be between {} and {}",
            BeerScore::MIN,
            BeerScore::MAX
        ))
    })
}

fn parse_tags(keys: Vec<String>) -> AppResult<Vec<Tag>> {
    let mut tags = keys
        .iter()
        .map(|k| Tag::from_key(k).ok_or_else(|| AppError::Validation(format!("Unknown tag: {k}"))))
        .collect::<AppResult<Vec<_>>>()?;
    tags.sort();
    tags.dedup();
    Ok(tags)
}

#[derive(Clone)]
pub struct RatingStore {
    db: DatabaseConnection,
}

impl RatingStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// All ratings, newest first.
    pub async fn list(&self) -> AppResult<Vec<Rating>> {
        let rows = beer_rating::Entity::find()
            .order_by_desc(beer_rating::Column::CreatedAt)
            .order_by_desc(beer_rating::Column::Id)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Rating::from).collect())
    }

    pub async fn get_by_external_id(&self, external_id: &str) -> AppResult<Option<Rating>> {
        let row = beer_rating::Entity::find()
            .filter(beer_rating::Column::ImdbId.eq(external_id))
            .one(&self.db)
            .await?;
        Ok(row.map(Rating::from))
    }

    pub async fn external_ids(&self) -> AppResult<Vec<String>> {
        let ids: Vec<String> = beer_rating::Entity::find()
            .select_only()
            .column(beer_rating::Column::ImdbId)
            .distinct()
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(ids)
    }

    /// Ratings keyed by external id, restricted to `external_ids`.
    pub async fn rated_among(&self, external_ids: &[String]) -> AppResult<HashMap<String, Rating>> {
        if external_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = beer_rating::Entity::find()
            .filter(beer_rating::Column::ImdbId.is_in(external_ids.iter().cloned()))
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(|row| (row.imdb_id.clone(), Rating::from(row))).collect())
    }

    pub async fn create(&self, new: NewRating) -> AppResult<Rating> {
        let now = now_sec();
        let model = beer_rating::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            imdb_id: Set(new.external_id.clone()),
            confusion_beers: Set(new.confusion.get()),
            enhancement_beers: Set(new.enhancement.get()),
            rating_blurb: Set(new.blurb),
            tags: Set(encode_tags(&new.tags)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let row = model.insert(&self.db).await.map_err(|err| match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                AppError::Conflict(format!("Rating already exists for {}", new.external_id))
            },
            _ => AppError::Store(err),
        })?;

        info!(external_id = %row.imdb_id, id = %row.id, "rating created");
        Ok(row.into())
    }

    pub async fn update(&self, id: &str, changes: RatingChanges) -> AppResult<Rating> {
        let Some(row) = beer_rating::Entity::find_by_id(id.to_string()).one(&self.db).await? else {
            return Err(AppError::NotFound(format!("Rating {id} not found")));
        };

        let mut model = row.into_active_model();
        model.confusion_beers = Set(changes.confusion.get());
        model.enhancement_beers = Set(changes.enhancement.get());
        if let Some(blurb) = changes.blurb {
            model.rating_blurb = Set(blurb);
        }
        if let Some(tags) = changes.tags {
            model.tags = Set(encode_tags(&tags));
        }
        model.updated_at = Set(now_sec());

        let row = model.update(&self.db).await?;
        info!(external_id = %row.imdb_id, id = %row.id, "rating updated");
        Ok(row.into())
    }

    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let result = beer_rating::Entity::delete_by_id(id.to_string()).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Rating {id} not found")));
        }
        info!(id = %id, "rating deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn create_req(external_id: Option<&str>, c: Option<i64>, e: Option<i64>) -> CreateRatingRequest {
        CreateRatingRequest {
            external_id: external_id.map(str::to_string),
            confusion_beers: c,
            enhancement_beers: e,
            blurb: None,
            tags: None,
        }
    }

    #[test]
    fn create_requires_all_fields() {
        for req in [
            create_req(None, Some(5), Some(5)),
            create_req(Some("  "), Some(5), Some(5)),
            create_req(Some("tt0390384"), None, Some(5)),
            create_req(Some("tt0390384"), Some(5), None),
        ] {
            let err = req.validate().unwrap_err();
            assert!(matches!(err, AppError::Validation(ref m) if m == "Missing required fields"));
        }
    }

    #[test]
    fn scores_outside_range_are_rejected() {
        let err = create_req(Some("tt0390384"), Some(0), Some(5)).validate().unwrap_err();
        assert_eq!(err.to_string(), "confusionBeers must be between 1 and 10");
        let err = create_req(Some("tt0390384"), Some(5), Some(11)).validate().unwrap_err();
        assert_eq!(err.to_string(), "enhancementBeers must be between 1 and 10");
    }

    #[test]
    fn unknown_tags_are_rejected_and_known_ones_normalised() {
        let mut req = create_req(Some("tt0390384"), Some(10), Some(4));
        req.tags = Some(vec!["sci_fi".into(), "cult_classic".into(), "sci_fi".into()]);
        assert_eq!(req.validate().unwrap().tags, vec![Tag::CultClassic, Tag::SciFi]);

        let mut req = create_req(Some("tt0390384"), Some(10), Some(4));
        req.tags = Some(vec!["musical".into()]);
        assert_eq!(req.validate().unwrap_err().to_string(), "Unknown tag: musical");
    }

    #[test]
    fn update_requires_id() {
        let req = UpdateRatingRequest {
            id: None,
            confusion_beers: Some(3),
            enhancement_beers: Some(3),
            blurb: None,
            tags: None,
        };
        assert_eq!(req.validate().unwrap_err().to_string(), "Missing id");
    }

    #[tokio::test]
    async fn crud_round_trip() {
        let store = RatingStore::new(db::memory().await);

        let new = create_req(Some("tt0390384"), Some(10), Some(4)).validate().unwrap();
        let created = store.create(new.clone()).await.unwrap();
        assert_eq!(created.external_id, "tt0390384");
        assert_eq!(created.confusion_beers, 10);

        let dup = store.create(new).await.unwrap_err();
        assert!(matches!(dup, AppError::Conflict(_)));

        let changes = RatingChanges {
            confusion: BeerScore::new(9).unwrap(),
            enhancement: BeerScore::new(5).unwrap(),
            blurb: Some("bring a notebook".into()),
            tags: Some(vec![Tag::SciFi]),
        };
        let updated = store.update(&created.id, changes).await.unwrap();
        assert_eq!(updated.confusion_beers, 9);
        assert_eq!(updated.blurb, "bring a notebook");
        assert_eq!(updated.tags, vec![Tag::SciFi]);

        assert_eq!(store.external_ids().await.unwrap(), vec!["tt0390384".to_string()]);
        assert!(store.get_by_external_id("tt0390384").await.unwrap().is_some());

        store.delete(&created.id).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
        assert!(matches!(store.delete(&created.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn update_of_missing_rating_is_not_found() {
        let store = RatingStore::new(db::memory().await);
        let changes = RatingChanges {
            confusion: BeerScore::new(1).unwrap(),
            enhancement: BeerScore::new(1).unwrap(),
            blurb: None,
            tags: None,
        };
        assert!(matches!(store.update("nope", changes).await, Err(AppError::NotFound(_))));
    }
}
