use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::HeaderMap,
    routing::get,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    AppState,
    auth::{AdminActor, check_refresh_secret},
    browse::{self, BrowseFilter, BrowseQuery, Highlights},
    combine,
    error::{AppError, AppResult},
    models::{DisplayRecord, MovieDetails, Rating, Tag},
    ratings::{CreateRatingRequest, UpdateRatingRequest},
    refresh::RefreshSummary,
};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/api/movies",
            get(list_movies).post(create_movie).put(update_movie).delete(delete_movie),
        )
        .route("/api/movies/search", get(search_movies))
        .route("/api/movies/highlights", get(highlights))
        .route("/api/movies/{external_id}", get(movie_detail))
        .route("/api/preview/{external_id}", get(preview))
        .route("/api/tags", get(tags))
        .route("/api/refresh-cache", get(refresh_cache).post(refresh_cache))
        .with_state(state)
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload.map(|Json(v)| v).map_err(|rejection| AppError::Validation(rejection.body_text()))
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> AppResult<T> {
    params.map(|Query(v)| v).map_err(|rejection| AppError::Validation(rejection.body_text()))
}

pub async fn list_movies(
    State(state): State<Arc<AppState>>,
    params: Result<Query<BrowseQuery>, QueryRejection>,
) -> AppResult<Json<Vec<DisplayRecord>>> {
    let filter = BrowseFilter::try_from(query(params)?)?;
    let records = combine::list(&state.ratings, &state.cache).await?;
    Ok(Json(browse::apply(records, &filter)))
}

pub async fn highlights(State(state): State<Arc<AppState>>) -> AppResult<Json<Highlights>> {
    let records = combine::list(&state.ratings, &state.cache).await?;
    Ok(Json(browse::highlights(&records)))
}

pub async fn create_movie(
    State(state): State<Arc<AppState>>,
    _admin: AdminActor,
    payload: Result<Json<CreateRatingRequest>, JsonRejection>,
) -> AppResult<Json<Rating>> {
    let new = body(payload)?.validate()?;
    Ok(Json(state.ratings.create(new).await?))
}

pub async fn update_movie(
    State(state): State<Arc<AppState>>,
    _admin: AdminActor,
    payload: Result<Json<UpdateRatingRequest>, JsonRejection>,
) -> AppResult<Json<Rating>> {
    let (id, changes) = body(payload)?.validate()?;
    Ok(Json(state.ratings.update(&id, changes).await?))
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    id: Option<String>,
}

pub async fn delete_movie(
    State(state): State<Arc<AppState>>,
    _admin: AdminActor,
    params: Result<Query<DeleteQuery>, QueryRejection>,
) -> AppResult<Json<Value>> {
    let id = query(params)?.id.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let Some(id) = id else {
        return Err(AppError::Validation("Missing id".to_string()));
    };
    state.ratings.delete(&id).await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    q: Option<String>,
    page: Option<u32>,
}

pub async fn search_movies(
    State(state): State<Arc<AppState>>,
    params: Result<Query<SearchQuery>, QueryRejection>,
) -> AppResult<Json<Value>> {
    let q = query(params)?;
    let text = q.q.as_deref().map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return Ok(Json(json!({ "results": [], "total": 0, "error": "No query provided" })));
    }

    let found =
        combine::search(&state.ratings, &*state.provider, text, q.page.unwrap_or(1)).await?;
    Ok(Json(serde_json::to_value(found)?))
}

pub async fn movie_detail(
    State(state): State<Arc<AppState>>,
    Path(external_id): Path<String>,
) -> AppResult<Json<DisplayRecord>> {
    combine::detail(&state.ratings, &state.cache, &*state.provider, &external_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No rating for {external_id}")))
}

/// Provider lookup for the admin form; never touches either store.
pub async fn preview(
    State(state): State<Arc<AppState>>,
    _admin: AdminActor,
    Path(external_id): Path<String>,
) -> AppResult<Json<MovieDetails>> {
    state
        .provider
        .fetch_by_id(&external_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Movie {external_id} not found")))
}

pub async fn tags() -> Json<Value> {
    let tags: Vec<Value> =
        Tag::ALL.iter().map(|t| json!({ "key": t.key(), "label": t.label() })).collect();
    Json(Value::from(tags))
}

pub async fn refresh_cache(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Json<RefreshSummary>> {
    check_refresh_secret(state.config.refresh_secret.as_deref(), &headers)?;
    Ok(Json(state.refresh.run().await?))
}
