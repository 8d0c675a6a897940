use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde_json::{json, Value};

use crate::{
    cached,
    db::CacheKey,
    error::{AppError, AppResult},
    models::{
        Anime, AnimeId, ExplainQuery, ExplanationResponse, RecommendationRequest,
        RecommendationResponse, SearchRequest, SearchResponse, MAX_SEARCH_LIMIT,
    },
    services::recommendations,
};

use super::AppState;

/// Service banner
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Anime Recommendation ML Service" }))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "ml-recommendation",
        "catalog_size": state.catalog.len(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Personalised recommendations from liked/disliked titles, genres and mood
pub async fn recommend(
    State(state): State<AppState>,
    payload: Result<Json<RecommendationRequest>, JsonRejection>,
) -> AppResult<Json<RecommendationResponse>> {
    let Json(request) = payload?;

    let outcome = recommendations::get_recommendations(
        &state.catalog,
        &state.genre_space,
        state.explainer.clone(),
        &request,
    )
    .await?;

    if let Some(user_id) = request.user_id.as_deref() {
        state.preferences.put(user_id.trim(), outcome.preferences).await;
    }

    Ok(Json(outcome.response))
}

/// Free-text catalog search
pub async fn search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> AppResult<Json<SearchResponse>> {
    let Json(request) = payload?;

    let query = request.query.trim().to_string();
    let limit = request.limit;
    if query.is_empty() {
        return Err(AppError::InvalidInput("Query must not be empty".to_string()));
    }
    if limit == 0 || limit > MAX_SEARCH_LIMIT {
        return Err(AppError::InvalidInput(format!(
            "limit must be between 1 and {}",
            MAX_SEARCH_LIMIT
        )));
    }

    let lookup = {
        let state = state.clone();
        let query = query.clone();
        async move {
            let (results, total) = state.search_index.search(&state.catalog, &query, limit)?;
            Ok::<_, AppError>(SearchResponse {
                results,
                query,
                total,
            })
        }
    };

    let mut response: SearchResponse = match &state.cache {
        Some(cache) => cached!(
            cache,
            CacheKey::Search {
                query: query.clone(),
                limit,
            },
            state.search_cache_ttl,
            lookup
        )?,
        None => lookup.await?,
    };
    // Cache keys ignore case, echo this request's text
    response.query = query;

    tracing::info!(
        query = %response.query,
        returned = response.results.len(),
        total = response.total,
        "Search completed"
    );

    Ok(Json(response))
}

/// Explains why one title would suit the user
pub async fn explain(
    State(state): State<AppState>,
    Path(anime_id): Path<String>,
    params: Result<Query<ExplainQuery>, QueryRejection>,
) -> AppResult<Json<ExplanationResponse>> {
    let Query(params) = params?;

    let user_id = params
        .user_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());
    let preferences = match &user_id {
        Some(id) => state.preferences.get(id).await,
        None => None,
    };

    let response = recommendations::explain_anime(
        &state.catalog,
        state.explainer.as_ref(),
        &AnimeId::new(anime_id),
        user_id,
        preferences,
    )
    .await?;

    Ok(Json(response))
}

pub async fn get_anime(
    State(state): State<AppState>,
    Path(anime_id): Path<String>,
) -> AppResult<Json<Anime>> {
    let anime = state
        .catalog
        .get(&AnimeId::new(anime_id.as_str()))
        .ok_or_else(|| AppError::NotFound(format!("Anime {} not found", anime_id)))?;

    Ok(Json(anime.clone()))
}

/// Genre vocabulary of the loaded catalog
pub async fn list_genres(State(state): State<AppState>) -> Json<Value> {
    let genres = state.catalog.genres();
    Json(json!({ "total": genres.len(), "genres": genres }))
}
