use axum::{
    Extension, Json,
    extract::{Query, rejection::QueryRejection},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{
    api::require_token,
    error::ApiError,
    server::AppState,
    spotify::tracks::MAX_PAGE_SIZE,
    types::{GenreQuery, GenreRecommendations, ModelRecommendations, Recommendations},
    utils, warning,
};

pub const DEFAULT_GENRE_SAMPLE: usize = 20;

/// Top tracks of the user together with their audio features.
pub async fn recommendations(Extension(state): Extension<AppState>) -> Result<Response, ApiError> {
    let token = require_token(&state).await?;

    let top_tracks = state
        .spotify
        .top_tracks(&token, MAX_PAGE_SIZE)
        .await
        .inspect_err(|e| warning!("Fetching top tracks failed: {}", e))?;

    if top_tracks.is_empty() {
        return Ok(Json(json!({ "message": "No top tracks found for the user." })).into_response());
    }

    let ids: Vec<String> = top_tracks.iter().map(|t| t.id.clone()).collect();
    let audio_features = state
        .spotify
        .audio_features(&token, &ids)
        .await
        .inspect_err(|e| warning!("Fetching audio features failed: {}", e))?;

    Ok(Json(Recommendations {
        top_tracks,
        audio_features,
    })
    .into_response())
}

/// Random sample of tracks found by searching a genre.
pub async fn genre_recommendations(
    query: Result<Query<GenreQuery>, QueryRejection>,
    Extension(state): Extension<AppState>,
) -> Result<Json<GenreRecommendations>, ApiError> {
    let token = require_token(&state).await?;
    let Query(query) = query?;

    let genre = query
        .genre
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty())
        .ok_or_else(|| ApiError::BadRequest("query parameter 'genre' is required".to_string()))?;
    let amount = query
        .limit
        .unwrap_or(DEFAULT_GENRE_SAMPLE)
        .clamp(1, MAX_PAGE_SIZE);

    let found = state
        .spotify
        .search_by_genre(&token, &genre, MAX_PAGE_SIZE)
        .await
        .inspect_err(|e| warning!("Genre search for '{}' failed: {}", genre, e))?;

    let tracks = utils::sample_tracks(found, amount, &mut rand::rng());
    Ok(Json(GenreRecommendations { genre, tracks }))
}

/// Recommendations from the prediction service, seeded with the user's top
/// tracks.
pub async fn model_recommendations(
    Extension(state): Extension<AppState>,
) -> Result<Response, ApiError> {
    let token = require_token(&state).await?;
    let prediction = state
        .prediction
        .as_ref()
        .ok_or(ApiError::PredictionUnavailable)?;

    let seed_tracks: Vec<String> = state
        .spotify
        .top_tracks(&token, MAX_PAGE_SIZE)
        .await
        .inspect_err(|e| warning!("Fetching top tracks failed: {}", e))?
        .into_iter()
        .map(|t| t.uri)
        .collect();

    if seed_tracks.is_empty() {
        return Ok(Json(json!({ "message": "No top tracks found for the user." })).into_response());
    }

    let recommendations = prediction
        .predict(&seed_tracks)
        .await
        .inspect_err(|e| warning!("Prediction service call failed: {}", e))?;

    Ok(Json(ModelRecommendations {
        seed_tracks,
        recommendations: utils::dedup_uris(&recommendations),
    })
    .into_response())
}
