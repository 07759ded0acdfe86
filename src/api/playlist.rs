use axum::{Extension, Json, extract::rejection::JsonRejection, http::StatusCode};
use chrono::Utc;

use crate::{
    api::require_token,
    error::ApiError,
    server::AppState,
    success,
    types::{CreatePlaylistRequest, NewPlaylist, PlaylistCreated},
    utils, warning,
};

/// Materializes a list of track URIs as a new playlist of the current user.
pub async fn create_playlist(
    Extension(state): Extension<AppState>,
    body: Result<Json<NewPlaylist>, JsonRejection>,
) -> Result<(StatusCode, Json<PlaylistCreated>), ApiError> {
    let token = require_token(&state).await?;
    let Json(body) = body?;

    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::BadRequest("playlist name must not be empty".to_string()));
    }
    let uris = utils::dedup_uris(&body.track_uris);

    let user = state
        .spotify
        .current_user(&token)
        .await
        .inspect_err(|e| warning!("Fetching the current user failed: {}", e))?;

    let request = CreatePlaylistRequest {
        name,
        description: body.description.unwrap_or_else(|| {
            format!("Recommendations from {}", Utc::now().format("%Y-%m-%d"))
        }),
        public: body.public,
    };
    let playlist = state
        .spotify
        .create_playlist(&token, &user.id, &request)
        .await
        .inspect_err(|e| warning!("Creating playlist '{}' failed: {}", request.name, e))?;

    state
        .spotify
        .add_tracks(&token, &playlist.id, &uris)
        .await
        .inspect_err(|e| warning!("Adding tracks to playlist {} failed: {}", playlist.id, e))?;

    success!("Created playlist '{}' with {} tracks", playlist.name, uris.len());
    Ok((
        StatusCode::CREATED,
        Json(PlaylistCreated {
            id: playlist.id,
            name: playlist.name,
            track_count: uris.len(),
        }),
    ))
}
