//! # API Module
//!
//! HTTP handlers of the recommendation backend. Every handler receives the
//! shared [`AppState`](crate::server::AppState) through an axum `Extension`.
//!
//! ## Endpoints
//!
//! ### Authentication
//!
//! - [`login`] - redirects the browser to Spotify's authorize page
//! - [`callback`] - completes the authorization-code exchange
//! - [`client_token`] - obtains an app-level token (client-credentials flow)
//! - [`session`] - reports the session state without exposing token values
//!
//! ### Recommendations
//!
//! - [`recommendations`] - top tracks together with their audio features
//! - [`genre_recommendations`] - random sample of tracks found by genre
//! - [`model_recommendations`] - recommendations from the prediction service
//! - [`create_playlist`] - stores a list of tracks as a new playlist
//!
//! ### Monitoring
//!
//! - [`root`] and [`health`] - liveness
//!
//! Every recommendation endpoint answers `401 {"error": ...}` while no access
//! token is available, and relays the status and body of a failed Spotify call.

mod auth;
mod health;
mod playlist;
mod recommendations;

pub use auth::{callback, client_token, login, session};
pub use health::{health, root};
pub use playlist::create_playlist;
pub use recommendations::{genre_recommendations, model_recommendations, recommendations};

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::{error::ApiError, server::AppState};

/// `302 Found` redirect to `location`.
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

pub(crate) async fn require_token(state: &AppState) -> Result<String, ApiError> {
    state
        .session
        .get_access_token()
        .await
        .ok_or(ApiError::Unauthenticated)
}
