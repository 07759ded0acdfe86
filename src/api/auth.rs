use axum::{
    Extension, Json,
    extract::Query,
    response::{Html, IntoResponse, Response},
};

use crate::{
    api::found,
    error::{ApiError, AuthError},
    server::AppState,
    types::{CallbackParams, ClientTokenResponse, SessionSnapshot},
};

pub async fn login(Extension(state): Extension<AppState>) -> Response {
    let url = state
        .spotify
        .authorize_url(state.config.scopes.as_slice(), state.config.show_dialog);
    found(&url)
}

/// Redirect target of the authorize page.
///
/// Failures are rendered as a `200` text body carrying the error, so the user
/// sees what went wrong in the browser tab the provider sent them back to.
pub async fn callback(
    Query(params): Query<CallbackParams>,
    Extension(state): Extension<AppState>,
) -> Response {
    let result = state
        .session
        .handle_callback(params.code.as_deref(), params.error.as_deref())
        .await;

    match result {
        Ok(()) => match &state.config.post_login_redirect {
            Some(location) => found(location),
            None => Html("<h2>Authentication successful.</h2><p>You can close this window.</p>")
                .into_response(),
        },
        Err(AuthError::Provider(error)) => format!("Callback Error: {error}").into_response(),
        Err(e) => format!("Error getting Tokens: {e}").into_response(),
    }
}

pub async fn client_token(
    Extension(state): Extension<AppState>,
) -> Result<Json<ClientTokenResponse>, ApiError> {
    let token = state.session.client_credentials_grant().await?;
    Ok(Json(ClientTokenResponse {
        access_token: token.access_token,
        expires_in: token.expires_in,
    }))
}

pub async fn session(Extension(state): Extension<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot().await)
}
