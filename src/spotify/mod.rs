//! # Spotify Integration Module
//!
//! One typed client, [`SpotifyClient`], for every call made to Spotify. Methods
//! are grouped by endpoint family, one submodule each:
//!
//! - [`auth`] - authorize URL construction and the token endpoint (code
//!   exchange, refresh, client credentials)
//! - [`tracks`] - top tracks, audio features and genre search
//! - [`playlist`] - current user profile, playlist creation, adding tracks
//!
//! The token endpoint operations are also exposed through the [`Accounts`]
//! trait. The session manager only depends on that trait, never on HTTP.
//!
//! ## Error Types
//!
//! - token endpoint calls return [`AuthError`](crate::error::AuthError)
//! - resource calls return [`ApiError`](crate::error::ApiError); a non-2xx
//!   answer becomes `ApiError::Upstream` carrying the status and body verbatim
//!
//! No call is retried here and no timeout is configured; the transport defaults
//! apply.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::{
    config::Config,
    error::{ApiError, AuthError},
    types::TokenResponse,
};

pub mod auth;
pub mod playlist;
pub mod tracks;

/// The provider's token endpoint, as seen by the session manager.
#[async_trait]
pub trait Accounts: Send + Sync {
    /// Exchanges an authorization code for an access and refresh token.
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthError>;

    /// Obtains a new access token with a refresh token.
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse, AuthError>;

    /// Obtains an app-level access token with no user context.
    async fn client_credentials(&self) -> Result<TokenResponse, AuthError>;
}

#[derive(Debug, Clone)]
pub struct SpotifyClient {
    http: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    accounts_url: String,
    api_url: String,
}

impl SpotifyClient {
    pub fn new(config: &Config) -> Self {
        Self::with_http(Client::new(), config)
    }

    pub fn with_http(http: Client, config: &Config) -> Self {
        SpotifyClient {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            accounts_url: config.accounts_url.clone(),
            api_url: config.api_url.clone(),
        }
    }

    fn api(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }
}

/// Decodes a resource API response, turning any non-2xx status into
/// [`ApiError::Upstream`] with the body left untouched.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await?;
        return Err(ApiError::Upstream { status, body });
    }

    Ok(response.json::<T>().await?)
}
