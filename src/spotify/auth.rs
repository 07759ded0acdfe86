use async_trait::async_trait;
use url::Url;

use crate::{
    error::AuthError,
    spotify::{Accounts, SpotifyClient},
    types::TokenResponse,
    utils,
};

impl SpotifyClient {
    /// Builds the URL of Spotify's authorize page.
    ///
    /// The query carries the client id, `response_type=code`, the redirect URI
    /// and the requested scopes, space-joined with every distinct scope once in
    /// order of first appearance. With `show_dialog` the user is asked for
    /// consent again even if it was granted before.
    ///
    /// Scope names are not validated; Spotify rejects unknown ones on its page.
    ///
    /// # Example
    ///
    /// ```
    /// let url = client.authorize_url(&["user-top-read"], true);
    /// // https://accounts.spotify.com/authorize?client_id=...&scope=user-top-read&show_dialog=true
    /// ```
    pub fn authorize_url<S: AsRef<str>>(&self, scopes: &[S], show_dialog: bool) -> String {
        let scope = utils::join_scopes(scopes);
        let mut params = vec![
            ("client_id", self.client_id.as_str()),
            ("response_type", "code"),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("scope", scope.as_str()),
        ];
        if show_dialog {
            params.push(("show_dialog", "true"));
        }

        let base = format!("{}/authorize", self.accounts_url);
        match Url::parse_with_params(&base, &params) {
            Ok(url) => url.to_string(),
            // accounts_url is not an absolute URL; fall back to plain concatenation
            Err(_) => {
                let query = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(&params)
                    .finish();
                format!("{base}?{query}")
            }
        }
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let res = self
            .http
            .post(format!("{}/api/token", self.accounts_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            return Err(AuthError::TokenRejected { status, body });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl Accounts for SpotifyClient {
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ])
        .await
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn client_credentials(&self) -> Result<TokenResponse, AuthError> {
        self.token_request(&[("grant_type", "client_credentials")]).await
    }
}
