use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, post},
};
use tokio::net::TcpListener;

use crate::{
    Res, api,
    config::{Config, GrantFlow},
    info,
    management::SessionManager,
    prediction::PredictionClient,
    spotify::SpotifyClient,
};

/// Everything the handlers share. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session: Arc<SessionManager>,
    pub spotify: Arc<SpotifyClient>,
    pub prediction: Option<Arc<PredictionClient>>,
}

impl AppState {
    /// Wires the provider client, the session manager and the optional
    /// prediction client from the configuration.
    pub fn new(config: Config) -> Self {
        let spotify = Arc::new(SpotifyClient::new(&config));
        let session = Arc::new(SessionManager::new(
            spotify.clone(),
            config.max_refresh_failures,
        ));
        let prediction = config
            .model_service_url
            .as_ref()
            .map(|url| Arc::new(PredictionClient::new(url.as_str())));

        AppState {
            config: Arc::new(config),
            session,
            spotify,
            prediction,
        }
    }
}

/// Builds the router for the configured grant flow.
///
/// `/login` and `/callback` exist only for the authorization-code flow,
/// `/spotify/token` only for the client-credentials flow.
pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/", get(api::root))
        .route("/health", get(api::health))
        .route("/session", get(api::session))
        .route("/recommendations", get(api::recommendations))
        .route("/recommendations/genre", get(api::genre_recommendations))
        .route("/recommendations/model", get(api::model_recommendations))
        .route("/playlists", post(api::create_playlist));

    let router = match state.config.grant_flow {
        GrantFlow::AuthorizationCode => router
            .route("/login", get(api::login))
            .route("/callback", get(api::callback)),
        GrantFlow::ClientCredentials => router.route("/spotify/token", get(api::client_token)),
    };

    router.layer(Extension(state))
}

pub async fn start_api_server(state: AppState) -> Res<()> {
    let addr = state.config.server_addr();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server is running on http://{}", listener.local_addr()?);
    if state.config.grant_flow == GrantFlow::AuthorizationCode {
        info!("Log in at http://{}/login", listener.local_addr()?);
    }

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
