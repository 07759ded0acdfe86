use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    body::{Body, Bytes, to_bytes},
    extract::{Form, Path, Query, State},
    http::{HeaderMap, Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::{Value, json};
use spotrec::{
    config::Config,
    server::{AppState, build_router},
};
use tokio::net::TcpListener;
use tower::ServiceExt;

const CLIENT_ID: &str = "test-client";
const CLIENT_SECRET: &str = "test-secret";
const FORBIDDEN_BODY: &str = r#"{"error":{"status":403,"message":"Insufficient client scope"}}"#;

/// Stand-in for both Spotify (accounts and Web API) and the prediction service.
#[derive(Default)]
struct MockProvider {
    token_calls: AtomicUsize,
    refresh_tokens: Mutex<Vec<String>>,
    /// One entry per add-tracks request, in arrival order.
    added_batches: Mutex<Vec<Vec<String>>>,
    predict_calls: AtomicUsize,
    predict_seeds: Mutex<Vec<String>>,
}

impl MockProvider {
    fn added_uris(&self) -> Vec<String> {
        self.added_batches.lock().unwrap().concat()
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn track(id: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Track {id}"),
        "uri": format!("spotify:track:{id}"),
        "popularity": 50
    })
}

async fn token_endpoint(
    State(mock): State<Arc<MockProvider>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    mock.token_calls.fetch_add(1, Ordering::SeqCst);

    let expected = format!("Basic {}", STANDARD.encode(format!("{CLIENT_ID}:{CLIENT_SECRET}")));
    if headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) != Some(expected.as_str()) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "invalid_client" }))).into_response();
    }

    let code = form.get("code").map(String::as_str);
    match (form.get("grant_type").map(String::as_str), code) {
        (Some("authorization_code"), Some("abc123")) => Json(json!({
            "access_token": "AT1",
            "refresh_token": "RT1",
            "expires_in": 3600,
            "token_type": "Bearer",
            "scope": "user-top-read"
        }))
        .into_response(),
        (Some("authorization_code"), Some("limited")) => Json(json!({
            "access_token": "AT-LIMITED",
            "refresh_token": "RT-LIMITED",
            "expires_in": 3600
        }))
        .into_response(),
        (Some("authorization_code"), Some("short-lived")) => Json(json!({
            "access_token": "AT-SHORT",
            "refresh_token": "RT-SHORT",
            "expires_in": 2
        }))
        .into_response(),
        (Some("authorization_code"), Some("no-history")) => Json(json!({
            "access_token": "AT-EMPTY",
            "refresh_token": "RT-EMPTY",
            "expires_in": 3600
        }))
        .into_response(),
        (Some("refresh_token"), None) => {
            let Some(refresh_token) = form.get("refresh_token") else {
                return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid_request" }))).into_response();
            };
            mock.refresh_tokens.lock().unwrap().push(refresh_token.clone());
            if refresh_token != "RT-SHORT" {
                return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid_grant" }))).into_response();
            }
            Json(json!({
                "access_token": "AT-REFRESHED",
                "token_type": "Bearer",
                "expires_in": 3600
            }))
            .into_response()
        }
        (Some("client_credentials"), _) => Json(json!({
            "access_token": "APP1",
            "token_type": "Bearer",
            "expires_in": 3600
        }))
        .into_response(),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant", "error_description": "Invalid authorization code" })),
        )
            .into_response(),
    }
}

async fn top_tracks(headers: HeaderMap) -> Response {
    match bearer(&headers).as_deref() {
        Some("AT1" | "AT-REFRESHED") => {
            Json(json!({ "items": [track("t1"), track("t2")] })).into_response()
        }
        Some("AT-EMPTY") => Json(json!({ "items": [] })).into_response(),
        _ => (
            StatusCode::FORBIDDEN,
            [(header::CONTENT_TYPE, "application/json")],
            FORBIDDEN_BODY,
        )
            .into_response(),
    }
}

async fn audio_features(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    let features: Vec<Value> = query
        .get("ids")
        .map(|ids| ids.split(',').map(|id| json!({ "id": id, "danceability": 0.5 })).collect())
        .unwrap_or_default();
    Json(json!({ "audio_features": features }))
}

async fn search(Query(query): Query<HashMap<String, String>>) -> Response {
    if query.get("q").map(String::as_str) != Some("genre:\"rock\"")
        || query.get("type").map(String::as_str) != Some("track")
    {
        return StatusCode::BAD_REQUEST.into_response();
    }
    Json(json!({
        "tracks": {
            "items": [track("r1"), track("r2"), track("r1"), track("r3"), track("r2")],
            "total": 5
        }
    }))
    .into_response()
}

async fn me() -> Json<Value> {
    Json(json!({ "id": "user-1", "display_name": "Test User" }))
}

async fn create_playlist(Path(user_id): Path<String>, Json(body): Json<Value>) -> Response {
    assert_eq!(user_id, "user-1");
    (
        StatusCode::CREATED,
        Json(json!({ "id": "pl-1", "name": body["name"] })),
    )
        .into_response()
}

async fn add_tracks(
    State(mock): State<Arc<MockProvider>>,
    Path(playlist_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    assert_eq!(playlist_id, "pl-1");
    let uris: Vec<String> = serde_json::from_value(body["uris"].clone()).unwrap();
    mock.added_batches.lock().unwrap().push(uris);
    (StatusCode::CREATED, Json(json!({ "snapshot_id": "snap-1" }))).into_response()
}

async fn predict(State(mock): State<Arc<MockProvider>>, Json(body): Json<Value>) -> Json<Value> {
    mock.predict_calls.fetch_add(1, Ordering::SeqCst);
    let seeds: Vec<String> = serde_json::from_value(body["track_uris"].clone()).unwrap();
    *mock.predict_seeds.lock().unwrap() = seeds;
    Json(json!({
        "recommendations": [
            "spotify:track:4iV5W9uYEdYUVa79Axb7Rh",
            "spotify:track:1BxfuYhYUQhGUa7b1A2u62",
            "spotify:track:4iV5W9uYEdYUVa79Axb7Rh"
        ]
    }))
}

async fn spawn_provider() -> (String, Arc<MockProvider>) {
    let mock = Arc::new(MockProvider::default());
    let app = Router::new()
        .route("/api/token", post(token_endpoint))
        .route("/v1/me", get(me))
        .route("/v1/me/top/tracks", get(top_tracks))
        .route("/v1/audio-features", get(audio_features))
        .route("/v1/search", get(search))
        .route("/v1/users/{user_id}/playlists", post(create_playlist))
        .route("/v1/playlists/{playlist_id}/tracks", post(add_tracks))
        .route("/predict", post(predict))
        .with_state(mock.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), mock)
}

fn config(base: &str, overrides: &[(&str, &str)]) -> Config {
    let mut env: HashMap<String, String> = [
        ("SPOTIFY_CLIENT_ID", CLIENT_ID.to_string()),
        ("SPOTIFY_CLIENT_SECRET", CLIENT_SECRET.to_string()),
        ("SPOTIFY_REDIRECT_URI", "http://127.0.0.1:3000/callback".to_string()),
        ("SPOTIFY_ACCOUNTS_URL", base.to_string()),
        ("SPOTIFY_API_URL", format!("{base}/v1")),
        ("MODEL_SERVICE_URL", base.to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    for (k, v) in overrides {
        env.insert(k.to_string(), v.to_string());
    }

    Config::from_lookup(|key| env.get(key).cloned()).unwrap()
}

async fn setup(overrides: &[(&str, &str)]) -> (Router, Arc<MockProvider>, String) {
    let (base, mock) = spawn_provider().await;
    let app = build_router(AppState::new(config(&base, overrides)));
    (app, mock, base)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body)
}

async fn get_uri(app: &Router, uri: &str) -> (StatusCode, HeaderMap, Bytes) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(app: &Router, uri: &str, body: String) -> (StatusCode, HeaderMap, Bytes) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

fn json_body(body: &Bytes) -> Value {
    serde_json::from_slice(body).unwrap()
}

async fn login(app: &Router, code: &str) {
    let (status, headers, _) = get_uri(app, &format!("/callback?code={code}")).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(headers[header::LOCATION], "/recommendations");
}

#[tokio::test]
async fn root_reports_liveness() {
    let (app, _, _) = setup(&[]).await;

    let (status, _, body) = get_uri(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Backend running");

    let (status, _, body) = get_uri(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["status"], "ok");
}

#[tokio::test]
async fn login_redirects_to_the_authorize_page() {
    let (app, mock, base) = setup(&[]).await;

    let (status, headers, _) = get_uri(&app, "/login").await;

    assert_eq!(status, StatusCode::FOUND);
    let location = headers[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with(&format!("{base}/authorize?")));

    let url = url::Url::parse(location).unwrap();
    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
    assert_eq!(params["client_id"], CLIENT_ID);
    assert_eq!(params["redirect_uri"], "http://127.0.0.1:3000/callback");
    assert_eq!(params["response_type"], "code");
    assert_eq!(params["show_dialog"], "true");
    assert!(params["scope"].split(' ').any(|s| s == "user-top-read"));
    assert_eq!(mock.token_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn callback_error_is_shown_without_exchange() {
    let (app, mock, _) = setup(&[]).await;

    let (status, _, body) = get_uri(&app, "/callback?error=access_denied").await;

    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8_lossy(&body).contains("access_denied"));
    assert_eq!(mock.token_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn protected_route_requires_login() {
    let (app, _, _) = setup(&[]).await;

    for uri in [
        "/recommendations",
        "/recommendations/genre?genre=rock",
        "/recommendations/model",
    ] {
        let (status, _, body) = get_uri(&app, uri).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert!(json_body(&body).get("error").is_some(), "{uri}");
    }
}

#[tokio::test]
async fn login_then_recommendations_use_the_new_token() {
    let (app, mock, _) = setup(&[]).await;

    login(&app, "abc123").await;
    assert_eq!(mock.token_calls.load(Ordering::SeqCst), 1);

    let (status, _, body) = get_uri(&app, "/recommendations").await;
    assert_eq!(status, StatusCode::OK);

    let value = json_body(&body);
    let ids: Vec<&str> = value["topTracks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["t1", "t2"]);
    assert_eq!(value["topTracks"][0]["popularity"], 50);
    assert_eq!(value["audioFeatures"].as_array().unwrap().len(), 2);
    assert_eq!(value["audioFeatures"][1]["id"], "t2");

    let (status, _, body) = get_uri(&app, "/session").await;
    assert_eq!(status, StatusCode::OK);
    let session = json_body(&body);
    assert_eq!(session["status"], "authenticated");
    assert_eq!(session["expiresIn"], 3600);
    assert_eq!(session["refreshScheduled"], true);
    assert!(session.get("accessToken").is_none());
}

#[tokio::test]
async fn failed_exchange_keeps_the_session_unauthenticated() {
    let (app, mock, _) = setup(&[]).await;

    let (status, _, body) = get_uri(&app, "/callback?code=expired-code").await;

    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("Error getting Tokens"));
    assert!(text.contains("invalid_grant"));
    assert_eq!(mock.token_calls.load(Ordering::SeqCst), 1);

    let (status, _, _) = get_uri(&app, "/recommendations").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_cycle_replaces_the_access_token() {
    let (app, mock, _) = setup(&[]).await;
    login(&app, "short-lived").await;

    // the provider does not accept the login token for resource calls
    let (status, _, _) = get_uri(&app, "/recommendations").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // expires_in of 2 seconds refreshes after one
    let mut refreshed = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if get_uri(&app, "/recommendations").await.0 == StatusCode::OK {
            refreshed = true;
            break;
        }
    }
    assert!(refreshed, "access token was never refreshed");

    let seen = mock.refresh_tokens.lock().unwrap().clone();
    assert!(!seen.is_empty());
    assert!(seen.iter().all(|t| t == "RT-SHORT"), "{seen:?}");

    let (_, _, body) = get_uri(&app, "/session").await;
    let session = json_body(&body);
    assert_eq!(session["status"], "authenticated");
    assert_eq!(session["refreshFailures"], 0);
    assert_eq!(session["refreshScheduled"], true);
}

#[tokio::test]
async fn callback_can_render_a_success_page() {
    let (app, _, _) = setup(&[("POST_LOGIN_REDIRECT", "")]).await;

    let (status, _, body) = get_uri(&app, "/callback?code=abc123").await;

    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8_lossy(&body).contains("Authentication successful"));
}

#[tokio::test]
async fn upstream_errors_are_relayed() {
    let (app, _, _) = setup(&[]).await;
    login(&app, "limited").await;

    let (status, headers, body) = get_uri(&app, "/recommendations").await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    assert_eq!(body, FORBIDDEN_BODY);
}

#[tokio::test]
async fn genre_recommendations_sample_distinct_tracks() {
    let (app, _, _) = setup(&[]).await;
    login(&app, "abc123").await;

    let (status, _, body) = get_uri(&app, "/recommendations/genre?genre=rock&limit=2").await;
    assert_eq!(status, StatusCode::OK);
    let value = json_body(&body);
    assert_eq!(value["genre"], "rock");
    let tracks = value["tracks"].as_array().unwrap();
    assert_eq!(tracks.len(), 2);
    assert_ne!(tracks[0]["id"], tracks[1]["id"]);

    let (status, _, body) = get_uri(&app, "/recommendations/genre?genre=rock&limit=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["tracks"].as_array().unwrap().len(), 3);

    let (status, _, body) = get_uri(&app, "/recommendations/genre").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json_body(&body).get("error").is_some());
}

#[tokio::test]
async fn invalid_genre_limit_is_a_json_400() {
    let (app, _, _) = setup(&[]).await;
    login(&app, "abc123").await;

    let (status, headers, body) = get_uri(&app, "/recommendations/genre?genre=rock&limit=abc").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    let error = json_body(&body)["error"].as_str().unwrap().to_string();
    assert!(error.contains("limit"), "{error}");
}

#[tokio::test]
async fn model_recommendations_are_seeded_with_top_tracks() {
    let (app, mock, _) = setup(&[]).await;
    login(&app, "abc123").await;

    let (status, _, body) = get_uri(&app, "/recommendations/model").await;

    assert_eq!(status, StatusCode::OK);
    let value = json_body(&body);
    assert_eq!(
        value["seedTracks"],
        json!(["spotify:track:t1", "spotify:track:t2"])
    );
    assert_eq!(
        value["recommendations"],
        json!([
            "spotify:track:4iV5W9uYEdYUVa79Axb7Rh",
            "spotify:track:1BxfuYhYUQhGUa7b1A2u62"
        ])
    );
    assert_eq!(
        *mock.predict_seeds.lock().unwrap(),
        vec!["spotify:track:t1", "spotify:track:t2"]
    );
}

#[tokio::test]
async fn model_recommendations_without_top_tracks_skip_the_model() {
    let (app, mock, _) = setup(&[]).await;
    login(&app, "no-history").await;

    let (status, _, body) = get_uri(&app, "/recommendations/model").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json_body(&body),
        json!({ "message": "No top tracks found for the user." })
    );
    assert_eq!(mock.predict_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn model_recommendations_need_a_configured_service() {
    let (app, _, _) = setup(&[("MODEL_SERVICE_URL", "")]).await;
    login(&app, "abc123").await;

    let (status, _, body) = get_uri(&app, "/recommendations/model").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(json_body(&body).get("error").is_some());
}

#[tokio::test]
async fn playlist_is_created_with_unique_tracks() {
    let (app, mock, _) = setup(&[]).await;
    login(&app, "abc123").await;

    let (status, _, body) = post_json(
        &app,
        "/playlists",
        json!({
            "name": "Weekly picks",
            "trackUris": ["spotify:track:a", "spotify:track:b", "spotify:track:a"]
        })
        .to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let value = json_body(&body);
    assert_eq!(value["id"], "pl-1");
    assert_eq!(value["name"], "Weekly picks");
    assert_eq!(value["trackCount"], 2);
    assert_eq!(mock.added_uris(), vec!["spotify:track:a", "spotify:track:b"]);
}

#[tokio::test]
async fn playlist_tracks_are_added_in_batches_of_100() {
    let (app, mock, _) = setup(&[]).await;
    login(&app, "abc123").await;

    let uris: Vec<String> = (0..205).map(|i| format!("spotify:track:{i:04}")).collect();
    let (status, _, body) = post_json(
        &app,
        "/playlists",
        json!({ "name": "Long list", "trackUris": uris }).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json_body(&body)["trackCount"], 205);

    let batches = mock.added_batches.lock().unwrap().clone();
    let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![100, 100, 5]);
    assert_eq!(batches.concat(), uris);
}

#[tokio::test]
async fn malformed_playlist_body_is_a_json_400() {
    let (app, mock, _) = setup(&[]).await;
    login(&app, "abc123").await;

    let (status, headers, body) = post_json(&app, "/playlists", "{\"name\": ".to_string()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    assert!(json_body(&body)["error"].is_string());

    // wrong field type
    let (status, _, body) = post_json(
        &app,
        "/playlists",
        json!({ "name": "Picks", "trackUris": "spotify:track:a" }).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json_body(&body)["error"].is_string());
    assert!(mock.added_batches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn client_credentials_flow_serves_app_tokens() {
    let (app, _, _) = setup(&[("SPOTIFY_GRANT_FLOW", "client_credentials")]).await;

    let (status, _, body) = get_uri(&app, "/spotify/token").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json_body(&body),
        json!({ "accessToken": "APP1", "expiresIn": 3600 })
    );

    let (status, _, _) = get_uri(&app, "/login").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, body) = get_uri(&app, "/session").await;
    assert_eq!(status, StatusCode::OK);
    let session = json_body(&body);
    assert_eq!(session["status"], "authenticated");
    assert_eq!(session["refreshScheduled"], false);
}

#[tokio::test]
async fn client_credentials_failure_is_a_json_500() {
    let (app, _, _) = setup(&[
        ("SPOTIFY_GRANT_FLOW", "client_credentials"),
        ("SPOTIFY_CLIENT_SECRET", "wrong-secret"),
    ])
    .await;

    let (status, _, body) = get_uri(&app, "/spotify/token").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let value = json_body(&body);
    assert!(value["error"].as_str().unwrap().contains("invalid_client"));
}
