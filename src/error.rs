use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failures of the authorization layer: the callback and every token request.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The provider redirected back with an `error` parameter, e.g. the user
    /// denied consent.
    #[error("{0}")]
    Provider(String),

    #[error("missing authorization code")]
    MissingCode,

    #[error("token request rejected with status {status}: {body}")]
    TokenRejected { status: StatusCode, body: String },

    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed token response: {0}")]
    MalformedToken(#[from] serde_json::Error),
}

/// Errors surfaced by the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("User not authenticated")]
    Unauthenticated,

    /// A resource call to the provider (or the prediction service) answered
    /// with a non-2xx status. Status and body are relayed to the caller as is.
    #[error("upstream request failed with status {status}")]
    Upstream { status: StatusCode, body: String },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    BadRequest(String),

    #[error("prediction service is not configured")]
    PredictionUnavailable,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Upstream { status, .. } => *status,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PredictionUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Auth(_) | Self::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            Self::Upstream { body, .. } => {
                let content_type = if serde_json::from_str::<serde_json::Value>(&body).is_ok() {
                    "application/json"
                } else {
                    "text/plain; charset=utf-8"
                };
                (status, [(header::CONTENT_TYPE, content_type)], body).into_response()
            }
            other => (status, Json(json!({ "error": other.to_string() }))).into_response(),
        }
    }
}
