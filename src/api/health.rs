use axum::response::Json;
use serde_json::{Value, json};

pub async fn root() -> &'static str {
    "Backend running"
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
