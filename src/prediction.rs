//! Client for the external recommendation model.
//!
//! The model service exposes a single endpoint, `POST /predict`, taking
//! `{"track_uris": [...]}` and answering `{"recommendations": [...]}` with
//! track URIs. What the model does with the seeds is opaque to this crate.

use reqwest::Client;

use crate::{
    error::ApiError,
    spotify::read_json,
    types::{PredictRequest, PredictResponse},
};

#[derive(Debug, Clone)]
pub struct PredictionClient {
    http: Client,
    base_url: String,
}

impl PredictionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http(Client::new(), base_url)
    }

    pub fn with_http(http: Client, base_url: impl Into<String>) -> Self {
        PredictionClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn predict(&self, track_uris: &[String]) -> Result<Vec<String>, ApiError> {
        let response = self
            .http
            .post(format!("{}/predict", self.base_url))
            .json(&PredictRequest {
                track_uris: track_uris.to_vec(),
            })
            .send()
            .await?;

        let res: PredictResponse = read_json(response).await?;
        Ok(res.recommendations)
    }
}
