use serde_json::Value;

use crate::{
    error::ApiError,
    spotify::{SpotifyClient, read_json},
    types::{AudioFeaturesResponse, SearchResponse, TopTracksResponse, Track},
};

/// Upper bound Spotify accepts for `limit` on top tracks and search.
pub const MAX_PAGE_SIZE: usize = 50;

impl SpotifyClient {
    /// Retrieves the user's top tracks.
    ///
    /// Requires the `user-top-read` scope.
    pub async fn top_tracks(&self, token: &str, limit: usize) -> Result<Vec<Track>, ApiError> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE).to_string();
        let response = self
            .http
            .get(self.api("me/top/tracks"))
            .query(&[("limit", limit.as_str())])
            .bearer_auth(token)
            .send()
            .await?;

        let res = read_json::<TopTracksResponse>(response).await?;
        Ok(res.items)
    }

    /// Retrieves audio features for a batch of track ids.
    ///
    /// Entries of the result are `null` for tracks without features, in the
    /// same order as `ids`.
    pub async fn audio_features(&self, token: &str, ids: &[String]) -> Result<Vec<Value>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .http
            .get(self.api("audio-features"))
            .query(&[("ids", ids.join(","))])
            .bearer_auth(token)
            .send()
            .await?;

        let res = read_json::<AudioFeaturesResponse>(response).await?;
        Ok(res.audio_features)
    }

    /// Searches tracks tagged with a genre.
    ///
    /// Uses the `genre:"..."` field filter of the search endpoint and returns a
    /// single page of up to `limit` results.
    pub async fn search_by_genre(
        &self,
        token: &str,
        genre: &str,
        limit: usize,
    ) -> Result<Vec<Track>, ApiError> {
        let query = format!("genre:\"{}\"", genre.replace('"', ""));
        let limit = limit.clamp(1, MAX_PAGE_SIZE).to_string();
        let response = self
            .http
            .get(self.api("search"))
            .query(&[
                ("q", query.as_str()),
                ("type", "track"),
                ("limit", limit.as_str()),
            ])
            .bearer_auth(token)
            .send()
            .await?;

        let res = read_json::<SearchResponse>(response).await?;
        Ok(res.tracks.items)
    }
}
