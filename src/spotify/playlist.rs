use crate::{
    error::ApiError,
    spotify::{SpotifyClient, read_json},
    types::{
        AddTrackToPlaylistRequest, AddTrackToPlaylistResponse, CreatePlaylistRequest,
        CreatePlaylistResponse, UserProfile,
    },
};

/// Spotify accepts at most this many URIs per add-tracks request.
pub const MAX_TRACKS_PER_REQUEST: usize = 100;

impl SpotifyClient {
    /// Retrieves the profile of the user the token belongs to.
    pub async fn current_user(&self, token: &str) -> Result<UserProfile, ApiError> {
        let response = self.http.get(self.api("me")).bearer_auth(token).send().await?;
        read_json(response).await
    }

    /// Creates an empty playlist owned by `user_id`.
    ///
    /// Requires `playlist-modify-private` or `playlist-modify-public`, depending
    /// on `request.public`.
    pub async fn create_playlist(
        &self,
        token: &str,
        user_id: &str,
        request: &CreatePlaylistRequest,
    ) -> Result<CreatePlaylistResponse, ApiError> {
        let response = self
            .http
            .post(self.api(&format!("users/{user_id}/playlists")))
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        read_json(response).await
    }

    /// Appends tracks to a playlist, splitting `uris` into batches the API
    /// accepts. Returns the snapshot id of the last batch.
    pub async fn add_tracks(
        &self,
        token: &str,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<Option<String>, ApiError> {
        let mut snapshot = None;
        for chunk in uris.chunks(MAX_TRACKS_PER_REQUEST) {
            let request = AddTrackToPlaylistRequest {
                uris: chunk.to_vec(),
            };
            let response = self
                .http
                .post(self.api(&format!("playlists/{playlist_id}/tracks")))
                .bearer_auth(token)
                .json(&request)
                .send()
                .await?;

            let res: AddTrackToPlaylistResponse = read_json(response).await?;
            snapshot = Some(res.snapshot_id);
        }

        Ok(snapshot)
    }
}
