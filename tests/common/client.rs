//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per endpoint. When API routes or request
//! formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP test client with cookie-based session management
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    /// Creates a new unauthenticated client
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// Creates a client logged in as `username`
    ///
    /// # Panics
    ///
    /// Panics if authentication fails (indicates test infrastructure problem).
    pub async fn authenticated_as(base_url: String, username: &str, password: &str) -> Self {
        let client = Self::new(base_url);

        let response = client.login(username, password).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Authentication of {} failed: {:?}",
            username,
            response.text().await
        );

        client
    }

    /// Creates a client logged in as [`TEST_USER`]
    pub async fn authenticated(base_url: String) -> Self {
        Self::authenticated_as(base_url, TEST_USER, TEST_PASS).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ========================================================================
    // Users & Authentication
    // ========================================================================

    /// POST /users
    pub async fn register(&self, username: &str, password: &str, fullname: &str) -> Response {
        self.client
            .post(self.url("/users"))
            .json(&json!({
                "username": username,
                "password": password,
                "fullname": fullname,
            }))
            .send()
            .await
            .expect("Register request failed")
    }

    /// POST /authentications
    pub async fn login(&self, username: &str, password: &str) -> Response {
        self.client
            .post(self.url("/authentications"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Login request failed")
    }

    /// DELETE /authentications
    pub async fn logout(&self) -> Response {
        self.client
            .delete(self.url("/authentications"))
            .send()
            .await
            .expect("Logout request failed")
    }

    // ========================================================================
    // Albums
    // ========================================================================

    /// POST /albums
    pub async fn add_album(&self, name: &str, year: i32) -> Response {
        self.client
            .post(self.url("/albums"))
            .json(&json!({ "name": name, "year": year }))
            .send()
            .await
            .expect("Add album request failed")
    }

    /// GET /albums/{id}
    pub async fn get_album(&self, album_id: &str) -> Response {
        self.client
            .get(self.url(&format!("/albums/{}", album_id)))
            .send()
            .await
            .expect("Get album request failed")
    }

    /// DELETE /albums/{id}
    pub async fn delete_album(&self, album_id: &str) -> Response {
        self.client
            .delete(self.url(&format!("/albums/{}", album_id)))
            .send()
            .await
            .expect("Delete album request failed")
    }

    /// POST /albums/{id}/likes
    pub async fn toggle_album_like(&self, album_id: &str) -> Response {
        self.client
            .post(self.url(&format!("/albums/{}/likes", album_id)))
            .send()
            .await
            .expect("Toggle like request failed")
    }

    /// GET /albums/{id}/likes
    pub async fn get_album_likes(&self, album_id: &str) -> Response {
        self.client
            .get(self.url(&format!("/albums/{}/likes", album_id)))
            .send()
            .await
            .expect("Get likes request failed")
    }

    // ========================================================================
    // Songs
    // ========================================================================

    /// GET /songs?title=&performer=
    pub async fn search_songs(&self, title: Option<&str>, performer: Option<&str>) -> Response {
        let mut query = Vec::new();
        if let Some(title) = title {
            query.push(("title", title));
        }
        if let Some(performer) = performer {
            query.push(("performer", performer));
        }
        self.client
            .get(self.url("/songs"))
            .query(&query)
            .send()
            .await
            .expect("Search songs request failed")
    }

    // ========================================================================
    // Playlists
    // ========================================================================

    /// POST /playlists
    pub async fn create_playlist(&self, name: &str) -> Response {
        self.client
            .post(self.url("/playlists"))
            .json(&json!({ "name": name }))
            .send()
            .await
            .expect("Create playlist request failed")
    }

    /// GET /playlists
    pub async fn get_playlists(&self) -> Response {
        self.client
            .get(self.url("/playlists"))
            .send()
            .await
            .expect("Get playlists request failed")
    }

    /// DELETE /playlists/{id}
    pub async fn delete_playlist(&self, playlist_id: &str) -> Response {
        self.client
            .delete(self.url(&format!("/playlists/{}", playlist_id)))
            .send()
            .await
            .expect("Delete playlist request failed")
    }

    /// POST /playlists/{id}/songs
    pub async fn add_song_to_playlist(&self, playlist_id: &str, song_id: &str) -> Response {
        self.client
            .post(self.url(&format!("/playlists/{}/songs", playlist_id)))
            .json(&json!({ "songId": song_id }))
            .send()
            .await
            .expect("Add playlist song request failed")
    }

    /// GET /playlists/{id}/songs
    pub async fn get_playlist_songs(&self, playlist_id: &str) -> Response {
        self.client
            .get(self.url(&format!("/playlists/{}/songs", playlist_id)))
            .send()
            .await
            .expect("Get playlist songs request failed")
    }

    /// DELETE /playlists/{id}/songs
    pub async fn remove_song_from_playlist(&self, playlist_id: &str, song_id: &str) -> Response {
        self.client
            .delete(self.url(&format!("/playlists/{}/songs", playlist_id)))
            .json(&json!({ "songId": song_id }))
            .send()
            .await
            .expect("Remove playlist song request failed")
    }

    /// GET /playlists/{id}/activities
    pub async fn get_playlist_activities(&self, playlist_id: &str) -> Response {
        self.client
            .get(self.url(&format!("/playlists/{}/activities", playlist_id)))
            .send()
            .await
            .expect("Get activities request failed")
    }

    // ========================================================================
    // Collaborations
    // ========================================================================

    /// POST /collaborations
    pub async fn add_collaborator(&self, playlist_id: &str, user_id: &str) -> Response {
        self.client
            .post(self.url("/collaborations"))
            .json(&json!({ "playlistId": playlist_id, "userId": user_id }))
            .send()
            .await
            .expect("Add collaborator request failed")
    }

    /// DELETE /collaborations
    pub async fn remove_collaborator(&self, playlist_id: &str, user_id: &str) -> Response {
        self.client
            .delete(self.url("/collaborations"))
            .json(&json!({ "playlistId": playlist_id, "userId": user_id }))
            .send()
            .await
            .expect("Remove collaborator request failed")
    }
}

/// Reads a response body as JSON
pub async fn json_body(response: Response) -> Value {
    response.json().await.expect("Response body is not JSON")
}
