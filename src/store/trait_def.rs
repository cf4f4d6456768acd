//! Store traits.
//!
//! Every method runs as a single statement. Absence is reported as
//! `Ok(None)`, `Ok(false)` or an affected count of zero; `Err` is reserved
//! for database failures.

use super::models::{
    Album, InsertOutcome, NewAlbum, NewSong, Playlist, PlaylistActivity, PlaylistSummary, Song,
    SongSummary, User, UserCredentials,
};
use super::ActivityAction;
use crate::ids::{
    ActivityId, AlbumId, CollaborationId, LikeId, PlaylistId, PlaylistSongId, SongId, UserId,
};
use crate::user::auth::{AuthToken, AuthTokenValue};
use anyhow::Result;

// =============================================================================
// Users
// =============================================================================

pub trait UserStore: Send + Sync {
    /// Creates a user together with its password credentials.
    /// Returns `Duplicate` if the username is already taken.
    fn create_user(
        &self,
        username: &str,
        fullname: &str,
        salt: &str,
        hash: &str,
        hasher: &str,
    ) -> Result<InsertOutcome<UserId>>;

    /// Returns Ok(None) if the user does not exist.
    fn get_user(&self, user_id: &UserId) -> Result<Option<User>>;

    /// Returns Ok(None) if the username is unknown.
    fn get_user_credentials(&self, username: &str) -> Result<Option<UserCredentials>>;

    fn add_auth_token(&self, token: &AuthToken) -> Result<()>;

    /// Returns Ok(None) if the token does not exist.
    fn get_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>>;

    /// Updates the token's last used timestamp to now.
    fn touch_auth_token(&self, value: &AuthTokenValue) -> Result<()>;

    /// Returns whether a token was deleted.
    fn delete_auth_token(&self, value: &AuthTokenValue) -> Result<bool>;
}

// =============================================================================
// Catalog
// =============================================================================

pub trait CatalogStore: Send + Sync {
    fn insert_album(&self, album: &NewAlbum) -> Result<AlbumId>;

    fn get_album(&self, album_id: &AlbumId) -> Result<Option<Album>>;

    fn album_exists(&self, album_id: &AlbumId) -> Result<bool>;

    /// Songs belonging to the album, ordered by title.
    fn get_album_songs(&self, album_id: &AlbumId) -> Result<Vec<SongSummary>>;

    /// Returns whether the album existed.
    fn update_album(&self, album_id: &AlbumId, album: &NewAlbum) -> Result<bool>;

    /// Returns whether the album existed.
    fn set_album_cover(&self, album_id: &AlbumId, cover_url: Option<&str>) -> Result<bool>;

    /// Deletes the album, cascading to its songs and likes.
    /// Returns whether the album existed.
    fn delete_album(&self, album_id: &AlbumId) -> Result<bool>;

    /// `Skipped` when the song references a missing album.
    fn insert_song(&self, song: &NewSong) -> Result<InsertOutcome<SongId>>;

    fn get_song(&self, song_id: &SongId) -> Result<Option<Song>>;

    fn song_exists(&self, song_id: &SongId) -> Result<bool>;

    /// Returns false when the song or its referenced album is missing.
    fn update_song(&self, song_id: &SongId, song: &NewSong) -> Result<bool>;

    /// Returns whether the song existed.
    fn delete_song(&self, song_id: &SongId) -> Result<bool>;

    /// Case-insensitive substring search, filters ANDed. No filter lists
    /// every song.
    fn search_songs(&self, title: Option<&str>, performer: Option<&str>)
        -> Result<Vec<SongSummary>>;
}

// =============================================================================
// Playlists
// =============================================================================

pub trait PlaylistStore: Send + Sync {
    fn insert_playlist(&self, name: &str, owner: &UserId) -> Result<PlaylistId>;

    fn get_playlist(&self, playlist_id: &PlaylistId) -> Result<Option<Playlist>>;

    /// Playlist with the owner's username resolved.
    fn get_playlist_summary(&self, playlist_id: &PlaylistId) -> Result<Option<PlaylistSummary>>;

    /// Playlists owned by the user or shared with them, each listed once.
    fn get_playlists_for_user(&self, user_id: &UserId) -> Result<Vec<PlaylistSummary>>;

    /// Deletes the playlist, cascading to its songs, collaborations and
    /// activities. Returns whether the playlist existed.
    fn delete_playlist(&self, playlist_id: &PlaylistId) -> Result<bool>;

    /// Appends a song to the playlist. `Skipped` if the playlist is gone.
    fn insert_playlist_song(
        &self,
        playlist_id: &PlaylistId,
        song_id: &SongId,
    ) -> Result<InsertOutcome<PlaylistSongId>>;

    /// Removes every occurrence of the song. Returns the number of rows removed.
    fn delete_playlist_songs(&self, playlist_id: &PlaylistId, song_id: &SongId) -> Result<usize>;

    fn get_playlist_songs(&self, playlist_id: &PlaylistId) -> Result<Vec<SongSummary>>;

    fn insert_activity(
        &self,
        playlist_id: &PlaylistId,
        song_id: &SongId,
        user_id: &UserId,
        action: ActivityAction,
    ) -> Result<ActivityId>;

    /// Activities joined with username and song title, oldest first.
    fn get_activities(&self, playlist_id: &PlaylistId) -> Result<Vec<PlaylistActivity>>;
}

// =============================================================================
// Collaborations
// =============================================================================

pub trait CollaborationStore: Send + Sync {
    /// `Duplicate` if the user already collaborates on the playlist.
    fn insert_collaboration(
        &self,
        playlist_id: &PlaylistId,
        user_id: &UserId,
    ) -> Result<InsertOutcome<CollaborationId>>;

    /// Returns whether a collaboration was removed.
    fn delete_collaboration(&self, playlist_id: &PlaylistId, user_id: &UserId) -> Result<bool>;

    fn is_collaborator(&self, playlist_id: &PlaylistId, user_id: &UserId) -> Result<bool>;
}

// =============================================================================
// Album likes
// =============================================================================

pub trait AlbumLikeStore: Send + Sync {
    /// Returns whether a like row existed.
    fn delete_album_like(&self, user_id: &UserId, album_id: &AlbumId) -> Result<bool>;

    /// `Duplicate` if the user already likes the album, `Skipped` if the
    /// album is gone.
    fn insert_album_like(
        &self,
        user_id: &UserId,
        album_id: &AlbumId,
    ) -> Result<InsertOutcome<LikeId>>;

    fn count_album_likes(&self, album_id: &AlbumId) -> Result<u64>;
}

/// Everything the services need from persistence.
pub trait FullStore:
    UserStore + CatalogStore + PlaylistStore + CollaborationStore + AlbumLikeStore
{
}

impl<T> FullStore for T where
    T: UserStore + CatalogStore + PlaylistStore + CollaborationStore + AlbumLikeStore
{
}
