use crate::ids::{AlbumId, PlaylistId, SongId, UserId};
use serde::{Deserialize, Serialize};

/// Result of an insert that may be rejected by the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome<T> {
    /// The row was written.
    Inserted(T),
    /// A unique constraint rejected the row.
    Duplicate,
    /// The insert guard matched nothing or a referenced row was missing,
    /// so no row was written.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub fullname: String,
}

#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: UserId,
    pub salt: String,
    pub hash: String,
    pub hasher: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: AlbumId,
    pub name: String,
    pub year: i32,
    pub cover_url: Option<String>,
    #[serde(skip)]
    pub created_at: i64,
    #[serde(skip)]
    pub updated_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAlbum {
    pub name: String,
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: SongId,
    pub title: String,
    pub year: i32,
    pub genre: String,
    pub performer: String,
    pub duration: Option<i32>,
    pub album_id: Option<AlbumId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSong {
    pub title: String,
    pub year: i32,
    pub genre: String,
    pub performer: String,
    #[serde(default)]
    pub duration: Option<i32>,
    #[serde(default)]
    pub album_id: Option<AlbumId>,
}

/// The short form of a song used in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SongSummary {
    pub id: SongId,
    pub title: String,
    pub performer: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub id: PlaylistId,
    pub name: String,
    pub owner: UserId,
}

/// A playlist with its owner's username resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaylistSummary {
    pub id: PlaylistId,
    pub name: String,
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityAction {
    Add,
    Delete,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Add => "add",
            ActivityAction::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "add" => Some(ActivityAction::Add),
            "delete" => Some(ActivityAction::Delete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaylistActivity {
    pub username: String,
    pub title: String,
    pub action: ActivityAction,
    pub time: i64,
}
