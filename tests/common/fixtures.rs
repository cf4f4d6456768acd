//! Seed data for end-to-end tests
//!
//! Users and catalog rows are written straight through the store so tests
//! start from a known state without going through the API.

use super::constants::*;
use anyhow::{bail, Result};
use playlist_catalog_server::ids::{AlbumId, SongId, UserId};
use playlist_catalog_server::store::{CatalogStore, InsertOutcome, NewAlbum, NewSong, SqliteStore};
use playlist_catalog_server::user::UserManager;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Ids of the rows created by [`create_test_db`].
#[derive(Debug, Clone)]
pub struct SeededData {
    pub test_user_id: UserId,
    pub other_user_id: UserId,
    pub stranger_user_id: UserId,
    pub album_id: AlbumId,
    pub song_1_id: SongId,
    pub song_2_id: SongId,
}

/// Creates a temporary database with three users, one album and two songs.
/// Returns (temp_dir, db_path, store, seeded ids)
pub fn create_test_db() -> Result<(TempDir, PathBuf, Arc<SqliteStore>, SeededData)> {
    let dir = TempDir::new()?;
    let db_path = dir.path().join("music.db");
    let store = Arc::new(SqliteStore::new(&db_path)?);

    let users = UserManager::new(store.clone());
    let register = |username: &str, password: &str| -> Result<UserId> {
        match users.register_user(username, password, username) {
            Ok(id) => Ok(id),
            Err(err) => bail!("Failed to seed user {}: {}", username, err),
        }
    };
    let test_user_id = register(TEST_USER, TEST_PASS)?;
    let other_user_id = register(OTHER_USER, OTHER_PASS)?;
    let stranger_user_id = register(STRANGER_USER, STRANGER_PASS)?;

    let album_id = store.insert_album(&NewAlbum {
        name: ALBUM_1_NAME.to_string(),
        year: ALBUM_1_YEAR,
    })?;
    let song = |title: &str| NewSong {
        title: title.to_string(),
        year: ALBUM_1_YEAR,
        genre: "Pop".to_string(),
        performer: SONG_PERFORMER.to_string(),
        duration: Some(285),
        album_id: Some(album_id.clone()),
    };
    let insert_song = |title: &str| -> Result<SongId> {
        match store.insert_song(&song(title))? {
            InsertOutcome::Inserted(id) => Ok(id),
            other => bail!("Failed to seed song {}: {:?}", title, other),
        }
    };
    let song_1_id = insert_song(SONG_1_TITLE)?;
    let song_2_id = insert_song(SONG_2_TITLE)?;

    Ok((
        dir,
        db_path,
        store,
        SeededData {
            test_user_id,
            other_user_id,
            stranger_user_id,
            album_id,
            song_1_id,
            song_2_id,
        },
    ))
}
