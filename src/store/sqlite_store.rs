use super::models::{
    ActivityAction, Album, InsertOutcome, NewAlbum, NewSong, Playlist, PlaylistActivity,
    PlaylistSummary, Song, SongSummary, User, UserCredentials,
};
use super::schema::VERSIONED_SCHEMAS;
use super::trait_def::{AlbumLikeStore, CatalogStore, CollaborationStore, PlaylistStore, UserStore};
use crate::ids::{
    ActivityId, AlbumId, CollaborationId, LikeId, PlaylistId, PlaylistSongId, SongId, UserId,
};
use crate::sqlite_persistence::open_versioned;
use crate::user::auth::{AuthToken, AuthTokenValue};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::info;

/// SQLite implementation of every store trait, on a single shared
/// connection. Each method holds the lock for one statement only.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let mut conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {:?}", path))?;
        open_versioned(&mut conn, VERSIONED_SCHEMAS)
            .with_context(|| format!("Failed to initialize database at {:?}", path))?;
        info!("Opened music database at {:?}", path);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock leaves the connection itself usable.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn row_to_song_summary(row: &rusqlite::Row) -> rusqlite::Result<SongSummary> {
        Ok(SongSummary {
            id: row.get("id")?,
            title: row.get("title")?,
            performer: row.get("performer")?,
        })
    }

    fn row_to_song(row: &rusqlite::Row) -> rusqlite::Result<Song> {
        Ok(Song {
            id: row.get("id")?,
            title: row.get("title")?,
            year: row.get("year")?,
            genre: row.get("genre")?,
            performer: row.get("performer")?,
            duration: row.get("duration")?,
            album_id: row.get("album_id")?,
        })
    }

    fn row_to_album(row: &rusqlite::Row) -> rusqlite::Result<Album> {
        Ok(Album {
            id: row.get("id")?,
            name: row.get("name")?,
            year: row.get("year")?,
            cover_url: row.get("cover_url")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn row_to_playlist_summary(row: &rusqlite::Row) -> rusqlite::Result<PlaylistSummary> {
        Ok(PlaylistSummary {
            id: row.get("id")?,
            name: row.get("name")?,
            username: row.get("username")?,
        })
    }

    fn row_to_auth_token(row: &rusqlite::Row) -> rusqlite::Result<AuthToken> {
        Ok(AuthToken {
            value: AuthTokenValue(row.get("value")?),
            user_id: row.get("user_id")?,
            created: from_unix_seconds(row.get("created")?),
            last_used: row
                .get::<_, Option<i64>>("last_used")?
                .map(from_unix_seconds),
        })
    }
}

fn from_unix_seconds(seconds: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(seconds.max(0) as u64)
}

fn to_unix_seconds(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}

/// Turns the result of a guarded insert into an [`InsertOutcome`].
/// A referenced row deleted between the guard and the write counts as a
/// guard miss.
fn insert_outcome<T>(result: rusqlite::Result<usize>, id: T) -> Result<InsertOutcome<T>> {
    match result {
        Ok(0) => Ok(InsertOutcome::Skipped),
        Ok(_) => Ok(InsertOutcome::Inserted(id)),
        Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Duplicate),
        Err(err) if is_foreign_key_violation(&err) => Ok(InsertOutcome::Skipped),
        Err(err) => Err(err.into()),
    }
}

// =============================================================================
// Users
// =============================================================================

impl UserStore for SqliteStore {
    fn create_user(
        &self,
        username: &str,
        fullname: &str,
        salt: &str,
        hash: &str,
        hasher: &str,
    ) -> Result<InsertOutcome<UserId>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let user_id = UserId::generate();
        let inserted = tx.execute(
            "INSERT INTO user (id, username, fullname) VALUES (?1, ?2, ?3)",
            params![user_id, username, fullname],
        );
        match insert_outcome(inserted, user_id.clone())? {
            InsertOutcome::Inserted(_) => {}
            other => return Ok(other),
        }
        tx.execute(
            "INSERT INTO user_password_credentials (user_id, salt, hash, hasher) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, salt, hash, hasher],
        )
        .context("Failed to store user credentials")?;
        tx.commit()?;
        Ok(InsertOutcome::Inserted(user_id))
    }

    fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        let conn = self.conn();
        let user = conn
            .query_row(
                "SELECT id, username, fullname FROM user WHERE id = ?1",
                params![user_id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        fullname: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    fn get_user_credentials(&self, username: &str) -> Result<Option<UserCredentials>> {
        let conn = self.conn();
        let credentials = conn
            .query_row(
                "SELECT c.user_id, c.salt, c.hash, c.hasher FROM user_password_credentials c \
                 INNER JOIN user u ON u.id = c.user_id WHERE u.username = ?1",
                params![username],
                |row| {
                    Ok(UserCredentials {
                        user_id: row.get(0)?,
                        salt: row.get(1)?,
                        hash: row.get(2)?,
                        hasher: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(credentials)
    }

    fn add_auth_token(&self, token: &AuthToken) -> Result<()> {
        self.conn().execute(
            "INSERT INTO auth_token (value, user_id, created, last_used) VALUES (?1, ?2, ?3, ?4)",
            params![
                token.value.0,
                token.user_id,
                to_unix_seconds(token.created),
                token.last_used.map(to_unix_seconds),
            ],
        )?;
        Ok(())
    }

    fn get_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let conn = self.conn();
        let token = conn
            .query_row(
                "SELECT value, user_id, created, last_used FROM auth_token WHERE value = ?1",
                params![value.0],
                Self::row_to_auth_token,
            )
            .optional()?;
        Ok(token)
    }

    fn touch_auth_token(&self, value: &AuthTokenValue) -> Result<()> {
        self.conn().execute(
            "UPDATE auth_token SET last_used = ?1 WHERE value = ?2",
            params![Utc::now().timestamp(), value.0],
        )?;
        Ok(())
    }

    fn delete_auth_token(&self, value: &AuthTokenValue) -> Result<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM auth_token WHERE value = ?1", params![value.0])?;
        Ok(deleted > 0)
    }
}

// =============================================================================
// Catalog
// =============================================================================

impl CatalogStore for SqliteStore {
    fn insert_album(&self, album: &NewAlbum) -> Result<AlbumId> {
        let album_id = AlbumId::generate();
        let now = Utc::now().timestamp();
        self.conn().execute(
            "INSERT INTO album (id, name, year, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
            params![album_id, album.name, album.year, now],
        )?;
        Ok(album_id)
    }

    fn get_album(&self, album_id: &AlbumId) -> Result<Option<Album>> {
        let conn = self.conn();
        let album = conn
            .query_row(
                "SELECT id, name, year, cover_url, created_at, updated_at FROM album WHERE id = ?1",
                params![album_id],
                Self::row_to_album,
            )
            .optional()?;
        Ok(album)
    }

    fn album_exists(&self, album_id: &AlbumId) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM album WHERE id = ?1",
            params![album_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn get_album_songs(&self, album_id: &AlbumId) -> Result<Vec<SongSummary>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, title, performer FROM song WHERE album_id = ?1 ORDER BY title, rowid",
        )?;
        let songs = stmt
            .query_map(params![album_id], Self::row_to_song_summary)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(songs)
    }

    fn update_album(&self, album_id: &AlbumId, album: &NewAlbum) -> Result<bool> {
        let updated = self.conn().execute(
            "UPDATE album SET name = ?1, year = ?2, updated_at = ?3 WHERE id = ?4",
            params![album.name, album.year, Utc::now().timestamp(), album_id],
        )?;
        Ok(updated > 0)
    }

    fn set_album_cover(&self, album_id: &AlbumId, cover_url: Option<&str>) -> Result<bool> {
        let updated = self.conn().execute(
            "UPDATE album SET cover_url = ?1, updated_at = ?2 WHERE id = ?3",
            params![cover_url, Utc::now().timestamp(), album_id],
        )?;
        Ok(updated > 0)
    }

    fn delete_album(&self, album_id: &AlbumId) -> Result<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM album WHERE id = ?1", params![album_id])?;
        Ok(deleted > 0)
    }

    fn insert_song(&self, song: &NewSong) -> Result<InsertOutcome<SongId>> {
        let song_id = SongId::generate();
        let result = self.conn().execute(
            "INSERT INTO song (id, title, year, genre, performer, duration, album_id) \
             SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7 \
             WHERE ?7 IS NULL OR EXISTS (SELECT 1 FROM album WHERE id = ?7)",
            params![
                song_id,
                song.title,
                song.year,
                song.genre,
                song.performer,
                song.duration,
                song.album_id,
            ],
        );
        insert_outcome(result, song_id)
    }

    fn get_song(&self, song_id: &SongId) -> Result<Option<Song>> {
        let conn = self.conn();
        let song = conn
            .query_row(
                "SELECT id, title, year, genre, performer, duration, album_id FROM song WHERE id = ?1",
                params![song_id],
                Self::row_to_song,
            )
            .optional()?;
        Ok(song)
    }

    fn song_exists(&self, song_id: &SongId) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM song WHERE id = ?1",
            params![song_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn update_song(&self, song_id: &SongId, song: &NewSong) -> Result<bool> {
        let updated = self.conn().execute(
            "UPDATE song SET title = ?1, year = ?2, genre = ?3, performer = ?4, duration = ?5, \
             album_id = ?6 \
             WHERE id = ?7 AND (?6 IS NULL OR EXISTS (SELECT 1 FROM album WHERE id = ?6))",
            params![
                song.title,
                song.year,
                song.genre,
                song.performer,
                song.duration,
                song.album_id,
                song_id,
            ],
        )?;
        Ok(updated > 0)
    }

    fn delete_song(&self, song_id: &SongId) -> Result<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM song WHERE id = ?1", params![song_id])?;
        Ok(deleted > 0)
    }

    fn search_songs(
        &self,
        title: Option<&str>,
        performer: Option<&str>,
    ) -> Result<Vec<SongSummary>> {
        let conn = self.conn();
        // instr() on lowered values sidesteps LIKE wildcards in user input
        let mut stmt = conn.prepare(
            "SELECT id, title, performer FROM song \
             WHERE (?1 IS NULL OR instr(lower(title), lower(?1)) > 0) \
             AND (?2 IS NULL OR instr(lower(performer), lower(?2)) > 0) \
             ORDER BY title, rowid",
        )?;
        let songs = stmt
            .query_map(params![title, performer], Self::row_to_song_summary)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(songs)
    }
}

// =============================================================================
// Playlists
// =============================================================================

impl PlaylistStore for SqliteStore {
    fn insert_playlist(&self, name: &str, owner: &UserId) -> Result<PlaylistId> {
        let playlist_id = PlaylistId::generate();
        self.conn().execute(
            "INSERT INTO playlist (id, name, owner) VALUES (?1, ?2, ?3)",
            params![playlist_id, name, owner],
        )?;
        Ok(playlist_id)
    }

    fn get_playlist(&self, playlist_id: &PlaylistId) -> Result<Option<Playlist>> {
        let conn = self.conn();
        let playlist = conn
            .query_row(
                "SELECT id, name, owner FROM playlist WHERE id = ?1",
                params![playlist_id],
                |row| {
                    Ok(Playlist {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        owner: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(playlist)
    }

    fn get_playlist_summary(&self, playlist_id: &PlaylistId) -> Result<Option<PlaylistSummary>> {
        let conn = self.conn();
        let summary = conn
            .query_row(
                "SELECT p.id AS id, p.name AS name, u.username AS username FROM playlist p \
                 INNER JOIN user u ON u.id = p.owner WHERE p.id = ?1",
                params![playlist_id],
                Self::row_to_playlist_summary,
            )
            .optional()?;
        Ok(summary)
    }

    fn get_playlists_for_user(&self, user_id: &UserId) -> Result<Vec<PlaylistSummary>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT p.id AS id, p.name AS name, u.username AS username FROM playlist p \
             INNER JOIN user u ON u.id = p.owner \
             WHERE p.owner = ?1 \
             OR EXISTS (SELECT 1 FROM collaboration c WHERE c.playlist_id = p.id AND c.user_id = ?1) \
             ORDER BY p.rowid",
        )?;
        let playlists = stmt
            .query_map(params![user_id], Self::row_to_playlist_summary)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(playlists)
    }

    fn delete_playlist(&self, playlist_id: &PlaylistId) -> Result<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM playlist WHERE id = ?1", params![playlist_id])?;
        Ok(deleted > 0)
    }

    fn insert_playlist_song(
        &self,
        playlist_id: &PlaylistId,
        song_id: &SongId,
    ) -> Result<InsertOutcome<PlaylistSongId>> {
        let playlist_song_id = PlaylistSongId::generate();
        let result = self.conn().execute(
            "INSERT INTO playlist_song (id, playlist_id, song_id) \
             SELECT ?1, ?2, ?3 WHERE EXISTS (SELECT 1 FROM playlist WHERE id = ?2)",
            params![playlist_song_id, playlist_id, song_id],
        );
        insert_outcome(result, playlist_song_id)
    }

    fn delete_playlist_songs(&self, playlist_id: &PlaylistId, song_id: &SongId) -> Result<usize> {
        let deleted = self.conn().execute(
            "DELETE FROM playlist_song WHERE playlist_id = ?1 AND song_id = ?2",
            params![playlist_id, song_id],
        )?;
        Ok(deleted)
    }

    fn get_playlist_songs(&self, playlist_id: &PlaylistId) -> Result<Vec<SongSummary>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT s.id AS id, s.title AS title, s.performer AS performer FROM playlist_song ps \
             INNER JOIN song s ON s.id = ps.song_id WHERE ps.playlist_id = ?1 ORDER BY ps.rowid",
        )?;
        let songs = stmt
            .query_map(params![playlist_id], Self::row_to_song_summary)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(songs)
    }

    fn insert_activity(
        &self,
        playlist_id: &PlaylistId,
        song_id: &SongId,
        user_id: &UserId,
        action: ActivityAction,
    ) -> Result<ActivityId> {
        let activity_id = ActivityId::generate();
        self.conn().execute(
            "INSERT INTO playlist_song_activity (id, playlist_id, song_id, user_id, action, time) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                activity_id,
                playlist_id,
                song_id,
                user_id,
                action.as_str(),
                Utc::now().timestamp(),
            ],
        )?;
        Ok(activity_id)
    }

    fn get_activities(&self, playlist_id: &PlaylistId) -> Result<Vec<PlaylistActivity>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT u.username, s.title, a.action, a.time FROM playlist_song_activity a \
             INNER JOIN user u ON u.id = a.user_id \
             INNER JOIN song s ON s.id = a.song_id \
             WHERE a.playlist_id = ?1 ORDER BY a.time, a.rowid",
        )?;
        let rows = stmt
            .query_map(params![playlist_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(username, title, action, time)| {
                let action = ActivityAction::parse(&action)
                    .with_context(|| format!("Unknown activity action '{}'", action))?;
                Ok(PlaylistActivity {
                    username,
                    title,
                    action,
                    time,
                })
            })
            .collect()
    }
}

// =============================================================================
// Collaborations
// =============================================================================

impl CollaborationStore for SqliteStore {
    fn insert_collaboration(
        &self,
        playlist_id: &PlaylistId,
        user_id: &UserId,
    ) -> Result<InsertOutcome<CollaborationId>> {
        let collaboration_id = CollaborationId::generate();
        let result = self.conn().execute(
            "INSERT INTO collaboration (id, playlist_id, user_id) \
             SELECT ?1, ?2, ?3 WHERE EXISTS (SELECT 1 FROM playlist WHERE id = ?2)",
            params![collaboration_id, playlist_id, user_id],
        );
        insert_outcome(result, collaboration_id)
    }

    fn delete_collaboration(&self, playlist_id: &PlaylistId, user_id: &UserId) -> Result<bool> {
        let deleted = self.conn().execute(
            "DELETE FROM collaboration WHERE playlist_id = ?1 AND user_id = ?2",
            params![playlist_id, user_id],
        )?;
        Ok(deleted > 0)
    }

    fn is_collaborator(&self, playlist_id: &PlaylistId, user_id: &UserId) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM collaboration WHERE playlist_id = ?1 AND user_id = ?2",
            params![playlist_id, user_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

// =============================================================================
// Album likes
// =============================================================================

impl AlbumLikeStore for SqliteStore {
    fn delete_album_like(&self, user_id: &UserId, album_id: &AlbumId) -> Result<bool> {
        let deleted = self.conn().execute(
            "DELETE FROM user_album_like WHERE user_id = ?1 AND album_id = ?2",
            params![user_id, album_id],
        )?;
        Ok(deleted > 0)
    }

    fn insert_album_like(
        &self,
        user_id: &UserId,
        album_id: &AlbumId,
    ) -> Result<InsertOutcome<LikeId>> {
        let like_id = LikeId::generate();
        let result = self.conn().execute(
            "INSERT INTO user_album_like (id, album_id, user_id) \
             SELECT ?1, ?2, ?3 WHERE EXISTS (SELECT 1 FROM album WHERE id = ?2)",
            params![like_id, album_id, user_id],
        );
        insert_outcome(result, like_id)
    }

    fn count_album_likes(&self, album_id: &AlbumId) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM user_album_like WHERE album_id = ?1",
            params![album_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
