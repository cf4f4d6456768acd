//! Albums and songs.

use crate::error::{ServiceError, ServiceResult};
use crate::ids::{AlbumId, SongId};
use crate::likes::{AlbumLikeService, ALBUM_NOT_FOUND};
use crate::playlists::SONG_NOT_FOUND;
use crate::store::{Album, FullStore, InsertOutcome, NewAlbum, NewSong, Song, SongSummary};
use crate::validation::{require_non_empty, require_valid_year};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlbumWithSongs {
    #[serde(flatten)]
    pub album: Album,
    pub songs: Vec<SongSummary>,
}

fn validate_album(album: &NewAlbum) -> ServiceResult<()> {
    require_non_empty("name", &album.name)?;
    require_valid_year(album.year)
}

fn validate_song(song: &NewSong) -> ServiceResult<()> {
    require_non_empty("title", &song.title)?;
    require_non_empty("genre", &song.genre)?;
    require_non_empty("performer", &song.performer)?;
    require_valid_year(song.year)?;
    if matches!(song.duration, Some(d) if d < 0) {
        return Err(ServiceError::invariant("duration must not be negative"));
    }
    Ok(())
}

pub struct CatalogService {
    store: Arc<dyn FullStore>,
    likes: Arc<AlbumLikeService>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn FullStore>, likes: Arc<AlbumLikeService>) -> Self {
        Self { store, likes }
    }

    // =========================================================================
    // Albums
    // =========================================================================

    pub fn add_album(&self, album: &NewAlbum) -> ServiceResult<AlbumId> {
        validate_album(album)?;
        let album_id = self.store.insert_album(album)?;
        info!("Added album {} ({})", album_id, album.name);
        Ok(album_id)
    }

    pub fn get_album(&self, album_id: &AlbumId) -> ServiceResult<AlbumWithSongs> {
        let album = self
            .store
            .get_album(album_id)?
            .ok_or_else(|| ServiceError::not_found(ALBUM_NOT_FOUND))?;
        let songs = self.store.get_album_songs(album_id)?;
        Ok(AlbumWithSongs { album, songs })
    }

    pub fn edit_album(&self, album_id: &AlbumId, album: &NewAlbum) -> ServiceResult<()> {
        validate_album(album)?;
        if !self.store.update_album(album_id, album)? {
            return Err(ServiceError::not_found(ALBUM_NOT_FOUND));
        }
        Ok(())
    }

    /// Stores a reference to an already uploaded cover image.
    pub fn edit_album_cover(&self, album_id: &AlbumId, cover_url: &str) -> ServiceResult<()> {
        require_non_empty("coverUrl", cover_url)?;
        if !self.store.set_album_cover(album_id, Some(cover_url))? {
            return Err(ServiceError::not_found(ALBUM_NOT_FOUND));
        }
        Ok(())
    }

    /// Deletes the album with its songs and likes.
    pub fn delete_album(&self, album_id: &AlbumId) -> ServiceResult<()> {
        if !self.store.delete_album(album_id)? {
            return Err(ServiceError::not_found(ALBUM_NOT_FOUND));
        }
        // The rows are already gone, only the cached counter can be left over.
        if let Err(err) = self.likes.invalidate(album_id) {
            warn!("Album {} deleted but its like count is still cached: {}", album_id, err);
        }
        info!("Deleted album {}", album_id);
        Ok(())
    }

    // =========================================================================
    // Songs
    // =========================================================================

    fn require_album_if_any(&self, song: &NewSong) -> ServiceResult<()> {
        if let Some(album_id) = &song.album_id {
            if !self.store.album_exists(album_id)? {
                return Err(ServiceError::not_found(ALBUM_NOT_FOUND));
            }
        }
        Ok(())
    }

    pub fn add_song(&self, song: &NewSong) -> ServiceResult<SongId> {
        validate_song(song)?;
        self.require_album_if_any(song)?;
        match self.store.insert_song(song)? {
            InsertOutcome::Inserted(song_id) => {
                info!("Added song {} ({})", song_id, song.title);
                Ok(song_id)
            }
            // The album went away after the check above.
            InsertOutcome::Skipped => Err(ServiceError::not_found(ALBUM_NOT_FOUND)),
            InsertOutcome::Duplicate => Err(ServiceError::invariant("Failed to add song")),
        }
    }

    pub fn get_song(&self, song_id: &SongId) -> ServiceResult<Song> {
        self.store
            .get_song(song_id)?
            .ok_or_else(|| ServiceError::not_found(SONG_NOT_FOUND))
    }

    pub fn edit_song(&self, song_id: &SongId, song: &NewSong) -> ServiceResult<()> {
        validate_song(song)?;
        self.require_album_if_any(song)?;
        if !self.store.update_song(song_id, song)? {
            // Either row may be the missing one.
            self.require_album_if_any(song)?;
            return Err(ServiceError::not_found(SONG_NOT_FOUND));
        }
        Ok(())
    }

    pub fn delete_song(&self, song_id: &SongId) -> ServiceResult<()> {
        if !self.store.delete_song(song_id)? {
            return Err(ServiceError::not_found(SONG_NOT_FOUND));
        }
        info!("Deleted song {}", song_id);
        Ok(())
    }

    pub fn search_songs(
        &self,
        title: Option<&str>,
        performer: Option<&str>,
    ) -> ServiceResult<Vec<SongSummary>> {
        Ok(self.store.search_songs(title, performer)?)
    }
}
