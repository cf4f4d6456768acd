//! Playlists, their songs, and the membership activity log.
//!
//! Adding or removing a song is a two step write: the membership change
//! first, then an activity record. The two writes are not atomic. If the
//! activity append fails after the membership change succeeded, the call
//! still succeeds and reports [`ActivityOutcome::Failed`].

use crate::access::{PlaylistAccessControl, PLAYLIST_NOT_FOUND};
use crate::error::{ServiceError, ServiceResult};
use crate::ids::{ActivityId, PlaylistId, PlaylistSongId, SongId, UserId};
use crate::store::{
    ActivityAction, FullStore, InsertOutcome, PlaylistActivity, PlaylistSummary, SongSummary,
};
use crate::validation::require_non_empty;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

pub const SONG_NOT_FOUND: &str = "Song not found";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityOutcome {
    Recorded(ActivityId),
    Failed(String),
}

impl ActivityOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, ActivityOutcome::Recorded(_))
    }
}

/// Result of a membership change. `membership_id` is only known for
/// additions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    pub membership_id: Option<PlaylistSongId>,
    pub activity: ActivityOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaylistWithSongs {
    pub id: PlaylistId,
    pub name: String,
    pub username: String,
    pub songs: Vec<SongSummary>,
}

pub struct PlaylistService {
    store: Arc<dyn FullStore>,
    access: Arc<PlaylistAccessControl>,
}

impl PlaylistService {
    pub fn new(store: Arc<dyn FullStore>, access: Arc<PlaylistAccessControl>) -> Self {
        Self { store, access }
    }

    pub fn create_playlist(&self, owner: &UserId, name: &str) -> ServiceResult<PlaylistId> {
        require_non_empty("name", name)?;
        let playlist_id = self.store.insert_playlist(name, owner)?;
        info!("User {} created playlist {}", owner, playlist_id);
        Ok(playlist_id)
    }

    pub fn get_playlists_for_user(&self, user_id: &UserId) -> ServiceResult<Vec<PlaylistSummary>> {
        Ok(self.store.get_playlists_for_user(user_id)?)
    }

    pub fn get_playlist_songs(
        &self,
        playlist_id: &PlaylistId,
        user_id: &UserId,
    ) -> ServiceResult<PlaylistWithSongs> {
        self.access.verify_playlist_access(playlist_id, user_id)?;
        let summary = self
            .store
            .get_playlist_summary(playlist_id)?
            .ok_or_else(|| ServiceError::not_found(PLAYLIST_NOT_FOUND))?;
        let songs = self.store.get_playlist_songs(playlist_id)?;
        Ok(PlaylistWithSongs {
            id: summary.id,
            name: summary.name,
            username: summary.username,
            songs,
        })
    }

    /// Owner only.
    pub fn delete_playlist(&self, playlist_id: &PlaylistId, user_id: &UserId) -> ServiceResult<()> {
        self.access.verify_playlist_owner(playlist_id, user_id)?;
        if !self.store.delete_playlist(playlist_id)? {
            return Err(ServiceError::not_found(PLAYLIST_NOT_FOUND));
        }
        info!("User {} deleted playlist {}", user_id, playlist_id);
        Ok(())
    }

    pub fn add_song_to_playlist(
        &self,
        playlist_id: &PlaylistId,
        song_id: &SongId,
        user_id: &UserId,
    ) -> ServiceResult<MutationOutcome> {
        if !self.store.song_exists(song_id)? {
            return Err(ServiceError::not_found(SONG_NOT_FOUND));
        }
        self.access.verify_playlist_access(playlist_id, user_id)?;

        let membership_id = match self.store.insert_playlist_song(playlist_id, song_id)? {
            InsertOutcome::Inserted(id) => id,
            InsertOutcome::Duplicate | InsertOutcome::Skipped => {
                return Err(ServiceError::invariant("Failed to add song to playlist"))
            }
        };

        let activity = self.record_activity(playlist_id, song_id, user_id, ActivityAction::Add);
        Ok(MutationOutcome {
            membership_id: Some(membership_id),
            activity,
        })
    }

    /// Removes every occurrence of the song from the playlist.
    pub fn remove_song_from_playlist(
        &self,
        playlist_id: &PlaylistId,
        song_id: &SongId,
        user_id: &UserId,
    ) -> ServiceResult<MutationOutcome> {
        self.access.verify_playlist_access(playlist_id, user_id)?;

        if self.store.delete_playlist_songs(playlist_id, song_id)? == 0 {
            return Err(ServiceError::invariant("Song is not in the playlist"));
        }

        let activity = self.record_activity(playlist_id, song_id, user_id, ActivityAction::Delete);
        Ok(MutationOutcome {
            membership_id: None,
            activity,
        })
    }

    pub fn get_playlist_activities(
        &self,
        playlist_id: &PlaylistId,
        user_id: &UserId,
    ) -> ServiceResult<Vec<PlaylistActivity>> {
        self.access.verify_playlist_access(playlist_id, user_id)?;
        Ok(self.store.get_activities(playlist_id)?)
    }

    fn record_activity(
        &self,
        playlist_id: &PlaylistId,
        song_id: &SongId,
        user_id: &UserId,
        action: ActivityAction,
    ) -> ActivityOutcome {
        match self
            .store
            .insert_activity(playlist_id, song_id, user_id, action)
        {
            Ok(activity_id) => ActivityOutcome::Recorded(activity_id),
            Err(err) => {
                warn!(
                    "Playlist {} changed ({} {}) but the activity was not recorded: {:#}",
                    playlist_id,
                    action.as_str(),
                    song_id,
                    err
                );
                ActivityOutcome::Failed(err.to_string())
            }
        }
    }
}
