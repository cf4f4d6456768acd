//! Playlist access control.
//!
//! A playlist is always accessible to its owner. Anyone else gets in only
//! if the [`CollaborationResolver`] vouches for them; when it doesn't, the
//! caller sees the ownership error, never the resolver's.

use crate::error::{ServiceError, ServiceResult};
use crate::ids::{PlaylistId, UserId};
use crate::store::FullStore;
use std::sync::Arc;
use tracing::debug;

pub const PLAYLIST_NOT_FOUND: &str = "Playlist not found";
pub const PLAYLIST_ACCESS_DENIED: &str = "You are not allowed to access this playlist";

/// Answers whether a user collaborates on a playlist.
pub trait CollaborationResolver: Send + Sync {
    /// Ok if `user_id` is a collaborator of `playlist_id`.
    fn verify_collaborator(&self, playlist_id: &PlaylistId, user_id: &UserId)
        -> ServiceResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessGrant {
    Owner,
    Collaborator,
}

#[derive(Debug)]
pub enum AccessDecision {
    Allowed(AccessGrant),
    Denied(ServiceError),
}

pub struct PlaylistAccessControl {
    store: Arc<dyn FullStore>,
    resolver: Arc<dyn CollaborationResolver>,
}

impl PlaylistAccessControl {
    pub fn new(store: Arc<dyn FullStore>, resolver: Arc<dyn CollaborationResolver>) -> Self {
        Self { store, resolver }
    }

    /// Ownership only, collaborations are never consulted.
    pub fn verify_playlist_owner(
        &self,
        playlist_id: &PlaylistId,
        user_id: &UserId,
    ) -> ServiceResult<()> {
        let playlist = self
            .store
            .get_playlist(playlist_id)?
            .ok_or_else(|| ServiceError::not_found(PLAYLIST_NOT_FOUND))?;
        if &playlist.owner != user_id {
            return Err(ServiceError::authorization(PLAYLIST_ACCESS_DENIED));
        }
        Ok(())
    }

    /// Ownership first, then collaboration.
    ///
    /// Store failures while checking ownership are returned as `Err`. A
    /// missing playlist is denied straight away. Any resolver failure,
    /// including its own store errors, is swallowed and the ownership
    /// error is reported instead.
    pub fn check_playlist_access(
        &self,
        playlist_id: &PlaylistId,
        user_id: &UserId,
    ) -> ServiceResult<AccessDecision> {
        let ownership_error = match self.verify_playlist_owner(playlist_id, user_id) {
            Ok(()) => return Ok(AccessDecision::Allowed(AccessGrant::Owner)),
            Err(err @ ServiceError::NotFound(_)) => return Ok(AccessDecision::Denied(err)),
            Err(err @ ServiceError::Authorization(_)) => err,
            Err(err) => return Err(err),
        };

        match self.resolver.verify_collaborator(playlist_id, user_id) {
            Ok(()) => Ok(AccessDecision::Allowed(AccessGrant::Collaborator)),
            Err(resolver_error) => {
                debug!(
                    "Collaboration check for {} on {} failed: {}",
                    user_id, playlist_id, resolver_error
                );
                Ok(AccessDecision::Denied(ownership_error))
            }
        }
    }

    pub fn verify_playlist_access(
        &self,
        playlist_id: &PlaylistId,
        user_id: &UserId,
    ) -> ServiceResult<AccessGrant> {
        match self.check_playlist_access(playlist_id, user_id)? {
            AccessDecision::Allowed(grant) => Ok(grant),
            AccessDecision::Denied(err) => Err(err),
        }
    }
}
