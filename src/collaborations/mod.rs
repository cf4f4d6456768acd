use crate::access::{CollaborationResolver, PlaylistAccessControl, PLAYLIST_NOT_FOUND};
use crate::error::{ServiceError, ServiceResult};
use crate::ids::{CollaborationId, PlaylistId, UserId};
use crate::store::{FullStore, InsertOutcome};
use std::sync::Arc;
use tracing::info;

/// Resolves collaborations straight from the store.
pub struct StoreCollaborationResolver {
    store: Arc<dyn FullStore>,
}

impl StoreCollaborationResolver {
    pub fn new(store: Arc<dyn FullStore>) -> Self {
        Self { store }
    }
}

impl CollaborationResolver for StoreCollaborationResolver {
    fn verify_collaborator(&self, playlist_id: &PlaylistId, user_id: &UserId) -> ServiceResult<()> {
        if self.store.get_playlist(playlist_id)?.is_none() {
            return Err(ServiceError::not_found(PLAYLIST_NOT_FOUND));
        }
        if !self.store.is_collaborator(playlist_id, user_id)? {
            return Err(ServiceError::authorization(
                "Collaboration could not be verified",
            ));
        }
        Ok(())
    }
}

/// Owner-side management of playlist collaborators.
pub struct CollaborationService {
    store: Arc<dyn FullStore>,
    access: Arc<PlaylistAccessControl>,
}

impl CollaborationService {
    pub fn new(store: Arc<dyn FullStore>, access: Arc<PlaylistAccessControl>) -> Self {
        Self { store, access }
    }

    pub fn add_collaborator(
        &self,
        playlist_id: &PlaylistId,
        owner_id: &UserId,
        collaborator_id: &UserId,
    ) -> ServiceResult<CollaborationId> {
        self.access.verify_playlist_owner(playlist_id, owner_id)?;
        if self.store.get_user(collaborator_id)?.is_none() {
            return Err(ServiceError::not_found("User not found"));
        }

        match self.store.insert_collaboration(playlist_id, collaborator_id)? {
            InsertOutcome::Inserted(collaboration_id) => {
                info!(
                    "User {} now collaborates on playlist {}",
                    collaborator_id, playlist_id
                );
                Ok(collaboration_id)
            }
            InsertOutcome::Duplicate => Err(ServiceError::conflict(
                "User already collaborates on this playlist",
            )),
            InsertOutcome::Skipped => Err(ServiceError::not_found(PLAYLIST_NOT_FOUND)),
        }
    }

    pub fn remove_collaborator(
        &self,
        playlist_id: &PlaylistId,
        owner_id: &UserId,
        collaborator_id: &UserId,
    ) -> ServiceResult<()> {
        self.access.verify_playlist_owner(playlist_id, owner_id)?;
        if !self.store.delete_collaboration(playlist_id, collaborator_id)? {
            return Err(ServiceError::invariant("Failed to remove collaboration"));
        }
        info!(
            "User {} no longer collaborates on playlist {}",
            collaborator_id, playlist_id
        );
        Ok(())
    }
}
