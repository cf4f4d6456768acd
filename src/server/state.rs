use axum::extract::FromRef;

use crate::access::PlaylistAccessControl;
use crate::cache::CacheStore;
use crate::catalog::CatalogService;
use crate::collaborations::{CollaborationService, StoreCollaborationResolver};
use crate::likes::AlbumLikeService;
use crate::playlists::PlaylistService;
use crate::store::FullStore;
use crate::user::UserManager;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedUserManager = Arc<UserManager>;
pub type GuardedCatalogService = Arc<CatalogService>;
pub type GuardedAlbumLikeService = Arc<AlbumLikeService>;
pub type GuardedPlaylistService = Arc<PlaylistService>;
pub type GuardedCollaborationService = Arc<CollaborationService>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub hash: String,
    pub user_manager: GuardedUserManager,
    pub catalog: GuardedCatalogService,
    pub album_likes: GuardedAlbumLikeService,
    pub playlists: GuardedPlaylistService,
    pub collaborations: GuardedCollaborationService,
}

impl ServerState {
    /// Wires every service on top of a single store and cache.
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn FullStore>,
        cache: Arc<dyn CacheStore>,
        hash: String,
    ) -> Self {
        let resolver = Arc::new(StoreCollaborationResolver::new(store.clone()));
        let access = Arc::new(PlaylistAccessControl::new(store.clone(), resolver));
        let album_likes = Arc::new(AlbumLikeService::new(store.clone(), cache));

        ServerState {
            config,
            start_time: Instant::now(),
            hash,
            user_manager: Arc::new(UserManager::new(store.clone())),
            catalog: Arc::new(CatalogService::new(store.clone(), album_likes.clone())),
            album_likes,
            playlists: Arc::new(PlaylistService::new(store.clone(), access.clone())),
            collaborations: Arc::new(CollaborationService::new(store, access)),
        }
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedUserManager {
    fn from_ref(input: &ServerState) -> Self {
        input.user_manager.clone()
    }
}

impl FromRef<ServerState> for GuardedCatalogService {
    fn from_ref(input: &ServerState) -> Self {
        input.catalog.clone()
    }
}

impl FromRef<ServerState> for GuardedAlbumLikeService {
    fn from_ref(input: &ServerState) -> Self {
        input.album_likes.clone()
    }
}

impl FromRef<ServerState> for GuardedPlaylistService {
    fn from_ref(input: &ServerState) -> Self {
        input.playlists.clone()
    }
}

impl FromRef<ServerState> for GuardedCollaborationService {
    fn from_ref(input: &ServerState) -> Self {
        input.collaborations.clone()
    }
}
