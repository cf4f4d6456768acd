//! Album likes and the cached like counter.
//!
//! The counter lives under `likes:{album_id}` with no expiry. Every toggle
//! drops the entry after each row write; the next read recomputes it from
//! the store and writes it back.

use crate::cache::{CacheLookup, CacheStore};
use crate::error::{ServiceError, ServiceResult};
use crate::ids::{AlbumId, UserId};
use crate::store::{FullStore, InsertOutcome};
use anyhow::Context;
use std::sync::Arc;
use tracing::{debug, warn};

pub const ALBUM_NOT_FOUND: &str = "Album not found";

pub fn like_count_cache_key(album_id: &AlbumId) -> String {
    format!("likes:{}", album_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeToggle {
    Liked,
    Unliked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeCount {
    pub count: u64,
    pub from_cache: bool,
}

pub struct AlbumLikeService {
    store: Arc<dyn FullStore>,
    cache: Arc<dyn CacheStore>,
}

impl AlbumLikeService {
    pub fn new(store: Arc<dyn FullStore>, cache: Arc<dyn CacheStore>) -> Self {
        Self { store, cache }
    }

    fn cached_count(&self, key: &str) -> Option<u64> {
        match self.cache.get(key) {
            Ok(CacheLookup::Hit(value)) => match value.parse::<u64>() {
                Ok(count) => Some(count),
                Err(_) => {
                    warn!("Ignoring unparsable cache value '{}' for {}", value, key);
                    None
                }
            },
            Ok(CacheLookup::Miss) => None,
            Err(err) => {
                warn!("Cache read for {} failed: {:#}", key, err);
                None
            }
        }
    }

    /// Cache-first read of the like counter. Zero likes is a valid count,
    /// a missing album is not.
    pub fn get_like_count(&self, album_id: &AlbumId) -> ServiceResult<LikeCount> {
        let key = like_count_cache_key(album_id);
        if let Some(count) = self.cached_count(&key) {
            debug!("Like count for {} served from cache", album_id);
            return Ok(LikeCount {
                count,
                from_cache: true,
            });
        }

        if !self.store.album_exists(album_id)? {
            return Err(ServiceError::not_found(ALBUM_NOT_FOUND));
        }
        let count = self.store.count_album_likes(album_id)?;

        if let Err(err) = self.cache.set(&key, count.to_string()) {
            warn!("Failed to cache like count for {}: {:#}", album_id, err);
        }
        Ok(LikeCount {
            count,
            from_cache: false,
        })
    }

    /// Flips the user's like on the album.
    ///
    /// The cache entry is dropped after every row write, so a count refilled
    /// by a reader in between is dropped again. A failed drop fails the call.
    pub fn toggle_like(&self, user_id: &UserId, album_id: &AlbumId) -> ServiceResult<LikeToggle> {
        if !self.store.album_exists(album_id)? {
            return Err(ServiceError::not_found(ALBUM_NOT_FOUND));
        }

        let unliked = self.store.delete_album_like(user_id, album_id)?;
        self.invalidate(album_id)?;

        if unliked {
            debug!("User {} unliked album {}", user_id, album_id);
            return Ok(LikeToggle::Unliked);
        }

        let outcome = self.store.insert_album_like(user_id, album_id)?;
        self.invalidate(album_id)?;

        match outcome {
            InsertOutcome::Inserted(like_id) => {
                debug!("User {} liked album {} ({})", user_id, album_id, like_id);
                Ok(LikeToggle::Liked)
            }
            InsertOutcome::Duplicate => Err(ServiceError::conflict(
                "A concurrent request already changed this like",
            )),
            InsertOutcome::Skipped => Err(ServiceError::invariant("Failed to add like")),
        }
    }

    pub fn invalidate(&self, album_id: &AlbumId) -> ServiceResult<()> {
        self.cache
            .delete(&like_count_cache_key(album_id))
            .with_context(|| format!("Failed to invalidate like count for {}", album_id))?;
        Ok(())
    }
}
