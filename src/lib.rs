//! Playlist Catalog Server Library
//!
//! Albums, songs, playlists with collaborators, album likes and playlist
//! activity logs behind a JSON REST API.

pub mod access;
pub mod cache;
pub mod catalog;
pub mod collaborations;
pub mod config;
pub mod error;
pub mod ids;
pub mod likes;
pub mod playlists;
pub mod server;
pub mod sqlite_persistence;
pub mod store;
pub mod user;
pub mod validation;

// Re-export commonly used types for convenience
pub use cache::{CacheStore, InMemoryCacheStore};
pub use error::{ServiceError, ServiceResult};
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig};
pub use store::{FullStore, SqliteStore};
