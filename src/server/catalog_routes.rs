//! Album, song and album like routes.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::server::{json_payload, success_data, success_message};
use super::session::Session;
use super::state::{GuardedAlbumLikeService, GuardedCatalogService, ServerState};
use crate::error::ServiceError;
use crate::ids::{AlbumId, SongId};
use crate::likes::LikeToggle;
use crate::store::{NewAlbum, NewSong};

pub const DATA_SOURCE_HEADER: &str = "X-Data-Source";

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct CoverBody {
    pub cover_url: String,
}

#[derive(Deserialize, Debug, Default)]
struct SongSearchParams {
    pub title: Option<String>,
    pub performer: Option<String>,
}

// =============================================================================
// Albums
// =============================================================================

async fn post_album(
    State(catalog): State<GuardedCatalogService>,
    payload: Result<Json<NewAlbum>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let album = json_payload(payload)?;
    let album_id = catalog.add_album(&album)?;
    Ok(success_data(
        StatusCode::CREATED,
        json!({ "albumId": album_id }),
    ))
}

async fn get_album(
    State(catalog): State<GuardedCatalogService>,
    Path(id): Path<AlbumId>,
) -> Result<Response, ServiceError> {
    let album = catalog.get_album(&id)?;
    Ok(success_data(StatusCode::OK, json!({ "album": album })))
}

async fn put_album(
    State(catalog): State<GuardedCatalogService>,
    Path(id): Path<AlbumId>,
    payload: Result<Json<NewAlbum>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let album = json_payload(payload)?;
    catalog.edit_album(&id, &album)?;
    Ok(success_message(StatusCode::OK, "Album updated"))
}

async fn delete_album(
    State(catalog): State<GuardedCatalogService>,
    Path(id): Path<AlbumId>,
) -> Result<Response, ServiceError> {
    catalog.delete_album(&id)?;
    Ok(success_message(StatusCode::OK, "Album deleted"))
}

async fn put_album_cover(
    State(catalog): State<GuardedCatalogService>,
    Path(id): Path<AlbumId>,
    payload: Result<Json<CoverBody>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let body = json_payload(payload)?;
    catalog.edit_album_cover(&id, &body.cover_url)?;
    Ok(success_message(StatusCode::OK, "Album cover updated"))
}

async fn post_album_like(
    session: Session,
    State(likes): State<GuardedAlbumLikeService>,
    Path(id): Path<AlbumId>,
) -> Result<Response, ServiceError> {
    let message = match likes.toggle_like(&session.user_id, &id)? {
        LikeToggle::Liked => "Album liked",
        LikeToggle::Unliked => "Album unliked",
    };
    Ok(success_message(StatusCode::CREATED, message))
}

async fn get_album_likes(
    State(likes): State<GuardedAlbumLikeService>,
    Path(id): Path<AlbumId>,
) -> Result<Response, ServiceError> {
    let like_count = likes.get_like_count(&id)?;
    let mut response = success_data(StatusCode::OK, json!({ "likes": like_count.count }));
    if like_count.from_cache {
        response
            .headers_mut()
            .insert(DATA_SOURCE_HEADER, HeaderValue::from_static("cache"));
    }
    Ok(response)
}

// =============================================================================
// Songs
// =============================================================================

async fn post_song(
    State(catalog): State<GuardedCatalogService>,
    payload: Result<Json<NewSong>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let song = json_payload(payload)?;
    let song_id = catalog.add_song(&song)?;
    Ok(success_data(StatusCode::CREATED, json!({ "songId": song_id })))
}

async fn search_songs(
    State(catalog): State<GuardedCatalogService>,
    Query(params): Query<SongSearchParams>,
) -> Result<Response, ServiceError> {
    let songs = catalog.search_songs(params.title.as_deref(), params.performer.as_deref())?;
    Ok(success_data(StatusCode::OK, json!({ "songs": songs })))
}

async fn get_song(
    State(catalog): State<GuardedCatalogService>,
    Path(id): Path<SongId>,
) -> Result<Response, ServiceError> {
    let song = catalog.get_song(&id)?;
    Ok(success_data(StatusCode::OK, json!({ "song": song })))
}

async fn put_song(
    State(catalog): State<GuardedCatalogService>,
    Path(id): Path<SongId>,
    payload: Result<Json<NewSong>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let song = json_payload(payload)?;
    catalog.edit_song(&id, &song)?;
    Ok(success_message(StatusCode::OK, "Song updated"))
}

async fn delete_song(
    State(catalog): State<GuardedCatalogService>,
    Path(id): Path<SongId>,
) -> Result<Response, ServiceError> {
    catalog.delete_song(&id)?;
    Ok(success_message(StatusCode::OK, "Song deleted"))
}

pub fn make_catalog_routes(state: ServerState) -> Router {
    Router::new()
        .route("/albums", post(post_album))
        .route(
            "/albums/{id}",
            get(get_album).put(put_album).delete(delete_album),
        )
        .route("/albums/{id}/cover", put(put_album_cover))
        .route(
            "/albums/{id}/likes",
            post(post_album_like).get(get_album_likes),
        )
        .route("/songs", post(post_song).get(search_songs))
        .route("/songs/{id}", get(get_song).put(put_song).delete(delete_song))
        .with_state(state)
}
