//! Playlist, playlist song, activity and collaboration routes. All of them
//! require a session.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::server::{json_payload, success_data, success_message};
use super::session::Session;
use super::state::{GuardedCollaborationService, GuardedPlaylistService, ServerState};
use crate::error::ServiceError;
use crate::ids::{PlaylistId, SongId, UserId};
use crate::playlists::{ActivityOutcome, MutationOutcome};

#[derive(Deserialize, Debug)]
struct CreatePlaylistBody {
    pub name: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PlaylistSongBody {
    pub song_id: SongId,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct CollaborationBody {
    pub playlist_id: PlaylistId,
    pub user_id: UserId,
}

/// Membership changes succeed even when the activity record could not be
/// written. The response says which of the two happened.
fn mutation_response(status: StatusCode, message: &str, outcome: MutationOutcome) -> Response {
    if let ActivityOutcome::Failed(reason) = &outcome.activity {
        warn!("Responding with partial success: {}", reason);
    }
    (
        status,
        Json(json!({
            "status": "success",
            "message": message,
            "data": { "activityRecorded": outcome.activity.is_recorded() },
        })),
    )
        .into_response()
}

// =============================================================================
// Playlists
// =============================================================================

async fn post_playlist(
    session: Session,
    State(playlists): State<GuardedPlaylistService>,
    payload: Result<Json<CreatePlaylistBody>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let body = json_payload(payload)?;
    let playlist_id = playlists.create_playlist(&session.user_id, &body.name)?;
    Ok(success_data(
        StatusCode::CREATED,
        json!({ "playlistId": playlist_id }),
    ))
}

async fn get_playlists(
    session: Session,
    State(playlists): State<GuardedPlaylistService>,
) -> Result<Response, ServiceError> {
    let user_playlists = playlists.get_playlists_for_user(&session.user_id)?;
    Ok(success_data(
        StatusCode::OK,
        json!({ "playlists": user_playlists }),
    ))
}

async fn delete_playlist(
    session: Session,
    State(playlists): State<GuardedPlaylistService>,
    Path(id): Path<PlaylistId>,
) -> Result<Response, ServiceError> {
    playlists.delete_playlist(&id, &session.user_id)?;
    Ok(success_message(StatusCode::OK, "Playlist deleted"))
}

async fn post_playlist_song(
    session: Session,
    State(playlists): State<GuardedPlaylistService>,
    Path(id): Path<PlaylistId>,
    payload: Result<Json<PlaylistSongBody>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let body = json_payload(payload)?;
    let outcome = playlists.add_song_to_playlist(&id, &body.song_id, &session.user_id)?;
    Ok(mutation_response(
        StatusCode::CREATED,
        "Song added to playlist",
        outcome,
    ))
}

async fn get_playlist_songs(
    session: Session,
    State(playlists): State<GuardedPlaylistService>,
    Path(id): Path<PlaylistId>,
) -> Result<Response, ServiceError> {
    let playlist = playlists.get_playlist_songs(&id, &session.user_id)?;
    Ok(success_data(StatusCode::OK, json!({ "playlist": playlist })))
}

async fn delete_playlist_song(
    session: Session,
    State(playlists): State<GuardedPlaylistService>,
    Path(id): Path<PlaylistId>,
    payload: Result<Json<PlaylistSongBody>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let body = json_payload(payload)?;
    let outcome = playlists.remove_song_from_playlist(&id, &body.song_id, &session.user_id)?;
    Ok(mutation_response(
        StatusCode::OK,
        "Song removed from playlist",
        outcome,
    ))
}

async fn get_playlist_activities(
    session: Session,
    State(playlists): State<GuardedPlaylistService>,
    Path(id): Path<PlaylistId>,
) -> Result<Response, ServiceError> {
    let activities = playlists.get_playlist_activities(&id, &session.user_id)?;
    Ok(success_data(
        StatusCode::OK,
        json!({ "playlistId": id, "activities": activities }),
    ))
}

// =============================================================================
// Collaborations
// =============================================================================

async fn post_collaboration(
    session: Session,
    State(collaborations): State<GuardedCollaborationService>,
    payload: Result<Json<CollaborationBody>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let body = json_payload(payload)?;
    let collaboration_id =
        collaborations.add_collaborator(&body.playlist_id, &session.user_id, &body.user_id)?;
    Ok(success_data(
        StatusCode::CREATED,
        json!({ "collaborationId": collaboration_id }),
    ))
}

async fn delete_collaboration(
    session: Session,
    State(collaborations): State<GuardedCollaborationService>,
    payload: Result<Json<CollaborationBody>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let body = json_payload(payload)?;
    collaborations.remove_collaborator(&body.playlist_id, &session.user_id, &body.user_id)?;
    Ok(success_message(StatusCode::OK, "Collaboration removed"))
}

pub fn make_playlist_routes(state: ServerState) -> Router {
    Router::new()
        .route("/playlists", post(post_playlist).get(get_playlists))
        .route("/playlists/{id}", delete(delete_playlist))
        .route(
            "/playlists/{id}/songs",
            post(post_playlist_song)
                .get(get_playlist_songs)
                .delete(delete_playlist_song),
        )
        .route("/playlists/{id}/activities", get(get_playlist_activities))
        .route(
            "/collaborations",
            post(post_collaboration).delete(delete_collaboration),
        )
        .with_state(state)
}
