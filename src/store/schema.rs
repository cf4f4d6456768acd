//! SQLite schema for the music database.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

const USER_ID_FK: ForeignKey = ForeignKey {
    foreign_table: "user",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const ALBUM_ID_FK: ForeignKey = ForeignKey {
    foreign_table: "album",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const SONG_ID_FK: ForeignKey = ForeignKey {
    foreign_table: "song",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const PLAYLIST_ID_FK: ForeignKey = ForeignKey {
    foreign_table: "playlist",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

// =============================================================================
// Version 1 - Users, catalog, playlists, collaborations
// =============================================================================

pub const USER_TABLE_V1: Table = Table {
    name: "user",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("username", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("fullname", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

pub const USER_PASSWORD_CREDENTIALS_TABLE_V1: Table = Table {
    name: "user_password_credentials",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Text,
            is_primary_key = true,
            foreign_key = Some(&USER_ID_FK)
        ),
        sqlite_column!("salt", &SqlType::Text, non_null = true),
        sqlite_column!("hash", &SqlType::Text, non_null = true),
        sqlite_column!("hasher", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

pub const AUTH_TOKEN_TABLE_V1: Table = Table {
    name: "auth_token",
    columns: &[
        sqlite_column!("value", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "user_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&USER_ID_FK)
        ),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("last_used", &SqlType::Integer),
    ],
    indices: &[("idx_auth_token_user_id", "user_id")],
    unique_constraints: &[],
};

const ALBUM_TABLE_V1: Table = Table {
    name: "album",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("year", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

pub const SONG_TABLE_V1: Table = Table {
    name: "song",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("year", &SqlType::Integer, non_null = true),
        sqlite_column!("genre", &SqlType::Text, non_null = true),
        sqlite_column!("performer", &SqlType::Text, non_null = true),
        sqlite_column!("duration", &SqlType::Integer),
        sqlite_column!("album_id", &SqlType::Text, foreign_key = Some(&ALBUM_ID_FK)),
    ],
    indices: &[("idx_song_album_id", "album_id")],
    unique_constraints: &[],
};

pub const PLAYLIST_TABLE_V1: Table = Table {
    name: "playlist",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!(
            "owner",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&USER_ID_FK)
        ),
    ],
    indices: &[("idx_playlist_owner", "owner")],
    unique_constraints: &[],
};

/// Duplicate (playlist_id, song_id) pairs are allowed.
pub const PLAYLIST_SONG_TABLE_V1: Table = Table {
    name: "playlist_song",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "playlist_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&PLAYLIST_ID_FK)
        ),
        sqlite_column!(
            "song_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&SONG_ID_FK)
        ),
    ],
    indices: &[("idx_playlist_song_playlist_id", "playlist_id")],
    unique_constraints: &[],
};

/// Append-only. song_id and user_id are deliberately not foreign keys so
/// the record outlives the song or user it mentions.
pub const PLAYLIST_SONG_ACTIVITY_TABLE_V1: Table = Table {
    name: "playlist_song_activity",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "playlist_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&PLAYLIST_ID_FK)
        ),
        sqlite_column!("song_id", &SqlType::Text, non_null = true),
        sqlite_column!("user_id", &SqlType::Text, non_null = true),
        sqlite_column!("action", &SqlType::Text, non_null = true),
        sqlite_column!(
            "time",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_playlist_song_activity_playlist_id", "playlist_id")],
    unique_constraints: &[],
};

pub const COLLABORATION_TABLE_V1: Table = Table {
    name: "collaboration",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "playlist_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&PLAYLIST_ID_FK)
        ),
        sqlite_column!(
            "user_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&USER_ID_FK)
        ),
    ],
    indices: &[("idx_collaboration_user_id", "user_id")],
    unique_constraints: &[&["playlist_id", "user_id"]],
};

// =============================================================================
// Version 2 - Album covers and album likes
// =============================================================================

pub const ALBUM_TABLE_V2: Table = Table {
    name: "album",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("year", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("cover_url", &SqlType::Text),
    ],
    indices: &[],
    unique_constraints: &[],
};

pub const USER_ALBUM_LIKE_TABLE_V2: Table = Table {
    name: "user_album_like",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "album_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ALBUM_ID_FK)
        ),
        sqlite_column!(
            "user_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&USER_ID_FK)
        ),
    ],
    indices: &[("idx_user_album_like_album_id", "album_id")],
    unique_constraints: &[&["user_id", "album_id"]],
};

fn migrate_v1_to_v2(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    conn.execute("ALTER TABLE album ADD COLUMN cover_url TEXT", [])?;
    USER_ALBUM_LIKE_TABLE_V2.create(conn)?;
    Ok(())
}

pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 1,
        tables: &[
            USER_TABLE_V1,
            USER_PASSWORD_CREDENTIALS_TABLE_V1,
            AUTH_TOKEN_TABLE_V1,
            ALBUM_TABLE_V1,
            SONG_TABLE_V1,
            PLAYLIST_TABLE_V1,
            PLAYLIST_SONG_TABLE_V1,
            PLAYLIST_SONG_ACTIVITY_TABLE_V1,
            COLLABORATION_TABLE_V1,
        ],
        migration: None,
    },
    VersionedSchema {
        version: 2,
        tables: &[
            USER_TABLE_V1,
            USER_PASSWORD_CREDENTIALS_TABLE_V1,
            AUTH_TOKEN_TABLE_V1,
            ALBUM_TABLE_V2,
            SONG_TABLE_V1,
            PLAYLIST_TABLE_V1,
            PLAYLIST_SONG_TABLE_V1,
            PLAYLIST_SONG_ACTIVITY_TABLE_V1,
            COLLABORATION_TABLE_V1,
            USER_ALBUM_LIKE_TABLE_V2,
        ],
        migration: Some(migrate_v1_to_v2),
    },
];
