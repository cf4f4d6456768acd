//! Opaque identifiers.
//!
//! Every entity gets its own nominal id type so an album id can never be
//! passed where a playlist id is expected. Ids are generated as
//! `{prefix}-{16 random alphanumerics}`; the prefix only helps humans reading
//! logs and database dumps, nothing ever parses it.

use rand::{rng, Rng};
use rand_distr::Alphanumeric;
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

const RANDOM_PART_LEN: usize = 16;

/// A random A-z0-9 string
fn random_string(len: usize) -> String {
    let bytes = rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .collect::<Vec<u8>>();
    String::from_utf8_lossy(&bytes).to_string()
}

macro_rules! opaque_id {
    ($name:ident, $prefix:expr) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            pub fn generate() -> Self {
                Self(format!("{}-{}", Self::PREFIX, random_string(RANDOM_PART_LEN)))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::Borrowed(ValueRef::Text(self.0.as_bytes())))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                String::column_result(value).map(Self)
            }
        }
    };
}

opaque_id!(UserId, "user");
opaque_id!(AlbumId, "album");
opaque_id!(SongId, "song");
opaque_id!(PlaylistId, "playlist");
opaque_id!(PlaylistSongId, "playlist-song");
opaque_id!(CollaborationId, "collab");
opaque_id!(ActivityId, "activity");
opaque_id!(LikeId, "like");
