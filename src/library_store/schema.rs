//! SQLite schema of the library database.
//!
//! Entity tables carry `update_ts` (and `content_update_ts` for playlists) in
//! nanoseconds; ordered relations use a dense `position` column. Deleted ids
//! are kept forever in `deleted_entity` so they are never handed out again.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema,
};

// =============================================================================
// Entity tables
// =============================================================================

pub const ARTIST_TABLE: Table = Table {
    name: "artist",
    columns: &[
        sqlite_column!("artist_id", &SqlType::Text, is_primary_key = true, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("creation_ts", &SqlType::Integer, non_null = true),
        sqlite_column!("update_ts", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_artist_update_ts", "update_ts")],
    unique_constraints: &[],
};

pub const ALBUM_TABLE: Table = Table {
    name: "album",
    columns: &[
        sqlite_column!("album_id", &SqlType::Text, is_primary_key = true, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("creation_ts", &SqlType::Integer, non_null = true),
        sqlite_column!("update_ts", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_album_update_ts", "update_ts")],
    unique_constraints: &[],
};

/// `album_id` NULL means the unknown album.
pub const SONG_TABLE: Table = Table {
    name: "song",
    columns: &[
        sqlite_column!("song_id", &SqlType::Text, is_primary_key = true, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("album_id", &SqlType::Text),
        sqlite_column!("publication_year", &SqlType::Integer),
        sqlite_column!("track_number", &SqlType::Integer),
        sqlite_column!(
            "explicit_fg",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("creation_ts", &SqlType::Integer, non_null = true),
        sqlite_column!("update_ts", &SqlType::Integer, non_null = true),
    ],
    indices: &[
        ("idx_song_update_ts", "update_ts"),
        ("idx_song_album_id", "album_id"),
    ],
    unique_constraints: &[],
};

pub const USER_TABLE: Table = Table {
    name: "user",
    columns: &[
        sqlite_column!("user_id", &SqlType::Text, is_primary_key = true, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("creation_ts", &SqlType::Integer, non_null = true),
        sqlite_column!("update_ts", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_user_update_ts", "update_ts")],
    unique_constraints: &[&["name"]],
};

pub const PLAYLIST_TABLE: Table = Table {
    name: "playlist",
    columns: &[
        sqlite_column!("playlist_id", &SqlType::Text, is_primary_key = true, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("creation_ts", &SqlType::Integer, non_null = true),
        sqlite_column!("update_ts", &SqlType::Integer, non_null = true),
        sqlite_column!("content_update_ts", &SqlType::Integer, non_null = true),
    ],
    indices: &[
        ("idx_playlist_update_ts", "update_ts"),
        ("idx_playlist_content_update_ts", "content_update_ts"),
    ],
    unique_constraints: &[],
};

// =============================================================================
// Relation tables
// =============================================================================

const ARTIST_FK: ForeignKey = ForeignKey {
    foreign_table: "artist",
    foreign_column: "artist_id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const ALBUM_FK: ForeignKey = ForeignKey {
    foreign_table: "album",
    foreign_column: "album_id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const SONG_FK: ForeignKey = ForeignKey {
    foreign_table: "song",
    foreign_column: "song_id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const USER_FK: ForeignKey = ForeignKey {
    foreign_table: "user",
    foreign_column: "user_id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const PLAYLIST_FK: ForeignKey = ForeignKey {
    foreign_table: "playlist",
    foreign_column: "playlist_id",
    on_delete: ForeignKeyOnChange::Cascade,
};

pub const ALBUM_ARTIST_TABLE: Table = Table {
    name: "album_artist",
    columns: &[
        sqlite_column!("album_id", &SqlType::Text, non_null = true, foreign_key = Some(&ALBUM_FK)),
        sqlite_column!("artist_id", &SqlType::Text, non_null = true, foreign_key = Some(&ARTIST_FK)),
        sqlite_column!("position", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_album_artist_artist_id", "artist_id")],
    unique_constraints: &[&["album_id", "artist_id"]],
};

pub const SONG_ARTIST_TABLE: Table = Table {
    name: "song_artist",
    columns: &[
        sqlite_column!("song_id", &SqlType::Text, non_null = true, foreign_key = Some(&SONG_FK)),
        sqlite_column!("artist_id", &SqlType::Text, non_null = true, foreign_key = Some(&ARTIST_FK)),
        sqlite_column!("position", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_song_artist_artist_id", "artist_id")],
    unique_constraints: &[&["song_id", "artist_id"]],
};

/// One row per playlist owner.
pub const PLAYLIST_OWNED_USER_TABLE: Table = Table {
    name: "playlist_owned_user",
    columns: &[
        sqlite_column!("playlist_id", &SqlType::Text, non_null = true, foreign_key = Some(&PLAYLIST_FK)),
        sqlite_column!("user_id", &SqlType::Text, non_null = true, foreign_key = Some(&USER_FK)),
    ],
    indices: &[("idx_playlist_owned_user_user_id", "user_id")],
    unique_constraints: &[&["playlist_id", "user_id"]],
};

/// Positions are dense `0..N-1` per playlist. Not unique on purpose: the
/// incoming cap shifts every row of a playlist in one UPDATE.
pub const PLAYLIST_SONG_TABLE: Table = Table {
    name: "playlist_song",
    columns: &[
        sqlite_column!("playlist_id", &SqlType::Text, non_null = true, foreign_key = Some(&PLAYLIST_FK)),
        sqlite_column!("position", &SqlType::Integer, non_null = true),
        sqlite_column!("song_id", &SqlType::Text, non_null = true, foreign_key = Some(&SONG_FK)),
    ],
    indices: &[
        ("idx_playlist_song_playlist_position", "playlist_id, position"),
        ("idx_playlist_song_song_id", "song_id"),
    ],
    unique_constraints: &[],
};

pub const FAVORITE_PLAYLIST_TABLE: Table = Table {
    name: "favorite_playlist",
    columns: &[
        sqlite_column!("user_id", &SqlType::Text, non_null = true, foreign_key = Some(&USER_FK)),
        sqlite_column!("playlist_id", &SqlType::Text, non_null = true, foreign_key = Some(&PLAYLIST_FK)),
        sqlite_column!("update_ts", &SqlType::Integer, non_null = true),
    ],
    indices: &[
        ("idx_favorite_playlist_update_ts", "update_ts"),
        ("idx_favorite_playlist_playlist_id", "playlist_id"),
    ],
    unique_constraints: &[&["user_id", "playlist_id"]],
};

// =============================================================================
// Credentials
// =============================================================================

pub const USER_PASSWORD_CREDENTIALS_TABLE: Table = Table {
    name: "user_password_credentials",
    columns: &[
        sqlite_column!("user_id", &SqlType::Text, is_primary_key = true, non_null = true, foreign_key = Some(&USER_FK)),
        sqlite_column!("hash", &SqlType::Text, non_null = true),
        sqlite_column!("hasher", &SqlType::Text, non_null = true),
        sqlite_column!("created", &SqlType::Integer, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

pub const AUTH_TOKEN_TABLE: Table = Table {
    name: "auth_token",
    columns: &[
        sqlite_column!("value", &SqlType::Text, is_primary_key = true, non_null = true),
        sqlite_column!("user_id", &SqlType::Text, non_null = true, foreign_key = Some(&USER_FK)),
        sqlite_column!("created", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_auth_token_user_id", "user_id")],
    unique_constraints: &[],
};

// =============================================================================
// Tombstones
// =============================================================================

pub const DELETED_ENTITY_TABLE: Table = Table {
    name: "deleted_entity",
    columns: &[
        sqlite_column!("entity_kind", &SqlType::Text, non_null = true),
        sqlite_column!("entity_id", &SqlType::Text, non_null = true),
        sqlite_column!("delete_ts", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_deleted_entity_kind_ts", "entity_kind, delete_ts")],
    unique_constraints: &[&["entity_kind", "entity_id"]],
};

pub const DELETED_FAVORITE_PLAYLIST_TABLE: Table = Table {
    name: "deleted_favorite_playlist",
    columns: &[
        sqlite_column!("user_id", &SqlType::Text, non_null = true),
        sqlite_column!("playlist_id", &SqlType::Text, non_null = true),
        sqlite_column!("delete_ts", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_deleted_favorite_playlist_ts", "delete_ts")],
    unique_constraints: &[&["user_id", "playlist_id"]],
};

pub const LIBRARY_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        ARTIST_TABLE,
        ALBUM_TABLE,
        SONG_TABLE,
        USER_TABLE,
        PLAYLIST_TABLE,
        ALBUM_ARTIST_TABLE,
        SONG_ARTIST_TABLE,
        PLAYLIST_OWNED_USER_TABLE,
        PLAYLIST_SONG_TABLE,
        FAVORITE_PLAYLIST_TABLE,
        USER_PASSWORD_CREDENTIALS_TABLE,
        AUTH_TOKEN_TABLE,
        DELETED_ENTITY_TABLE,
        DELETED_FAVORITE_PLAYLIST_TABLE,
    ],
    migration: None,
}];
