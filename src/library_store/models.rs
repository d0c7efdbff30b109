//! Library entities as stored by the server and mirrored by replicas.
//!
//! Every entity is split into a `*Meta` part (what a writer supplies) and the
//! stored entity (meta plus server-assigned id and timestamps). Timestamps are
//! nanoseconds since the Unix epoch.

use serde::{Deserialize, Serialize};
use std::fmt;

pub type ArtistId = String;
pub type AlbumId = String;
pub type SongId = String;
pub type UserId = String;
pub type PlaylistId = String;

/// Groups songs with no artist assigned.
pub const UNKNOWN_ARTIST_ID: &str = "unknown_artist";
/// Groups songs with no album assigned.
pub const UNKNOWN_ALBUM_ID: &str = "unknown_album";

pub const INCOMING_PLAYLIST_ID: &str = "incoming";
pub const INCOMING_PLAYLIST_NAME: &str = "(incoming)";
pub const INCOMING_PLAYLIST_CAP: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Artist,
    Album,
    Song,
    User,
    Playlist,
    FavoritePlaylist,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Artist,
        EntityKind::Album,
        EntityKind::Song,
        EntityKind::User,
        EntityKind::Playlist,
        EntityKind::FavoritePlaylist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Artist => "artist",
            EntityKind::Album => "album",
            EntityKind::Song => "song",
            EntityKind::User => "user",
            EntityKind::Playlist => "playlist",
            EntityKind::FavoritePlaylist => "favorite_playlist",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistMeta {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: ArtistId,
    pub creation_ts: i64,
    pub update_ts: i64,
    #[serde(flatten)]
    pub meta: ArtistMeta,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumMeta {
    pub name: String,
    #[serde(default)]
    pub artist_ids: Vec<ArtistId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: AlbumId,
    pub creation_ts: i64,
    pub update_ts: i64,
    #[serde(flatten)]
    pub meta: AlbumMeta,
}

fn unknown_album_id() -> AlbumId {
    UNKNOWN_ALBUM_ID.to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongMeta {
    pub name: String,
    #[serde(default = "unknown_album_id")]
    pub album_id: AlbumId,
    /// Ordered, duplicates are dropped on write. Empty means unknown artist.
    #[serde(default)]
    pub artist_ids: Vec<ArtistId>,
    #[serde(default)]
    pub publication_year: Option<i64>,
    #[serde(default)]
    pub track_number: Option<i64>,
    #[serde(default)]
    pub explicit_fg: bool,
}

impl SongMeta {
    pub fn new<S: Into<String>>(name: S) -> SongMeta {
        SongMeta {
            name: name.into(),
            album_id: unknown_album_id(),
            artist_ids: vec![],
            publication_year: None,
            track_number: None,
            explicit_fg: false,
        }
    }

    pub fn has_unknown_album(&self) -> bool {
        self.album_id == UNKNOWN_ALBUM_ID
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub id: SongId,
    pub creation_ts: i64,
    pub update_ts: i64,
    #[serde(flatten)]
    pub meta: SongMeta,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMeta {
    pub name: String,
}

/// What a writer supplies for a user. `password` is optional on update,
/// in which case the stored credentials are kept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetaComplete {
    pub name: String,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub creation_ts: i64,
    pub update_ts: i64,
    #[serde(flatten)]
    pub meta: UserMeta,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistMeta {
    pub name: String,
    /// Stored sorted ascending without duplicates.
    #[serde(default)]
    pub owner_user_ids: Vec<UserId>,
    /// Playback order, duplicates allowed.
    #[serde(default)]
    pub song_ids: Vec<SongId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: PlaylistId,
    pub creation_ts: i64,
    pub update_ts: i64,
    /// Only moves when the name or the song sequence changes.
    pub content_update_ts: i64,
    #[serde(flatten)]
    pub meta: PlaylistMeta,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FavoritePlaylistId {
    pub user_id: UserId,
    pub playlist_id: PlaylistId,
}

impl FavoritePlaylistId {
    pub fn new<U: Into<String>, P: Into<String>>(user_id: U, playlist_id: P) -> Self {
        FavoritePlaylistId {
            user_id: user_id.into(),
            playlist_id: playlist_id.into(),
        }
    }
}

impl fmt::Display for FavoritePlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.playlist_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoritePlaylist {
    #[serde(flatten)]
    pub id: FavoritePlaylistId,
    pub update_ts: i64,
}

/// Marker of a deleted entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone<I> {
    pub id: I,
    pub delete_ts: i64,
}

/// Sorts and removes duplicates, the canonical form of playlist owners.
pub fn normalize_owner_ids(mut ids: Vec<UserId>) -> Vec<UserId> {
    ids.sort();
    ids.dedup();
    ids
}

/// Drops repeated ids keeping the first occurrence, and drops `sentinel`.
pub fn ordered_unique_ids(ids: &[String], sentinel: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.iter()
        .filter(|id| id.as_str() != sentinel && seen.insert(id.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_ids_are_sorted_and_unique() {
        let ids = vec!["c".to_string(), "a".into(), "c".into(), "b".into(), "a".into()];
        assert_eq!(normalize_owner_ids(ids), vec!["a", "b", "c"]);
    }

    #[test]
    fn ordered_unique_keeps_first_occurrence() {
        let ids = vec![
            "z".to_string(),
            UNKNOWN_ARTIST_ID.into(),
            "a".into(),
            "z".into(),
        ];
        assert_eq!(ordered_unique_ids(&ids, UNKNOWN_ARTIST_ID), vec!["z", "a"]);
    }

    #[test]
    fn song_json_is_flat_with_defaults() {
        let meta: SongMeta = serde_json::from_str(r#"{"name":"Intro"}"#).unwrap();
        assert!(meta.has_unknown_album());
        assert!(meta.artist_ids.is_empty());

        let song = Song {
            id: "s1".into(),
            creation_ts: 1,
            update_ts: 2,
            meta,
        };
        let json = serde_json::to_value(&song).unwrap();
        assert_eq!(json["id"], "s1");
        assert_eq!(json["name"], "Intro");
        assert_eq!(json["album_id"], UNKNOWN_ALBUM_ID);
    }

    #[test]
    fn favorite_playlist_json_is_flat() {
        let fav = FavoritePlaylist {
            id: FavoritePlaylistId::new("u1", "p1"),
            update_ts: 7,
        };
        let json = serde_json::to_string(&fav).unwrap();
        let back: FavoritePlaylist = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fav);
        assert!(json.contains(r#""user_id":"u1""#));
    }
}
