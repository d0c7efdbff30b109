//! Change feed: filters for "changed since" reads and the combined delta.

use super::error::StoreResult;
use super::models::*;
use super::store::LibraryTx;

use serde::{Deserialize, Serialize};

/// `from_ts` omitted means everything.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeFilter {
    #[serde(default)]
    pub from_ts: Option<i64>,
}

impl ChangeFilter {
    pub fn since(from_ts: i64) -> Self {
        ChangeFilter {
            from_ts: Some(from_ts),
        }
    }

    pub fn from_ts_or_zero(&self) -> i64 {
        self.from_ts.unwrap_or(0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistFilter {
    #[serde(default)]
    pub from_ts: Option<i64>,
    #[serde(default)]
    pub favorite_user_id: Option<UserId>,
    /// Only valid together with `favorite_user_id`.
    #[serde(default)]
    pub favorite_from_ts: Option<i64>,
}

impl From<ChangeFilter> for PlaylistFilter {
    fn from(filter: ChangeFilter) -> Self {
        PlaylistFilter {
            from_ts: filter.from_ts,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoritePlaylistFilter {
    #[serde(default)]
    pub from_ts: Option<i64>,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

/// Everything that changed at or after `from_ts`, read in one transaction.
///
/// Within a kind, entries are ascending by `update_ts` (tombstones by
/// `delete_ts`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryDelta {
    pub from_ts: i64,
    pub artists: Vec<Artist>,
    pub albums: Vec<Album>,
    pub songs: Vec<Song>,
    pub users: Vec<User>,
    pub playlists: Vec<Playlist>,
    pub favorite_playlists: Vec<FavoritePlaylist>,
    pub deleted_artists: Vec<Tombstone<ArtistId>>,
    pub deleted_albums: Vec<Tombstone<AlbumId>>,
    pub deleted_songs: Vec<Tombstone<SongId>>,
    pub deleted_users: Vec<Tombstone<UserId>>,
    pub deleted_playlists: Vec<Tombstone<PlaylistId>>,
    pub deleted_favorite_playlists: Vec<Tombstone<FavoritePlaylistId>>,
}

impl LibraryDelta {
    /// Highest `update_ts` / `delete_ts` carried, `None` when empty.
    pub fn max_ts(&self) -> Option<i64> {
        let updates = self
            .artists
            .iter()
            .map(|e| e.update_ts)
            .chain(self.albums.iter().map(|e| e.update_ts))
            .chain(self.songs.iter().map(|e| e.update_ts))
            .chain(self.users.iter().map(|e| e.update_ts))
            .chain(self.playlists.iter().map(|e| e.update_ts))
            .chain(self.favorite_playlists.iter().map(|e| e.update_ts));
        let deletes = self
            .deleted_artists
            .iter()
            .chain(&self.deleted_albums)
            .chain(&self.deleted_songs)
            .chain(&self.deleted_users)
            .chain(&self.deleted_playlists)
            .map(|t| t.delete_ts)
            .chain(self.deleted_favorite_playlists.iter().map(|t| t.delete_ts));
        updates.chain(deletes).max()
    }

    pub fn upsert_count(&self) -> usize {
        self.artists.len()
            + self.albums.len()
            + self.songs.len()
            + self.users.len()
            + self.playlists.len()
            + self.favorite_playlists.len()
    }

    pub fn delete_count(&self) -> usize {
        self.deleted_artists.len()
            + self.deleted_albums.len()
            + self.deleted_songs.len()
            + self.deleted_users.len()
            + self.deleted_playlists.len()
            + self.deleted_favorite_playlists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upsert_count() == 0 && self.delete_count() == 0
    }

    /// Number of entries per kind, upserts and tombstones together.
    pub fn counts_by_kind(&self) -> [(EntityKind, usize); 6] {
        [
            (
                EntityKind::Artist,
                self.artists.len() + self.deleted_artists.len(),
            ),
            (EntityKind::Album, self.albums.len() + self.deleted_albums.len()),
            (EntityKind::Song, self.songs.len() + self.deleted_songs.len()),
            (EntityKind::User, self.users.len() + self.deleted_users.len()),
            (
                EntityKind::Playlist,
                self.playlists.len() + self.deleted_playlists.len(),
            ),
            (
                EntityKind::FavoritePlaylist,
                self.favorite_playlists.len() + self.deleted_favorite_playlists.len(),
            ),
        ]
    }
}

impl LibraryTx<'_> {
    /// Tombstoned ids of an entity kind, ascending by `delete_ts`.
    pub fn read_deleted_ids(&self, kind: EntityKind, from_ts: Option<i64>) -> StoreResult<Vec<String>> {
        Ok(self
            .read_tombstones(kind, from_ts)?
            .into_iter()
            .map(|t| t.id)
            .collect())
    }

    pub fn read_delta(&self, from_ts: i64) -> StoreResult<LibraryDelta> {
        let filter = ChangeFilter::since(from_ts);
        Ok(LibraryDelta {
            from_ts,
            artists: self.read_artists(&filter)?,
            albums: self.read_albums(&filter)?,
            songs: self.read_songs(&filter)?,
            users: self.read_users(&filter)?,
            playlists: self.read_playlists(&filter.into())?,
            favorite_playlists: self.read_favorite_playlists(&FavoritePlaylistFilter {
                from_ts: Some(from_ts),
                user_id: None,
            })?,
            deleted_artists: self.read_tombstones(EntityKind::Artist, Some(from_ts))?,
            deleted_albums: self.read_tombstones(EntityKind::Album, Some(from_ts))?,
            deleted_songs: self.read_tombstones(EntityKind::Song, Some(from_ts))?,
            deleted_users: self.read_tombstones(EntityKind::User, Some(from_ts))?,
            deleted_playlists: self.read_tombstones(EntityKind::Playlist, Some(from_ts))?,
            deleted_favorite_playlists: self.read_favorite_playlist_tombstones(Some(from_ts))?,
        })
    }
}
