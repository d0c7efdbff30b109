//! In-memory replica of the library: canonical maps plus derived indexes.

use crate::library_store::*;
use std::collections::HashMap;

/// Derived, rebuildable views over the canonical maps. Every list holds ids
/// only; a lookup of an id that is not (yet) in the maps yields nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LibraryIndexes {
    pub ordered_artists: Vec<ArtistId>,
    pub ordered_albums: Vec<AlbumId>,
    pub ordered_songs: Vec<SongId>,
    pub ordered_users: Vec<UserId>,
    pub ordered_playlists: Vec<PlaylistId>,
    /// Songs without artist are under [`UNKNOWN_ARTIST_ID`].
    pub artist_ordered_songs: HashMap<ArtistId, Vec<SongId>>,
    /// Songs without album are under [`UNKNOWN_ALBUM_ID`].
    pub album_ordered_songs: HashMap<AlbumId, Vec<SongId>>,
    pub user_ordered_favorite_playlists: HashMap<UserId, Vec<PlaylistId>>,
    pub user_ordered_owned_playlists: HashMap<UserId, Vec<PlaylistId>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocalDb {
    /// Highest `update_ts`/`delete_ts` folded in, 0 before the first refresh.
    pub watermark: i64,
    pub artists: HashMap<ArtistId, Artist>,
    pub albums: HashMap<AlbumId, Album>,
    pub songs: HashMap<SongId, Song>,
    pub users: HashMap<UserId, User>,
    pub playlists: HashMap<PlaylistId, Playlist>,
    pub favorite_playlists: HashMap<FavoritePlaylistId, FavoritePlaylist>,
    pub indexes: LibraryIndexes,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub upserts: usize,
    pub deletes: usize,
}

fn name_key(name: &str, id: &str) -> (String, String) {
    (name.to_lowercase(), id.to_string())
}

fn sorted_ids<'a, T: 'a, I, K, F>(items: I, key: F) -> Vec<String>
where
    I: Iterator<Item = (&'a String, &'a T)>,
    K: Ord,
    F: Fn(&'a String, &'a T) -> K,
{
    let mut keyed: Vec<(K, &String)> = items.map(|(id, item)| (key(id, item), id)).collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.into_iter().map(|(_, id)| id.clone()).collect()
}

impl LocalDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a delta in: upserts first, then deletions (a deletion wins over
    /// an upsert of the same id), then a full index rebuild.
    pub fn apply_delta(&mut self, delta: &LibraryDelta) -> ApplyStats {
        for artist in &delta.artists {
            self.artists.insert(artist.id.clone(), artist.clone());
        }
        for album in &delta.albums {
            self.albums.insert(album.id.clone(), album.clone());
        }
        for song in &delta.songs {
            self.songs.insert(song.id.clone(), song.clone());
        }
        for user in &delta.users {
            self.users.insert(user.id.clone(), user.clone());
        }
        for playlist in &delta.playlists {
            self.playlists.insert(playlist.id.clone(), playlist.clone());
        }
        for favorite in &delta.favorite_playlists {
            self.favorite_playlists
                .insert(favorite.id.clone(), favorite.clone());
        }

        for tombstone in &delta.deleted_artists {
            self.artists.remove(&tombstone.id);
        }
        for tombstone in &delta.deleted_albums {
            self.albums.remove(&tombstone.id);
        }
        for tombstone in &delta.deleted_songs {
            self.songs.remove(&tombstone.id);
        }
        for tombstone in &delta.deleted_users {
            self.users.remove(&tombstone.id);
        }
        for tombstone in &delta.deleted_playlists {
            self.playlists.remove(&tombstone.id);
        }
        for tombstone in &delta.deleted_favorite_playlists {
            self.favorite_playlists.remove(&tombstone.id);
        }

        self.rebuild_indexes();
        if let Some(ts) = delta.max_ts() {
            self.watermark = self.watermark.max(ts);
        }

        ApplyStats {
            upserts: delta.upsert_count(),
            deletes: delta.delete_count(),
        }
    }

    pub fn rebuild_indexes(&mut self) {
        let mut indexes = LibraryIndexes {
            ordered_artists: sorted_ids(self.artists.iter(), |id, a| name_key(&a.meta.name, id)),
            ordered_albums: sorted_ids(self.albums.iter(), |id, a| name_key(&a.meta.name, id)),
            ordered_songs: sorted_ids(self.songs.iter(), |id, s| name_key(&s.meta.name, id)),
            ordered_users: sorted_ids(self.users.iter(), |id, u| name_key(&u.meta.name, id)),
            ordered_playlists: sorted_ids(self.playlists.iter(), |id, p| {
                name_key(&p.meta.name, id)
            }),
            ..Default::default()
        };

        // ordered_songs is already by name, so pushing in that order keeps
        // artist buckets sorted
        for song_id in &indexes.ordered_songs {
            let song = &self.songs[song_id];
            if song.meta.artist_ids.is_empty() {
                indexes
                    .artist_ordered_songs
                    .entry(UNKNOWN_ARTIST_ID.to_string())
                    .or_default()
                    .push(song_id.clone());
            }
            for artist_id in &song.meta.artist_ids {
                indexes
                    .artist_ordered_songs
                    .entry(artist_id.clone())
                    .or_default()
                    .push(song_id.clone());
            }
            indexes
                .album_ordered_songs
                .entry(song.meta.album_id.clone())
                .or_default()
                .push(song_id.clone());
        }
        for (album_id, song_ids) in indexes.album_ordered_songs.iter_mut() {
            if album_id == UNKNOWN_ALBUM_ID {
                continue;
            }
            // stable: equal track numbers keep the name order
            song_ids.sort_by_key(|id| {
                let track = self.songs[id].meta.track_number;
                (track.is_none(), track)
            });
        }

        let mut favorites: Vec<&FavoritePlaylistId> = self.favorite_playlists.keys().collect();
        favorites.sort();
        for favorite in favorites {
            indexes
                .user_ordered_favorite_playlists
                .entry(favorite.user_id.clone())
                .or_default()
                .push(favorite.playlist_id.clone());
        }
        for playlist_id in &indexes.ordered_playlists {
            for owner_id in &self.playlists[playlist_id].meta.owner_user_ids {
                indexes
                    .user_ordered_owned_playlists
                    .entry(owner_id.clone())
                    .or_default()
                    .push(playlist_id.clone());
            }
        }
        let playlist_order: HashMap<&String, usize> = indexes
            .ordered_playlists
            .iter()
            .enumerate()
            .map(|(i, id)| (id, i))
            .collect();
        for playlist_ids in indexes.user_ordered_favorite_playlists.values_mut() {
            // favorites of playlists not folded in yet go last
            playlist_ids.sort_by_key(|id| playlist_order.get(id).copied().unwrap_or(usize::MAX));
        }

        self.indexes = indexes;
    }

    pub fn artist(&self, id: &str) -> Option<&Artist> {
        self.artists.get(id)
    }

    pub fn album(&self, id: &str) -> Option<&Album> {
        self.albums.get(id)
    }

    pub fn song(&self, id: &str) -> Option<&Song> {
        self.songs.get(id)
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.get(id)
    }

    pub fn playlist(&self, id: &str) -> Option<&Playlist> {
        self.playlists.get(id)
    }

    fn resolve<'a, T>(map: &'a HashMap<String, T>, ids: Option<&'a Vec<String>>) -> Vec<&'a T> {
        ids.map(|ids| ids.iter().filter_map(|id| map.get(id)).collect())
            .unwrap_or_default()
    }

    /// Songs of an artist by name; [`UNKNOWN_ARTIST_ID`] gives the orphans.
    pub fn songs_of_artist(&self, artist_id: &str) -> Vec<&Song> {
        Self::resolve(&self.songs, self.indexes.artist_ordered_songs.get(artist_id))
    }

    /// Songs of an album by track number; [`UNKNOWN_ALBUM_ID`] gives the orphans.
    pub fn songs_of_album(&self, album_id: &str) -> Vec<&Song> {
        Self::resolve(&self.songs, self.indexes.album_ordered_songs.get(album_id))
    }

    /// Playback order; songs not present locally are skipped.
    pub fn playlist_songs(&self, playlist_id: &str) -> Vec<&Song> {
        self.playlist(playlist_id)
            .map(|p| p.meta.song_ids.iter().filter_map(|id| self.song(id)).collect())
            .unwrap_or_default()
    }

    pub fn favorite_playlists_of_user(&self, user_id: &str) -> Vec<&Playlist> {
        Self::resolve(
            &self.playlists,
            self.indexes.user_ordered_favorite_playlists.get(user_id),
        )
    }

    pub fn owned_playlists_of_user(&self, user_id: &str) -> Vec<&Playlist> {
        Self::resolve(
            &self.playlists,
            self.indexes.user_ordered_owned_playlists.get(user_id),
        )
    }

    /// Display name of an artist id, tolerant to the sentinel and to artists
    /// not folded in yet.
    pub fn artist_name(&self, artist_id: &str) -> &str {
        match self.artist(artist_id) {
            Some(artist) => &artist.meta.name,
            None if artist_id == UNKNOWN_ARTIST_ID => "(unknown artist)",
            None => "(missing artist)",
        }
    }

    pub fn album_name(&self, album_id: &str) -> &str {
        match self.album(album_id) {
            Some(album) => &album.meta.name,
            None if album_id == UNKNOWN_ALBUM_ID => "(unknown album)",
            None => "(missing album)",
        }
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Artist => self.artists.len(),
            EntityKind::Album => self.albums.len(),
            EntityKind::Song => self.songs.len(),
            EntityKind::User => self.users.len(),
            EntityKind::Playlist => self.playlists.len(),
            EntityKind::FavoritePlaylist => self.favorite_playlists.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artist(id: &str, name: &str, ts: i64) -> Artist {
        Artist {
            id: id.into(),
            creation_ts: ts,
            update_ts: ts,
            meta: ArtistMeta { name: name.into() },
        }
    }

    fn song(id: &str, name: &str, album: &str, artists: &[&str], track: Option<i64>, ts: i64) -> Song {
        let mut meta = SongMeta::new(name);
        meta.album_id = album.into();
        meta.artist_ids = artists.iter().map(|a| a.to_string()).collect();
        meta.track_number = track;
        Song {
            id: id.into(),
            creation_ts: ts,
            update_ts: ts,
            meta,
        }
    }

    fn playlist(id: &str, name: &str, owners: &[&str], songs: &[&str], ts: i64) -> Playlist {
        Playlist {
            id: id.into(),
            creation_ts: ts,
            update_ts: ts,
            content_update_ts: ts,
            meta: PlaylistMeta {
                name: name.into(),
                owner_user_ids: owners.iter().map(|o| o.to_string()).collect(),
                song_ids: songs.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    #[test]
    fn indexes_group_and_order() {
        let mut db = LocalDb::new();
        let delta = LibraryDelta {
            artists: vec![artist("a1", "zappa", 1), artist("a2", "Abba", 2)],
            songs: vec![
                song("s1", "b-side", "al", &["a1"], Some(2), 3),
                song("s2", "a-side", "al", &["a1", "a2"], Some(1), 4),
                song("s3", "Lonely", UNKNOWN_ALBUM_ID, &[], None, 5),
            ],
            ..Default::default()
        };
        db.apply_delta(&delta);

        assert_eq!(db.indexes.ordered_artists, vec!["a2", "a1"]);
        assert_eq!(db.indexes.ordered_songs, vec!["s2", "s1", "s3"]);
        assert_eq!(db.indexes.artist_ordered_songs["a1"], vec!["s2", "s1"]);
        assert_eq!(db.indexes.artist_ordered_songs["a2"], vec!["s2"]);
        assert_eq!(db.indexes.artist_ordered_songs[UNKNOWN_ARTIST_ID], vec!["s3"]);
        assert_eq!(db.indexes.album_ordered_songs["al"], vec!["s2", "s1"]);
        assert_eq!(db.indexes.album_ordered_songs[UNKNOWN_ALBUM_ID], vec!["s3"]);
        assert_eq!(db.watermark, 5);
    }

    #[test]
    fn album_songs_follow_track_numbers() {
        let mut db = LocalDb::new();
        db.apply_delta(&LibraryDelta {
            songs: vec![
                song("s1", "aaa", "al", &[], Some(3), 1),
                song("s2", "zzz", "al", &[], Some(1), 2),
                song("s3", "mmm", "al", &[], None, 3),
            ],
            ..Default::default()
        });
        let names: Vec<&str> = db
            .songs_of_album("al")
            .iter()
            .map(|s| s.meta.name.as_str())
            .collect();
        assert_eq!(names, vec!["zzz", "aaa", "mmm"]);
    }

    #[test]
    fn dangling_references_do_not_panic() {
        let mut db = LocalDb::new();
        db.apply_delta(&LibraryDelta {
            songs: vec![song("s1", "x", "not-yet", &["ghost"], None, 1)],
            playlists: vec![playlist("p1", "p", &["nobody"], &["s1", "gone"], 2)],
            favorite_playlists: vec![FavoritePlaylist {
                id: FavoritePlaylistId::new("u1", "p-missing"),
                update_ts: 3,
            }],
            ..Default::default()
        });
        assert_eq!(db.songs_of_artist("ghost").len(), 1);
        assert_eq!(db.artist_name("ghost"), "(missing artist)");
        assert_eq!(db.artist_name(UNKNOWN_ARTIST_ID), "(unknown artist)");
        assert_eq!(db.album_name("not-yet"), "(missing album)");
        assert_eq!(db.playlist_songs("p1").len(), 1);
        assert!(db.favorite_playlists_of_user("u1").is_empty());
        assert!(db.playlist_songs("nope").is_empty());
    }

    #[test]
    fn deletion_wins_over_upsert_in_same_delta() {
        let mut db = LocalDb::new();
        db.apply_delta(&LibraryDelta {
            artists: vec![artist("a1", "x", 1)],
            deleted_artists: vec![Tombstone {
                id: "a1".into(),
                delete_ts: 2,
            }],
            ..Default::default()
        });
        assert!(db.artist("a1").is_none());
        assert!(db.indexes.ordered_artists.is_empty());
        assert_eq!(db.watermark, 2);
    }

    #[test]
    fn deletes_drop_out_of_every_index() {
        let mut db = LocalDb::new();
        db.apply_delta(&LibraryDelta {
            songs: vec![song("s1", "x", "al", &["a1"], None, 1)],
            playlists: vec![playlist("p1", "p", &["u1"], &["s1"], 2)],
            favorite_playlists: vec![FavoritePlaylist {
                id: FavoritePlaylistId::new("u1", "p1"),
                update_ts: 3,
            }],
            ..Default::default()
        });
        assert_eq!(db.favorite_playlists_of_user("u1").len(), 1);
        assert_eq!(db.owned_playlists_of_user("u1").len(), 1);

        db.apply_delta(&LibraryDelta {
            deleted_songs: vec![Tombstone {
                id: "s1".into(),
                delete_ts: 4,
            }],
            deleted_playlists: vec![Tombstone {
                id: "p1".into(),
                delete_ts: 4,
            }],
            deleted_favorite_playlists: vec![Tombstone {
                id: FavoritePlaylistId::new("u1", "p1"),
                delete_ts: 4,
            }],
            ..Default::default()
        });
        assert!(db.indexes.artist_ordered_songs.is_empty());
        assert!(db.indexes.album_ordered_songs.is_empty());
        assert!(db.indexes.user_ordered_favorite_playlists.is_empty());
        assert!(db.indexes.user_ordered_owned_playlists.is_empty());
        assert_eq!(db.watermark, 4);
    }

    #[test]
    fn empty_delta_keeps_watermark() {
        let mut db = LocalDb::new();
        db.apply_delta(&LibraryDelta {
            artists: vec![artist("a1", "x", 10)],
            ..Default::default()
        });
        let stats = db.apply_delta(&LibraryDelta::default());
        assert_eq!(stats, ApplyStats::default());
        assert_eq!(db.watermark, 10);
    }
}
