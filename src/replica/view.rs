//! What a UI is currently looking at, and the rule that keeps it valid
//! across refreshes.

use super::local_db::LocalDb;
use crate::library_store::{
    AlbumId, ArtistId, PlaylistId, UserId, UNKNOWN_ALBUM_ID, UNKNOWN_ARTIST_ID,
};
use std::fmt;
use std::str::FromStr;

fn named_lines(ids: &[String], name: impl Fn(&str) -> Option<String>) -> Vec<String> {
    ids.iter()
        .filter_map(|id| name(id).map(|n| format!("{}  [{}]", n, id)))
        .collect()
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LibraryView {
    #[default]
    Menu,
    AllArtists,
    AllAlbums,
    AllSongs,
    AllPlaylists,
    AllUsers,
    SongsFromArtist(ArtistId),
    SongsFromUnknownArtist,
    SongsFromAlbum(AlbumId),
    SongsFromUnknownAlbum,
    SongsFromPlaylist(PlaylistId),
    FavoritePlaylistsFromUser(UserId),
}

impl LibraryView {
    /// False when the view points at an entity the replica no longer has.
    pub fn is_valid(&self, db: &LocalDb) -> bool {
        match self {
            LibraryView::SongsFromArtist(id) => db.artist(id).is_some(),
            LibraryView::SongsFromAlbum(id) => db.album(id).is_some(),
            LibraryView::SongsFromPlaylist(id) => db.playlist(id).is_some(),
            LibraryView::FavoritePlaylistsFromUser(id) => db.user(id).is_some(),
            _ => true,
        }
    }

    /// Called after every refresh: a view over a vanished entity falls back
    /// to the menu.
    pub fn revalidate(self, db: &LocalDb) -> LibraryView {
        if self.is_valid(db) {
            self
        } else {
            LibraryView::Menu
        }
    }

    /// Song ids listed by song views, in display order. Empty for other views.
    pub fn song_ids(&self, db: &LocalDb) -> Vec<String> {
        let songs = match self {
            LibraryView::AllSongs => return db.indexes.ordered_songs.clone(),
            LibraryView::SongsFromArtist(id) => db.songs_of_artist(id),
            LibraryView::SongsFromUnknownArtist => db.songs_of_artist(UNKNOWN_ARTIST_ID),
            LibraryView::SongsFromAlbum(id) => db.songs_of_album(id),
            LibraryView::SongsFromUnknownAlbum => db.songs_of_album(UNKNOWN_ALBUM_ID),
            LibraryView::SongsFromPlaylist(id) => db.playlist_songs(id),
            _ => return vec![],
        };
        songs.into_iter().map(|s| s.id.clone()).collect()
    }

    /// One display line per item.
    pub fn lines(&self, db: &LocalDb) -> Vec<String> {
        match self {
            LibraryView::Menu => [
                "artists", "albums", "songs", "playlists", "users",
                "unknown-artist", "unknown-album",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            LibraryView::AllArtists => named_lines(&db.indexes.ordered_artists, |id| {
                db.artist(id).map(|a| a.meta.name.clone())
            }),
            LibraryView::AllAlbums => named_lines(&db.indexes.ordered_albums, |id| {
                db.album(id).map(|a| a.meta.name.clone())
            }),
            LibraryView::AllPlaylists => named_lines(&db.indexes.ordered_playlists, |id| {
                db.playlist(id).map(|p| p.meta.name.clone())
            }),
            LibraryView::AllUsers => named_lines(&db.indexes.ordered_users, |id| {
                db.user(id).map(|u| u.meta.name.clone())
            }),
            LibraryView::FavoritePlaylistsFromUser(user_id) => db
                .favorite_playlists_of_user(user_id)
                .iter()
                .map(|p| format!("{}  [{}]", p.meta.name, p.id))
                .collect(),
            _ => self
                .song_ids(db)
                .iter()
                .filter_map(|id| db.song(id))
                .map(|song| {
                    let artists: Vec<&str> = song
                        .meta
                        .artist_ids
                        .iter()
                        .map(|a| db.artist_name(a))
                        .collect();
                    let artists = if artists.is_empty() {
                        db.artist_name(UNKNOWN_ARTIST_ID).to_string()
                    } else {
                        artists.join(", ")
                    };
                    format!(
                        "{} - {} ({})  [{}]",
                        artists,
                        song.meta.name,
                        db.album_name(&song.meta.album_id),
                        song.id
                    )
                })
                .collect(),
        }
    }
}

impl fmt::Display for LibraryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryView::Menu => write!(f, "menu"),
            LibraryView::AllArtists => write!(f, "artists"),
            LibraryView::AllAlbums => write!(f, "albums"),
            LibraryView::AllSongs => write!(f, "songs"),
            LibraryView::AllPlaylists => write!(f, "playlists"),
            LibraryView::AllUsers => write!(f, "users"),
            LibraryView::SongsFromArtist(id) => write!(f, "artist:{}", id),
            LibraryView::SongsFromUnknownArtist => write!(f, "unknown-artist"),
            LibraryView::SongsFromAlbum(id) => write!(f, "album:{}", id),
            LibraryView::SongsFromUnknownAlbum => write!(f, "unknown-album"),
            LibraryView::SongsFromPlaylist(id) => write!(f, "playlist:{}", id),
            LibraryView::FavoritePlaylistsFromUser(id) => write!(f, "favorites:{}", id),
        }
    }
}

impl FromStr for LibraryView {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let view = match s.split_once(':') {
            None => match s {
                "menu" => LibraryView::Menu,
                "artists" => LibraryView::AllArtists,
                "albums" => LibraryView::AllAlbums,
                "songs" => LibraryView::AllSongs,
                "playlists" => LibraryView::AllPlaylists,
                "users" => LibraryView::AllUsers,
                "unknown-artist" => LibraryView::SongsFromUnknownArtist,
                "unknown-album" => LibraryView::SongsFromUnknownAlbum,
                _ => anyhow::bail!("Unknown view '{}'", s),
            },
            Some((_, "")) => anyhow::bail!("Missing id in view '{}'", s),
            Some(("artist", id)) => LibraryView::SongsFromArtist(id.to_string()),
            Some(("album", id)) => LibraryView::SongsFromAlbum(id.to_string()),
            Some(("playlist", id)) => LibraryView::SongsFromPlaylist(id.to_string()),
            Some(("favorites", id)) => LibraryView::FavoritePlaylistsFromUser(id.to_string()),
            Some(_) => anyhow::bail!("Unknown view '{}'", s),
        };
        Ok(view)
    }
}
