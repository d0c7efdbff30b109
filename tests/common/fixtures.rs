//! Test fixture creation for the library database

use super::constants::*;
use anyhow::Result;
use pezzottify_library::library_store::*;

/// Ids of everything [`seed_library`] creates.
#[derive(Clone, Debug)]
pub struct SeededLibrary {
    pub test_user_id: UserId,
    pub other_user_id: UserId,
    pub band_id: ArtistId,
    pub jazz_id: ArtistId,
    pub album_id: AlbumId,
    /// Tracks 1..3 of the album, in track order.
    pub album_song_ids: Vec<SongId>,
    /// By the jazz ensemble, not on any album.
    pub loose_song_id: SongId,
    /// Owned by the test user, holds the album tracks.
    pub playlist_id: PlaylistId,
}

/// Two users, two artists, one album with three tracks, a song without
/// album and a playlist.
pub fn seed_library(store: &SqliteLibraryStore) -> Result<SeededLibrary> {
    let test_user = store.create_user(&UserMetaComplete {
        name: TEST_USER.to_string(),
        password: Some(TEST_PASS.to_string()),
    })?;
    let other_user = store.create_user(&UserMetaComplete {
        name: OTHER_USER.to_string(),
        password: Some(OTHER_PASS.to_string()),
    })?;

    let band = store.create_artist(&ArtistMeta {
        name: ARTIST_1_NAME.to_string(),
    })?;
    let jazz = store.create_artist(&ArtistMeta {
        name: ARTIST_2_NAME.to_string(),
    })?;
    let album = store.create_album(
        &AlbumMeta {
            name: ALBUM_1_NAME.to_string(),
            artist_ids: vec![band.id.clone()],
        },
        true,
    )?;

    // inserted out of track order on purpose
    let mut album_song_ids = vec![String::new(); 3];
    for (track, name) in [(3, "Closing Track"), (1, "Opening Track"), (2, "Middle Track")] {
        let song = store.create_song(
            &SongMeta {
                album_id: album.id.clone(),
                artist_ids: vec![band.id.clone()],
                track_number: Some(track),
                publication_year: Some(2001),
                ..SongMeta::new(name)
            },
            true,
        )?;
        album_song_ids[(track - 1) as usize] = song.id;
    }

    let loose_song = store.create_song(
        &SongMeta {
            artist_ids: vec![jazz.id.clone()],
            ..SongMeta::new("Smooth Jazz")
        },
        true,
    )?;

    let playlist = store.create_playlist(
        &PlaylistMeta {
            name: PLAYLIST_1_NAME.to_string(),
            owner_user_ids: vec![test_user.id.clone()],
            song_ids: album_song_ids.clone(),
        },
        true,
    )?;

    Ok(SeededLibrary {
        test_user_id: test_user.id,
        other_user_id: other_user.id,
        band_id: band.id,
        jazz_id: jazz.id,
        album_id: album.id,
        album_song_ids,
        loose_song_id: loose_song.id,
        playlist_id: playlist.id,
    })
}
