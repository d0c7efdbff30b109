use super::delta::ChangeFilter;
use super::error::{StoreError, StoreResult};
use super::models::*;
use super::store::LibraryTx;

use rusqlite::{params, OptionalExtension, Row};

const SONG_COLUMNS: &str =
    "song_id, name, album_id, publication_year, track_number, explicit_fg, creation_ts, update_ts";

fn parse_song_row(row: &Row) -> rusqlite::Result<Song> {
    let album_id: Option<String> = row.get(2)?;
    Ok(Song {
        id: row.get(0)?,
        meta: SongMeta {
            name: row.get(1)?,
            album_id: album_id.unwrap_or_else(|| UNKNOWN_ALBUM_ID.to_string()),
            artist_ids: vec![],
            publication_year: row.get(3)?,
            track_number: row.get(4)?,
            explicit_fg: row.get::<_, i64>(5)? != 0,
        },
        creation_ts: row.get(6)?,
        update_ts: row.get(7)?,
    })
}

fn album_column(meta: &SongMeta) -> Option<&str> {
    if meta.has_unknown_album() {
        None
    } else {
        Some(meta.album_id.as_str())
    }
}

impl LibraryTx<'_> {
    fn song_artist_ids(&self, song_id: &str) -> StoreResult<Vec<ArtistId>> {
        self.read_ordered_ids("song_artist", "song_id", "artist_id", song_id)
    }

    fn check_song_refs(&self, meta: &SongMeta, artist_ids: &[ArtistId]) -> StoreResult<()> {
        if !meta.has_unknown_album() && !self.exists(EntityKind::Album, &meta.album_id)? {
            return Err(StoreError::validation(format!(
                "album '{}' does not exist",
                meta.album_id
            )));
        }
        self.check_refs_exist(EntityKind::Artist, artist_ids)
    }

    pub fn read_songs(&self, filter: &ChangeFilter) -> StoreResult<Vec<Song>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {} FROM song WHERE update_ts >= ?1 ORDER BY update_ts ASC, song_id ASC",
            SONG_COLUMNS
        ))?;
        let mut songs = stmt
            .query_map(params![filter.from_ts_or_zero()], parse_song_row)?
            .collect::<Result<Vec<_>, _>>()?;
        for song in songs.iter_mut() {
            song.meta.artist_ids = self.song_artist_ids(&song.id)?;
        }
        Ok(songs)
    }

    pub fn read_song(&self, song_id: &str) -> StoreResult<Song> {
        let mut song = self
            .conn
            .query_row(
                &format!("SELECT {} FROM song WHERE song_id = ?1", SONG_COLUMNS),
                params![song_id],
                parse_song_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found(EntityKind::Song, song_id))?;
        song.meta.artist_ids = self.song_artist_ids(song_id)?;
        Ok(song)
    }

    pub fn create_song(&self, meta: &SongMeta, check_refs: bool) -> StoreResult<Song> {
        let artist_ids = ordered_unique_ids(&meta.artist_ids, UNKNOWN_ARTIST_ID);
        if check_refs {
            self.check_song_refs(meta, &artist_ids)?;
        }

        let now = self.now();
        let song = Song {
            id: self.generate_id(EntityKind::Song)?,
            creation_ts: now,
            update_ts: now,
            meta: SongMeta {
                artist_ids,
                ..meta.clone()
            },
        };
        self.conn.execute(
            &format!(
                "INSERT INTO song ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                SONG_COLUMNS
            ),
            params![
                song.id,
                song.meta.name,
                album_column(&song.meta),
                song.meta.publication_year,
                song.meta.track_number,
                song.meta.explicit_fg,
                song.creation_ts,
                song.update_ts
            ],
        )?;
        self.write_ordered_ids(
            "song_artist",
            "song_id",
            "artist_id",
            &song.id,
            &song.meta.artist_ids,
        )?;
        Ok(song)
    }

    pub fn update_song(&self, song_id: &str, meta: &SongMeta, check_refs: bool) -> StoreResult<Song> {
        let current = self.read_song(song_id)?;
        let artist_ids = ordered_unique_ids(&meta.artist_ids, UNKNOWN_ARTIST_ID);
        if check_refs {
            self.check_song_refs(meta, &artist_ids)?;
        }
        if artist_ids != current.meta.artist_ids {
            self.write_ordered_ids("song_artist", "song_id", "artist_id", song_id, &artist_ids)?;
        }

        let song = Song {
            id: current.id,
            creation_ts: current.creation_ts,
            update_ts: self.now(),
            meta: SongMeta {
                artist_ids,
                ..meta.clone()
            },
        };
        self.conn.execute(
            "UPDATE song SET name = ?1, album_id = ?2, publication_year = ?3, track_number = ?4,
                explicit_fg = ?5, update_ts = ?6
             WHERE song_id = ?7",
            params![
                song.meta.name,
                album_column(&song.meta),
                song.meta.publication_year,
                song.meta.track_number,
                song.meta.explicit_fg,
                song.update_ts,
                song_id
            ],
        )?;
        Ok(song)
    }

    /// Also removes the song from every playlist holding it.
    pub fn delete_song(&self, song_id: &str) -> StoreResult<Song> {
        let song = self.read_song(song_id)?;
        let now = self.now();

        let playlist_ids = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT DISTINCT playlist_id FROM playlist_song WHERE song_id = ?1",
            )?;
            let ids = stmt
                .query_map(params![song_id], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };
        for playlist_id in &playlist_ids {
            self.remove_song_occurrences(playlist_id, song_id, now)?;
        }

        self.conn
            .execute("DELETE FROM song WHERE song_id = ?1", params![song_id])?;
        self.write_tombstone(EntityKind::Song, song_id, now)?;
        Ok(song)
    }
}
