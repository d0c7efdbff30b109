use super::delta::ChangeFilter;
use super::error::{StoreError, StoreResult};
use super::models::*;
use super::store::LibraryTx;

use rusqlite::{params, OptionalExtension, Row};

fn parse_artist_row(row: &Row) -> rusqlite::Result<Artist> {
    Ok(Artist {
        id: row.get(0)?,
        meta: ArtistMeta { name: row.get(1)? },
        creation_ts: row.get(2)?,
        update_ts: row.get(3)?,
    })
}

impl LibraryTx<'_> {
    pub fn read_artists(&self, filter: &ChangeFilter) -> StoreResult<Vec<Artist>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT artist_id, name, creation_ts, update_ts FROM artist
             WHERE update_ts >= ?1 ORDER BY update_ts ASC, artist_id ASC",
        )?;
        let artists = stmt
            .query_map(params![filter.from_ts_or_zero()], parse_artist_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(artists)
    }

    pub fn read_artist(&self, artist_id: &str) -> StoreResult<Artist> {
        self.conn
            .query_row(
                "SELECT artist_id, name, creation_ts, update_ts FROM artist WHERE artist_id = ?1",
                params![artist_id],
                parse_artist_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found(EntityKind::Artist, artist_id))
    }

    pub fn create_artist(&self, meta: &ArtistMeta) -> StoreResult<Artist> {
        let now = self.now();
        let artist = Artist {
            id: self.generate_id(EntityKind::Artist)?,
            creation_ts: now,
            update_ts: now,
            meta: meta.clone(),
        };
        self.conn.execute(
            "INSERT INTO artist (artist_id, name, creation_ts, update_ts) VALUES (?1, ?2, ?3, ?4)",
            params![artist.id, artist.meta.name, artist.creation_ts, artist.update_ts],
        )?;
        Ok(artist)
    }

    pub fn update_artist(&self, artist_id: &str, meta: &ArtistMeta) -> StoreResult<Artist> {
        let mut artist = self.read_artist(artist_id)?;
        artist.update_ts = self.now();
        artist.meta = meta.clone();
        self.conn.execute(
            "UPDATE artist SET name = ?1, update_ts = ?2 WHERE artist_id = ?3",
            params![artist.meta.name, artist.update_ts, artist_id],
        )?;
        Ok(artist)
    }

    /// Detaches the artist from its songs and albums (re-stamping them) and
    /// leaves a tombstone.
    pub fn delete_artist(&self, artist_id: &str) -> StoreResult<Artist> {
        let artist = self.read_artist(artist_id)?;
        let now = self.now();

        self.conn.execute(
            "UPDATE song SET update_ts = ?1
             WHERE song_id IN (SELECT song_id FROM song_artist WHERE artist_id = ?2)",
            params![now, artist_id],
        )?;
        self.conn.execute(
            "UPDATE album SET update_ts = ?1
             WHERE album_id IN (SELECT album_id FROM album_artist WHERE artist_id = ?2)",
            params![now, artist_id],
        )?;
        self.conn
            .execute("DELETE FROM song_artist WHERE artist_id = ?1", params![artist_id])?;
        self.conn
            .execute("DELETE FROM album_artist WHERE artist_id = ?1", params![artist_id])?;
        self.conn
            .execute("DELETE FROM artist WHERE artist_id = ?1", params![artist_id])?;
        self.write_tombstone(EntityKind::Artist, artist_id, now)?;
        Ok(artist)
    }
}
