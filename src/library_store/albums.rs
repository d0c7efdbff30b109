use super::delta::ChangeFilter;
use super::error::{StoreError, StoreResult};
use super::models::*;
use super::store::LibraryTx;

use rusqlite::{params, OptionalExtension, Row};

fn parse_album_row(row: &Row) -> rusqlite::Result<Album> {
    Ok(Album {
        id: row.get(0)?,
        meta: AlbumMeta {
            name: row.get(1)?,
            artist_ids: vec![],
        },
        creation_ts: row.get(2)?,
        update_ts: row.get(3)?,
    })
}

impl LibraryTx<'_> {
    fn album_artist_ids(&self, album_id: &str) -> StoreResult<Vec<ArtistId>> {
        self.read_ordered_ids("album_artist", "album_id", "artist_id", album_id)
    }

    pub fn read_albums(&self, filter: &ChangeFilter) -> StoreResult<Vec<Album>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT album_id, name, creation_ts, update_ts FROM album
             WHERE update_ts >= ?1 ORDER BY update_ts ASC, album_id ASC",
        )?;
        let mut albums = stmt
            .query_map(params![filter.from_ts_or_zero()], parse_album_row)?
            .collect::<Result<Vec<_>, _>>()?;
        for album in albums.iter_mut() {
            album.meta.artist_ids = self.album_artist_ids(&album.id)?;
        }
        Ok(albums)
    }

    pub fn read_album(&self, album_id: &str) -> StoreResult<Album> {
        let mut album = self
            .conn
            .query_row(
                "SELECT album_id, name, creation_ts, update_ts FROM album WHERE album_id = ?1",
                params![album_id],
                parse_album_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found(EntityKind::Album, album_id))?;
        album.meta.artist_ids = self.album_artist_ids(album_id)?;
        Ok(album)
    }

    pub fn create_album(&self, meta: &AlbumMeta, check_refs: bool) -> StoreResult<Album> {
        let artist_ids = ordered_unique_ids(&meta.artist_ids, UNKNOWN_ARTIST_ID);
        if check_refs {
            self.check_refs_exist(EntityKind::Artist, &artist_ids)?;
        }

        let now = self.now();
        let album = Album {
            id: self.generate_id(EntityKind::Album)?,
            creation_ts: now,
            update_ts: now,
            meta: AlbumMeta {
                name: meta.name.clone(),
                artist_ids,
            },
        };
        self.conn.execute(
            "INSERT INTO album (album_id, name, creation_ts, update_ts) VALUES (?1, ?2, ?3, ?4)",
            params![album.id, album.meta.name, album.creation_ts, album.update_ts],
        )?;
        self.write_ordered_ids(
            "album_artist",
            "album_id",
            "artist_id",
            &album.id,
            &album.meta.artist_ids,
        )?;
        Ok(album)
    }

    pub fn update_album(
        &self,
        album_id: &str,
        meta: &AlbumMeta,
        check_refs: bool,
    ) -> StoreResult<Album> {
        let mut album = self.read_album(album_id)?;
        let artist_ids = ordered_unique_ids(&meta.artist_ids, UNKNOWN_ARTIST_ID);

        if artist_ids != album.meta.artist_ids {
            if check_refs {
                self.check_refs_exist(EntityKind::Artist, &artist_ids)?;
            }
            self.write_ordered_ids("album_artist", "album_id", "artist_id", album_id, &artist_ids)?;
        }

        album.update_ts = self.now();
        album.meta = AlbumMeta {
            name: meta.name.clone(),
            artist_ids,
        };
        self.conn.execute(
            "UPDATE album SET name = ?1, update_ts = ?2 WHERE album_id = ?3",
            params![album.meta.name, album.update_ts, album_id],
        )?;
        Ok(album)
    }

    /// Its songs move to the unknown album bucket.
    pub fn delete_album(&self, album_id: &str) -> StoreResult<Album> {
        let album = self.read_album(album_id)?;
        let now = self.now();

        self.conn.execute(
            "UPDATE song SET album_id = NULL, update_ts = ?1 WHERE album_id = ?2",
            params![now, album_id],
        )?;
        self.conn
            .execute("DELETE FROM album WHERE album_id = ?1", params![album_id])?;
        self.write_tombstone(EntityKind::Album, album_id, now)?;
        Ok(album)
    }
}

#[cfg(test)]
mod tests {
    use super::super::store::SqliteLibraryStore;
    use super::*;

    #[test]
    fn create_with_unknown_artist_ref_fails_when_checked() {
        let store = SqliteLibraryStore::in_memory().unwrap();
        let meta = AlbumMeta {
            name: "Ghost".into(),
            artist_ids: vec!["missing".into()],
        };
        let err = store.write(|tx| tx.create_album(&meta, true)).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(store.read(|tx| tx.count(EntityKind::Album)).unwrap(), 0);
    }

    #[test]
    fn artist_ids_keep_order_without_duplicates() {
        let store = SqliteLibraryStore::in_memory().unwrap();
        let (a, b) = store
            .write(|tx| {
                Ok((
                    tx.create_artist(&ArtistMeta { name: "a".into() })?,
                    tx.create_artist(&ArtistMeta { name: "b".into() })?,
                ))
            })
            .unwrap();
        let meta = AlbumMeta {
            name: "Split".into(),
            artist_ids: vec![b.id.clone(), a.id.clone(), b.id.clone()],
        };
        let album = store.write(|tx| tx.create_album(&meta, true)).unwrap();
        assert_eq!(album.meta.artist_ids, vec![b.id.clone(), a.id.clone()]);
        assert_eq!(store.read(|tx| tx.read_album(&album.id)).unwrap(), album);

        let reordered = store
            .write(|tx| {
                tx.update_album(
                    &album.id,
                    &AlbumMeta {
                        name: "Split".into(),
                        artist_ids: vec![a.id.clone(), b.id.clone()],
                    },
                    true,
                )
            })
            .unwrap();
        assert_eq!(reordered.meta.artist_ids, vec![a.id, b.id]);
        assert!(reordered.update_ts > album.update_ts);
    }

    #[test]
    fn delete_moves_songs_to_unknown_album() {
        let store = SqliteLibraryStore::in_memory().unwrap();
        let album = store
            .write(|tx| {
                tx.create_album(
                    &AlbumMeta {
                        name: "LP".into(),
                        artist_ids: vec![],
                    },
                    true,
                )
            })
            .unwrap();
        let mut song_meta = SongMeta::new("Side A");
        song_meta.album_id = album.id.clone();
        let song = store.write(|tx| tx.create_song(&song_meta, true)).unwrap();

        store.write(|tx| tx.delete_album(&album.id)).unwrap();

        let song_after = store.read(|tx| tx.read_song(&song.id)).unwrap();
        assert!(song_after.meta.has_unknown_album());
        assert!(song_after.update_ts > song.update_ts);
        let err = store.read(|tx| tx.read_album(&album.id)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
