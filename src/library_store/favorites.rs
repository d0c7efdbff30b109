use super::delta::FavoritePlaylistFilter;
use super::error::{StoreError, StoreResult};
use super::models::*;
use super::store::LibraryTx;

use rusqlite::{params, OptionalExtension, Row};

fn parse_favorite_row(row: &Row) -> rusqlite::Result<FavoritePlaylist> {
    Ok(FavoritePlaylist {
        id: FavoritePlaylistId {
            user_id: row.get(0)?,
            playlist_id: row.get(1)?,
        },
        update_ts: row.get(2)?,
    })
}

impl LibraryTx<'_> {
    pub fn read_favorite_playlists(
        &self,
        filter: &FavoritePlaylistFilter,
    ) -> StoreResult<Vec<FavoritePlaylist>> {
        let mut sql = String::from(
            "SELECT user_id, playlist_id, update_ts FROM favorite_playlist WHERE update_ts >= :from_ts ",
        );
        if filter.user_id.is_some() {
            sql.push_str("AND user_id = :user_id ");
        }
        sql.push_str("ORDER BY update_ts ASC, user_id ASC, playlist_id ASC");

        let from_ts = filter.from_ts.unwrap_or(0);
        let mut named: Vec<(&str, &dyn rusqlite::ToSql)> = vec![(":from_ts", &from_ts)];
        if let Some(user_id) = &filter.user_id {
            named.push((":user_id", user_id));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let favorites = stmt
            .query_map(named.as_slice(), parse_favorite_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(favorites)
    }

    pub fn read_favorite_playlist(&self, id: &FavoritePlaylistId) -> StoreResult<FavoritePlaylist> {
        self.conn
            .query_row(
                "SELECT user_id, playlist_id, update_ts FROM favorite_playlist
                 WHERE user_id = ?1 AND playlist_id = ?2",
                params![id.user_id, id.playlist_id],
                parse_favorite_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found(EntityKind::FavoritePlaylist, id))
    }

    /// Idempotent: favoriting again only refreshes `update_ts`. Clears a
    /// previous tombstone of the same relation.
    pub fn create_favorite_playlist(
        &self,
        id: &FavoritePlaylistId,
        check_refs: bool,
    ) -> StoreResult<FavoritePlaylist> {
        if check_refs {
            self.check_refs_exist(EntityKind::User, [&id.user_id])?;
            self.check_refs_exist(EntityKind::Playlist, [&id.playlist_id])?;
        }
        let favorite = FavoritePlaylist {
            id: id.clone(),
            update_ts: self.now(),
        };
        self.conn.execute(
            "INSERT INTO favorite_playlist (user_id, playlist_id, update_ts) VALUES (?1, ?2, ?3)
             ON CONFLICT (user_id, playlist_id) DO UPDATE SET update_ts = excluded.update_ts",
            params![id.user_id, id.playlist_id, favorite.update_ts],
        )?;
        self.conn.execute(
            "DELETE FROM deleted_favorite_playlist WHERE user_id = ?1 AND playlist_id = ?2",
            params![id.user_id, id.playlist_id],
        )?;
        Ok(favorite)
    }

    pub fn delete_favorite_playlist(&self, id: &FavoritePlaylistId) -> StoreResult<FavoritePlaylist> {
        let favorite = self.read_favorite_playlist(id)?;
        let now = self.now();
        self.conn.execute(
            "DELETE FROM favorite_playlist WHERE user_id = ?1 AND playlist_id = ?2",
            params![id.user_id, id.playlist_id],
        )?;
        self.conn.execute(
            "INSERT OR REPLACE INTO deleted_favorite_playlist (user_id, playlist_id, delete_ts)
             VALUES (?1, ?2, ?3)",
            params![id.user_id, id.playlist_id, now],
        )?;
        Ok(favorite)
    }

    pub fn read_favorite_playlist_tombstones(
        &self,
        from_ts: Option<i64>,
    ) -> StoreResult<Vec<Tombstone<FavoritePlaylistId>>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT user_id, playlist_id, delete_ts FROM deleted_favorite_playlist
             WHERE delete_ts >= ?1 ORDER BY delete_ts ASC, user_id ASC, playlist_id ASC",
        )?;
        let tombstones = stmt
            .query_map(params![from_ts.unwrap_or(0)], |row| {
                Ok(Tombstone {
                    id: FavoritePlaylistId {
                        user_id: row.get(0)?,
                        playlist_id: row.get(1)?,
                    },
                    delete_ts: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tombstones)
    }
}

#[cfg(test)]
mod tests {
    use super::super::store::SqliteLibraryStore;
    use super::*;

    fn setup() -> (SqliteLibraryStore, FavoritePlaylistId) {
        let store = SqliteLibraryStore::in_memory().unwrap();
        let id = store
            .write(|tx| {
                let user = tx.create_user_with_hash("fan", None)?;
                let playlist = tx.create_playlist(
                    &PlaylistMeta {
                        name: "hits".into(),
                        owner_user_ids: vec![],
                        song_ids: vec![],
                    },
                    true,
                )?;
                Ok(FavoritePlaylistId::new(user.id, playlist.id))
            })
            .unwrap();
        (store, id)
    }

    #[test]
    fn favorite_requires_existing_refs_when_checked() {
        let (store, id) = setup();
        let bad = FavoritePlaylistId::new(&id.user_id, "ghost");
        let err = store
            .write(|tx| tx.create_favorite_playlist(&bad, true))
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn favorite_again_refreshes_timestamp() {
        let (store, id) = setup();
        let first = store
            .write(|tx| tx.create_favorite_playlist(&id, true))
            .unwrap();
        let second = store
            .write(|tx| tx.create_favorite_playlist(&id, true))
            .unwrap();
        assert!(second.update_ts > first.update_ts);
        let all = store
            .read(|tx| tx.read_favorite_playlists(&FavoritePlaylistFilter::default()))
            .unwrap();
        assert_eq!(all, vec![second]);
    }

    #[test]
    fn unfavorite_then_favorite_clears_tombstone() {
        let (store, id) = setup();
        store
            .write(|tx| tx.create_favorite_playlist(&id, true))
            .unwrap();
        store
            .write(|tx| tx.delete_favorite_playlist(&id))
            .unwrap();
        let tombstones = store
            .read(|tx| tx.read_favorite_playlist_tombstones(None))
            .unwrap();
        assert_eq!(tombstones.len(), 1);

        store
            .write(|tx| tx.create_favorite_playlist(&id, true))
            .unwrap();
        assert!(store
            .read(|tx| tx.read_favorite_playlist_tombstones(None))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn unfavorite_missing_is_not_found() {
        let (store, id) = setup();
        let err = store
            .write(|tx| tx.delete_favorite_playlist(&id))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::NotFound {
                kind: EntityKind::FavoritePlaylist,
                ..
            }
        ));
    }

    #[test]
    fn filter_by_user() {
        let (store, id) = setup();
        store
            .write(|tx| tx.create_favorite_playlist(&id, true))
            .unwrap();
        let other_user = store
            .write(|tx| tx.create_user_with_hash("other", None))
            .unwrap();
        store
            .write(|tx| {
                tx.create_favorite_playlist(&FavoritePlaylistId::new(&other_user.id, &id.playlist_id), true)
            })
            .unwrap();

        let filter = FavoritePlaylistFilter {
            from_ts: None,
            user_id: Some(id.user_id.clone()),
        };
        let mine = store.read(|tx| tx.read_favorite_playlists(&filter)).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, id);
    }
}
