use super::delta::PlaylistFilter;
use super::error::{StoreError, StoreResult};
use super::models::*;
use super::store::LibraryTx;

use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

fn parse_playlist_row(row: &Row) -> rusqlite::Result<Playlist> {
    Ok(Playlist {
        id: row.get(0)?,
        meta: PlaylistMeta {
            name: row.get(1)?,
            owner_user_ids: vec![],
            song_ids: vec![],
        },
        creation_ts: row.get(2)?,
        update_ts: row.get(3)?,
        content_update_ts: row.get(4)?,
    })
}

impl LibraryTx<'_> {
    fn playlist_owner_ids(&self, playlist_id: &str) -> StoreResult<Vec<UserId>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT user_id FROM playlist_owned_user WHERE playlist_id = ?1 ORDER BY user_id ASC",
        )?;
        let ids = stmt
            .query_map(params![playlist_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    fn playlist_song_ids(&self, playlist_id: &str) -> StoreResult<Vec<SongId>> {
        self.read_ordered_ids("playlist_song", "playlist_id", "song_id", playlist_id)
    }

    fn fill_playlist_relations(&self, playlist: &mut Playlist) -> StoreResult<()> {
        playlist.meta.owner_user_ids = self.playlist_owner_ids(&playlist.id)?;
        playlist.meta.song_ids = self.playlist_song_ids(&playlist.id)?;
        Ok(())
    }

    fn write_playlist_owners(&self, playlist_id: &str, owner_ids: &[UserId]) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM playlist_owned_user WHERE playlist_id = ?1",
            params![playlist_id],
        )?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO playlist_owned_user (playlist_id, user_id) VALUES (?1, ?2)",
        )?;
        for user_id in owner_ids {
            stmt.execute(params![playlist_id, user_id])?;
        }
        Ok(())
    }

    fn write_playlist_songs(&self, playlist_id: &str, song_ids: &[SongId]) -> StoreResult<()> {
        let capped = if playlist_id == INCOMING_PLAYLIST_ID && song_ids.len() > INCOMING_PLAYLIST_CAP
        {
            &song_ids[song_ids.len() - INCOMING_PLAYLIST_CAP..]
        } else {
            song_ids
        };
        self.write_ordered_ids("playlist_song", "playlist_id", "song_id", playlist_id, capped)
    }

    fn stamp_playlist(&self, playlist_id: &str, ts: i64, content_changed: bool) -> StoreResult<()> {
        if content_changed {
            self.conn.execute(
                "UPDATE playlist SET update_ts = ?1, content_update_ts = ?1 WHERE playlist_id = ?2",
                params![ts, playlist_id],
            )?;
        } else {
            self.conn.execute(
                "UPDATE playlist SET update_ts = ?1 WHERE playlist_id = ?2",
                params![ts, playlist_id],
            )?;
        }
        Ok(())
    }

    /// Deletes every occurrence of `song_id`, rewrites dense positions and
    /// stamps both timestamps. Returns whether anything was removed.
    pub(super) fn remove_song_occurrences(
        &self,
        playlist_id: &str,
        song_id: &str,
        ts: i64,
    ) -> StoreResult<bool> {
        let song_ids = self.playlist_song_ids(playlist_id)?;
        let remaining: Vec<SongId> = song_ids.iter().filter(|id| *id != song_id).cloned().collect();
        if remaining.len() == song_ids.len() {
            return Ok(false);
        }
        self.write_playlist_songs(playlist_id, &remaining)?;
        self.stamp_playlist(playlist_id, ts, true)?;
        Ok(true)
    }

    fn check_playlist_refs(&self, owner_ids: &[UserId], song_ids: &[SongId]) -> StoreResult<()> {
        self.check_refs_exist(EntityKind::User, owner_ids)?;
        let mut distinct = song_ids.to_vec();
        distinct.sort();
        distinct.dedup();
        self.check_refs_exist(EntityKind::Song, &distinct)
    }

    /// Playlists with `update_ts >= from_ts`. With a favorite user, only that
    /// user's favorites are returned, and `favorite_from_ts` matches either a
    /// new favorite relation or a content change of an already favorite playlist.
    pub fn read_playlists(&self, filter: &PlaylistFilter) -> StoreResult<Vec<Playlist>> {
        if filter.favorite_from_ts.is_some() && filter.favorite_user_id.is_none() {
            return Err(StoreError::validation(
                "favoriteFromTs requires favoriteUserId",
            ));
        }

        let mut sql = String::from(
            "SELECT p.playlist_id, p.name, p.creation_ts, p.update_ts, p.content_update_ts
             FROM playlist p ",
        );
        if filter.favorite_user_id.is_some() {
            sql.push_str(
                "JOIN favorite_playlist fp ON fp.playlist_id = p.playlist_id AND fp.user_id = :favorite_user_id ",
            );
        }
        sql.push_str("WHERE p.update_ts >= :from_ts ");
        if filter.favorite_from_ts.is_some() {
            sql.push_str(
                "AND (fp.update_ts >= :favorite_from_ts OR p.content_update_ts >= :favorite_from_ts) ",
            );
        }
        sql.push_str("ORDER BY p.update_ts ASC, p.playlist_id ASC");

        let from_ts = filter.from_ts.unwrap_or(0);
        let mut named: Vec<(&str, &dyn rusqlite::ToSql)> = vec![(":from_ts", &from_ts)];
        if let Some(user_id) = &filter.favorite_user_id {
            named.push((":favorite_user_id", user_id));
        }
        if let Some(favorite_from_ts) = &filter.favorite_from_ts {
            named.push((":favorite_from_ts", favorite_from_ts));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut playlists = stmt
            .query_map(named.as_slice(), parse_playlist_row)?
            .collect::<Result<Vec<_>, _>>()?;
        for playlist in playlists.iter_mut() {
            self.fill_playlist_relations(playlist)?;
        }
        Ok(playlists)
    }

    pub fn read_playlist(&self, playlist_id: &str) -> StoreResult<Playlist> {
        let mut playlist = self
            .conn
            .query_row(
                "SELECT playlist_id, name, creation_ts, update_ts, content_update_ts
                 FROM playlist WHERE playlist_id = ?1",
                params![playlist_id],
                parse_playlist_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found(EntityKind::Playlist, playlist_id))?;
        self.fill_playlist_relations(&mut playlist)?;
        Ok(playlist)
    }

    pub fn create_playlist(&self, meta: &PlaylistMeta, check_refs: bool) -> StoreResult<Playlist> {
        let owner_ids = normalize_owner_ids(meta.owner_user_ids.clone());
        if check_refs {
            self.check_playlist_refs(&owner_ids, &meta.song_ids)?;
        }

        let now = self.now();
        let playlist_id = self.generate_id(EntityKind::Playlist)?;
        self.conn.execute(
            "INSERT INTO playlist (playlist_id, name, creation_ts, update_ts, content_update_ts)
             VALUES (?1, ?2, ?3, ?3, ?3)",
            params![playlist_id, meta.name, now],
        )?;
        self.write_playlist_owners(&playlist_id, &owner_ids)?;
        self.write_playlist_songs(&playlist_id, &meta.song_ids)?;
        self.read_playlist(&playlist_id)
    }

    /// `update_ts` always moves; `content_update_ts` only when the name or
    /// the song sequence (order included) changes.
    pub fn update_playlist(
        &self,
        playlist_id: &str,
        meta: &PlaylistMeta,
        check_refs: bool,
    ) -> StoreResult<Playlist> {
        let current = self.read_playlist(playlist_id)?;
        let owner_ids = normalize_owner_ids(meta.owner_user_ids.clone());
        if check_refs {
            self.check_playlist_refs(&owner_ids, &meta.song_ids)?;
        }

        let owners_updated = owner_ids != current.meta.owner_user_ids;
        let song_ids_updated = meta.song_ids != current.meta.song_ids;
        let name_updated = meta.name != current.meta.name;

        if owners_updated {
            self.write_playlist_owners(playlist_id, &owner_ids)?;
        }
        if song_ids_updated {
            self.write_playlist_songs(playlist_id, &meta.song_ids)?;
        }

        let now = self.now();
        self.conn.execute(
            "UPDATE playlist SET name = ?1 WHERE playlist_id = ?2",
            params![meta.name, playlist_id],
        )?;
        self.stamp_playlist(playlist_id, now, name_updated || song_ids_updated)?;
        debug!(
            "Updated playlist {} (name: {}, songs: {}, owners: {})",
            playlist_id, name_updated, song_ids_updated, owners_updated
        );
        self.read_playlist(playlist_id)
    }

    /// Appends `song_id` after the current last position. On the incoming
    /// playlist the oldest entries are evicted to keep it at its cap.
    pub fn add_song_to_playlist(
        &self,
        playlist_id: &str,
        song_id: &str,
        check_refs: bool,
    ) -> StoreResult<Playlist> {
        if !self.exists(EntityKind::Playlist, playlist_id)? {
            return Err(StoreError::not_found(EntityKind::Playlist, playlist_id));
        }
        if check_refs {
            self.check_refs_exist(EntityKind::Song, [&song_id.to_string()])?;
        }

        self.conn.execute(
            "INSERT INTO playlist_song (playlist_id, position, song_id)
             SELECT ?1, COALESCE(MAX(position) + 1, 0), ?2 FROM playlist_song WHERE playlist_id = ?1",
            params![playlist_id, song_id],
        )?;

        if playlist_id == INCOMING_PLAYLIST_ID {
            self.evict_incoming_overflow()?;
        }

        self.stamp_playlist(playlist_id, self.now(), true)?;
        self.read_playlist(playlist_id)
    }

    fn evict_incoming_overflow(&self) -> StoreResult<()> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM playlist_song WHERE playlist_id = ?1",
            params![INCOMING_PLAYLIST_ID],
            |row| row.get(0),
        )?;
        let overflow = count - INCOMING_PLAYLIST_CAP as i64;
        if overflow > 0 {
            self.conn.execute(
                "UPDATE playlist_song SET position = position - ?1 WHERE playlist_id = ?2",
                params![overflow, INCOMING_PLAYLIST_ID],
            )?;
            self.conn.execute(
                "DELETE FROM playlist_song WHERE playlist_id = ?1 AND position < 0",
                params![INCOMING_PLAYLIST_ID],
            )?;
            debug!("Evicted {} songs from the incoming playlist", overflow);
        }
        Ok(())
    }

    /// Removes every occurrence of `song_id`. A song that is not in the
    /// playlist leaves it untouched.
    pub fn remove_song_from_playlist(&self, playlist_id: &str, song_id: &str) -> StoreResult<Playlist> {
        if !self.exists(EntityKind::Playlist, playlist_id)? {
            return Err(StoreError::not_found(EntityKind::Playlist, playlist_id));
        }
        self.remove_song_occurrences(playlist_id, song_id, self.now())?;
        self.read_playlist(playlist_id)
    }

    /// Tombstones the playlist and every favorite relation pointing at it.
    pub fn delete_playlist(&self, playlist_id: &str) -> StoreResult<Playlist> {
        if playlist_id == INCOMING_PLAYLIST_ID {
            return Err(StoreError::validation(
                "the incoming playlist cannot be deleted",
            ));
        }
        let playlist = self.read_playlist(playlist_id)?;
        let now = self.now();

        self.conn.execute(
            "INSERT OR REPLACE INTO deleted_favorite_playlist (user_id, playlist_id, delete_ts)
             SELECT user_id, playlist_id, ?1 FROM favorite_playlist WHERE playlist_id = ?2",
            params![now, playlist_id],
        )?;
        self.conn.execute(
            "DELETE FROM playlist WHERE playlist_id = ?1",
            params![playlist_id],
        )?;
        self.write_tombstone(EntityKind::Playlist, playlist_id, now)?;
        Ok(playlist)
    }
}
