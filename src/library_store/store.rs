use super::clock::MonotonicClock;
use super::delta::{ChangeFilter, FavoritePlaylistFilter, LibraryDelta, PlaylistFilter};
use super::error::{StoreError, StoreResult};
use super::models::*;
use super::schema::LIBRARY_VERSIONED_SCHEMAS;
use super::trait_def::LibraryStore;
use crate::sqlite_persistence::{open_versioned, prepare_connection};
use crate::user::{AuthToken, AuthTokenValue, PasswordHasherKind};

use anyhow::Result;
use rand::distr::Alphanumeric;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

pub const ID_LENGTH: usize = 16;

/// A random A-z0-9 string
fn random_string(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// SQLite backed library store.
///
/// Every public operation runs in its own transaction. Callers that need to
/// compose several operations atomically use [`SqliteLibraryStore::write`]
/// and call the [`LibraryTx`] methods directly.
#[derive(Clone)]
pub struct SqliteLibraryStore {
    conn: Arc<Mutex<Connection>>,
    clock: Arc<MonotonicClock>,
}

/// Operations bound to an open transaction.
///
/// Nothing here commits: the owner of the transaction does, and dropping it
/// uncommitted (error or panic) rolls everything back.
pub struct LibraryTx<'a> {
    pub(super) conn: &'a Connection,
    pub(super) clock: &'a MonotonicClock,
}

impl SqliteLibraryStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned(db_path, LIBRARY_VERSIONED_SCHEMAS)?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        prepare_connection(&conn, LIBRARY_VERSIONED_SCHEMAS, true)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let clock = MonotonicClock::new();
        let newest: i64 = conn.query_row(
            "SELECT MAX(ts) FROM (
                SELECT MAX(update_ts) AS ts FROM artist
                UNION ALL SELECT MAX(update_ts) FROM album
                UNION ALL SELECT MAX(update_ts) FROM song
                UNION ALL SELECT MAX(update_ts) FROM user
                UNION ALL SELECT MAX(update_ts) FROM playlist
                UNION ALL SELECT MAX(update_ts) FROM favorite_playlist
                UNION ALL SELECT MAX(delete_ts) FROM deleted_entity
                UNION ALL SELECT MAX(delete_ts) FROM deleted_favorite_playlist
            )",
            [],
            |row| row.get::<_, Option<i64>>(0),
        )?
        .unwrap_or(0);
        clock.observe(newest);

        let store = SqliteLibraryStore {
            conn: Arc::new(Mutex::new(conn)),
            clock: Arc::new(clock),
        };
        store.write(|tx| tx.ensure_incoming_playlist())?;
        Ok(store)
    }

    /// Runs `f` inside an immediate write transaction, committing on `Ok`.
    pub fn write<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&LibraryTx<'_>) -> StoreResult<T>,
    {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&LibraryTx {
            conn: &tx,
            clock: &self.clock,
        })?;
        tx.commit()?;
        Ok(value)
    }

    /// Runs `f` inside a read transaction, so multi-table reads see one snapshot.
    pub fn read<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&LibraryTx<'_>) -> StoreResult<T>,
    {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        f(&LibraryTx {
            conn: &tx,
            clock: &self.clock,
        })
    }
}

pub(super) fn table_of(kind: EntityKind) -> (&'static str, &'static str) {
    match kind {
        EntityKind::Artist => ("artist", "artist_id"),
        EntityKind::Album => ("album", "album_id"),
        EntityKind::Song => ("song", "song_id"),
        EntityKind::User => ("user", "user_id"),
        EntityKind::Playlist => ("playlist", "playlist_id"),
        EntityKind::FavoritePlaylist => ("favorite_playlist", "playlist_id"),
    }
}

impl LibraryTx<'_> {
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn exists(&self, kind: EntityKind, id: &str) -> StoreResult<bool> {
        let (table, column) = table_of(kind);
        let exists = self.conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1)", table, column),
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn count(&self, kind: EntityKind) -> StoreResult<usize> {
        let (table, _) = table_of(kind);
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?;
        Ok(count as usize)
    }

    /// Fails with a validation error naming the first id of `kind` that does not exist.
    pub(super) fn check_refs_exist<'i, I>(&self, kind: EntityKind, ids: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = &'i String>,
    {
        for id in ids {
            if !self.exists(kind, id)? {
                return Err(StoreError::validation(format!(
                    "{} '{}' does not exist",
                    kind, id
                )));
            }
        }
        Ok(())
    }

    /// Draws ids until one is neither live nor tombstoned.
    pub(super) fn generate_id(&self, kind: EntityKind) -> StoreResult<String> {
        loop {
            let candidate = random_string(ID_LENGTH);
            if !self.exists(kind, &candidate)? && !self.is_tombstoned(kind, &candidate)? {
                return Ok(candidate);
            }
            debug!("Id collision on {} {}, drawing again", kind, candidate);
        }
    }

    pub(super) fn is_tombstoned(&self, kind: EntityKind, id: &str) -> StoreResult<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM deleted_entity WHERE entity_kind = ?1 AND entity_id = ?2)",
            params![kind.as_str(), id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub(super) fn write_tombstone(&self, kind: EntityKind, id: &str, ts: i64) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO deleted_entity (entity_kind, entity_id, delete_ts) VALUES (?1, ?2, ?3)",
            params![kind.as_str(), id, ts],
        )?;
        Ok(())
    }

    /// Tombstoned ids of `kind` with `delete_ts >= from_ts`, oldest first.
    pub fn read_tombstones(
        &self,
        kind: EntityKind,
        from_ts: Option<i64>,
    ) -> StoreResult<Vec<Tombstone<String>>> {
        if kind == EntityKind::FavoritePlaylist {
            return Err(StoreError::validation(
                "favorite playlist tombstones are keyed by (user, playlist)",
            ));
        }
        let mut stmt = self.conn.prepare_cached(
            "SELECT entity_id, delete_ts FROM deleted_entity
             WHERE entity_kind = ?1 AND delete_ts >= ?2
             ORDER BY delete_ts ASC, entity_id ASC",
        )?;
        let rows = stmt
            .query_map(params![kind.as_str(), from_ts.unwrap_or(0)], |row| {
                Ok(Tombstone {
                    id: row.get(0)?,
                    delete_ts: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Ordered ids of a relation table, `position` ascending.
    pub(super) fn read_ordered_ids(
        &self,
        table: &str,
        owner_column: &str,
        value_column: &str,
        owner_id: &str,
    ) -> StoreResult<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {} FROM {} WHERE {} = ?1 ORDER BY position ASC",
            value_column, table, owner_column
        ))?;
        let ids = stmt
            .query_map(params![owner_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    /// Replaces all rows of an ordered relation with `ids` at positions `0..N-1`.
    pub(super) fn write_ordered_ids(
        &self,
        table: &str,
        owner_column: &str,
        value_column: &str,
        owner_id: &str,
        ids: &[String],
    ) -> StoreResult<()> {
        self.conn.execute(
            &format!("DELETE FROM {} WHERE {} = ?1", table, owner_column),
            params![owner_id],
        )?;
        let mut stmt = self.conn.prepare_cached(&format!(
            "INSERT INTO {} ({}, {}, position) VALUES (?1, ?2, ?3)",
            table, owner_column, value_column
        ))?;
        for (position, id) in ids.iter().enumerate() {
            stmt.execute(params![owner_id, id, position as i64])?;
        }
        Ok(())
    }

    fn ensure_incoming_playlist(&self) -> StoreResult<()> {
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM playlist WHERE playlist_id = ?1",
                params![INCOMING_PLAYLIST_ID],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !exists {
            let now = self.now();
            self.conn.execute(
                "INSERT INTO playlist (playlist_id, name, creation_ts, update_ts, content_update_ts)
                 VALUES (?1, ?2, ?3, ?3, ?3)",
                params![INCOMING_PLAYLIST_ID, INCOMING_PLAYLIST_NAME, now],
            )?;
            info!("Created incoming playlist");
        }
        Ok(())
    }
}

impl LibraryStore for SqliteLibraryStore {
    fn read_artists(&self, filter: &ChangeFilter) -> StoreResult<Vec<Artist>> {
        self.read(|tx| tx.read_artists(filter))
    }

    fn read_artist(&self, id: &str) -> StoreResult<Artist> {
        self.read(|tx| tx.read_artist(id))
    }

    fn create_artist(&self, meta: &ArtistMeta) -> StoreResult<Artist> {
        self.write(|tx| tx.create_artist(meta))
    }

    fn update_artist(&self, id: &str, meta: &ArtistMeta) -> StoreResult<Artist> {
        self.write(|tx| tx.update_artist(id, meta))
    }

    fn delete_artist(&self, id: &str) -> StoreResult<Artist> {
        self.write(|tx| tx.delete_artist(id))
    }

    fn read_albums(&self, filter: &ChangeFilter) -> StoreResult<Vec<Album>> {
        self.read(|tx| tx.read_albums(filter))
    }

    fn read_album(&self, id: &str) -> StoreResult<Album> {
        self.read(|tx| tx.read_album(id))
    }

    fn create_album(&self, meta: &AlbumMeta, check_refs: bool) -> StoreResult<Album> {
        self.write(|tx| tx.create_album(meta, check_refs))
    }

    fn update_album(&self, id: &str, meta: &AlbumMeta, check_refs: bool) -> StoreResult<Album> {
        self.write(|tx| tx.update_album(id, meta, check_refs))
    }

    fn delete_album(&self, id: &str) -> StoreResult<Album> {
        self.write(|tx| tx.delete_album(id))
    }

    fn read_songs(&self, filter: &ChangeFilter) -> StoreResult<Vec<Song>> {
        self.read(|tx| tx.read_songs(filter))
    }

    fn read_song(&self, id: &str) -> StoreResult<Song> {
        self.read(|tx| tx.read_song(id))
    }

    fn create_song(&self, meta: &SongMeta, check_refs: bool) -> StoreResult<Song> {
        self.write(|tx| tx.create_song(meta, check_refs))
    }

    fn update_song(&self, id: &str, meta: &SongMeta, check_refs: bool) -> StoreResult<Song> {
        self.write(|tx| tx.update_song(id, meta, check_refs))
    }

    fn delete_song(&self, id: &str) -> StoreResult<Song> {
        self.write(|tx| tx.delete_song(id))
    }

    fn read_users(&self, filter: &ChangeFilter) -> StoreResult<Vec<User>> {
        self.read(|tx| tx.read_users(filter))
    }

    fn read_user(&self, id: &str) -> StoreResult<User> {
        self.read(|tx| tx.read_user(id))
    }

    fn find_user_by_name(&self, name: &str) -> StoreResult<Option<User>> {
        self.read(|tx| tx.find_user_by_name(name))
    }

    fn create_user(&self, meta: &UserMetaComplete) -> StoreResult<User> {
        // argon2 is slow, hash before taking the connection lock
        let hash = hash_optional_password(meta.password.as_deref())?;
        self.write(|tx| tx.create_user_with_hash(&meta.name, hash.as_deref()))
    }

    fn update_user(&self, id: &str, meta: &UserMetaComplete) -> StoreResult<User> {
        let hash = hash_optional_password(meta.password.as_deref())?;
        self.write(|tx| tx.update_user_with_hash(id, &meta.name, hash.as_deref()))
    }

    fn delete_user(&self, id: &str) -> StoreResult<User> {
        self.write(|tx| tx.delete_user(id))
    }

    fn authenticate(&self, name: &str, password: &str) -> StoreResult<Option<User>> {
        let credentials = match self.read(|tx| tx.read_password_credentials(name))? {
            Some(credentials) => credentials,
            None => return Ok(None),
        };
        if !credentials.hasher.verify(password, &credentials.hash)? {
            return Ok(None);
        }
        self.read(|tx| tx.read_user(&credentials.user_id)).map(Some)
    }

    fn add_auth_token(&self, user_id: &str) -> StoreResult<AuthToken> {
        self.write(|tx| tx.add_auth_token(user_id))
    }

    fn read_auth_token(&self, value: &AuthTokenValue) -> StoreResult<Option<AuthToken>> {
        self.read(|tx| tx.read_auth_token(value))
    }

    fn delete_auth_token(&self, value: &AuthTokenValue) -> StoreResult<bool> {
        self.write(|tx| tx.delete_auth_token(value))
    }

    fn prune_auth_tokens(&self, created_before: i64) -> StoreResult<usize> {
        self.write(|tx| tx.prune_auth_tokens(created_before))
    }

    fn read_playlists(&self, filter: &PlaylistFilter) -> StoreResult<Vec<Playlist>> {
        self.read(|tx| tx.read_playlists(filter))
    }

    fn read_playlist(&self, id: &str) -> StoreResult<Playlist> {
        self.read(|tx| tx.read_playlist(id))
    }

    fn create_playlist(&self, meta: &PlaylistMeta, check_refs: bool) -> StoreResult<Playlist> {
        self.write(|tx| tx.create_playlist(meta, check_refs))
    }

    fn update_playlist(
        &self,
        id: &str,
        meta: &PlaylistMeta,
        check_refs: bool,
    ) -> StoreResult<Playlist> {
        self.write(|tx| tx.update_playlist(id, meta, check_refs))
    }

    fn add_song_to_playlist(
        &self,
        playlist_id: &str,
        song_id: &str,
        check_refs: bool,
    ) -> StoreResult<Playlist> {
        self.write(|tx| tx.add_song_to_playlist(playlist_id, song_id, check_refs))
    }

    fn remove_song_from_playlist(
        &self,
        playlist_id: &str,
        song_id: &str,
    ) -> StoreResult<Playlist> {
        self.write(|tx| tx.remove_song_from_playlist(playlist_id, song_id))
    }

    fn delete_playlist(&self, id: &str) -> StoreResult<Playlist> {
        self.write(|tx| tx.delete_playlist(id))
    }

    fn read_favorite_playlists(
        &self,
        filter: &FavoritePlaylistFilter,
    ) -> StoreResult<Vec<FavoritePlaylist>> {
        self.read(|tx| tx.read_favorite_playlists(filter))
    }

    fn create_favorite_playlist(
        &self,
        id: &FavoritePlaylistId,
        check_refs: bool,
    ) -> StoreResult<FavoritePlaylist> {
        self.write(|tx| tx.create_favorite_playlist(id, check_refs))
    }

    fn delete_favorite_playlist(&self, id: &FavoritePlaylistId) -> StoreResult<FavoritePlaylist> {
        self.write(|tx| tx.delete_favorite_playlist(id))
    }

    fn read_deleted_ids(&self, kind: EntityKind, from_ts: Option<i64>) -> StoreResult<Vec<String>> {
        self.read(|tx| tx.read_deleted_ids(kind, from_ts))
    }

    fn read_deleted_favorite_playlists(
        &self,
        from_ts: Option<i64>,
    ) -> StoreResult<Vec<FavoritePlaylistId>> {
        self.read(|tx| {
            Ok(tx
                .read_favorite_playlist_tombstones(from_ts)?
                .into_iter()
                .map(|t| t.id)
                .collect())
        })
    }

    fn read_delta(&self, from_ts: i64) -> StoreResult<LibraryDelta> {
        self.read(|tx| tx.read_delta(from_ts))
    }

    fn count(&self, kind: EntityKind) -> StoreResult<usize> {
        self.read(|tx| tx.count(kind))
    }
}

fn hash_optional_password(password: Option<&str>) -> StoreResult<Option<String>> {
    Ok(password
        .map(|plain| PasswordHasherKind::Argon2.hash(plain))
        .transpose()?)
}
