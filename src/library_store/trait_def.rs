//! LibraryStore trait definition.
//!
//! The server talks to the library through this trait; every method is one
//! transaction. Composed writes go through `SqliteLibraryStore::write`.

use super::delta::{ChangeFilter, FavoritePlaylistFilter, LibraryDelta, PlaylistFilter};
use super::error::StoreResult;
use super::models::*;
use crate::user::{AuthToken, AuthTokenValue};

pub trait LibraryStore: Send + Sync {
    // =========================================================================
    // Artists
    // =========================================================================

    fn read_artists(&self, filter: &ChangeFilter) -> StoreResult<Vec<Artist>>;
    fn read_artist(&self, id: &str) -> StoreResult<Artist>;
    fn create_artist(&self, meta: &ArtistMeta) -> StoreResult<Artist>;
    fn update_artist(&self, id: &str, meta: &ArtistMeta) -> StoreResult<Artist>;
    fn delete_artist(&self, id: &str) -> StoreResult<Artist>;

    // =========================================================================
    // Albums
    // =========================================================================

    fn read_albums(&self, filter: &ChangeFilter) -> StoreResult<Vec<Album>>;
    fn read_album(&self, id: &str) -> StoreResult<Album>;
    fn create_album(&self, meta: &AlbumMeta, check_refs: bool) -> StoreResult<Album>;
    fn update_album(&self, id: &str, meta: &AlbumMeta, check_refs: bool) -> StoreResult<Album>;
    fn delete_album(&self, id: &str) -> StoreResult<Album>;

    // =========================================================================
    // Songs
    // =========================================================================

    fn read_songs(&self, filter: &ChangeFilter) -> StoreResult<Vec<Song>>;
    fn read_song(&self, id: &str) -> StoreResult<Song>;
    fn create_song(&self, meta: &SongMeta, check_refs: bool) -> StoreResult<Song>;
    fn update_song(&self, id: &str, meta: &SongMeta, check_refs: bool) -> StoreResult<Song>;
    fn delete_song(&self, id: &str) -> StoreResult<Song>;

    // =========================================================================
    // Users and authentication
    // =========================================================================

    fn read_users(&self, filter: &ChangeFilter) -> StoreResult<Vec<User>>;
    fn read_user(&self, id: &str) -> StoreResult<User>;
    fn find_user_by_name(&self, name: &str) -> StoreResult<Option<User>>;
    /// A `None` password creates a user that cannot log in.
    fn create_user(&self, meta: &UserMetaComplete) -> StoreResult<User>;
    fn update_user(&self, id: &str, meta: &UserMetaComplete) -> StoreResult<User>;
    fn delete_user(&self, id: &str) -> StoreResult<User>;

    /// Returns Ok(None) if the name is unknown or the password does not match.
    fn authenticate(&self, name: &str, password: &str) -> StoreResult<Option<User>>;
    fn add_auth_token(&self, user_id: &str) -> StoreResult<AuthToken>;
    fn read_auth_token(&self, value: &AuthTokenValue) -> StoreResult<Option<AuthToken>>;
    fn delete_auth_token(&self, value: &AuthTokenValue) -> StoreResult<bool>;
    /// Drops tokens created before `created_before`, returns how many.
    fn prune_auth_tokens(&self, created_before: i64) -> StoreResult<usize>;

    // =========================================================================
    // Playlists and favorites
    // =========================================================================

    fn read_playlists(&self, filter: &PlaylistFilter) -> StoreResult<Vec<Playlist>>;
    fn read_playlist(&self, id: &str) -> StoreResult<Playlist>;
    fn create_playlist(&self, meta: &PlaylistMeta, check_refs: bool) -> StoreResult<Playlist>;
    fn update_playlist(
        &self,
        id: &str,
        meta: &PlaylistMeta,
        check_refs: bool,
    ) -> StoreResult<Playlist>;
    fn add_song_to_playlist(
        &self,
        playlist_id: &str,
        song_id: &str,
        check_refs: bool,
    ) -> StoreResult<Playlist>;
    fn remove_song_from_playlist(&self, playlist_id: &str, song_id: &str)
        -> StoreResult<Playlist>;
    fn delete_playlist(&self, id: &str) -> StoreResult<Playlist>;

    fn read_favorite_playlists(
        &self,
        filter: &FavoritePlaylistFilter,
    ) -> StoreResult<Vec<FavoritePlaylist>>;
    fn create_favorite_playlist(
        &self,
        id: &FavoritePlaylistId,
        check_refs: bool,
    ) -> StoreResult<FavoritePlaylist>;
    fn delete_favorite_playlist(&self, id: &FavoritePlaylistId) -> StoreResult<FavoritePlaylist>;

    // =========================================================================
    // Change feed
    // =========================================================================

    /// Not valid for `EntityKind::FavoritePlaylist`, see
    /// [`LibraryStore::read_deleted_favorite_playlists`].
    fn read_deleted_ids(&self, kind: EntityKind, from_ts: Option<i64>) -> StoreResult<Vec<String>>;
    fn read_deleted_favorite_playlists(
        &self,
        from_ts: Option<i64>,
    ) -> StoreResult<Vec<FavoritePlaylistId>>;
    fn read_delta(&self, from_ts: i64) -> StoreResult<LibraryDelta>;

    /// Number of live entities of `kind` (for metrics and the home page).
    fn count(&self, kind: EntityKind) -> StoreResult<usize>;
}
