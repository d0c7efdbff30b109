//! Read, create, update and delete endpoints of every entity kind.
//!
//! Writes from the API always check references; only trusted in-process
//! callers may skip them.

use super::api_error::{ApiCreated, ApiJson, ApiQuery, ApiResult};
use super::metrics::{record_delta_items, record_store_write};
use super::session::Session;
use super::state::{GuardedLibraryStore, ServerState};
use crate::library_store::*;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};

const CHECK_REFS: bool = true;

#[derive(Deserialize, Serialize, Debug)]
pub struct AddSongBody {
    pub song_id: SongId,
}

fn created<T>(kind: EntityKind, entity: T) -> ApiCreated<T> {
    record_store_write(kind, "create");
    Ok((StatusCode::CREATED, Json(entity)))
}

fn written<T>(kind: EntityKind, operation: &str, entity: T) -> ApiResult<T> {
    record_store_write(kind, operation);
    Ok(Json(entity))
}

fn listed<T>(kind: EntityKind, entities: Vec<T>) -> ApiResult<Vec<T>> {
    record_delta_items(kind, entities.len());
    Ok(Json(entities))
}

// =========================================================================
// Artists
// =========================================================================

async fn get_artists(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    ApiQuery(filter): ApiQuery<ChangeFilter>,
) -> ApiResult<Vec<Artist>> {
    listed(EntityKind::Artist, store.read_artists(&filter)?)
}

async fn get_artist(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    Path(id): Path<ArtistId>,
) -> ApiResult<Artist> {
    Ok(Json(store.read_artist(&id)?))
}

async fn post_artist(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    ApiJson(meta): ApiJson<ArtistMeta>,
) -> ApiCreated<Artist> {
    created(EntityKind::Artist, store.create_artist(&meta)?)
}

async fn put_artist(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    Path(id): Path<ArtistId>,
    ApiJson(meta): ApiJson<ArtistMeta>,
) -> ApiResult<Artist> {
    written(EntityKind::Artist, "update", store.update_artist(&id, &meta)?)
}

async fn delete_artist(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    Path(id): Path<ArtistId>,
) -> ApiResult<Artist> {
    written(EntityKind::Artist, "delete", store.delete_artist(&id)?)
}

// =========================================================================
// Albums
// =========================================================================

async fn get_albums(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    ApiQuery(filter): ApiQuery<ChangeFilter>,
) -> ApiResult<Vec<Album>> {
    listed(EntityKind::Album, store.read_albums(&filter)?)
}

async fn get_album(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    Path(id): Path<AlbumId>,
) -> ApiResult<Album> {
    Ok(Json(store.read_album(&id)?))
}

async fn post_album(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    ApiJson(meta): ApiJson<AlbumMeta>,
) -> ApiCreated<Album> {
    created(EntityKind::Album, store.create_album(&meta, CHECK_REFS)?)
}

async fn put_album(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    Path(id): Path<AlbumId>,
    ApiJson(meta): ApiJson<AlbumMeta>,
) -> ApiResult<Album> {
    let album = store.update_album(&id, &meta, CHECK_REFS)?;
    written(EntityKind::Album, "update", album)
}

async fn delete_album(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    Path(id): Path<AlbumId>,
) -> ApiResult<Album> {
    written(EntityKind::Album, "delete", store.delete_album(&id)?)
}

// =========================================================================
// Songs
// =========================================================================

async fn get_songs(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    ApiQuery(filter): ApiQuery<ChangeFilter>,
) -> ApiResult<Vec<Song>> {
    listed(EntityKind::Song, store.read_songs(&filter)?)
}

async fn get_song(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    Path(id): Path<SongId>,
) -> ApiResult<Song> {
    Ok(Json(store.read_song(&id)?))
}

async fn post_song(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    ApiJson(meta): ApiJson<SongMeta>,
) -> ApiCreated<Song> {
    created(EntityKind::Song, store.create_song(&meta, CHECK_REFS)?)
}

async fn put_song(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    Path(id): Path<SongId>,
    ApiJson(meta): ApiJson<SongMeta>,
) -> ApiResult<Song> {
    let song = store.update_song(&id, &meta, CHECK_REFS)?;
    written(EntityKind::Song, "update", song)
}

async fn delete_song(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    Path(id): Path<SongId>,
) -> ApiResult<Song> {
    written(EntityKind::Song, "delete", store.delete_song(&id)?)
}

// =========================================================================
// Users
// =========================================================================

async fn get_users(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    ApiQuery(filter): ApiQuery<ChangeFilter>,
) -> ApiResult<Vec<User>> {
    listed(EntityKind::User, store.read_users(&filter)?)
}

async fn get_user(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    Path(id): Path<UserId>,
) -> ApiResult<User> {
    Ok(Json(store.read_user(&id)?))
}

async fn post_user(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    ApiJson(meta): ApiJson<UserMetaComplete>,
) -> ApiCreated<User> {
    created(EntityKind::User, store.create_user(&meta)?)
}

async fn put_user(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    Path(id): Path<UserId>,
    ApiJson(meta): ApiJson<UserMetaComplete>,
) -> ApiResult<User> {
    written(EntityKind::User, "update", store.update_user(&id, &meta)?)
}

async fn delete_user(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    Path(id): Path<UserId>,
) -> ApiResult<User> {
    written(EntityKind::User, "delete", store.delete_user(&id)?)
}

// =========================================================================
// Playlists
// =========================================================================

async fn get_playlists(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    ApiQuery(filter): ApiQuery<PlaylistFilter>,
) -> ApiResult<Vec<Playlist>> {
    listed(EntityKind::Playlist, store.read_playlists(&filter)?)
}

async fn get_playlist(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    Path(id): Path<PlaylistId>,
) -> ApiResult<Playlist> {
    Ok(Json(store.read_playlist(&id)?))
}

async fn post_playlist(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    ApiJson(meta): ApiJson<PlaylistMeta>,
) -> ApiCreated<Playlist> {
    created(
        EntityKind::Playlist,
        store.create_playlist(&meta, CHECK_REFS)?,
    )
}

async fn put_playlist(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    Path(id): Path<PlaylistId>,
    ApiJson(meta): ApiJson<PlaylistMeta>,
) -> ApiResult<Playlist> {
    let playlist = store.update_playlist(&id, &meta, CHECK_REFS)?;
    written(EntityKind::Playlist, "update", playlist)
}

async fn delete_playlist(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    Path(id): Path<PlaylistId>,
) -> ApiResult<Playlist> {
    written(EntityKind::Playlist, "delete", store.delete_playlist(&id)?)
}

async fn post_playlist_song(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    Path(id): Path<PlaylistId>,
    ApiJson(body): ApiJson<AddSongBody>,
) -> ApiResult<Playlist> {
    let playlist = store.add_song_to_playlist(&id, &body.song_id, CHECK_REFS)?;
    written(EntityKind::Playlist, "add_song", playlist)
}

async fn delete_playlist_song(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    Path((id, song_id)): Path<(PlaylistId, SongId)>,
) -> ApiResult<Playlist> {
    let playlist = store.remove_song_from_playlist(&id, &song_id)?;
    written(EntityKind::Playlist, "remove_song", playlist)
}

// =========================================================================
// Favorites
// =========================================================================

async fn get_favorite_playlists(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    ApiQuery(filter): ApiQuery<FavoritePlaylistFilter>,
) -> ApiResult<Vec<FavoritePlaylist>> {
    listed(
        EntityKind::FavoritePlaylist,
        store.read_favorite_playlists(&filter)?,
    )
}

async fn post_favorite_playlist(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    ApiJson(id): ApiJson<FavoritePlaylistId>,
) -> ApiCreated<FavoritePlaylist> {
    created(
        EntityKind::FavoritePlaylist,
        store.create_favorite_playlist(&id, CHECK_REFS)?,
    )
}

async fn delete_favorite_playlist(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    Path((user_id, playlist_id)): Path<(UserId, PlaylistId)>,
) -> ApiResult<FavoritePlaylist> {
    let id = FavoritePlaylistId::new(user_id, playlist_id);
    written(
        EntityKind::FavoritePlaylist,
        "delete",
        store.delete_favorite_playlist(&id)?,
    )
}

pub fn make_library_routes(state: ServerState) -> Router {
    Router::new()
        .route("/artists", get(get_artists).post(post_artist))
        .route(
            "/artists/{id}",
            get(get_artist).put(put_artist).delete(delete_artist),
        )
        .route("/albums", get(get_albums).post(post_album))
        .route(
            "/albums/{id}",
            get(get_album).put(put_album).delete(delete_album),
        )
        .route("/songs", get(get_songs).post(post_song))
        .route(
            "/songs/{id}",
            get(get_song).put(put_song).delete(delete_song),
        )
        .route("/users", get(get_users).post(post_user))
        .route(
            "/users/{id}",
            get(get_user).put(put_user).delete(delete_user),
        )
        .route("/playlists", get(get_playlists).post(post_playlist))
        .route(
            "/playlists/{id}",
            get(get_playlist).put(put_playlist).delete(delete_playlist),
        )
        .route("/playlists/{id}/songs", axum::routing::post(post_playlist_song))
        .route(
            "/playlists/{id}/songs/{song_id}",
            delete(delete_playlist_song),
        )
        .route(
            "/favoritePlaylists",
            get(get_favorite_playlists).post(post_favorite_playlist),
        )
        .route(
            "/favoritePlaylists/{user_id}/{playlist_id}",
            delete(delete_favorite_playlist),
        )
        .with_state(state)
}
