//! Change-feed endpoints: tombstones per kind and the combined delta.

use super::api_error::{ApiQuery, ApiResult};
use super::metrics::{record_delta, record_delta_items};
use super::session::Session;
use super::state::{GuardedLibraryStore, ServerState};
use crate::library_store::{ChangeFilter, EntityKind, FavoritePlaylistId, LibraryDelta};

use axum::{extract::State, routing::get, Json, Router};
use tracing::debug;

fn deleted_ids(
    store: &GuardedLibraryStore,
    kind: EntityKind,
    filter: &ChangeFilter,
) -> ApiResult<Vec<String>> {
    let ids = store.read_deleted_ids(kind, filter.from_ts)?;
    record_delta_items(kind, ids.len());
    Ok(Json(ids))
}

async fn get_deleted_artists(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    ApiQuery(filter): ApiQuery<ChangeFilter>,
) -> ApiResult<Vec<String>> {
    deleted_ids(&store, EntityKind::Artist, &filter)
}

async fn get_deleted_albums(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    ApiQuery(filter): ApiQuery<ChangeFilter>,
) -> ApiResult<Vec<String>> {
    deleted_ids(&store, EntityKind::Album, &filter)
}

async fn get_deleted_songs(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    ApiQuery(filter): ApiQuery<ChangeFilter>,
) -> ApiResult<Vec<String>> {
    deleted_ids(&store, EntityKind::Song, &filter)
}

async fn get_deleted_users(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    ApiQuery(filter): ApiQuery<ChangeFilter>,
) -> ApiResult<Vec<String>> {
    deleted_ids(&store, EntityKind::User, &filter)
}

async fn get_deleted_playlists(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    ApiQuery(filter): ApiQuery<ChangeFilter>,
) -> ApiResult<Vec<String>> {
    deleted_ids(&store, EntityKind::Playlist, &filter)
}

async fn get_deleted_favorite_playlists(
    _session: Session,
    State(store): State<GuardedLibraryStore>,
    ApiQuery(filter): ApiQuery<ChangeFilter>,
) -> ApiResult<Vec<FavoritePlaylistId>> {
    let ids = store.read_deleted_favorite_playlists(filter.from_ts)?;
    record_delta_items(EntityKind::FavoritePlaylist, ids.len());
    Ok(Json(ids))
}

async fn get_delta(
    session: Session,
    State(store): State<GuardedLibraryStore>,
    ApiQuery(filter): ApiQuery<ChangeFilter>,
) -> ApiResult<LibraryDelta> {
    let delta = store.read_delta(filter.from_ts_or_zero())?;
    debug!(
        "Delta from {} for user {}: {} upserts, {} deletes",
        delta.from_ts,
        session.user_id,
        delta.upsert_count(),
        delta.delete_count()
    );
    record_delta(&delta);
    Ok(Json(delta))
}

pub fn make_sync_routes(state: ServerState) -> Router {
    Router::new()
        .route("/sync/delta", get(get_delta))
        .route("/artists/deleted", get(get_deleted_artists))
        .route("/albums/deleted", get(get_deleted_albums))
        .route("/songs/deleted", get(get_deleted_songs))
        .route("/users/deleted", get(get_deleted_users))
        .route("/playlists/deleted", get(get_deleted_playlists))
        .route(
            "/favoritePlaylists/deleted",
            get(get_deleted_favorite_playlists),
        )
        .with_state(state)
}
