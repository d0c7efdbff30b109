//! Typed client of the `/v1` REST surface.
//!
//! Requests carry a bearer token obtained with the configured credentials.
//! When the server answers `invalid_token` the client logs in again and
//! repeats the request, as many times as its [`TokenRetryPolicy`] allows.

use super::config::ClientConfig;
use super::error::{ClientError, ClientResult};
use super::retry::TokenRetryPolicy;
use super::tls::{pinned_client_config, pinned_or_probe};
use crate::library_store::*;
use crate::replica::DeltaSource;
use crate::server::{HealthResponse, LoginBody, TokenResponse};

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{debug, info};

#[derive(Deserialize)]
struct ErrorBody {
    error_code: String,
    #[serde(default)]
    message: String,
}

#[derive(Clone, Debug)]
struct ClientSession {
    token: String,
    user_id: UserId,
}

pub struct LibraryClient {
    http: reqwest::Client,
    base_url: String,
    user_name: String,
    password: String,
    retry_policy: TokenRetryPolicy,
    session: Mutex<Option<ClientSession>>,
}

pub fn kind_path(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Artist => "artists",
        EntityKind::Album => "albums",
        EntityKind::Song => "songs",
        EntityKind::User => "users",
        EntityKind::Playlist => "playlists",
        EntityKind::FavoritePlaylist => "favoritePlaylists",
    }
}

async fn error_from_response(response: reqwest::Response) -> ClientError {
    let status = response.status();
    let text = match response.text().await {
        Ok(text) => text,
        Err(err) => return err.into(),
    };
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => match body.error_code.as_str() {
            "not_found" => ClientError::NotFound(body.message),
            "validation" => ClientError::Validation(body.message),
            "invalid_token" => ClientError::InvalidToken,
            "invalid_credentials" => ClientError::InvalidCredentials,
            _ => ClientError::Api {
                status,
                code: body.error_code,
                message: body.message,
            },
        },
        Err(_) => ClientError::Api {
            status,
            code: "unknown".to_string(),
            message: text,
        },
    }
}

impl LibraryClient {
    /// Builds the HTTP client (pinning the server certificate when the
    /// server is self-signed) and checks that the server answers.
    pub async fn connect(config: &ClientConfig) -> ClientResult<Self> {
        let base_url = config.base_url();
        let mut builder = reqwest::Client::builder().timeout(config.timeout());
        if config.ssl && config.self_signed {
            let cert =
                pinned_or_probe(&config.pinned_cert_path(), &base_url, config.timeout()).await?;
            builder = builder.use_preconfigured_tls(pinned_client_config(cert)?);
        }
        let http = builder.build()?;

        let client = Self::with_http_client(
            http,
            base_url,
            config.username.clone(),
            config.password.clone(),
        );
        let health = client.health().await?;
        info!("Connected to {} (server {})", client.base_url, health.hash);
        Ok(client)
    }

    pub fn with_http_client(
        http: reqwest::Client,
        base_url: String,
        user_name: String,
        password: String,
    ) -> Self {
        LibraryClient {
            http,
            base_url,
            user_name,
            password,
            retry_policy: TokenRetryPolicy::default(),
            session: Mutex::new(None),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: TokenRetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Id of the logged in user, known after the first successful login.
    pub fn user_id(&self) -> Option<UserId> {
        self.session.lock().unwrap().as_ref().map(|s| s.user_id.clone())
    }

    fn token(&self) -> Option<String> {
        self.session.lock().unwrap().as_ref().map(|s| s.token.clone())
    }

    /// Drops the session only while it still holds `rejected`; a concurrent
    /// call may already have logged in again.
    fn forget_token(&self, rejected: &str) {
        let mut session = self.session.lock().unwrap();
        if session.as_ref().is_some_and(|s| s.token == rejected) {
            *session = None;
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{}", self.base_url, path)
    }

    pub async fn health(&self) -> ClientResult<HealthResponse> {
        let response = self.http.get(self.url("/health")).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response.json().await?)
    }

    pub async fn login(&self) -> ClientResult<UserId> {
        let body = LoginBody {
            user_name: self.user_name.clone(),
            password: self.password.clone(),
        };
        let response = self.http.post(self.url("/token")).json(&body).send().await?;
        if response.status() != StatusCode::CREATED {
            return Err(error_from_response(response).await);
        }
        let token: TokenResponse = response.json().await?;
        debug!("Logged in as {}", token.user_id);
        let user_id = token.user_id.clone();
        *self.session.lock().unwrap() = Some(ClientSession {
            token: token.access_token,
            user_id: token.user_id,
        });
        Ok(user_id)
    }

    /// Revokes the current token server side. A no-op when not logged in.
    pub async fn logout(&self) -> ClientResult<()> {
        let token = match self.session.lock().unwrap().take() {
            Some(session) => session.token,
            None => return Ok(()),
        };
        let response = self
            .http
            .delete(self.url("/token"))
            .bearer_auth(token)
            .send()
            .await?;
        match response.status() {
            StatusCode::NO_CONTENT => Ok(()),
            // already expired or revoked
            StatusCode::UNAUTHORIZED => Ok(()),
            _ => Err(error_from_response(response).await),
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        token: &str,
    ) -> ClientResult<T> {
        let response = request.bearer_auth(token).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response.json().await?)
    }

    /// Sends an authorized request built by `make_request`, logging in first
    /// if needed and again whenever the retry policy allows.
    async fn authorized<T, F>(&self, make_request: F) -> ClientResult<T>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let mut refreshes = 0;
        loop {
            let token = match self.token() {
                Some(token) => token,
                None => {
                    self.login().await?;
                    self.token().ok_or(ClientError::InvalidToken)?
                }
            };
            match self.send_once(make_request(), &token).await {
                Err(err) if self.retry_policy.should_refresh(refreshes, &err) => {
                    refreshes += 1;
                    debug!("Token rejected, logging in again ({})", refreshes);
                    self.forget_token(&token);
                }
                result => return result,
            }
        }
    }

    async fn list<T, Q>(&self, kind: EntityKind, query: &Q) -> ClientResult<Vec<T>>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.url(&format!("/{}", kind_path(kind)));
        self.authorized(|| self.http.get(&url).query(query)).await
    }

    async fn read_one<T: DeserializeOwned>(&self, kind: EntityKind, id: &str) -> ClientResult<T> {
        let url = self.url(&format!("/{}/{}", kind_path(kind), id));
        self.authorized(|| self.http.get(&url)).await
    }

    async fn send_json<T, B>(&self, method: Method, path: String, body: &B) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(&path);
        self.authorized(|| self.http.request(method.clone(), &url).json(body))
            .await
    }

    async fn create<T, B>(&self, kind: EntityKind, body: &B) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(Method::POST, format!("/{}", kind_path(kind)), body)
            .await
    }

    async fn update<T, B>(&self, kind: EntityKind, id: &str, body: &B) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(Method::PUT, format!("/{}/{}", kind_path(kind), id), body)
            .await
    }

    async fn remove<T: DeserializeOwned>(&self, path: String) -> ClientResult<T> {
        let url = self.url(&path);
        self.authorized(|| self.http.delete(&url)).await
    }

    // =========================================================================
    // Artists, albums, songs
    // =========================================================================

    pub async fn read_artists(&self, filter: &ChangeFilter) -> ClientResult<Vec<Artist>> {
        self.list(EntityKind::Artist, filter).await
    }

    pub async fn read_artist(&self, id: &str) -> ClientResult<Artist> {
        self.read_one(EntityKind::Artist, id).await
    }

    pub async fn create_artist(&self, meta: &ArtistMeta) -> ClientResult<Artist> {
        self.create(EntityKind::Artist, meta).await
    }

    pub async fn update_artist(&self, id: &str, meta: &ArtistMeta) -> ClientResult<Artist> {
        self.update(EntityKind::Artist, id, meta).await
    }

    pub async fn delete_artist(&self, id: &str) -> ClientResult<Artist> {
        self.remove(format!("/artists/{}", id)).await
    }

    pub async fn read_albums(&self, filter: &ChangeFilter) -> ClientResult<Vec<Album>> {
        self.list(EntityKind::Album, filter).await
    }

    pub async fn read_album(&self, id: &str) -> ClientResult<Album> {
        self.read_one(EntityKind::Album, id).await
    }

    pub async fn create_album(&self, meta: &AlbumMeta) -> ClientResult<Album> {
        self.create(EntityKind::Album, meta).await
    }

    pub async fn update_album(&self, id: &str, meta: &AlbumMeta) -> ClientResult<Album> {
        self.update(EntityKind::Album, id, meta).await
    }

    pub async fn delete_album(&self, id: &str) -> ClientResult<Album> {
        self.remove(format!("/albums/{}", id)).await
    }

    pub async fn read_songs(&self, filter: &ChangeFilter) -> ClientResult<Vec<Song>> {
        self.list(EntityKind::Song, filter).await
    }

    pub async fn read_song(&self, id: &str) -> ClientResult<Song> {
        self.read_one(EntityKind::Song, id).await
    }

    pub async fn create_song(&self, meta: &SongMeta) -> ClientResult<Song> {
        self.create(EntityKind::Song, meta).await
    }

    pub async fn update_song(&self, id: &str, meta: &SongMeta) -> ClientResult<Song> {
        self.update(EntityKind::Song, id, meta).await
    }

    pub async fn delete_song(&self, id: &str) -> ClientResult<Song> {
        self.remove(format!("/songs/{}", id)).await
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub async fn read_users(&self, filter: &ChangeFilter) -> ClientResult<Vec<User>> {
        self.list(EntityKind::User, filter).await
    }

    pub async fn read_user(&self, id: &str) -> ClientResult<User> {
        self.read_one(EntityKind::User, id).await
    }

    pub async fn create_user(&self, meta: &UserMetaComplete) -> ClientResult<User> {
        self.create(EntityKind::User, meta).await
    }

    pub async fn update_user(&self, id: &str, meta: &UserMetaComplete) -> ClientResult<User> {
        self.update(EntityKind::User, id, meta).await
    }

    pub async fn delete_user(&self, id: &str) -> ClientResult<User> {
        self.remove(format!("/users/{}", id)).await
    }

    // =========================================================================
    // Playlists and favorites
    // =========================================================================

    pub async fn read_playlists(&self, filter: &PlaylistFilter) -> ClientResult<Vec<Playlist>> {
        self.list(EntityKind::Playlist, filter).await
    }

    pub async fn read_playlist(&self, id: &str) -> ClientResult<Playlist> {
        self.read_one(EntityKind::Playlist, id).await
    }

    pub async fn create_playlist(&self, meta: &PlaylistMeta) -> ClientResult<Playlist> {
        self.create(EntityKind::Playlist, meta).await
    }

    pub async fn update_playlist(&self, id: &str, meta: &PlaylistMeta) -> ClientResult<Playlist> {
        self.update(EntityKind::Playlist, id, meta).await
    }

    pub async fn delete_playlist(&self, id: &str) -> ClientResult<Playlist> {
        self.remove(format!("/playlists/{}", id)).await
    }

    pub async fn add_song_to_playlist(
        &self,
        playlist_id: &str,
        song_id: &str,
    ) -> ClientResult<Playlist> {
        let body = crate::server::AddSongBody {
            song_id: song_id.to_string(),
        };
        self.send_json(
            Method::POST,
            format!("/playlists/{}/songs", playlist_id),
            &body,
        )
        .await
    }

    pub async fn remove_song_from_playlist(
        &self,
        playlist_id: &str,
        song_id: &str,
    ) -> ClientResult<Playlist> {
        self.remove(format!("/playlists/{}/songs/{}", playlist_id, song_id))
            .await
    }

    pub async fn read_favorite_playlists(
        &self,
        filter: &FavoritePlaylistFilter,
    ) -> ClientResult<Vec<FavoritePlaylist>> {
        self.list(EntityKind::FavoritePlaylist, filter).await
    }

    pub async fn create_favorite_playlist(
        &self,
        id: &FavoritePlaylistId,
    ) -> ClientResult<FavoritePlaylist> {
        self.create(EntityKind::FavoritePlaylist, id).await
    }

    pub async fn delete_favorite_playlist(
        &self,
        id: &FavoritePlaylistId,
    ) -> ClientResult<FavoritePlaylist> {
        self.remove(format!(
            "/favoritePlaylists/{}/{}",
            id.user_id, id.playlist_id
        ))
        .await
    }

    // =========================================================================
    // Change feed
    // =========================================================================

    /// Not valid for favorites, see [`LibraryClient::read_deleted_favorite_playlists`].
    pub async fn read_deleted_ids(
        &self,
        kind: EntityKind,
        filter: &ChangeFilter,
    ) -> ClientResult<Vec<String>> {
        if kind == EntityKind::FavoritePlaylist {
            return Err(ClientError::Validation(
                "favorite playlists have composite ids".to_string(),
            ));
        }
        let url = self.url(&format!("/{}/deleted", kind_path(kind)));
        self.authorized(|| self.http.get(&url).query(filter)).await
    }

    pub async fn read_deleted_favorite_playlists(
        &self,
        filter: &ChangeFilter,
    ) -> ClientResult<Vec<FavoritePlaylistId>> {
        let url = self.url("/favoritePlaylists/deleted");
        self.authorized(|| self.http.get(&url).query(filter)).await
    }

    pub async fn read_delta(&self, from_ts: i64) -> ClientResult<LibraryDelta> {
        let url = self.url("/sync/delta");
        let filter = ChangeFilter::since(from_ts);
        self.authorized(|| self.http.get(&url).query(&filter)).await
    }
}

#[async_trait]
impl DeltaSource for LibraryClient {
    type Error = ClientError;

    async fn fetch_delta(&self, from_ts: i64) -> Result<LibraryDelta, ClientError> {
        self.read_delta(from_ts).await
    }
}
