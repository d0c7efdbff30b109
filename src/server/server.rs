use anyhow::Result;
use std::{sync::Arc, time::Duration};

use tracing::info;

use crate::library_store::LibraryStore;
use tower_http::services::ServeDir;

use axum::{
    extract::State,
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::api_error::{ApiError, ApiErrorCode};
use super::auth_routes::make_auth_routes;
use super::library_routes::make_library_routes;
use super::metrics::metrics_handler;
use super::session::Session;
use super::state::ServerState;
use super::sync_routes::make_sync_routes;
use super::tls::serve_tls;
use super::{log_requests, ServerConfig};

#[derive(Debug, Serialize, Deserialize)]
pub struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub hash: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(session: Option<Session>, State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        user_id: session.map(|s| s.user_id),
    };
    Json(stats)
}

async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        hash: state.hash.clone(),
    })
}

async fn api_not_found() -> ApiError {
    ApiError::new(ApiErrorCode::NotFound, "no such endpoint")
}

pub fn make_app(config: ServerConfig, store: Arc<dyn LibraryStore>) -> Router {
    let state = ServerState::new(config.clone(), store);

    let api_routes: Router = Router::new()
        .route("/health", get(health))
        .with_state(state.clone())
        .merge(make_auth_routes(state.clone()))
        .merge(make_sync_routes(state.clone()))
        .merge(make_library_routes(state.clone()))
        .fallback(api_not_found);

    let home_router: Router = match &config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new().route("/", get(home)).with_state(state),
    };

    home_router
        .nest("/v1", api_routes)
        .layer(middleware::from_fn_with_state(
            config.requests_logging_level,
            log_requests,
        ))
}

pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Serves the API (HTTPS when `tls_config` is given) and the metrics
/// endpoint until either fails.
pub async fn run_server(
    config: ServerConfig,
    store: Arc<dyn LibraryStore>,
    tls_config: Option<Arc<rustls::ServerConfig>>,
) -> Result<()> {
    let port = config.port;
    let metrics_port = config.metrics_port;
    let app = make_app(config, store);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    let metrics_listener =
        tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port)).await?;

    let metrics_server = async {
        axum::serve(metrics_listener, make_metrics_app()).await?;
        anyhow::Ok(())
    };
    let api_server = async {
        match tls_config {
            Some(tls_config) => {
                serve_tls(listener, app, tls_config, std::future::pending()).await
            }
            None => {
                info!("Serving HTTP on port {}", port);
                axum::serve(listener, app).await?;
                Ok(())
            }
        }
    };

    tokio::try_join!(api_server, metrics_server)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library_store::*;
    use crate::server::RequestsLoggingLevel;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt; // for `oneshot`

    struct TestApp {
        app: Router,
        store: SqliteLibraryStore,
        token: String,
    }

    fn test_config() -> ServerConfig {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            ..Default::default()
        }
    }

    fn test_app_with_config(config: ServerConfig) -> TestApp {
        let store = SqliteLibraryStore::in_memory().unwrap();
        let user = store
            .write(|tx| tx.create_user_with_hash("tester", None))
            .unwrap();
        let token = store.write(|tx| tx.add_auth_token(&user.id)).unwrap();
        TestApp {
            app: make_app(config, Arc::new(store.clone())),
            store,
            token: token.value.0,
        }
    }

    fn test_app() -> TestApp {
        test_app_with_config(test_config())
    }

    impl TestApp {
        async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            let builder = Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", self.token));
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };
            let response = self.app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, value)
        }
    }

    #[tokio::test]
    async fn responds_invalid_token_on_protected_routes() {
        let test_app = test_app();
        let protected_routes = vec![
            "/v1/artists",
            "/v1/albums/123",
            "/v1/songs/deleted",
            "/v1/playlists?fromTs=0",
            "/v1/favoritePlaylists",
            "/v1/sync/delta",
        ];

        for route in protected_routes.into_iter() {
            println!("Trying route {}", route);
            let request = Request::builder().uri(route).body(Body::empty()).unwrap();
            let response = test_app.app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let body: ApiError = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(body.error_code, ApiErrorCode::InvalidToken);
        }
    }

    #[tokio::test]
    async fn health_is_public() {
        let test_app = test_app();
        let request = Request::builder()
            .uri("/v1/health")
            .body(Body::empty())
            .unwrap();
        let response = test_app.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn cookie_token_is_accepted() {
        let test_app = test_app();
        let request = Request::builder()
            .uri("/v1/artists")
            .header(header::COOKIE, format!("session_token={}", test_app.token))
            .body(Body::empty())
            .unwrap();
        let response = test_app.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let test_app = test_app_with_config(ServerConfig {
            token_ttl_sec: 0,
            ..test_config()
        });
        // the store clock is strictly monotonic so the token is already older than 0s
        std::thread::sleep(Duration::from_millis(2));
        let (status, body) = test_app.send("GET", "/v1/artists", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "invalid_token");
    }

    #[tokio::test]
    async fn crud_round_trip_and_error_codes() {
        let test_app = test_app();

        let (status, artist) = test_app
            .send("POST", "/v1/artists", Some(json!({"name": "Mina"})))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let artist_id = artist["id"].as_str().unwrap().to_string();

        let (status, song) = test_app
            .send(
                "POST",
                "/v1/songs",
                Some(json!({"name": "Se telefonando", "artist_ids": [artist_id]})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(song["album_id"], UNKNOWN_ALBUM_ID);

        let (status, body) = test_app
            .send(
                "POST",
                "/v1/songs",
                Some(json!({"name": "x", "artist_ids": ["ghost"]})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "validation");

        let (status, body) = test_app.send("GET", "/v1/albums/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_code"], "not_found");

        let (status, _) = test_app
            .send("PUT", &format!("/v1/artists/{}", artist_id), Some(json!({"name": "Mina Mazzini"})))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = test_app
            .send("DELETE", &format!("/v1/artists/{}", artist_id), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let (_, deleted) = test_app.send("GET", "/v1/artists/deleted?fromTs=0", None).await;
        assert_eq!(deleted, json!([artist_id]));
    }

    #[tokio::test]
    async fn malformed_body_is_a_validation_error() {
        let test_app = test_app();
        let (status, body) = test_app
            .send("POST", "/v1/artists", Some(json!({"nome": "typo"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "validation");
    }

    #[tokio::test]
    async fn playlist_membership_endpoints() {
        let test_app = test_app();
        let song = test_app
            .store
            .create_song(&SongMeta::new("tune"), true)
            .unwrap();
        let (status, playlist) = test_app
            .send("POST", "/v1/playlists", Some(json!({"name": "mix"})))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let playlist_id = playlist["id"].as_str().unwrap().to_string();

        let path = format!("/v1/playlists/{}/songs", playlist_id);
        for _ in 0..2 {
            let (status, _) = test_app
                .send("POST", &path, Some(json!({"song_id": song.id})))
                .await;
            assert_eq!(status, StatusCode::OK);
        }
        let (_, playlist) = test_app
            .send("GET", &format!("/v1/playlists/{}", playlist_id), None)
            .await;
        assert_eq!(playlist["song_ids"], json!([song.id, song.id]));

        let (status, playlist) = test_app
            .send("DELETE", &format!("{}/{}", path, song.id), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(playlist["song_ids"], json!([]));
    }

    #[tokio::test]
    async fn favorite_from_ts_requires_user() {
        let test_app = test_app();
        let (status, body) = test_app
            .send("GET", "/v1/playlists?favoriteFromTs=5", None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "validation");
    }

    #[tokio::test]
    async fn delta_endpoint_carries_every_kind() {
        let test_app = test_app();
        test_app
            .store
            .create_artist(&ArtistMeta { name: "a".into() })
            .unwrap();
        let (status, delta) = test_app.send("GET", "/v1/sync/delta?fromTs=0", None).await;
        assert_eq!(status, StatusCode::OK);
        let delta: LibraryDelta = serde_json::from_value(delta).unwrap();
        assert_eq!(delta.artists.len(), 1);
        assert_eq!(delta.users.len(), 1);
        assert!(delta.playlists.iter().any(|p| p.id == INCOMING_PLAYLIST_ID));
    }

    #[tokio::test]
    async fn unknown_api_path_is_json_not_found() {
        let test_app = test_app();
        let (status, body) = test_app.send("GET", "/v1/genres", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_code"], "not_found");
    }

    #[test]
    fn uptime_format() {
        assert_eq!(format_uptime(Duration::from_secs(90061)), "1d 01:01:01");
    }
}
