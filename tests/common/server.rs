//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP(S) servers.
//! Each test gets an isolated server with its own database.

use super::constants::*;
use super::fixtures::{seed_library, SeededLibrary};
use pezzottify_library::client::{ClientConfig, LibraryClient};
use pezzottify_library::library_store::{LibraryStore, SqliteLibraryStore};
use pezzottify_library::server::tls::serve_tls;
use pezzottify_library::server::{make_app, RequestsLoggingLevel, ServerConfig};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};
use tokio::net::TcpListener;

/// A self-signed certificate and its key, written to temp files.
pub struct TestCertificate {
    pub cert_file: NamedTempFile,
    pub key_file: NamedTempFile,
}

impl TestCertificate {
    pub fn generate(hostname: &str) -> Self {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec![hostname.to_string()])
                .expect("Failed to generate certificate");
        let cert_pem = cert.pem();
        let mut cert_file = NamedTempFile::new().expect("Failed to create cert file");
        cert_file.write_all(cert_pem.as_bytes()).unwrap();
        let mut key_file = NamedTempFile::new().expect("Failed to create key file");
        key_file
            .write_all(key_pair.serialize_pem().as_bytes())
            .unwrap();
        TestCertificate {
            cert_file,
            key_file,
        }
    }
}

/// Test server instance with an isolated database
///
/// When dropped, the server shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Whether the server speaks HTTPS
    pub tls: bool,

    /// Store for direct database access in tests
    pub store: SqliteLibraryStore,

    /// What the fixtures created
    pub seeded: SeededLibrary,

    // Private fields - keep resources alive until drop
    _temp_db_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

pub fn test_server_config(port: u16) -> ServerConfig {
    ServerConfig {
        port,
        requests_logging_level: RequestsLoggingLevel::None,
        ..Default::default()
    }
}

impl TestServer {
    /// Spawns a seeded HTTP server on a random port
    pub async fn spawn() -> Self {
        Self::spawn_with(|config| config, None).await
    }

    /// Spawns a seeded HTTPS server presenting `certificate`
    pub async fn spawn_tls(certificate: &TestCertificate) -> Self {
        Self::spawn_with(|config| config, Some(certificate)).await
    }

    /// Spawns a seeded server with a customized config, over HTTPS when a
    /// certificate is given.
    pub async fn spawn_with<F>(customize: F, certificate: Option<&TestCertificate>) -> Self
    where
        F: FnOnce(ServerConfig) -> ServerConfig,
    {
        let temp_db_dir = TempDir::new().expect("Failed to create temp dir");
        let store = SqliteLibraryStore::new(temp_db_dir.path().join("library.db"))
            .expect("Failed to open library store");
        let seeded = seed_library(&store).expect("Failed to seed library");

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let config = customize(test_server_config(port));
        let app = make_app(config, Arc::new(store.clone()) as Arc<dyn LibraryStore>);

        let tls = certificate.is_some();
        let base_url = match certificate {
            Some(certificate) => {
                let tls_config = pezzottify_library::server::load_tls_config(
                    certificate.cert_file.path(),
                    certificate.key_file.path(),
                )
                .expect("Failed to load TLS config");
                tokio::spawn(async move {
                    serve_tls(listener, app, tls_config, async {
                        shutdown_rx.await.ok();
                    })
                    .await
                    .expect("Server failed");
                });
                format!("https://{}:{}", TLS_HOSTNAME, port)
            }
            None => {
                tokio::spawn(async move {
                    axum::serve(listener, app)
                        .with_graceful_shutdown(async {
                            shutdown_rx.await.ok();
                        })
                        .await
                        .expect("Server failed");
                });
                format!("http://127.0.0.1:{}", port)
            }
        };

        let server = Self {
            base_url,
            port,
            tls,
            store,
            seeded,
            _temp_db_dir: temp_db_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the /v1/health endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .danger_accept_invalid_certs(true)
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/v1/health", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }

    /// Client settings pointing at this server, pinning into `data_dir`
    pub fn client_config(&self, data_dir: &Path) -> ClientConfig {
        ClientConfig {
            hostname: if self.tls {
                TLS_HOSTNAME.to_string()
            } else {
                "127.0.0.1".to_string()
            },
            port: self.port,
            ssl: self.tls,
            self_signed: self.tls,
            username: TEST_USER.to_string(),
            password: TEST_PASS.to_string(),
            data_dir: data_dir.to_path_buf(),
            timeout_sec: REQUEST_TIMEOUT_SECS,
        }
    }

    /// A connected (not yet logged in) client for TEST_USER
    pub async fn library_client(&self) -> LibraryClient {
        let data_dir = TempDir::new().unwrap();
        LibraryClient::connect(&self.client_config(data_dir.path()))
            .await
            .expect("Failed to connect")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        // TempDir and NamedTempFile will be cleaned up automatically
    }
}
