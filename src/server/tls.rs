//! HTTPS serving of the router with rustls.

use anyhow::{anyhow, Context, Result};
use axum::Router;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tower::Service;
use tracing::{debug, info, warn};

/// Builds a rustls server config from PEM files. The first certificate of
/// the chain file is the leaf.
pub fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<Arc<rustls::ServerConfig>> {
    let certs = CertificateDer::pem_file_iter(cert_path)
        .map_err(|err| anyhow!("Cannot read certificate {:?}: {:?}", cert_path, err))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| anyhow!("Cannot parse certificate {:?}: {:?}", cert_path, err))?;
    if certs.is_empty() {
        anyhow::bail!("No certificate found in {:?}", cert_path);
    }
    let key = PrivateKeyDer::from_pem_file(key_path)
        .map_err(|err| anyhow!("Cannot read private key {:?}: {:?}", key_path, err))?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .context("Unsupported TLS protocol versions")?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("Certificate and key do not match")?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(Arc::new(config))
}

/// Accepts TLS connections until `shutdown` resolves. Each connection is
/// served on its own task; a failed handshake only drops that connection.
pub async fn serve_tls<F>(
    listener: TcpListener,
    app: Router,
    tls_config: Arc<rustls::ServerConfig>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send,
{
    let acceptor = TlsAcceptor::from(tls_config);
    tokio::pin!(shutdown);
    info!("Serving HTTPS on {:?}", listener.local_addr()?);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!("Failed to accept connection: {}", err);
                    continue;
                }
            },
            _ = &mut shutdown => break,
        };

        let acceptor = acceptor.clone();
        let tower_service = app.clone();
        tokio::spawn(async move {
            let stream = match acceptor.accept(stream).await {
                Ok(stream) => stream,
                Err(err) => {
                    debug!("TLS handshake with {} failed: {}", peer, err);
                    return;
                }
            };
            let hyper_service =
                hyper::service::service_fn(move |request: hyper::Request<Incoming>| {
                    tower_service.clone().call(request)
                });
            if let Err(err) = auto::Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(stream), hyper_service)
                .await
            {
                debug!("Connection with {} ended with error: {}", peer, err);
            }
        });
    }
    Ok(())
}
